//! `chronicle budget` — Show how a token budget splits across categories.

use chronicle_config::EngineConfig;
use chronicle_context::prioritizer::allocate_budget;

pub fn run(config: &EngineConfig, total: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(config, total)?);
    Ok(())
}

fn render(config: &EngineConfig, total: Option<usize>) -> Result<String, serde_json::Error> {
    let total = total.unwrap_or(config.budget.total_tokens);
    let allocation = allocate_budget(total, &config.budget.percentages);
    serde_json::to_string_pretty(&serde_json::json!({
        "total": total,
        "allocated": allocation.total(),
        "allocation": allocation,
    }))
}
