//! `chronicle config` — Print the configuration.

use chronicle_config::EngineConfig;

pub fn show(config: &EngineConfig, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = if default {
        EngineConfig::default_toml()
    } else {
        toml::to_string_pretty(config)?
    };
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_back() {
        let back: EngineConfig = toml::from_str(&EngineConfig::default_toml()).unwrap();
        assert_eq!(back.budget.total_tokens, 16_000);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn loaded_config_round_trips_through_toml() {
        let mut config = EngineConfig::default();
        config.budget.total_tokens = 12_000;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.budget.total_tokens, 12_000);
    }
}
