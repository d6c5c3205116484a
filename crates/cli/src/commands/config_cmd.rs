//! `parley config`: print the default configuration.

use parley_config::AppConfig;

pub fn show() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", AppConfig::default_toml());
}

#[cfg(test)]
mod tests {
    use parley_config::AppConfig;

    #[test]
    fn default_toml_names_every_section() {
        let toml = AppConfig::default_toml();
        for section in ["[llm]", "[satori]", "[store]", "[bot]", "[limits]"] {
            assert!(toml.contains(section), "missing {section}");
        }
    }
}
