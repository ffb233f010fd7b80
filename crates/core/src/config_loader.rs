use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering defaults, TOML, and `DUEL_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value has the wrong type.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base(path).extract()?;
        Ok(config)
    }

    /// Loads application configuration with a specific profile overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(path: &str, profile: &str) -> Result<AppConfig> {
        let overlay = path.strip_suffix(".toml").unwrap_or(path);
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(format!("{overlay}.{profile}.toml")))
            .merge(Env::prefixed("DUEL_").split("__"))
            .extract()?;

        Ok(config)
    }

    fn base(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DUEL_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use figment::Jail;

    #[test]
    fn test_defaults_when_file_missing() {
        Jail::expect_with(|_jail| {
            let config = ConfigLoader::load_from("config/missing.toml").unwrap();
            assert_eq!(config.run_mode, RunMode::Staging);
            assert!(config.feed.api_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_toml_and_env_layering() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all("config").expect("create config dir");
            jail.create_file(
                "config/Config.toml",
                r#"
                run_mode = "principal"

                [feed]
                base_url = "http://feed.local"
                requests_per_minute = 30
                timeout_secs = 5
                "#,
            )?;
            jail.set_env("DUEL_FEED__API_KEY", "from-env");

            let config = ConfigLoader::load().unwrap();
            assert_eq!(config.run_mode, RunMode::Principal);
            assert_eq!(config.feed.base_url, "http://feed.local");
            assert_eq!(config.feed.requests_per_minute, 30);
            assert_eq!(config.feed.api_key.as_deref(), Some("from-env"));
            Ok(())
        });
    }

    #[test]
    fn test_profile_overlay_wins() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all("config").expect("create config dir");
            jail.create_file("config/Config.toml", "run_mode = \"staging\"")?;
            jail.create_file("config/Config.proxy.toml", "run_mode = \"proxy\"")?;

            let config = ConfigLoader::load_with_profile("config/Config.toml", "proxy").unwrap();
            assert_eq!(config.run_mode, RunMode::Proxy);
            Ok(())
        });
    }
}
