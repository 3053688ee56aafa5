use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use storefront_auth::AuthClientConfig;

/// Environment prefix for overrides, e.g. `STOREFRONT__AUTH__BASE_URL`.
pub const ENV_PREFIX: &str = "STOREFRONT__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub auth: AuthClientConfig,
    /// Where the session credentials are kept between runs. Defaults to
    /// `$HOME/.storefront/session.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            auth: AuthClientConfig::default(),
            credentials_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl CliConfig {
    /// Resolve the credentials file, falling back to `$HOME/.storefront`.
    ///
    /// Fails when no path is configured and `HOME` is unset, rather than
    /// writing credentials relative to the working directory.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_path {
            return Ok(path.clone());
        }
        let home = std::env::var("HOME")
            .context("HOME is not set; pass --credentials or set credentials_path")?;
        Ok(Path::new(&home).join(".storefront").join("session.json"))
    }

    /// Layered load: defaults, then the YAML file (if any), then
    /// `STOREFRONT__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load configuration")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let cfg = CliConfig::load(None).unwrap();
            assert_eq!(cfg.auth.refresh_path, "/auth/refresh");
            assert_eq!(cfg.logging.format, LogFormat::Text);
            Ok(())
        });
    }

    #[test]
    fn yaml_then_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "storefront.yaml",
                r#"
auth:
  base_url: "https://api.shop.test/"
  refresh_timeout: "5s"
credentials_path: "/tmp/sf/session.json"
logging:
  format: json
"#,
            )?;
            jail.set_env("STOREFRONT__AUTH__REFRESH_TIMEOUT", "20s");

            let cfg = CliConfig::load(Some(Path::new("storefront.yaml"))).unwrap();
            assert_eq!(cfg.auth.base_url.as_ref().unwrap().as_str(), "https://api.shop.test/");
            assert_eq!(cfg.auth.refresh_timeout, Duration::from_secs(20));
            assert_eq!(
                cfg.credentials_path().unwrap(),
                PathBuf::from("/tmp/sf/session.json")
            );
            assert_eq!(cfg.logging.format, LogFormat::Json);
            Ok(())
        });
    }

    #[test]
    fn credentials_default_under_home() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("HOME", "/home/shopper");
            let cfg = CliConfig::load(None).unwrap();
            assert_eq!(
                cfg.credentials_path().unwrap(),
                PathBuf::from("/home/shopper/.storefront/session.json")
            );
            Ok(())
        });
    }

    #[test]
    fn credentials_path_requires_home_when_unset() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let cfg = CliConfig::load(None).unwrap();
            let err = cfg.credentials_path().unwrap_err();
            assert!(err.to_string().contains("HOME is not set"), "got {err:#}");

            jail.set_env("STOREFRONT__CREDENTIALS_PATH", "/srv/sf/session.json");
            let cfg = CliConfig::load(None).unwrap();
            assert_eq!(
                cfg.credentials_path().unwrap(),
                PathBuf::from("/srv/sf/session.json")
            );
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("storefront.yaml", "auth:\n  refresh_timout: 5s\n")?;
            assert!(CliConfig::load(Some(Path::new("storefront.yaml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        figment::Jail::expect_with(|_jail| {
            assert!(CliConfig::load(Some(Path::new("nope.yaml"))).is_err());
            Ok(())
        });
    }
}
