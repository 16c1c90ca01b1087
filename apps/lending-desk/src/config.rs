//! Desk configuration, layered: defaults → file → env → CLI flags.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::Provider;
use figment::providers::{Env, Format, Serialized, Toml};
use nebula_pool::PoolConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "lending-desk.toml";

/// Environment variable prefix, e.g. `LENDING_READERS=50`.
pub const ENV_PREFIX: &str = "LENDING_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Copies of the book on the shelf (pool capacity)
    pub copies: u32,
    /// Concurrent readers to simulate
    pub readers: usize,
    /// Upper bound on how long a reader keeps a book
    pub max_hold_ms: u64,
    /// Give up on a checkout after this long; wait forever when unset
    pub acquire_timeout_ms: Option<u64>,
    pub author: String,
    pub title: String,
    /// `tracing` filter directive
    pub log: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            copies: 2,
            readers: 20,
            max_hold_ms: 1000,
            acquire_timeout_ms: None,
            author: "pei".to_string(),
            title: "hal".to_string(),
            log: "info".to_string(),
        }
    }
}

impl DeskConfig {
    /// Load the layered config.
    ///
    /// `path` must exist when given; otherwise [`DEFAULT_CONFIG_FILE`] is
    /// read if present. `overrides` is merged last (CLI flags).
    pub fn load(path: Option<&Path>, overrides: impl Provider) -> Result<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => Toml::file(path),
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(overrides)
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.copies == 0 && self.acquire_timeout_ms.is_none() {
            return Err(Error::Config(
                "copies must be at least 1 unless acquire_timeout_ms is set".to_string(),
            ));
        }
        if self.acquire_timeout_ms == Some(0) {
            return Err(Error::Config(
                "acquire_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }

    /// Pool settings for the shelf.
    pub fn pool_config(&self) -> PoolConfig {
        let config = PoolConfig::named("books");
        match self.acquire_timeout_ms {
            Some(ms) => config.with_acquire_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[derive(Serialize)]
    struct NoOverrides {}

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = DeskConfig::load(None, Serialized::defaults(NoOverrides {})).unwrap();
            assert_eq!(config, DeskConfig::default());
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    copies = 3
                    readers = 5
                    title = "rust"
                "#,
            )?;
            jail.set_env("LENDING_READERS", "7");
            jail.set_env("LENDING_MAX_HOLD_MS", "10");

            #[derive(Serialize)]
            struct Flags {
                copies: u32,
            }

            let config = DeskConfig::load(None, Serialized::defaults(Flags { copies: 4 })).unwrap();
            assert_eq!(config.copies, 4);
            assert_eq!(config.readers, 7);
            assert_eq!(config.max_hold_ms, 10);
            assert_eq!(config.title, "rust");
            assert_eq!(config.author, "pei");
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = DeskConfig::load(
                Some(Path::new("nope.toml")),
                Serialized::defaults(NoOverrides {}),
            )
            .unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn empty_shelf_needs_a_timeout() {
        let config = DeskConfig {
            copies: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DeskConfig {
            copies: 0,
            acquire_timeout_ms: Some(50),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.pool_config().acquire_timeout,
            Some(Duration::from_millis(50))
        );
    }
}
