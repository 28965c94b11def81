use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug)]
pub struct BusConfig {
    #[serde(default = "defaults::prefix")]
    pub prefix: String,
    #[serde(default = "defaults::domain")]
    pub domain: String,
    #[serde(default = "defaults::domain_bytes")]
    pub domain_bytes: u64,
    #[serde(default = "defaults::slot_bytes")]
    pub slot_bytes: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn prefix() -> String {
        "/dev/shm".into()
    }

    pub fn domain() -> String {
        "basalt".into()
    }

    pub fn domain_bytes() -> u64 {
        4 << 20
    }

    pub fn slot_bytes() -> u64 {
        16 << 20
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            prefix: defaults::prefix(),
            domain: defaults::domain(),
            domain_bytes: defaults::domain_bytes(),
            slot_bytes: defaults::slot_bytes(),
            log_level: defaults::log_level(),
        }
    }
}

impl BusConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: BusConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_all_defaults() {
        let cfg: BusConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.prefix, "/dev/shm");
        assert_eq!(cfg.domain, "basalt");
        assert_eq!(cfg.domain_bytes, 4 << 20);
        assert_eq!(cfg.slot_bytes, 16 << 20);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg: BusConfig = toml::from_str(
            r#"
            prefix = "/tmp/bus"
            domain = "robot"
            slot_bytes = 65536
            "#,
        )
        .unwrap();
        assert_eq!(cfg.prefix, "/tmp/bus");
        assert_eq!(cfg.domain, "robot");
        assert_eq!(cfg.slot_bytes, 65536);
        assert_eq!(cfg.domain_bytes, 4 << 20);
    }
}
