//! buildstate configuration — YAML schema and loader.
//!
//! Two knobs today: how strictly `ingest` treats builder payloads, and the
//! default log filter for the command-line front end.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How `ingest` treats fields it does not recognise on a component entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Unknown fields are an error.
    Strict,
    /// Unknown fields are dropped.
    #[default]
    Lenient,
}

impl FromStr for IngestMode {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(IngestMode::Strict),
            "lenient" => Ok(IngestMode::Lenient),
            _ => Err(format!("unknown ingest mode: '{s}' (expected strict/lenient)")),
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub ingest: IngestMode,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StateConfig {
    /// Parse a configuration from YAML text. Missing sections take defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid config: {e}"))
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = StateConfig::from_yaml_str("").unwrap();
        assert_eq!(cfg.ingest, IngestMode::Lenient);
        assert_eq!(cfg.logging.filter, "info");
    }

    #[test]
    fn parses_full_config() {
        let yaml = "ingest: strict\nlogging:\n  filter: buildstate=debug\n";
        let cfg = StateConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.ingest, IngestMode::Strict);
        assert_eq!(cfg.logging.filter, "buildstate=debug");
    }

    #[test]
    fn partial_logging_section() {
        let cfg = StateConfig::from_yaml_str("logging: {}\n").unwrap();
        assert_eq!(cfg.logging.filter, "info");
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = StateConfig::from_yaml_str("ingest: sloppy\n").unwrap_err();
        assert!(err.contains("invalid config"));
    }

    #[test]
    fn ingest_mode_from_str() {
        assert_eq!("STRICT".parse::<IngestMode>().unwrap(), IngestMode::Strict);
        assert_eq!("lenient".parse::<IngestMode>().unwrap(), IngestMode::Lenient);
        assert!("loose".parse::<IngestMode>().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ingest: strict").unwrap();
        let cfg = StateConfig::load(file.path()).unwrap();
        assert_eq!(cfg.ingest, IngestMode::Strict);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = StateConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.contains("failed to read"));
    }
}
