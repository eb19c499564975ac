use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{is_plain_identifier, Config};

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sink.yaml";

/// Flat variable names of older deployments and the keys they set.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PG_COMPONENT_PSQL_USER", "database.user"),
    ("PG_COMPONENT_PSQL_PASSWORD", "database.password"),
    ("PG_COMPONENT_PSQL_HOST", "database.host"),
    ("PG_COMPONENT_PSQL_DATABASE", "database.database"),
    ("NETWORK", "network"),
    ("BINARY_OS", "binary_os"),
    ("SPKG_PATH", "release_uri"),
    ("SUBSTREAMS_API_TOKEN", "api_token"),
    ("HTTP_SERVER_HOST", "server.host"),
];

const LEGACY_PORT_ENV: &[(&str, &str)] = &[
    ("PG_COMPONENT_PSQL_PORT", "database.port"),
    ("HTTP_SERVER_PORT", "server.port"),
];

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid schema prefix: {0:?}. Must be a lowercase SQL identifier")]
    InvalidSchemaPrefix(String),

    #[error("Invalid port in {var}: {value}")]
    InvalidPort { var: &'static str, value: String },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. YAML file (`sink.yaml` unless `path` is given, optional)
    /// 3. Environment variables (SINK_* prefix, `__` separates nesting)
    /// 4. Legacy flat variables (PG_COMPONENT_PSQL_*, NETWORK, ...)
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config = Self::extract(path)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Merge and deserialize without validating, for commands that only need
    /// part of the configuration.
    pub fn extract(path: Option<&Path>) -> Result<Config> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(path)?
            .extract()
            .context(format!("Failed to load config from {}", path.display()))
    }

    /// The merged provider stack, before extraction.
    pub fn figment(path: &Path) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SINK_").split("__"));

        for (var, key) in LEGACY_ENV {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        for (var, key) in LEGACY_PORT_ENV {
            if let Ok(value) = std::env::var(var) {
                let Ok(port) = value.trim().parse::<u16>() else {
                    return Err(ConfigError::InvalidPort { var: *var, value });
                };
                figment = figment.merge(Serialized::default(key, port));
            }
        }

        Ok(figment)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let database = &config.database;
        if database.user.is_empty() {
            return Err(ConfigError::MissingSetting("database.user"));
        }
        if database.host.is_empty() {
            return Err(ConfigError::MissingSetting("database.host"));
        }
        if database.database.is_empty() {
            return Err(ConfigError::MissingSetting("database.database"));
        }
        if database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(database.max_connections));
        }

        if config.network.is_empty() {
            return Err(ConfigError::MissingSetting("network"));
        }

        // the prefix is interpolated into DDL
        let prefix = &config.sink.schema_prefix;
        if prefix.ends_with(|c: char| c.is_ascii_digit()) || !is_plain_identifier(prefix) {
            return Err(ConfigError::InvalidSchemaPrefix(prefix.clone()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ALL_ENV: &[&str] = &[
        "PG_COMPONENT_PSQL_USER",
        "PG_COMPONENT_PSQL_PASSWORD",
        "PG_COMPONENT_PSQL_HOST",
        "PG_COMPONENT_PSQL_PORT",
        "PG_COMPONENT_PSQL_DATABASE",
        "NETWORK",
        "BINARY_OS",
        "SPKG_PATH",
        "SUBSTREAMS_API_TOKEN",
        "HTTP_SERVER_HOST",
        "HTTP_SERVER_PORT",
        "SINK_NETWORK",
        "SINK_DATABASE__HOST",
    ];

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.database.user = "sink".to_string();
        config.database.database = "indexer".to_string();
        config
    }

    fn unset_all() -> Vec<(&'static str, Option<&'static str>)> {
        ALL_ENV.iter().map(|var| (*var, None)).collect()
    }

    #[test]
    fn test_default_config_requires_database_settings() {
        let config = Config::default();
        assert_eq!(config.network, "polygon");
        assert_eq!(config.sink.schema_prefix, "dcl");
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingSetting("database.user"))
        ));
        ConfigLoader::validate(&valid_config()).expect("filled in config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
network: mainnet
database:
  user: sink
  host: db
  database: indexer
sink:
  development_mode: true
  run_timeout_secs: 3600
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.network, "mainnet");
        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.port, 5432);
        assert!(config.sink.development_mode);
        assert_eq!(config.sink.run_timeout_secs, Some(3600));
        assert_eq!(config.sink.max_restarts, 5);
        assert_eq!(config.logging.format, "pretty");
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_legacy_env_overrides_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network: goerli\ndatabase:\n  user: yaml_user\n  database: yaml_db").unwrap();

        let mut vars = unset_all();
        vars.extend([
            ("PG_COMPONENT_PSQL_USER", Some("env_user")),
            ("PG_COMPONENT_PSQL_PASSWORD", Some("hunter2")),
            ("PG_COMPONENT_PSQL_PORT", Some("6543")),
            ("NETWORK", Some("polygon")),
            ("SUBSTREAMS_API_TOKEN", Some("token-abc")),
            ("HTTP_SERVER_PORT", Some("8080")),
        ]);

        temp_env::with_vars(vars, || {
            let config = ConfigLoader::load(Some(file.path())).unwrap();
            assert_eq!(config.network, "polygon");
            assert_eq!(config.database.user, "env_user");
            assert_eq!(config.database.password, "hunter2");
            assert_eq!(config.database.port, 6543);
            assert_eq!(config.database.database, "yaml_db");
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.api_token.as_ref().map(|t| t.expose()), Some("token-abc"));
        });
    }

    #[test]
    fn test_prefixed_env_nesting() {
        let mut vars = unset_all();
        vars.extend([
            ("PG_COMPONENT_PSQL_USER", Some("sink")),
            ("PG_COMPONENT_PSQL_DATABASE", Some("indexer")),
            ("SINK_DATABASE__HOST", Some("replica")),
            ("SINK_NETWORK", Some("mainnet")),
        ]);

        temp_env::with_vars(vars, || {
            let config = ConfigLoader::load(Some(Path::new("does-not-exist.yaml"))).unwrap();
            assert_eq!(config.database.host, "replica");
            assert_eq!(config.network, "mainnet");
        });
    }

    #[test]
    fn test_legacy_env_wins_over_prefixed() {
        let mut vars = unset_all();
        vars.extend([("SINK_NETWORK", Some("mainnet")), ("NETWORK", Some("goerli"))]);

        temp_env::with_vars(vars, || {
            let config: Config = ConfigLoader::figment(Path::new("does-not-exist.yaml"))
                .unwrap()
                .extract()
                .unwrap();
            assert_eq!(config.network, "goerli");
        });
    }

    #[test]
    fn test_invalid_legacy_port() {
        let mut vars = unset_all();
        vars.push(("PG_COMPONENT_PSQL_PORT", Some("not-a-port")));

        temp_env::with_vars(vars, || {
            let err = ConfigLoader::figment(Path::new("does-not-exist.yaml")).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPort { var: "PG_COMPONENT_PSQL_PORT", .. }));
        });
    }

    #[test]
    fn test_token_is_not_required_at_load() {
        let config = valid_config();
        assert!(config.api_token.is_none());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = valid_config();
        config.database.max_connections = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_empty_network() {
        let mut config = valid_config();
        config.network = String::new();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingSetting("network"))
        ));
    }

    #[test]
    fn test_validate_schema_prefix() {
        for prefix in ["", "DCL", "dcl;", "dcl2"] {
            let mut config = valid_config();
            config.sink.schema_prefix = prefix.to_string();
            assert!(
                matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidSchemaPrefix(_))),
                "prefix {prefix:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }
}
