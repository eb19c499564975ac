use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::sink::ApiToken;

/// Main configuration structure for the sink supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Network the sink indexes (polygon, mainnet, goerli, ...)
    #[serde(default = "default_network")]
    pub network: String,

    /// Release asset name matched when downloading the sink binary
    #[serde(default = "default_binary_os")]
    pub binary_os: String,

    /// Substreams package the sink runs
    #[serde(default = "default_release_uri")]
    pub release_uri: String,

    /// Substreams API token handed to the sink process
    #[serde(default)]
    pub api_token: Option<ApiToken>,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Sink process configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_network() -> String {
    "polygon".to_string()
}

fn default_binary_os() -> String {
    // local development default; deployments set their own platform
    "substreams-sink-postgres_darwin_arm64".to_string()
}

fn default_release_uri() -> String {
    "https://github.com/decentraland/decentraland-substreams/releases/download/0.0.3/decentraland-substreams-v0.0.3.spkg"
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: default_network(),
            binary_os: default_binary_os(),
            release_uri: default_release_uri(),
            api_token: None,
            database: DatabaseConfig::default(),
            sink: SinkConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Upstream firehose endpoint for the configured network.
    pub fn upstream_endpoint(&self) -> String {
        let host = match self.network.as_str() {
            "goerli" => "goerli.eth",
            "mainnet" => "mainnet.eth",
            other => other,
        };
        format!("{host}.streamingfast.io:443")
    }
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database_host")]
    pub host: String,

    #[serde(default = "default_database_port")]
    pub port: u16,

    /// Database name
    #[serde(default)]
    pub database: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// URL scheme the sink binary expects in its DSN
    #[serde(default = "default_dsn_scheme")]
    pub scheme: String,
}

fn default_database_host() -> String {
    "localhost".to_string()
}

const fn default_database_port() -> u16 {
    5432
}

const fn default_max_connections() -> u32 {
    10
}

fn default_dsn_scheme() -> String {
    "psql".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            host: default_database_host(),
            port: default_database_port(),
            database: String::new(),
            max_connections: default_max_connections(),
            scheme: default_dsn_scheme(),
        }
    }
}

impl DatabaseConfig {
    /// DSN handed to the sink binary, pinned to one schema.
    pub fn sink_dsn(&self, schema: &str) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?sslmode=disable&schema={schema}",
            self.scheme, self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Sink process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Schema file passed to `setup`
    #[serde(default = "default_schema_file")]
    pub schema_file: String,

    /// File receiving the child's combined output, truncated per run
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    #[serde(default = "default_out_directory")]
    pub out_directory: PathBuf,

    /// Working directory of the child process
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Prometheus endpoint exposed by the sink binary
    #[serde(default = "default_metrics_url")]
    pub metrics_url: String,

    /// Latest-release metadata endpoint of the sink binary
    #[serde(default = "default_release_index_url")]
    pub release_index_url: String,

    /// Prefix of every schema namespace
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    #[serde(default)]
    pub development_mode: bool,

    /// Kill a run that has not exited after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Restarts tolerated before a crash-looping job gives up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// A run lasting at least this long resets the restart counter
    #[serde(default = "default_restart_reset_secs")]
    pub restart_reset_secs: u64,

    /// Maximum head block drift for the sink to count as ready
    #[serde(default = "default_readiness_threshold_secs")]
    pub readiness_threshold_secs: f64,

    /// Name of the supervised job
    #[serde(default = "default_job_name")]
    pub job_name: String,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("./substreams-sink-postgres")
}

fn default_schema_file() -> String {
    "schema.sql".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs.txt")
}

fn default_out_directory() -> PathBuf {
    PathBuf::from("./")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("./")
}

fn default_metrics_url() -> String {
    "http://0.0.0.0:9102".to_string()
}

fn default_release_index_url() -> String {
    "https://api.github.com/repos/streamingfast/substreams-sink-postgres/releases/latest".to_string()
}

fn default_schema_prefix() -> String {
    "dcl".to_string()
}

const fn default_max_restarts() -> u32 {
    5
}

const fn default_restart_reset_secs() -> u64 {
    60
}

const fn default_readiness_threshold_secs() -> f64 {
    120.0
}

fn default_job_name() -> String {
    "substreamsCli".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            schema_file: default_schema_file(),
            log_file: default_log_file(),
            out_directory: default_out_directory(),
            working_dir: default_working_dir(),
            metrics_url: default_metrics_url(),
            release_index_url: default_release_index_url(),
            schema_prefix: default_schema_prefix(),
            development_mode: false,
            run_timeout_secs: None,
            max_restarts: default_max_restarts(),
            restart_reset_secs: default_restart_reset_secs(),
            readiness_threshold_secs: default_readiness_threshold_secs(),
            job_name: default_job_name(),
        }
    }
}

impl SinkConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_server_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation of file logs: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
