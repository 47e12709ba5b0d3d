//! Configuration Storage
//!
//! This module reads the configuration file from disk and locates the
//! per-user files the REPL keeps (line history).

use crate::config::Config;
use crate::error::{Result, SqlChatError};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Directory under the home directory holding REPL state
const STATE_DIR: &str = ".sql-chat";

/// History file name
const HISTORY_FILE: &str = "history";

impl Config {
    /// Load configuration from a file
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    /// Unknown keys are ignored; missing required keys are an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            SqlChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&content)
                .map_err(|e| SqlChatError::Config(format!("{}: {}", path.display(), e)))
        } else {
            Self::from_json_str(&content)
                .map_err(|e| SqlChatError::Config(format!("{}: {}", path.display(), e)))
        }
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| SqlChatError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SqlChatError::Config(format!("Failed to parse config: {}", e.message())))
    }
}

/// Path of the REPL history file
pub fn history_file() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(STATE_DIR).join(HISTORY_FILE))
        .unwrap_or_else(|| PathBuf::from(".sql-chat-history"))
}

/// Make sure the history file's directory exists
pub fn ensure_history_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"{
        "openAIAPIKey": "sk-test-123",
        "openAIModel": "gpt-4o",
        "dbTimeoutMs": 5000,
        "apiTimeoutMs": 30000,
        "postgresConnection": {
            "host": "aact-db.ctti-clinicaltrials.org",
            "port": 5432,
            "database": "aact",
            "user": "reader",
            "password": "secret"
        }
    }"#;

    #[test]
    fn test_load_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.openai_api_key, "sk-test-123");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.db_timeout_ms, 5000);
        assert_eq!(config.api_timeout_ms, 30000);
        assert_eq!(config.postgres_connection.host, "aact-db.ctti-clinicaltrials.org");
        assert_eq!(config.postgres_connection.port, 5432);
        assert_eq!(config.postgres_connection.database, "aact");
        assert_eq!(config.postgres_connection.user, "reader");
        assert_eq!(config.postgres_connection.password, "secret");
    }

    #[test]
    fn test_optional_keys_default() {
        let config = Config::from_json_str(FULL_CONFIG).unwrap();
        assert_eq!(config.schema_name, "public");
        assert_eq!(config.sample_rows, 3);
        assert_eq!(config.history_turns, 10);
        assert!(!config.allow_writes);
        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_missing_required_key() {
        let content = FULL_CONFIG.replace("\"apiTimeoutMs\": 30000,", "");
        let err = Config::from_json_str(&content).unwrap_err();
        assert!(matches!(err, SqlChatError::Config(_)));
        assert!(err.to_string().contains("apiTimeoutMs"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/definitely/not/here/config.json").unwrap_err();
        assert!(matches!(err, SqlChatError::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = Config::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SqlChatError::Config(_)));
    }

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
openAIAPIKey = "sk-toml"
openAIModel = "gpt-4o-mini"
dbTimeoutMs = 1000
apiTimeoutMs = 2000
schemaName = "ctgov"
sampleRows = 5

[postgresConnection]
host = "localhost"
port = 5433
database = "aact"
user = "reader"
password = "pw"
"#;
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.openai_api_key, "sk-toml");
        assert_eq!(config.schema_name, "ctgov");
        assert_eq!(config.sample_rows, 5);
        assert_eq!(config.postgres_connection.port, 5433);
    }

    #[test]
    fn test_history_file_name() {
        assert!(history_file().ends_with("history"));
    }
}
