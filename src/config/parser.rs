use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with every run so rank history can be traced back to the
/// settings that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[search]
endpoint = "https://search.example.com/ns/v1/search/paged-composite-cards"
search-page = "https://search.example.com/ns/search"
known-promoted-markers = ["AD"]

[crawl]
page-size = 40
max-pages = 3
min-delay = 500
max-delay = 900

[retry]
max-attempts = 2

[output]
database-path = "./ranks.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.page_size, 40);
        assert_eq!(config.crawl.max_pages, 3);
        assert_eq!(config.crawl.request_timeout, 10);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.delay_between_attempts, 5000);
        assert_eq!(config.search.sort, "RECOMMEND");
        assert_eq!(config.search.known_promoted_markers, vec!["AD".to_string()]);
        assert_eq!(config.output.channel, "newStore");
        assert_eq!(config.output.export_dir, "results");
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config_content = r#"
[search]
endpoint = "https://search.example.com/api"
search-page = "https://search.example.com/search"

[output]
database-path = "./ranks.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.page_size, 50);
        assert_eq!(config.crawl.max_pages, 1);
        assert_eq!(config.crawl.min_delay, 1000);
        assert_eq!(config.crawl.max_delay, 3000);
        assert!(config.client.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[search]
endpoint = "https://search.example.com/api"
search-page = "https://search.example.com/search"

[crawl]
page-size = 0

[output]
database-path = "./ranks.db"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
