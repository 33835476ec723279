mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./config.toml", "./reelvault.toml", "/etc/reelvault/config.toml"];

    for path_str in default_paths {
        let path = Path::new(path_str);
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.matching.auto_match_threshold) {
        anyhow::bail!("auto_match_threshold must be within 0.0..=1.0");
    }
    if !(0.0..=1.0).contains(&config.matching.ambiguity_margin) {
        anyhow::bail!("ambiguity_margin must be within 0.0..=1.0");
    }
    if !(0.0..=1.0).contains(&config.transcode.completion_threshold) {
        anyhow::bail!("completion_threshold must be within 0.0..=1.0");
    }
    if config.transcode.segment_secs == 0 {
        anyhow::bail!("segment_secs cannot be 0");
    }
    if config.tmdb.requests_per_second == 0 {
        anyhow::bail!("tmdb.requests_per_second cannot be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.matching.auto_match_threshold, 0.7);
        assert_eq!(config.matching.ambiguity_margin, 0.1);
        assert_eq!(config.transcode.completion_threshold, 0.9);
        assert!(config.tmdb.api_key.is_none());
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tmdb]
api_key = "abc123"

[matching]
auto_match_threshold = 0.8
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tmdb.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.matching.auto_match_threshold, 0.8);
        // Unspecified sections keep their defaults.
        assert_eq!(config.matching.ambiguity_margin, 0.1);
        assert_eq!(config.transcode.segment_secs, 6);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[matching]
auto_match_threshold = 1.5
"#
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
