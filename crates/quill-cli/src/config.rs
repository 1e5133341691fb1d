//! Configuration file parsing for quill.toml.

use quill_value::RuntimeConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Value engine settings installed for every command
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Indentation width of the debug tree
    #[serde(default = "default_indent")]
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: default_indent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

/// Load configuration from a file or search for quill.toml.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        Some(path) => Err(anyhow::anyhow!("Config file not found: {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Search for quill.toml in the current directory and its parents.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join("quill.toml"))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_value::TextEncoding;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runtime, RuntimeConfig::default());
        assert!(config.output.pretty);
        assert_eq!(config.output.indent, 2);
    }

    #[test]
    fn test_parse_runtime_config() {
        let toml = r#"
[runtime]
encoding = "latin-1"
unicode_semantics = true
max_depth = 64
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.runtime.encoding, TextEncoding::Latin1);
        assert!(config.runtime.unicode_semantics);
        assert_eq!(config.runtime.max_depth, 64);
        assert_eq!(config.runtime.large_chunk_size, 4096);
    }

    #[test]
    fn test_parse_output_config() {
        let toml = r#"
[output]
pretty = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.output.pretty);
        assert_eq!(config.output.indent, 2);
    }

    #[test]
    fn test_encoding_aliases() {
        let config: Config = toml::from_str("[runtime]\nencoding = \"utf8\"\n").unwrap();
        assert_eq!(config.runtime.encoding, TextEncoding::Utf8);
        assert!(toml::from_str::<Config>("[runtime]\nencoding = \"ebcdic\"\n").is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let missing = Path::new("/nonexistent/quill.toml");
        assert!(load_config(Some(missing)).is_err());
    }
}
