use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// How the editor names new blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategyName {
    #[default]
    Random,
    Monotonic,
}

/// `[editor]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    pub id_strategy: IdStrategyName,
    /// Prefix for monotonic IDs; ignored for random ones.
    pub id_prefix: String,
    pub trailing_block: bool,
    pub block_cache: bool,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategyName::Random,
            id_prefix: "b".to_string(),
            trailing_block: true,
            block_cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory relative document paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_path: Option<PathBuf>,
    #[serde(default)]
    pub editor: EditorSection,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the documents directory
        config.documents_path = config
            .documents_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from_path(Self::config_path())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(Self::config_path())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/hyperblocks");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Resolve a document argument: relative paths land under
    /// `documents_path` when one is configured.
    pub fn document_path(&self, document: &Path) -> PathBuf {
        match &self.documents_path {
            Some(root) if document.is_relative() => root.join(document),
            _ => document.to_path_buf(),
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/hyperblocks/config.toml"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.editor.id_strategy, IdStrategyName::Random);
        assert!(config.editor.trailing_block);
    }

    #[test]
    fn test_partial_editor_table() {
        let config: Config = toml::from_str(
            r#"
[editor]
id_strategy = "monotonic"
id_prefix = "blk"
"#,
        )
        .unwrap();

        assert_eq!(config.editor.id_strategy, IdStrategyName::Monotonic);
        assert_eq!(config.editor.id_prefix, "blk");
        assert!(config.editor.block_cache);
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[editor]\nid_strategy = \"sequential\"\n").unwrap();

        let result = Config::load_from_path(&config_file);

        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("HYPERBLOCKS_TEST_VAR", "/test/env/path");
        }

        let expanded = Config::expand_path(Path::new("$HYPERBLOCKS_TEST_VAR/subdir"));

        assert_eq!(expanded, Some(PathBuf::from("/test/env/path/subdir")));

        unsafe {
            env::remove_var("HYPERBLOCKS_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(Path::new("~/test/path")).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let test_config = Config {
            documents_path: Some(PathBuf::from("/tmp/test-docs")),
            editor: EditorSection {
                id_strategy: IdStrategyName::Monotonic,
                trailing_block: false,
                ..EditorSection::default()
            },
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_document_path_resolution() {
        let config = Config {
            documents_path: Some(PathBuf::from("/docs")),
            ..Config::default()
        };

        assert_eq!(config.document_path(Path::new("a.md")), PathBuf::from("/docs/a.md"));
        assert_eq!(config.document_path(Path::new("/abs/b.md")), PathBuf::from("/abs/b.md"));
        assert_eq!(Config::default().document_path(Path::new("a.md")), PathBuf::from("a.md"));
    }
}
