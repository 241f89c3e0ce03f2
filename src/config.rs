// Configuration management for symdex

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub languages: LanguagesConfig,
    pub indexing: IndexingConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result count for hybrid search
    pub n_results: usize,
    /// Default weight for the vector score; 1.0 = pure semantic
    pub alpha: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory, relative to the project root unless absolute
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: "unnamed-project".to_string(), root: ".".to_string() }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["python".to_string(), "c".to_string(), "cpp".to_string()],
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { exclude: Vec::new() }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { n_results: 5, alpha: 0.7 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: ".symdex".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            languages: LanguagesConfig::default(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory.
    /// Looks for .symdex.toml in the project root; falls back to defaults.
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(".symdex.toml");

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                Self::default()
            }
        }
    }

    /// Whether a file passes the exclude patterns
    pub fn should_index_file(&self, file_path: &str) -> bool {
        for pattern in &self.indexing.exclude {
            if self.matches_pattern(file_path, pattern) {
                return false;
            }
        }
        true
    }

    /// Simple pattern matching: directory patterns end with '/', anything
    /// else is a substring match
    fn matches_pattern(&self, file_path: &str, pattern: &str) -> bool {
        if let Some(dir) = pattern.strip_suffix('/') {
            file_path.starts_with(pattern) || file_path.contains(&format!("/{}/", dir))
        } else {
            file_path.contains(pattern)
        }
    }

    /// Languages both enabled and actually supported
    pub fn enabled_languages(&self) -> Vec<String> {
        let supported = ["python", "c", "cpp"];
        self.languages
            .enabled
            .iter()
            .filter(|lang| supported.contains(&lang.as_str()))
            .cloned()
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }

        let supported = ["python", "c", "cpp"];
        for lang in &self.languages.enabled {
            if !supported.contains(&lang.as_str()) {
                return Err(anyhow::anyhow!("Unsupported language: {}", lang));
            }
        }

        if self.search.n_results == 0 {
            return Err(anyhow::anyhow!("search.n_results must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.search.alpha) {
            return Err(anyhow::anyhow!("search.alpha must be within [0.0, 1.0]"));
        }

        if self.storage.data_dir.is_empty() {
            return Err(anyhow::anyhow!("storage.data_dir cannot be empty"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }

        Ok(())
    }

    /// Resolve the data directory against the project root
    pub fn data_dir(&self, project_root: &Path) -> std::path::PathBuf {
        let dir = Path::new(&self.storage.data_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            project_root.join(dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.name, "unnamed-project");
        assert!(config.languages.enabled.contains(&"python".to_string()));
        assert_eq!(config.search.n_results, 5);
        assert!((config.search.alpha - 0.7).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_index_file() {
        let mut config = Config::default();
        config.indexing.exclude = vec!["generated/".to_string(), "_pb2".to_string()];

        assert!(config.should_index_file("src/main.py"));
        assert!(!config.should_index_file("generated/schema.py"));
        assert!(!config.should_index_file("src/generated/schema.py"));
        assert!(!config.should_index_file("src/api_pb2.py"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.languages.enabled = vec!["fortran".to_string()];
        assert!(config.validate().is_err());
        config.languages.enabled = vec!["c".to_string()];

        config.search.n_results = 0;
        assert!(config.validate().is_err());
        config.search.n_results = 5;

        config.search.alpha = 1.5;
        assert!(config.validate().is_err());
        config.search.alpha = 0.7;

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "debug".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".symdex.toml");
        std::fs::write(
            &path,
            r#"
[project]
name = "demo"

[search]
n_results = 10
alpha = 0.5
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.search.n_results, 10);
        // Unspecified sections fall back to defaults
        assert_eq!(config.storage.data_dir, ".symdex");
    }

    #[test]
    fn test_data_dir_resolution() {
        let config = Config::default();
        let resolved = config.data_dir(Path::new("/work/proj"));
        assert_eq!(resolved, Path::new("/work/proj/.symdex"));

        let mut abs = Config::default();
        abs.storage.data_dir = "/var/lib/symdex".to_string();
        assert_eq!(abs.data_dir(Path::new("/work/proj")), Path::new("/var/lib/symdex"));
    }
}
