// Framework configuration management for the harness runner
use harness_common::job::InputChannel;
use harness_common::types::Framework;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/frameworks.json";
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_DRIVER_MODULE: &str = "test_driver";
pub const DEFAULT_DRIVER_ENTRY: &str = "run_tests";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("framework config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no configuration found for framework: {0}")]
    MissingFramework(Framework),
}

/// Per-framework execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub name: Framework,
    #[serde(default = "default_python")]
    pub python: String,
    /// Test file pattern; unused by the driver variant
    #[serde(default)]
    pub pattern: Option<String>,
    /// Appended to the pytest command line; interpreter options otherwise
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub driver_module: Option<String>,
    #[serde(default)]
    pub driver_entry: Option<String>,
    /// Collect coverage even when the job does not ask for it
    #[serde(default)]
    pub coverage: bool,
    /// Seed for Python's `random` before any test runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_python() -> String {
    DEFAULT_PYTHON.to_string()
}

impl FrameworkConfig {
    /// Built-in settings used when no config file is present
    pub fn builtin(framework: Framework) -> Self {
        let (pattern, seed) = match framework {
            Framework::Unittest => (Some("test*.py".to_string()), None),
            Framework::Pytest => (Some("*test*.py".to_string()), Some(0)),
            Framework::Driver => (None, None),
        };
        let (driver_module, driver_entry) = match framework {
            Framework::Driver => (
                Some(DEFAULT_DRIVER_MODULE.to_string()),
                Some(DEFAULT_DRIVER_ENTRY.to_string()),
            ),
            _ => (None, None),
        };

        Self {
            name: framework,
            python: default_python(),
            pattern,
            extra_args: Vec::new(),
            driver_module,
            driver_entry,
            coverage: false,
            seed,
        }
    }

    pub fn driver_module(&self) -> &str {
        self.driver_module.as_deref().unwrap_or(DEFAULT_DRIVER_MODULE)
    }

    pub fn driver_entry(&self) -> &str {
        self.driver_entry.as_deref().unwrap_or(DEFAULT_DRIVER_ENTRY)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameworksJson {
    frameworks: Vec<FrameworkConfig>,
}

/// Framework configuration manager
#[derive(Debug, Clone)]
pub struct FrameworkConfigManager {
    configs: HashMap<Framework, FrameworkConfig>,
}

impl FrameworkConfigManager {
    /// Load framework configurations from a frameworks.json file
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }

        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let frameworks_json: FrameworksJson = serde_json::from_str(content)?;

        let mut configs = HashMap::new();
        for framework in frameworks_json.frameworks {
            configs.insert(framework.name, framework);
        }

        Ok(Self { configs })
    }

    /// Built-in defaults for every supported framework
    pub fn builtin() -> Self {
        let configs = Framework::ALL
            .iter()
            .map(|framework| (*framework, FrameworkConfig::builtin(*framework)))
            .collect();
        Self { configs }
    }

    /// Load with default path (config/frameworks.json), or fall back to built-ins
    pub fn load_default() -> Result<Self, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// Get configuration for a specific framework
    pub fn get_config(&self, framework: &Framework) -> Result<&FrameworkConfig, ConfigError> {
        self.configs
            .get(framework)
            .ok_or(ConfigError::MissingFramework(*framework))
    }

    /// List all configured frameworks
    pub fn list_frameworks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().map(|f| f.to_string()).collect();
        names.sort();
        names
    }
}

/// Everything one harness run needs, resolved from flags, env and file
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub framework: FrameworkConfig,
    pub input: InputChannel,
    pub code_root: PathBuf,
    pub tests_root: PathBuf,
    /// Child output goes here instead of the null device
    pub capture_file: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn framework(&self) -> Framework {
        self.framework.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_covers_every_framework() {
        let manager = FrameworkConfigManager::builtin();
        for framework in Framework::ALL {
            let config = manager.get_config(&framework).unwrap();
            assert_eq!(config.name, framework);
            assert_eq!(config.python, DEFAULT_PYTHON);
        }
        assert_eq!(manager.list_frameworks(), vec!["driver", "pytest", "unittest"]);
    }

    #[test]
    fn test_builtin_defaults() {
        let pytest = FrameworkConfig::builtin(Framework::Pytest);
        assert_eq!(pytest.pattern.as_deref(), Some("*test*.py"));
        assert_eq!(pytest.seed, Some(0));

        let driver = FrameworkConfig::builtin(Framework::Driver);
        assert_eq!(driver.driver_module(), DEFAULT_DRIVER_MODULE);
        assert_eq!(driver.driver_entry(), DEFAULT_DRIVER_ENTRY);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"frameworks":[
                {{"name":"driver","python":"/usr/bin/python3.10","driver_module":"lab10_tests"}},
                {{"name":"pytest","pattern":"test_*.py","coverage":true,"extra_args":["-q"]}}
            ]}}"#
        )
        .unwrap();

        let manager = FrameworkConfigManager::load(file.path()).unwrap();

        let driver = manager.get_config(&Framework::Driver).unwrap();
        assert_eq!(driver.python, "/usr/bin/python3.10");
        assert_eq!(driver.driver_module(), "lab10_tests");
        assert_eq!(driver.driver_entry(), DEFAULT_DRIVER_ENTRY);

        let pytest = manager.get_config(&Framework::Pytest).unwrap();
        assert!(pytest.coverage);
        assert_eq!(pytest.extra_args, vec!["-q"]);
        assert_eq!(pytest.python, DEFAULT_PYTHON);

        assert!(matches!(
            manager.get_config(&Framework::Unittest),
            Err(ConfigError::MissingFramework(Framework::Unittest))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = FrameworkConfigManager::load(Path::new("/nonexistent/frameworks.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"frameworks\": [{{\"name\": \"nose\"}}]}}").unwrap();
        let result = FrameworkConfigManager::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_shipped_config_parses() {
        let shipped = include_str!("../../../config/frameworks.json");
        let manager = FrameworkConfigManager::from_json(shipped).unwrap();
        assert_eq!(manager.list_frameworks().len(), 3);
    }
}
