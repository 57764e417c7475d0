use crate::config::settings::CopySettings;
use crate::utils::error::{CopyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional TOML file layered under the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub source: Option<SourceConfig>,
    pub target: Option<TargetConfig>,
    pub copy: Option<CopyConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub url: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyConfig {
    pub batch_size: Option<usize>,
    pub table_prefix: Option<String>,
    pub default_varchar_length: Option<u32>,
    pub tables: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CopyError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CopyError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DB_IN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// Overwrites every setting this file specifies.
    pub fn apply_to(&self, settings: &mut CopySettings) {
        if let Some(source) = &self.source {
            if let Some(url) = &source.url {
                settings.source_url = url.clone();
            }
            if let Some(schema) = &source.schema {
                settings.schema = schema.clone();
            }
        }

        if let Some(url) = self.target.as_ref().and_then(|t| t.url.as_ref()) {
            settings.target_url = url.clone();
        }

        if let Some(copy) = &self.copy {
            if let Some(batch_size) = copy.batch_size {
                settings.batch_size = batch_size;
            }
            if let Some(prefix) = &copy.table_prefix {
                settings.table_prefix = prefix.clone();
            }
            if let Some(length) = copy.default_varchar_length {
                settings.default_varchar_length = length;
            }
            if let Some(tables) = &copy.tables {
                settings.include_tables = tables.clone();
            }
            if let Some(exclude) = &copy.exclude {
                settings.exclude_tables = exclude.clone();
            }
            if let Some(timeout) = copy.connect_timeout_seconds {
                settings.connect_timeout_seconds = timeout;
            }
        }

        if let Some(monitoring) = &self.monitoring {
            settings.monitor = monitoring.enabled;
        }
    }
}
