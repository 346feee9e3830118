//! 容器配置
//!
//! 可以来自 TOML（顶层键或 `[factory]` 表）以及 `SPRIG_` 前缀的环境变量：
//!
//! ```toml
//! [factory]
//! allow_circular_references = true
//! detect_depends_on_cycles = true
//! reject_wrapped_early_references = false
//! allow_definition_overriding = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::constants::ENV_PREFIX;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse factory config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for config key '{key}', expected a boolean")]
    InvalidValue { key: String, value: String },
}

/// 容器行为开关
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    /// 是否允许通过提前暴露的引用打破单例之间的循环引用
    pub allow_circular_references: bool,

    /// dependsOn 构成环时立即失败
    pub detect_depends_on_cycles: bool,

    /// 提前暴露的引用被后置处理器替换时报错，而不是只记录警告
    pub reject_wrapped_early_references: bool,

    /// 同名注册时替换旧定义
    pub allow_definition_overriding: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            detect_depends_on_cycles: true,
            reject_wrapped_early_references: false,
            allow_definition_overriding: false,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    factory: FactoryConfig,
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn detect_depends_on_cycles(mut self, detect: bool) -> Self {
        self.detect_depends_on_cycles = detect;
        self
    }

    pub fn reject_wrapped_early_references(mut self, reject: bool) -> Self {
        self.reject_wrapped_early_references = reject;
        self
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    /// 解析 TOML 文本；存在 `[factory]` 表时只读取该表
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        if table.contains_key("factory") {
            let file: ConfigFile = toml::from_str(content)?;
            return Ok(file.factory);
        }
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loading factory config from {:?}", path);
        Self::from_toml_str(&content)
    }

    /// 用进程环境变量覆盖当前配置
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// 用给定的键值对覆盖当前配置
    ///
    /// 只处理 `SPRIG_` 前缀的键，例如 `SPRIG_ALLOW_CIRCULAR_REFERENCES=false`。
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let slot = match name.to_lowercase().as_str() {
                "allow_circular_references" => &mut self.allow_circular_references,
                "detect_depends_on_cycles" => &mut self.detect_depends_on_cycles,
                "reject_wrapped_early_references" => &mut self.reject_wrapped_early_references,
                "allow_definition_overriding" => &mut self.allow_definition_overriding,
                _ => continue,
            };
            *slot = parse_bool(key.as_ref(), value.as_ref())?;
            tracing::debug!("Factory config overridden by {}", key.as_ref());
        }
        Ok(self)
    }

    /// 默认配置加上环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
