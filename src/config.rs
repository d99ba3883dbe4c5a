//! 应用配置模块

use crate::core::SyncConfig;
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

/// 应用配置（JSON 配置文件，各部分独立读取，缺失的部分使用默认值）
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// 从配置文件加载；未指定或文件不存在时使用默认配置，格式错误时报错
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let Some(config_file) = config_file else {
            return Ok(Self::default());
        };

        if !config_file.exists() {
            debug!("配置文件不存在，使用默认配置: {:?}", config_file);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_file)
            .with_context(|| format!("failed to read config file {}", config_file.display()))?;
        Self::parse(&content)
            .with_context(|| format!("invalid config file {}", config_file.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: serde_json::Value = serde_json::from_str(content)?;

        Ok(Self {
            sync: section(&config, "sync")?,
            log: section(&config, "log")?,
        })
    }
}

fn section<T: DeserializeOwned + Default>(config: &serde_json::Value, key: &str) -> Result<T> {
    match config.get(key) {
        Some(value) => serde_json::from_value(value.clone())
            .with_context(|| format!("invalid \"{}\" section", key)),
        None => Ok(T::default()),
    }
}
