//! 配置模块，负责加载实体元数据JSON文件以及编译器选项

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::catalog::MemoryCatalog;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),
    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 过滤值写入谓词文本时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueEscaping {
    /// 只在缺少单引号的一侧补上引号, 与旧输出完全一致;
    /// 值中的单引号和字段中的 `.`/反引号都不做处理, 存在注入风险
    #[default]
    Verbatim,
    /// 值中的单引号与反斜杠全部转义, 并总是用单引号包裹;
    /// 未映射的字段按 `.` 分段用反引号包裹, 内部反引号加倍。
    ///
    /// 反斜杠加倍只适用于 MySQL 默认 sql_mode; 开启 `NO_BACKSLASH_ESCAPES`
    /// 时反斜杠是普通字符, 加倍后会改变值本身
    Escaped,
}

/// 编译器配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub value_escaping: ValueEscaping,
}

/// 从JSON文件加载实体元数据
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<MemoryCatalog, ConfigError> {
    let path_ref = path.as_ref();
    let display = path_ref.display().to_string();

    if !path_ref.exists() {
        return Err(ConfigError::NotFound(display));
    }

    let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;

    let catalog: MemoryCatalog = serde_json::from_str(&content)
        .map_err(|source| ConfigError::Parse { path: display, source })?;

    tracing::info!(path = %path_ref.display(), entities = catalog.entities.len(), "loaded entity catalog");
    Ok(catalog)
}
