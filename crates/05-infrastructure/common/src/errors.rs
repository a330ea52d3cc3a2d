//! 错误类型定义

use thiserror::Error;

/// 配置管理错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 对已移除的配置对象进行操作
    #[error("配置已被移除 (This Configuration has been Removed): {pid}")]
    Removed { pid: String },

    #[error("元数据缺少必需的 '{key}' 属性 (Metadata is missing mandatory '{key}' property)")]
    MetadataMissingKey { key: String },

    #[error("元数据属性 '{key}' 类型错误, 期望: {expected}")]
    MetadataTypeMismatch { key: String, expected: String },

    #[error("不支持的清单文件版本 (Unsupported manifest file version '{version}')")]
    UnsupportedVersion { version: i64 },

    #[error("参数无效: {message}")]
    InvalidArgument { message: String },

    #[error("未安装配置过滤器, 无法处理过滤表达式: {filter}")]
    FilterUnsupported { filter: String },

    #[error("过滤表达式无效: {filter}, 原因: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("后台工作线程启动失败: {name}")]
    WorkerSpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("运行参数加载失败: {source}")]
    SettingsError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ConfigError {
    /// 创建配置已移除错误
    pub fn removed(pid: impl Into<String>) -> Self {
        Self::Removed { pid: pid.into() }
    }

    /// 创建元数据缺失错误
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MetadataMissingKey { key: key.into() }
    }

    /// 创建元数据类型错误
    pub fn type_mismatch(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MetadataTypeMismatch {
            key: key.into(),
            expected: expected.into(),
        }
    }

    /// 创建参数无效错误
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// 是否为配置已移除错误
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
