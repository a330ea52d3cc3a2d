//! 注册表错误类型

use thiserror::Error;

/// 服务注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("模块不存在: {id}")]
    BundleNotFound { id: u64 },

    #[error("模块状态无效: {id}, 当前状态: {state}")]
    InvalidBundleState { id: u64, state: String },
}
