//! 配置对象、模块扩展与配置管理核心之间的内部接口

use crate::metadata::ConfigurationMetadata;
use config_abstractions::{AsyncWorkService, ThreadpoolSafeFuture};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 配置对象标识
///
/// 每个配置对象创建时分配，进程内单调递增、不复用。用于识别“同一个”配置对象，
/// 区分被移除后以相同 PID 重新创建的配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurationId(u64);

impl ConfigurationId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 批量添加配置的结果条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationAddedInfo {
    /// 配置 PID
    pub pid: String,
    /// 添加完成时的变更计数
    pub change_count: u64,
    /// 添加时的配置对象标识
    pub configuration_id: ConfigurationId,
}

impl ConfigurationAddedInfo {
    /// 创建结果条目
    pub fn new(pid: impl Into<String>, change_count: u64, configuration_id: ConfigurationId) -> Self {
        Self {
            pid: pid.into(),
            change_count,
            configuration_id,
        }
    }
}

/// 配置管理核心的内部接口
pub trait ConfigurationAdminPrivate: Send + Sync {
    /// 批量创建或更新配置
    ///
    /// 对实际创建或变更的配置各调度一次通知。返回每个输入 PID 对应的
    /// (PID, 变更计数, 配置标识)，供之后的 [`remove_configurations`](Self::remove_configurations) 使用。
    fn add_configurations(&self, metadata: Vec<ConfigurationMetadata>) -> Vec<ConfigurationAddedInfo>;

    /// 批量移除配置
    ///
    /// 只移除标识一致且变更计数未变（或已被他人标记移除）的配置，其余保持不变。
    fn remove_configurations(&self, added: &[ConfigurationAddedInfo]);

    /// 调度配置更新通知
    fn notify_configuration_updated(
        &self,
        pid: &str,
        change_count: u64,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> ThreadpoolSafeFuture;

    /// 配置对象已自行标记为移除，从核心中摘除并调度移除通知
    fn notify_configuration_removed(
        &self,
        pid: &str,
        configuration_id: ConfigurationId,
        change_count: u64,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> ThreadpoolSafeFuture;
}
