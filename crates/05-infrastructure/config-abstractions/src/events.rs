//! 配置事件定义

use serde::{Deserialize, Serialize};

/// 配置事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationEvent {
    /// 事件类型
    pub event_type: ConfigurationEventType,
    /// 配置 PID
    pub pid: String,
    /// 工厂 PID，非工厂实例时为空串
    pub factory_pid: String,
    /// 事件时间
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConfigurationEvent {
    /// 创建配置更新事件
    pub fn updated(pid: impl Into<String>, factory_pid: impl Into<String>) -> Self {
        Self {
            event_type: ConfigurationEventType::Updated,
            pid: pid.into(),
            factory_pid: factory_pid.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// 创建配置删除事件
    pub fn deleted(pid: impl Into<String>, factory_pid: impl Into<String>) -> Self {
        Self {
            event_type: ConfigurationEventType::Deleted,
            pid: pid.into(),
            factory_pid: factory_pid.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 配置事件类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigurationEventType {
    /// 配置创建或更新
    Updated,
    /// 配置删除
    Deleted,
}

/// 配置事件监听器 trait
pub trait ConfigurationListener: Send + Sync {
    /// 处理配置事件
    fn configuration_event(&self, event: &ConfigurationEvent);
}
