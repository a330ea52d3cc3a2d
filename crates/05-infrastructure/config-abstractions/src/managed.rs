//! 配置消费者接口

use infrastructure_common::Properties;
use thiserror::Error;

/// 配置异常
///
/// 消费者在收到的配置无效时返回，可以指明有问题的属性。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ConfigurationException {
    reason: String,
    property: Option<String>,
}

impl ConfigurationException {
    /// 创建配置异常
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            property: None,
        }
    }

    /// 创建指明属性的配置异常
    pub fn with_property(reason: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            property: Some(property.into()),
        }
    }

    /// 拒绝原因
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// 有问题的属性名
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }
}

/// 消费者回调错误
#[derive(Error, Debug)]
pub enum ManagedServiceError {
    /// 配置无效
    #[error("配置无效: {0}")]
    Configuration(#[from] ConfigurationException),

    /// 其他错误
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ManagedServiceError {
    /// 包装任意错误
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

/// 单实例配置消费者
///
/// 以服务属性 `service.pid` 或 `component.name` 声明所关心的 PID。
pub trait ManagedService: Send + Sync {
    /// 配置已更新；配置被移除时收到空属性
    fn updated(&self, properties: &Properties) -> Result<(), ManagedServiceError>;
}

/// 工厂配置消费者
///
/// 以服务属性声明工厂 PID，接收 `factoryPid~instanceName` 形式的实例配置。
pub trait ManagedServiceFactory: Send + Sync {
    /// 实例配置已创建或更新
    fn updated(&self, pid: &str, properties: &Properties) -> Result<(), ManagedServiceError>;

    /// 实例配置已移除
    fn removed(&self, pid: &str) -> Result<(), ManagedServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_exception_accessors() {
        let err = ConfigurationException::with_property("bad value", "x");
        assert_eq!(err.reason(), "bad value");
        assert_eq!(err.property(), Some("x"));
        assert_eq!(ConfigurationException::new("oops").property(), None);

        let wrapped: ManagedServiceError = err.into();
        assert!(wrapped.to_string().contains("bad value"));
    }

    #[test]
    fn test_other_error_displays_inner_message() {
        let err = ManagedServiceError::other("disk full");
        assert_eq!(err.to_string(), "disk full");
    }
}
