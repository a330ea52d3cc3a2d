//! 配置过滤接口

use infrastructure_common::{ConfigResult, Properties};

/// 配置过滤器
///
/// 为 [`ConfigurationAdmin::list_configurations`](crate::ConfigurationAdmin::list_configurations)
/// 提供过滤表达式求值能力。
pub trait ConfigurationFilter: Send + Sync {
    /// 判断配置是否匹配过滤表达式
    fn matches(&self, filter: &str, pid: &str, properties: &Properties) -> ConfigResult<bool>;
}
