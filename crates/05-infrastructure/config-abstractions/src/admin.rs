//! 配置管理服务接口

use crate::configuration::Configuration;
use infrastructure_common::ConfigResult;
use std::sync::Arc;

/// 配置管理服务
pub trait ConfigurationAdmin: Send + Sync {
    /// 获取配置，不存在时创建空配置
    fn get_configuration(&self, pid: &str) -> ConfigResult<Arc<dyn Configuration>>;

    /// 以随机实例名创建新的工厂配置
    fn create_factory_configuration(&self, factory_pid: &str)
        -> ConfigResult<Arc<dyn Configuration>>;

    /// 获取 `factoryPid~instanceName` 对应的工厂配置，不存在时创建
    fn get_factory_configuration(
        &self,
        factory_pid: &str,
        instance_name: &str,
    ) -> ConfigResult<Arc<dyn Configuration>>;

    /// 列出配置，过滤表达式为空串时返回全部
    fn list_configurations(&self, filter: &str) -> ConfigResult<Vec<Arc<dyn Configuration>>>;
}
