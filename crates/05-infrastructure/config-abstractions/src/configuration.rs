//! 配置对象接口

use crate::future::{NotificationFuture, ThreadpoolSafeFuture};
use infrastructure_common::{ConfigResult, Properties};

/// 配置对象
///
/// 以 PID 标识，持有属性集合和单调递增的变更计数。配置被移除后，
/// 所有方法都返回 [`ConfigError::Removed`](infrastructure_common::ConfigError::Removed)。
///
/// `update`/`update_if_different`/`remove` 返回的 [`NotificationFuture`] 在消费者通知
/// 完成后就绪。不要在异步任务服务自身的线程上阻塞等待它，那里请使用 `safe_` 系列方法。
pub trait Configuration: Send + Sync {
    /// 获取 PID
    fn get_pid(&self) -> ConfigResult<String>;

    /// 获取工厂 PID，非工厂实例时为空串
    fn get_factory_pid(&self) -> ConfigResult<String>;

    /// 获取属性副本
    fn get_properties(&self) -> ConfigResult<Properties>;

    /// 获取变更计数
    fn get_change_count(&self) -> ConfigResult<u64>;

    /// 替换属性并通知消费者
    fn update(&self, properties: Properties) -> ConfigResult<NotificationFuture>;

    /// 属性与当前不同时才更新，返回是否发生了更新
    fn update_if_different(&self, properties: Properties)
        -> ConfigResult<(bool, NotificationFuture)>;

    /// 移除配置并通知消费者
    fn remove(&self) -> ConfigResult<NotificationFuture>;

    /// 同 [`update`](Self::update)，返回可在线程池线程上安全等待的 future
    fn safe_update(&self, properties: Properties) -> ConfigResult<ThreadpoolSafeFuture>;

    /// 同 [`update_if_different`](Self::update_if_different)，返回可在线程池线程上安全等待的 future
    fn safe_update_if_different(
        &self,
        properties: Properties,
    ) -> ConfigResult<(bool, ThreadpoolSafeFuture)>;

    /// 同 [`remove`](Self::remove)，返回可在线程池线程上安全等待的 future
    fn safe_remove(&self) -> ConfigResult<ThreadpoolSafeFuture>;
}
