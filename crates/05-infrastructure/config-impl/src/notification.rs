//! 消费者回调与异常隔离
//!
//! 消费者回调返回的错误或发生的 panic 都在这里被捕获并记录，不会向上传播。

use config_abstractions::{
    ConfigurationEvent, ConfigurationListener, ManagedService, ManagedServiceError,
    ManagedServiceFactory,
};
use infrastructure_common::Properties;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

/// 提取 panic 载荷中的文本
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown exception".to_string()
    }
}

fn handle_outcome(
    pid: &str,
    callback: &'static str,
    properties: Option<&Properties>,
    outcome: std::thread::Result<Result<(), ManagedServiceError>>,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(ManagedServiceError::Configuration(e))) => {
            let value = e
                .property()
                .and_then(|property| properties.and_then(|p| p.get_compound(property)))
                .map(ToString::to_string);
            error!(
                pid = %pid,
                callback,
                reason = %e.reason(),
                property = e.property().unwrap_or_default(),
                value = value.as_deref().unwrap_or_default(),
                "消费者拒绝了配置: {}",
                e.reason()
            );
        }
        Ok(Err(ManagedServiceError::Other(e))) => {
            error!(pid = %pid, callback, error = %e, "消费者回调返回错误");
        }
        Err(payload) => {
            error!(
                pid = %pid,
                callback,
                panic = %panic_message(payload.as_ref()),
                "消费者回调发生 panic"
            );
        }
    }
}

/// 向单实例消费者发送配置，移除时发送空属性
pub(crate) fn notify_service_updated(
    pid: &str,
    service: &dyn ManagedService,
    properties: &Properties,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| service.updated(properties)));
    handle_outcome(pid, "ManagedService::updated", Some(properties), outcome);
}

/// 向工厂消费者发送实例配置
pub(crate) fn notify_factory_updated(
    pid: &str,
    factory: &dyn ManagedServiceFactory,
    properties: &Properties,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| factory.updated(pid, properties)));
    handle_outcome(pid, "ManagedServiceFactory::updated", Some(properties), outcome);
}

/// 通知工厂消费者实例配置已移除
pub(crate) fn notify_factory_removed(pid: &str, factory: &dyn ManagedServiceFactory) {
    let outcome = catch_unwind(AssertUnwindSafe(|| factory.removed(pid)));
    handle_outcome(pid, "ManagedServiceFactory::removed", None, outcome);
}

/// 发送配置事件
pub(crate) fn notify_listener(listener: &dyn ConfigurationListener, event: &ConfigurationEvent) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.configuration_event(event))) {
        warn!(
            pid = %event.pid,
            panic = %panic_message(payload.as_ref()),
            "配置事件监听器发生 panic"
        );
    }
}
