//! 服务注册表抽象接口

use crate::bundle::{BundleEvent, BundleInfo};
use crate::service::{ServiceEvent, ServiceId, ServiceInterface, ServiceReference};
use infrastructure_common::Properties;
use std::any::Any;
use std::sync::Arc;

/// 注册表中保存的服务对象
///
/// 实际保存的是 `Arc<S>`（`S` 为接口 trait object），通过 [`ServiceRegistryExt`] 还原。
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// 服务事件监听器
pub type ServiceListener = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

/// 模块事件监听器
pub type BundleListener = Arc<dyn Fn(&BundleEvent) + Send + Sync>;

/// 监听器注册令牌，用于注销监听器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// 服务注册表 trait
///
/// 事件回调在注册表内部锁之外调用，回调中可以再次访问注册表。
pub trait ServiceRegistry: Send + Sync {
    /// 注册服务
    fn register_service(
        &self,
        interface: ServiceInterface,
        service: ServiceObject,
        bundle: Option<BundleInfo>,
        properties: Properties,
    ) -> ServiceReference;

    /// 注销服务，服务不存在时返回 false
    fn unregister_service(&self, id: ServiceId) -> bool;

    /// 获取实现指定接口的全部服务引用，按服务 ID 升序
    fn get_service_references(&self, interface: ServiceInterface) -> Vec<ServiceReference>;

    /// 获取服务对象
    fn get_service(&self, reference: &ServiceReference) -> Option<ServiceObject>;

    /// 添加指定接口的服务事件监听器
    fn add_service_listener(
        &self,
        interface: ServiceInterface,
        listener: ServiceListener,
    ) -> ListenerToken;

    /// 移除服务事件监听器
    fn remove_service_listener(&self, token: ListenerToken);

    /// 获取所有已启动的模块
    fn active_bundles(&self) -> Vec<BundleInfo>;

    /// 添加模块事件监听器
    fn add_bundle_listener(&self, listener: BundleListener) -> ListenerToken;

    /// 移除模块事件监听器
    fn remove_bundle_listener(&self, token: ListenerToken);
}

/// 按接口类型操作服务的便捷方法
pub trait ServiceRegistryExt {
    /// 以接口 `S` 注册服务
    fn register<S>(
        &self,
        service: Arc<S>,
        bundle: Option<BundleInfo>,
        properties: Properties,
    ) -> ServiceReference
    where
        S: ?Sized + Send + Sync + 'static;

    /// 获取接口 `S` 的服务对象
    fn get_typed<S>(&self, reference: &ServiceReference) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static;

    /// 获取接口 `S` 的全部服务引用
    fn references_of<S>(&self) -> Vec<ServiceReference>
    where
        S: ?Sized + 'static;
}

impl<R> ServiceRegistryExt for R
where
    R: ServiceRegistry + ?Sized,
{
    fn register<S>(
        &self,
        service: Arc<S>,
        bundle: Option<BundleInfo>,
        properties: Properties,
    ) -> ServiceReference
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.register_service(
            ServiceInterface::of::<S>(),
            Arc::new(service),
            bundle,
            properties,
        )
    }

    fn get_typed<S>(&self, reference: &ServiceReference) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        if reference.interface() != ServiceInterface::of::<S>() {
            return None;
        }
        self.get_service(reference)
            .and_then(|object| object.downcast_ref::<Arc<S>>().cloned())
    }

    fn references_of<S>(&self) -> Vec<ServiceReference>
    where
        S: ?Sized + 'static,
    {
        self.get_service_references(ServiceInterface::of::<S>())
    }
}
