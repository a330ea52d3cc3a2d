//! 服务引用与服务事件

use crate::bundle::BundleInfo;
use infrastructure_common::pid::keys;
use infrastructure_common::Properties;
use std::any::TypeId;
use std::fmt;

/// 注册表分配的服务 ID
pub type ServiceId = u64;

/// 服务接口标识
///
/// 以 trait object 类型区分服务接口，名称仅用于日志。
#[derive(Clone, Copy)]
pub struct ServiceInterface {
    type_id: TypeId,
    name: &'static str,
}

impl ServiceInterface {
    /// 获取接口 `S` 的标识
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    /// 接口名称
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceInterface {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceInterface {}

impl fmt::Debug for ServiceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 服务引用
///
/// 描述一个已注册的服务：ID、接口、所属模块与服务属性。
#[derive(Debug, Clone)]
pub struct ServiceReference {
    id: ServiceId,
    interface: ServiceInterface,
    bundle: Option<BundleInfo>,
    properties: Properties,
}

impl ServiceReference {
    /// 创建服务引用，`service.id` 会写入服务属性
    pub fn new(
        id: ServiceId,
        interface: ServiceInterface,
        bundle: Option<BundleInfo>,
        mut properties: Properties,
    ) -> Self {
        properties.insert(keys::SERVICE_ID, id);
        Self {
            id,
            interface,
            bundle,
            properties,
        }
    }

    /// 注册表分配的服务 ID
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// 注册时的接口
    pub fn interface(&self) -> ServiceInterface {
        self.interface
    }

    /// 所属模块
    pub fn bundle(&self) -> Option<&BundleInfo> {
        self.bundle.as_ref()
    }

    /// 所属模块符号名，无模块时为空串
    pub fn bundle_name(&self) -> &str {
        self.bundle.as_ref().map_or("", |b| b.symbolic_name.as_str())
    }

    /// 服务属性
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// 按键名读取服务属性
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// 服务排名，缺省为 0
    pub fn ranking(&self) -> i64 {
        self.properties
            .get(keys::SERVICE_RANKING)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
    }
}

/// 服务事件
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// 服务已注册
    Registered(ServiceReference),
    /// 服务即将注销
    Unregistering(ServiceReference),
}

impl ServiceEvent {
    /// 事件对应的服务引用
    pub fn reference(&self) -> &ServiceReference {
        match self {
            ServiceEvent::Registered(reference) | ServiceEvent::Unregistering(reference) => {
                reference
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {}
    trait Other {}

    #[test]
    fn test_reference_carries_service_id_and_ranking() {
        let reference = ServiceReference::new(
            7,
            ServiceInterface::of::<dyn Greeter>(),
            None,
            Properties::new().with(keys::SERVICE_RANKING, 10),
        );

        assert_eq!(reference.property(keys::SERVICE_ID), Some(&serde_json::json!(7)));
        assert_eq!(reference.ranking(), 10);
        assert_eq!(reference.bundle_name(), "");
    }

    #[test]
    fn test_interfaces_compare_by_type() {
        assert_eq!(
            ServiceInterface::of::<dyn Greeter>(),
            ServiceInterface::of::<dyn Greeter>()
        );
        assert_ne!(
            ServiceInterface::of::<dyn Greeter>(),
            ServiceInterface::of::<dyn Other>()
        );
    }
}
