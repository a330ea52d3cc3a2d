//! 进程内服务注册表

use infrastructure_common::Properties;
use parking_lot::RwLock;
use registry_abstractions::{
    BundleEvent, BundleEventKind, BundleId, BundleInfo, BundleListener, BundleState,
    ListenerToken, RegistryError, ServiceEvent, ServiceId, ServiceInterface, ServiceListener,
    ServiceObject, ServiceReference, ServiceRegistry,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

struct Registration {
    reference: ServiceReference,
    service: ServiceObject,
}

struct BundleEntry {
    info: BundleInfo,
    state: BundleState,
}

#[derive(Default)]
struct RegistryState {
    services: BTreeMap<ServiceId, Registration>,
    service_listeners: Vec<(ListenerToken, ServiceInterface, ServiceListener)>,
    bundles: BTreeMap<BundleId, BundleEntry>,
    bundle_listeners: Vec<(ListenerToken, BundleListener)>,
}

/// 进程内服务注册表
///
/// 服务 ID 与模块 ID 从 1 开始递增分配。所有监听器都在锁外调用。
pub struct InMemoryServiceRegistry {
    state: RwLock<RegistryState>,
    next_service_id: AtomicU64,
    next_bundle_id: AtomicU64,
    next_token: AtomicU64,
}

impl InMemoryServiceRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_service_id: AtomicU64::new(1),
            next_bundle_id: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
        }
    }

    fn next_token(&self) -> ListenerToken {
        ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn fire_service_event(&self, event: &ServiceEvent) {
        let interface = event.reference().interface();
        let listeners: Vec<ServiceListener> = self
            .state
            .read()
            .service_listeners
            .iter()
            .filter(|(_, i, _)| *i == interface)
            .map(|(_, _, l)| l.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    fn fire_bundle_event(&self, event: &BundleEvent) {
        let listeners: Vec<BundleListener> = self
            .state
            .read()
            .bundle_listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// 安装模块
    pub fn install_bundle(
        &self,
        symbolic_name: impl Into<String>,
        headers: Map<String, Value>,
    ) -> BundleInfo {
        let id = self.next_bundle_id.fetch_add(1, Ordering::Relaxed);
        let info = BundleInfo::new(id, symbolic_name, headers);
        info!("安装模块: {} (id={})", info.symbolic_name, id);

        self.state.write().bundles.insert(
            id,
            BundleEntry {
                info: info.clone(),
                state: BundleState::Installed,
            },
        );
        info
    }

    /// 启动模块并发布 `Started` 事件
    pub fn start_bundle(&self, id: BundleId) -> Result<(), RegistryError> {
        let info = {
            let mut state = self.state.write();
            let entry = state
                .bundles
                .get_mut(&id)
                .ok_or(RegistryError::BundleNotFound { id })?;
            if entry.state == BundleState::Active {
                return Err(RegistryError::InvalidBundleState {
                    id,
                    state: entry.state.to_string(),
                });
            }
            entry.state = BundleState::Active;
            entry.info.clone()
        };

        info!("启动模块: {} (id={})", info.symbolic_name, id);
        self.fire_bundle_event(&BundleEvent {
            kind: BundleEventKind::Started,
            bundle: info,
        });
        Ok(())
    }

    /// 停止模块
    ///
    /// 先发布 `Stopping` 事件，再注销该模块注册的全部服务。
    pub fn stop_bundle(&self, id: BundleId) -> Result<(), RegistryError> {
        let info = {
            let state = self.state.read();
            let entry = state
                .bundles
                .get(&id)
                .ok_or(RegistryError::BundleNotFound { id })?;
            if entry.state != BundleState::Active {
                return Err(RegistryError::InvalidBundleState {
                    id,
                    state: entry.state.to_string(),
                });
            }
            entry.info.clone()
        };

        info!("停止模块: {} (id={})", info.symbolic_name, id);
        self.fire_bundle_event(&BundleEvent {
            kind: BundleEventKind::Stopping,
            bundle: info,
        });

        let owned: Vec<ServiceId> = self
            .state
            .read()
            .services
            .values()
            .filter(|r| r.reference.bundle().map(|b| b.id) == Some(id))
            .map(|r| r.reference.id())
            .collect();
        for service_id in owned {
            self.unregister_service(service_id);
        }

        if let Some(entry) = self.state.write().bundles.get_mut(&id) {
            entry.state = BundleState::Installed;
        }
        Ok(())
    }

    /// 模块状态
    pub fn bundle_state(&self, id: BundleId) -> Option<BundleState> {
        self.state.read().bundles.get(&id).map(|e| e.state)
    }
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryServiceRegistry")
            .field("services", &state.services.len())
            .field("service_listeners", &state.service_listeners.len())
            .field("bundles", &state.bundles.len())
            .field("bundle_listeners", &state.bundle_listeners.len())
            .finish()
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn register_service(
        &self,
        interface: ServiceInterface,
        service: ServiceObject,
        bundle: Option<BundleInfo>,
        properties: Properties,
    ) -> ServiceReference {
        let id = self.next_service_id.fetch_add(1, Ordering::Relaxed);
        let reference = ServiceReference::new(id, interface, bundle, properties);
        debug!(service_id = id, interface = interface.name(), "注册服务");

        self.state.write().services.insert(
            id,
            Registration {
                reference: reference.clone(),
                service,
            },
        );
        self.fire_service_event(&ServiceEvent::Registered(reference.clone()));
        reference
    }

    fn unregister_service(&self, id: ServiceId) -> bool {
        let reference = match self.state.read().services.get(&id) {
            Some(registration) => registration.reference.clone(),
            None => return false,
        };

        debug!(service_id = id, interface = reference.interface().name(), "注销服务");
        // 先通知再移除，监听器在回调期间仍可获取服务对象
        self.fire_service_event(&ServiceEvent::Unregistering(reference));
        self.state.write().services.remove(&id).is_some()
    }

    fn get_service_references(&self, interface: ServiceInterface) -> Vec<ServiceReference> {
        self.state
            .read()
            .services
            .values()
            .filter(|r| r.reference.interface() == interface)
            .map(|r| r.reference.clone())
            .collect()
    }

    fn get_service(&self, reference: &ServiceReference) -> Option<ServiceObject> {
        self.state
            .read()
            .services
            .get(&reference.id())
            .map(|r| r.service.clone())
    }

    fn add_service_listener(
        &self,
        interface: ServiceInterface,
        listener: ServiceListener,
    ) -> ListenerToken {
        let token = self.next_token();
        self.state
            .write()
            .service_listeners
            .push((token, interface, listener));
        token
    }

    fn remove_service_listener(&self, token: ListenerToken) {
        self.state
            .write()
            .service_listeners
            .retain(|(t, _, _)| *t != token);
    }

    fn active_bundles(&self) -> Vec<BundleInfo> {
        self.state
            .read()
            .bundles
            .values()
            .filter(|e| e.state == BundleState::Active)
            .map(|e| e.info.clone())
            .collect()
    }

    fn add_bundle_listener(&self, listener: BundleListener) -> ListenerToken {
        let token = self.next_token();
        self.state.write().bundle_listeners.push((token, listener));
        token
    }

    fn remove_bundle_listener(&self, token: ListenerToken) {
        self.state
            .write()
            .bundle_listeners
            .retain(|(t, _)| *t != token);
    }
}
