//! 服务跟踪器

use parking_lot::Mutex;
use registry_abstractions::{
    ListenerToken, ServiceEvent, ServiceId, ServiceInterface, ServiceReference, ServiceRegistry,
    ServiceRegistryExt, ServiceTrackerCustomizer,
};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// 跟踪条目，`None` 表示正在调用 `adding_service`
type Slot<T> = Option<(ServiceReference, T)>;

struct TrackerInner<S: ?Sized, C: ServiceTrackerCustomizer<S>> {
    registry: Arc<dyn ServiceRegistry>,
    customizer: Weak<C>,
    tracked: Mutex<HashMap<ServiceId, Slot<C::Tracked>>>,
    token: Mutex<Option<ListenerToken>>,
    _interface: PhantomData<fn() -> Arc<S>>,
}

impl<S, C> TrackerInner<S, C>
where
    S: ?Sized + Send + Sync + 'static,
    C: ServiceTrackerCustomizer<S> + 'static,
{
    fn on_registered(&self, reference: &ServiceReference) {
        let Some(customizer) = self.customizer.upgrade() else {
            return;
        };

        {
            let mut tracked = self.tracked.lock();
            if tracked.contains_key(&reference.id()) {
                return;
            }
            tracked.insert(reference.id(), None);
        }

        let Some(service) = self.registry.get_typed::<S>(reference) else {
            self.tracked.lock().remove(&reference.id());
            return;
        };

        match customizer.adding_service(reference, service) {
            Some(object) => {
                let orphan = {
                    let mut tracked = self.tracked.lock();
                    match tracked.get_mut(&reference.id()) {
                        Some(slot) => {
                            *slot = Some((reference.clone(), object));
                            None
                        }
                        None => Some(object),
                    }
                };
                match orphan {
                    // 注销事件在 adding_service 期间到达
                    Some(object) => customizer.removed_service(reference, object),
                    None => trace!(service_id = reference.id(), "开始跟踪服务"),
                }
            }
            None => {
                self.tracked.lock().remove(&reference.id());
                trace!(service_id = reference.id(), "服务未被跟踪");
            }
        }
    }

    fn on_unregistering(&self, reference: &ServiceReference) {
        let slot = self.tracked.lock().remove(&reference.id());
        if let (Some(Some((reference, object))), Some(customizer)) =
            (slot, self.customizer.upgrade())
        {
            trace!(service_id = reference.id(), "停止跟踪服务");
            customizer.removed_service(&reference, object);
        }
    }
}

/// 服务跟踪器
///
/// 跟踪注册表中实现接口 `S` 的服务，在服务出现和消失时回调 customizer。
/// 跟踪器只持有 customizer 的弱引用。
pub struct ServiceTracker<S: ?Sized, C: ServiceTrackerCustomizer<S>> {
    inner: Arc<TrackerInner<S, C>>,
}

impl<S, C> ServiceTracker<S, C>
where
    S: ?Sized + Send + Sync + 'static,
    C: ServiceTrackerCustomizer<S> + 'static,
{
    /// 创建跟踪器，调用 [`open`](Self::open) 后开始跟踪
    pub fn new(registry: Arc<dyn ServiceRegistry>, customizer: Weak<C>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                registry,
                customizer,
                tracked: Mutex::new(HashMap::new()),
                token: Mutex::new(None),
                _interface: PhantomData,
            }),
        }
    }

    /// 开始跟踪：先订阅服务事件，再处理已存在的服务
    pub fn open(&self) {
        let mut token = self.inner.token.lock();
        if token.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let interface = ServiceInterface::of::<S>();
        *token = Some(self.inner.registry.add_service_listener(
            interface,
            Arc::new(move |event: &ServiceEvent| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match event {
                    ServiceEvent::Registered(reference) => inner.on_registered(reference),
                    ServiceEvent::Unregistering(reference) => inner.on_unregistering(reference),
                }
            }),
        ));
        drop(token);

        debug!(interface = interface.name(), "打开服务跟踪器");
        for reference in self.inner.registry.get_service_references(interface) {
            self.inner.on_registered(&reference);
        }
    }

    /// 停止跟踪，对每个仍被跟踪的服务回调 `removed_service`
    pub fn close(&self) {
        let Some(token) = self.inner.token.lock().take() else {
            return;
        };
        self.inner.registry.remove_service_listener(token);
        debug!(interface = ServiceInterface::of::<S>().name(), "关闭服务跟踪器");

        let drained: Vec<(ServiceReference, C::Tracked)> = self
            .inner
            .tracked
            .lock()
            .drain()
            .filter_map(|(_, slot)| slot)
            .collect();

        if let Some(customizer) = self.inner.customizer.upgrade() {
            for (reference, object) in drained {
                customizer.removed_service(&reference, object);
            }
        }
    }

    /// 当前被跟踪的服务数量
    pub fn tracking_count(&self) -> usize {
        self.inner
            .tracked
            .lock()
            .values()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// 是否已打开
    pub fn is_open(&self) -> bool {
        self.inner.token.lock().is_some()
    }
}

impl<S: ?Sized, C: ServiceTrackerCustomizer<S>> Drop for ServiceTracker<S, C> {
    fn drop(&mut self) {
        if let Some(token) = self.inner.token.lock().take() {
            self.inner.registry.remove_service_listener(token);
        }
    }
}
