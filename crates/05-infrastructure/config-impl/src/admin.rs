//! 配置管理核心
//!
//! 维护 PID 到配置对象的映射与工厂 PID 索引，跟踪注册表中的配置消费者，
//! 并通过异步任务服务向消费者分发配置变更。

use crate::configuration::ConfigurationImpl;
use crate::metadata::ConfigurationMetadata;
use crate::notification::{
    notify_factory_removed, notify_factory_updated, notify_listener, notify_service_updated,
};
use crate::private::{ConfigurationAddedInfo, ConfigurationAdminPrivate, ConfigurationId};
use crate::settings::CmSettings;
use config_abstractions::{
    AsyncWorkService, Configuration, ConfigurationAdmin, ConfigurationEvent, ConfigurationFilter,
    ConfigurationListener, ManagedService, ManagedServiceFactory, NotificationCompleter,
    NotificationFuture, SingleInvokeTask, ThreadpoolSafeFuture,
};
use infrastructure_common::pid::keys;
use infrastructure_common::{
    factory_instance_pid, factory_pid_of, ConfigError, ConfigResult, Properties,
};
use parking_lot::{Condvar, Mutex, ReentrantMutex, RwLock};
use rand::distributions::Alphanumeric;
use rand::Rng;
use registry_abstractions::{
    ServiceId, ServiceReference, ServiceRegistry, ServiceTrackerCustomizer,
};
use registry_impl::ServiceTracker;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 已投递移除通知后记录的变更计数
const REMOVED: u64 = u64::MAX;

/// 被跟踪的配置消费者
///
/// 记录每个 PID 最近一次投递的 (配置标识, 变更计数)，保证同一份配置状态不会重复投递，
/// 也不会用更旧的状态覆盖更新的状态。比较、记录与回调在同一把消费者锁内完成；
/// 锁可重入，回调里同步触发的投递不会死锁。
pub struct TrackedService<S: ?Sized> {
    pid: String,
    service_id: ServiceId,
    service: Arc<S>,
    delivered: ReentrantMutex<RefCell<HashMap<String, (ConfigurationId, u64)>>>,
}

impl<S: ?Sized> TrackedService<S> {
    fn new(pid: String, service_id: ServiceId, service: Arc<S>) -> Self {
        Self {
            pid,
            service_id,
            service,
            delivered: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// 快照比已投递的更新时记录并投递
    fn deliver_update(
        &self,
        pid: &str,
        id: ConfigurationId,
        change_count: u64,
        deliver: impl FnOnce(&S),
    ) -> bool {
        let guard = self.delivered.lock();
        {
            let mut delivered = guard.borrow_mut();
            if matches!(delivered.get(pid), Some(last) if *last >= (id, change_count)) {
                return false;
            }
            delivered.insert(pid.to_string(), (id, change_count));
        }
        deliver(&self.service);
        true
    }

    /// 曾投递过 `upto`（含）之前的配置时投递移除
    ///
    /// 无论是否投递，都记下移除标记，之后到达的旧快照不会再被投递。
    fn deliver_removal(
        &self,
        pid: &str,
        upto: Option<ConfigurationId>,
        deliver: impl FnOnce(&S),
    ) -> bool {
        let guard = self.delivered.lock();
        {
            let mut delivered = guard.borrow_mut();
            match (delivered.get(pid).copied(), upto) {
                (Some((id, change_count)), upto) if change_count != REMOVED => {
                    if matches!(upto, Some(upto) if id > upto) {
                        return false;
                    }
                    let marker = upto.map_or(id, |upto| upto.max(id));
                    delivered.insert(pid.to_string(), (marker, REMOVED));
                }
                (Some((id, _)), Some(upto)) => {
                    if upto > id {
                        delivered.insert(pid.to_string(), (upto, REMOVED));
                    }
                    return false;
                }
                (None, Some(upto)) => {
                    delivered.insert(pid.to_string(), (upto, REMOVED));
                    return false;
                }
                _ => return false,
            }
        }
        deliver(&self.service);
        true
    }
}

#[derive(Default)]
struct AdminState {
    configurations: HashMap<String, Arc<ConfigurationImpl>>,
    factory_instances: HashMap<String, BTreeSet<String>>,
    managed_services: Vec<Arc<TrackedService<dyn ManagedService>>>,
    managed_service_factories: Vec<Arc<TrackedService<dyn ManagedServiceFactory>>>,
    listeners: Vec<(ServiceId, Arc<dyn ConfigurationListener>)>,
}

impl AdminState {
    fn add_factory_instance(&mut self, pid: &str) {
        let factory_pid = factory_pid_of(pid);
        if !factory_pid.is_empty() {
            self.factory_instances
                .entry(factory_pid.to_string())
                .or_default()
                .insert(pid.to_string());
        }
    }

    fn remove_factory_instance(&mut self, pid: &str) {
        let factory_pid = factory_pid_of(pid);
        if let Some(instances) = self.factory_instances.get_mut(factory_pid) {
            instances.remove(pid);
            if instances.is_empty() {
                self.factory_instances.remove(factory_pid);
            }
        }
    }
}

struct InFlightState {
    active: bool,
    next_id: u64,
    incomplete: HashSet<u64>,
}

/// 未完成的异步通知
struct InFlight {
    state: Mutex<InFlightState>,
    all_done: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            state: Mutex::new(InFlightState {
                active: true,
                next_id: 0,
                incomplete: HashSet::new(),
            }),
            all_done: Condvar::new(),
        }
    }

    fn complete(&self, id: u64) {
        let mut state = self.state.lock();
        state.incomplete.remove(&id);
        if state.incomplete.is_empty() {
            self.all_done.notify_all();
        }
    }

    fn wait_all(&self) {
        let mut state = self.state.lock();
        while !state.incomplete.is_empty() {
            self.all_done.wait(&mut state);
        }
    }

    fn stop_and_wait_all(&self) {
        self.state.lock().active = false;
        self.wait_all();
    }
}

/// 任务结束（执行完或被丢弃）时登记完成并触发完成信号
struct CompletionGuard {
    in_flight: Arc<InFlight>,
    id: u64,
    completer: Option<NotificationCompleter>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.in_flight.complete(self.id);
        if let Some(completer) = self.completer.take() {
            completer.complete();
        }
    }
}

struct Trackers {
    managed_services: ServiceTracker<dyn ManagedService, ConfigurationAdminImpl>,
    managed_service_factories: ServiceTracker<dyn ManagedServiceFactory, ConfigurationAdminImpl>,
    listeners: ServiceTracker<dyn ConfigurationListener, ConfigurationAdminImpl>,
}

/// 配置管理核心
///
/// 通过 [`new`](Self::new) 创建后立即开始跟踪消费者，必须显式调用
/// [`shutdown`](Self::shutdown) 结束。`shutdown` 会等待所有异步通知完成，
/// 不要在异步任务服务的线程上调用它。
pub struct ConfigurationAdminImpl {
    self_ref: Weak<Self>,
    async_work: Arc<dyn AsyncWorkService>,
    settings: CmSettings,
    state: Mutex<AdminState>,
    in_flight: Arc<InFlight>,
    filter: RwLock<Option<Arc<dyn ConfigurationFilter>>>,
    trackers: Mutex<Option<Trackers>>,
}

impl ConfigurationAdminImpl {
    /// 创建配置管理核心并开始跟踪注册表中的消费者
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        async_work: Arc<dyn AsyncWorkService>,
        settings: CmSettings,
    ) -> Arc<Self> {
        let admin = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            async_work,
            settings,
            state: Mutex::new(AdminState::default()),
            in_flight: Arc::new(InFlight::new()),
            filter: RwLock::new(None),
            trackers: Mutex::new(None),
        });

        let weak = Arc::downgrade(&admin);
        let trackers = Trackers {
            managed_services: ServiceTracker::new(registry.clone(), weak.clone()),
            managed_service_factories: ServiceTracker::new(registry.clone(), weak.clone()),
            listeners: ServiceTracker::new(registry, weak),
        };
        trackers.managed_services.open();
        trackers.managed_service_factories.open();
        trackers.listeners.open();
        *admin.trackers.lock() = Some(trackers);

        info!("配置管理服务已启动");
        admin
    }

    /// 安装列表过滤器
    pub fn set_configuration_filter(&self, filter: Arc<dyn ConfigurationFilter>) {
        *self.filter.write() = Some(filter);
    }

    /// 当前配置数量
    pub fn configuration_count(&self) -> usize {
        self.state.lock().configurations.len()
    }

    /// 工厂 PID 下的全部实例 PID
    pub fn factory_instances(&self, factory_pid: &str) -> Vec<String> {
        self.state
            .lock()
            .factory_instances
            .get(factory_pid)
            .map(|instances| instances.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn lookup(&self, pid: &str) -> Option<Arc<ConfigurationImpl>> {
        self.state.lock().configurations.get(pid).cloned()
    }

    /// 阻塞直到所有已调度的异步通知完成
    pub fn wait_for_all_async(&self) {
        self.in_flight.wait_all();
    }

    fn private_ref(&self) -> Weak<dyn ConfigurationAdminPrivate> {
        self.self_ref.clone()
    }

    /// 在持有状态锁时创建并登记配置
    fn create_locked(
        &self,
        state: &mut AdminState,
        pid: &str,
        properties: Properties,
    ) -> Arc<ConfigurationImpl> {
        state.add_factory_instance(pid);
        let configuration = Arc::new(ConfigurationImpl::new(
            self.private_ref(),
            pid,
            properties,
            self.async_work.create_strand(),
        ));
        state
            .configurations
            .insert(pid.to_string(), configuration.clone());
        configuration
    }

    fn random_instance_name(length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// 把任务交给异步任务服务执行
    ///
    /// 停止后不再调度任何任务，直接返回已就绪的完成信号。
    fn perform_async<F>(&self, strand: Option<Arc<dyn AsyncWorkService>>, f: F) -> ThreadpoolSafeFuture
    where
        F: FnOnce() + Send + 'static,
    {
        let id = {
            let mut in_flight = self.in_flight.state.lock();
            if !in_flight.active {
                return ThreadpoolSafeFuture::ready();
            }
            in_flight.next_id += 1;
            let id = in_flight.next_id;
            in_flight.incomplete.insert(id);
            id
        };

        let (completer, future) = NotificationFuture::channel();
        let guard = CompletionGuard {
            in_flight: self.in_flight.clone(),
            id,
            completer: Some(completer),
        };
        let task = SingleInvokeTask::new(Box::new(move || {
            let _guard = guard;
            f();
        }));

        let posted = task.clone();
        let executor = strand.unwrap_or_else(|| self.async_work.clone());
        executor.post(Box::new(move || {
            posted.invoke();
        }));

        ThreadpoolSafeFuture::new(future, Some(task))
    }

    /// 调度一次通知：执行时读取 PID 的当前状态并投递给匹配的消费者
    fn schedule_notification(
        &self,
        pid: &str,
        change_count: u64,
        removed_id: Option<ConfigurationId>,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> ThreadpoolSafeFuture {
        let weak = self.self_ref.clone();
        let pid = pid.to_string();
        self.perform_async(strand, move || {
            if let Some(admin) = weak.upgrade() {
                admin.deliver_notification(&pid, change_count, removed_id);
            }
        })
    }

    /// 读取 PID 当前的 (配置标识, 属性, 变更计数)
    fn current_locked(
        state: &AdminState,
        pid: &str,
    ) -> Option<(ConfigurationId, Properties, u64)> {
        let configuration = state.configurations.get(pid)?;
        let (properties, change_count) = configuration.snapshot().ok()?;
        Some((configuration.id(), properties, change_count))
    }

    /// 向新跟踪的 ManagedService 投递执行时刻的配置
    fn deliver_current_to_service(&self, tracked: &TrackedService<dyn ManagedService>) {
        let current = Self::current_locked(&self.state.lock(), &tracked.pid);
        if let Some((id, properties, change_count)) = current {
            tracked.deliver_update(&tracked.pid, id, change_count, |service| {
                notify_service_updated(&tracked.pid, service, &properties);
            });
        }
    }

    /// 向新跟踪的 ManagedServiceFactory 投递执行时刻的全部实例配置
    fn deliver_current_to_factory(&self, tracked: &TrackedService<dyn ManagedServiceFactory>) {
        let snapshots: Vec<_> = {
            let state = self.state.lock();
            state
                .factory_instances
                .get(&tracked.pid)
                .into_iter()
                .flatten()
                .filter_map(|pid| {
                    Self::current_locked(&state, pid).map(|current| (pid.clone(), current))
                })
                .collect()
        };
        for (pid, (id, properties, change_count)) in snapshots {
            tracked.deliver_update(&pid, id, change_count, |factory| {
                notify_factory_updated(&pid, factory, &properties);
            });
        }
    }

    fn deliver_notification(&self, pid: &str, change_count: u64, removed_id: Option<ConfigurationId>) {
        let factory_pid = factory_pid_of(pid);
        let (current, services, factories, listeners) = {
            let state = self.state.lock();
            let current = Self::current_locked(&state, pid);
            let services: Vec<_> = state
                .managed_services
                .iter()
                .filter(|tracked| tracked.pid == pid)
                .cloned()
                .collect();
            let factories: Vec<_> = if factory_pid.is_empty() {
                Vec::new()
            } else {
                state
                    .managed_service_factories
                    .iter()
                    .filter(|tracked| tracked.pid == factory_pid)
                    .cloned()
                    .collect()
            };
            let listeners: Vec<_> = state.listeners.iter().map(|(_, l)| l.clone()).collect();
            (current, services, factories, listeners)
        };

        match current {
            Some((id, properties, current_change_count)) => {
                let event = ConfigurationEvent::updated(pid, factory_pid);
                for listener in &listeners {
                    notify_listener(listener.as_ref(), &event);
                }
                for tracked in &services {
                    tracked.deliver_update(pid, id, current_change_count, |service| {
                        notify_service_updated(pid, service, &properties);
                    });
                }
                for tracked in &factories {
                    tracked.deliver_update(pid, id, current_change_count, |factory| {
                        notify_factory_updated(pid, factory, &properties);
                    });
                }
                if self.settings.log_properties_on_update {
                    debug!(
                        pid = %pid,
                        change_count = current_change_count,
                        properties = %properties,
                        "配置已更新"
                    );
                }
            }
            None => {
                let event = ConfigurationEvent::deleted(pid, factory_pid);
                for listener in &listeners {
                    notify_listener(listener.as_ref(), &event);
                }
                let empty = Properties::new();
                for tracked in &services {
                    tracked.deliver_removal(pid, removed_id, |service| {
                        notify_service_updated(pid, service, &empty);
                    });
                }
                for tracked in &factories {
                    tracked.deliver_removal(pid, removed_id, |factory| {
                        notify_factory_removed(pid, factory);
                    });
                }
                debug!(pid = %pid, change_count, "配置已移除");
            }
        }
    }

    /// 停止配置管理服务
    ///
    /// 停止跟踪消费者，清空并失效全部配置，向仍被跟踪且收到过配置的消费者发送最后一轮
    /// 移除通知，然后等待全部异步通知完成。
    pub fn shutdown(&self) {
        let (services, factories) = {
            let state = self.state.lock();
            (
                state.managed_services.clone(),
                state.managed_service_factories.clone(),
            )
        };

        let trackers = self.trackers.lock().take();
        if let Some(trackers) = trackers {
            trackers.managed_service_factories.close();
            trackers.managed_services.close();
            trackers.listeners.close();
        }

        let (configurations, factory_instances) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.configurations),
                std::mem::take(&mut state.factory_instances),
            )
        };
        for configuration in configurations.values() {
            configuration.invalidate();
        }

        for tracked in services {
            if !configurations.contains_key(&tracked.pid) {
                continue;
            }
            debug!(service_id = tracked.service_id, pid = %tracked.pid, "发送最终移除通知");
            self.perform_async(None, move || {
                tracked.deliver_removal(&tracked.pid, None, |service| {
                    notify_service_updated(&tracked.pid, service, &Properties::new());
                });
            });
        }
        for tracked in factories {
            let Some(instances) = factory_instances.get(&tracked.pid) else {
                continue;
            };
            for pid in instances {
                let tracked = tracked.clone();
                let pid = pid.clone();
                self.perform_async(None, move || {
                    tracked.deliver_removal(&pid, None, |factory| {
                        notify_factory_removed(&pid, factory);
                    });
                });
            }
        }

        self.in_flight.stop_and_wait_all();
        info!(
            configurations = configurations.len(),
            "配置管理服务已停止"
        );
    }
}

/// 按优先级从服务属性中解析 PID
///
/// 依次为嵌套的 `service` / `pid`、嵌套的 `component` / `name`、
/// 平铺的 `service.pid`、平铺的 `component.name`。
pub(crate) fn pid_from_reference(reference: &ServiceReference) -> Option<String> {
    let properties = reference.properties();
    let nested = |key: &str, sub_key: &str| {
        properties
            .get(key)
            .and_then(|value| value.as_object())
            .and_then(|object| object.get(sub_key))
            .and_then(|value| value.as_str())
    };

    nested(keys::SERVICE_KEY, keys::SERVICE_SUBKEY)
        .or_else(|| nested(keys::COMPONENT_KEY, keys::COMPONENT_SUBKEY))
        .or_else(|| properties.get_str(keys::SERVICE_PID))
        .or_else(|| properties.get_str(keys::COMPONENT_NAME))
        .filter(|pid| !pid.is_empty())
        .map(str::to_string)
}

fn warn_ignored(kind: &str, reference: &ServiceReference) {
    let bundle = match reference.bundle_name() {
        "" => "Unknown",
        name => name,
    };
    warn!(
        service_id = reference.id(),
        bundle = %bundle,
        "Ignoring {} with ID {} from bundle {} as it does not have a service.pid or component.name property",
        kind,
        reference.id(),
        bundle
    );
}

impl ConfigurationAdmin for ConfigurationAdminImpl {
    fn get_configuration(&self, pid: &str) -> ConfigResult<Arc<dyn Configuration>> {
        if pid.is_empty() {
            return Err(ConfigError::invalid_argument("PID 不能为空"));
        }

        let (configuration, created) = {
            let mut state = self.state.lock();
            match state.configurations.get(pid) {
                Some(configuration) => (configuration.clone(), false),
                None => (self.create_locked(&mut state, pid, Properties::new()), true),
            }
        };

        if created {
            self.notify_configuration_updated(pid, 1, configuration.strand());
        }
        debug!(
            pid = %pid,
            "获取配置: 返回{}配置对象",
            if created { "新建的" } else { "已有的" }
        );
        Ok(configuration)
    }

    fn create_factory_configuration(
        &self,
        factory_pid: &str,
    ) -> ConfigResult<Arc<dyn Configuration>> {
        if factory_pid.is_empty() {
            return Err(ConfigError::invalid_argument("工厂 PID 不能为空"));
        }

        let (pid, configuration) = {
            let mut state = self.state.lock();
            let mut length = self.settings.instance_name_length.get();
            let mut pid = factory_instance_pid(factory_pid, &Self::random_instance_name(length));
            while state.configurations.contains_key(&pid) {
                debug!(pid = %pid, "工厂实例名冲突，加长后重新生成");
                length += 1;
                pid = factory_instance_pid(factory_pid, &Self::random_instance_name(length));
            }
            let configuration = self.create_locked(&mut state, &pid, Properties::new());
            (pid, configuration)
        };

        self.notify_configuration_updated(&pid, 1, configuration.strand());
        debug!(pid = %pid, factory_pid = %factory_pid, "已创建工厂配置");
        Ok(configuration)
    }

    fn get_factory_configuration(
        &self,
        factory_pid: &str,
        instance_name: &str,
    ) -> ConfigResult<Arc<dyn Configuration>> {
        let pid = factory_instance_pid(factory_pid, instance_name);
        debug!(pid = %pid, "获取工厂实例配置");
        self.get_configuration(&pid)
    }

    fn list_configurations(&self, filter: &str) -> ConfigResult<Vec<Arc<dyn Configuration>>> {
        let filter = filter.trim();
        let mut configurations: Vec<Arc<ConfigurationImpl>> =
            self.state.lock().configurations.values().cloned().collect();

        if !filter.is_empty() {
            let Some(evaluator) = self.filter.read().clone() else {
                return Err(ConfigError::FilterUnsupported {
                    filter: filter.to_string(),
                });
            };
            let mut matched = Vec::new();
            for configuration in configurations {
                let Ok((properties, _)) = configuration.snapshot() else {
                    continue;
                };
                let pid = configuration.get_pid().unwrap_or_default();
                if evaluator.matches(filter, &pid, &properties)? {
                    matched.push(configuration);
                }
            }
            configurations = matched;
        }

        configurations.retain(|configuration| !configuration.is_removed());
        configurations.sort_by_key(|configuration| configuration.get_pid().unwrap_or_default());
        Ok(configurations
            .into_iter()
            .map(|configuration| configuration as Arc<dyn Configuration>)
            .collect())
    }
}

impl ConfigurationAdminPrivate for ConfigurationAdminImpl {
    fn add_configurations(&self, metadata: Vec<ConfigurationMetadata>) -> Vec<ConfigurationAddedInfo> {
        let mut added = Vec::with_capacity(metadata.len());
        let mut to_notify = Vec::new();
        let mut replaced = Vec::new();

        {
            let mut state = self.state.lock();
            for ConfigurationMetadata { pid, properties } in metadata {
                let existing = state.configurations.get(&pid).cloned();
                let (configuration, change_count) = match existing {
                    None => {
                        let configuration = self.create_locked(&mut state, &pid, properties);
                        to_notify.push((pid.clone(), 1, configuration.strand()));
                        (configuration, 1)
                    }
                    Some(existing) => {
                        match existing.update_without_notification_if_different(properties.clone()) {
                            Ok((true, change_count)) => {
                                to_notify.push((pid.clone(), change_count, existing.strand()));
                                (existing, change_count)
                            }
                            Ok((false, change_count)) => (existing, change_count),
                            Err(_) => {
                                // 已被并发移除，以新对象替换
                                debug!(pid = %pid, "配置已被并发移除，重新创建");
                                let configuration = self.create_locked(&mut state, &pid, properties);
                                to_notify.push((pid.clone(), 1, configuration.strand()));
                                replaced.push(existing);
                                (configuration, 1)
                            }
                        }
                    }
                };
                added.push(ConfigurationAddedInfo::new(pid, change_count, configuration.id()));
            }
        }

        for configuration in replaced {
            configuration.invalidate();
        }
        for (pid, change_count, strand) in to_notify {
            self.notify_configuration_updated(&pid, change_count, strand);
        }
        added
    }

    fn remove_configurations(&self, added: &[ConfigurationAddedInfo]) {
        let mut to_notify = Vec::new();
        let mut removed = Vec::new();

        {
            let mut state = self.state.lock();
            for info in added {
                let Some(configuration) = state.configurations.get(&info.pid).cloned() else {
                    debug!(pid = %info.pid, "配置已不存在，跳过移除");
                    continue;
                };
                if configuration.id() != info.configuration_id {
                    debug!(pid = %info.pid, "配置已被替换，跳过移除");
                    continue;
                }

                let erase = match configuration
                    .remove_without_notification_if_change_count_equals(info.change_count)
                {
                    Ok(erase) => erase,
                    // 已被并发标记移除
                    Err(_) => true,
                };
                if !erase {
                    debug!(
                        pid = %info.pid,
                        change_count = info.change_count,
                        "配置已被修改，跳过移除"
                    );
                    continue;
                }

                state.configurations.remove(&info.pid);
                state.remove_factory_instance(&info.pid);
                to_notify.push((
                    info.pid.clone(),
                    info.change_count,
                    configuration.id(),
                    configuration.strand(),
                ));
                removed.push(configuration);
            }
        }

        for configuration in removed {
            configuration.invalidate();
        }
        for (pid, change_count, id, strand) in to_notify {
            self.schedule_notification(&pid, change_count, Some(id), strand);
        }
    }

    fn notify_configuration_updated(
        &self,
        pid: &str,
        change_count: u64,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> ThreadpoolSafeFuture {
        self.schedule_notification(pid, change_count, None, strand)
    }

    fn notify_configuration_removed(
        &self,
        pid: &str,
        configuration_id: ConfigurationId,
        change_count: u64,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> ThreadpoolSafeFuture {
        {
            let mut state = self.state.lock();
            match state.configurations.get(pid) {
                Some(configuration) if configuration.id() == configuration_id => {
                    state.configurations.remove(pid);
                    state.remove_factory_instance(pid);
                }
                _ => {
                    debug!(pid = %pid, "配置已被替换或移除，不再通知");
                    return ThreadpoolSafeFuture::ready();
                }
            }
        }
        self.schedule_notification(pid, change_count, Some(configuration_id), strand)
    }
}

impl ServiceTrackerCustomizer<dyn ManagedService> for ConfigurationAdminImpl {
    type Tracked = Arc<TrackedService<dyn ManagedService>>;

    fn adding_service(
        &self,
        reference: &ServiceReference,
        service: Arc<dyn ManagedService>,
    ) -> Option<Self::Tracked> {
        let Some(pid) = pid_from_reference(reference) else {
            warn_ignored("ManagedService", reference);
            return None;
        };

        let tracked = Arc::new(TrackedService::new(pid.clone(), reference.id(), service));
        {
            let mut state = self.state.lock();
            if !state.configurations.contains_key(&pid) {
                self.create_locked(&mut state, &pid, Properties::new());
            }
            state.managed_services.push(tracked.clone());
        }

        debug!(service_id = reference.id(), pid = %pid, "开始跟踪 ManagedService");
        let weak = self.self_ref.clone();
        let delivery = tracked.clone();
        self.perform_async(None, move || {
            if let Some(admin) = weak.upgrade() {
                admin.deliver_current_to_service(&delivery);
            }
        });
        Some(tracked)
    }

    fn removed_service(&self, reference: &ServiceReference, tracked: Self::Tracked) {
        self.state
            .lock()
            .managed_services
            .retain(|entry| !Arc::ptr_eq(entry, &tracked));
        debug!(service_id = reference.id(), pid = %tracked.pid, "停止跟踪 ManagedService");
    }
}

impl ServiceTrackerCustomizer<dyn ManagedServiceFactory> for ConfigurationAdminImpl {
    type Tracked = Arc<TrackedService<dyn ManagedServiceFactory>>;

    fn adding_service(
        &self,
        reference: &ServiceReference,
        service: Arc<dyn ManagedServiceFactory>,
    ) -> Option<Self::Tracked> {
        let Some(factory_pid) = pid_from_reference(reference) else {
            warn_ignored("ManagedServiceFactory", reference);
            return None;
        };

        let tracked = Arc::new(TrackedService::new(factory_pid.clone(), reference.id(), service));
        let instances = {
            let mut state = self.state.lock();
            state.managed_service_factories.push(tracked.clone());
            state.factory_instances.get(&factory_pid).map_or(0, BTreeSet::len)
        };

        debug!(
            service_id = reference.id(),
            factory_pid = %factory_pid,
            instances,
            "开始跟踪 ManagedServiceFactory"
        );
        let weak = self.self_ref.clone();
        let delivery = tracked.clone();
        self.perform_async(None, move || {
            if let Some(admin) = weak.upgrade() {
                admin.deliver_current_to_factory(&delivery);
            }
        });
        Some(tracked)
    }

    fn removed_service(&self, reference: &ServiceReference, tracked: Self::Tracked) {
        self.state
            .lock()
            .managed_service_factories
            .retain(|entry| !Arc::ptr_eq(entry, &tracked));
        debug!(
            service_id = reference.id(),
            factory_pid = %tracked.pid,
            "停止跟踪 ManagedServiceFactory"
        );
    }
}

impl ServiceTrackerCustomizer<dyn ConfigurationListener> for ConfigurationAdminImpl {
    type Tracked = ServiceId;

    fn adding_service(
        &self,
        reference: &ServiceReference,
        service: Arc<dyn ConfigurationListener>,
    ) -> Option<Self::Tracked> {
        self.state.lock().listeners.push((reference.id(), service));
        Some(reference.id())
    }

    fn removed_service(&self, _reference: &ServiceReference, tracked: Self::Tracked) {
        self.state.lock().listeners.retain(|(id, _)| *id != tracked);
    }
}

impl std::fmt::Debug for ConfigurationAdminImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConfigurationAdminImpl")
            .field("configurations", &state.configurations.len())
            .field("managed_services", &state.managed_services.len())
            .field("managed_service_factories", &state.managed_service_factories.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}
