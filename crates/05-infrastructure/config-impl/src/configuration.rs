//! 配置对象实现

use crate::private::{ConfigurationAdminPrivate, ConfigurationId};
use config_abstractions::{
    AsyncWorkService, Configuration, NotificationFuture, ThreadpoolSafeFuture,
};
use infrastructure_common::{factory_pid_of, ConfigError, ConfigResult, Properties};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

struct ConfigurationState {
    properties: Properties,
    change_count: u64,
    removed: bool,
}

/// 配置对象
///
/// 属性、变更计数和移除标记由一把锁保护；指向配置管理核心的弱引用由另一把锁保护，
/// 因此 [`invalidate`](Self::invalidate) 可以与更新、移除并发调用。
pub struct ConfigurationImpl {
    id: ConfigurationId,
    pid: String,
    factory_pid: String,
    state: Mutex<ConfigurationState>,
    admin: Mutex<Option<Weak<dyn ConfigurationAdminPrivate>>>,
    strand: Option<Arc<dyn AsyncWorkService>>,
}

impl ConfigurationImpl {
    /// 创建配置，变更计数从 1 开始
    pub(crate) fn new(
        admin: Weak<dyn ConfigurationAdminPrivate>,
        pid: impl Into<String>,
        properties: Properties,
        strand: Option<Arc<dyn AsyncWorkService>>,
    ) -> Self {
        let pid = pid.into();
        let factory_pid = factory_pid_of(&pid).to_string();
        Self {
            id: ConfigurationId::next(),
            pid,
            factory_pid,
            state: Mutex::new(ConfigurationState {
                properties,
                change_count: 1,
                removed: false,
            }),
            admin: Mutex::new(Some(admin)),
            strand,
        }
    }

    /// 配置对象标识，移除后仍可读取
    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub(crate) fn strand(&self) -> Option<Arc<dyn AsyncWorkService>> {
        self.strand.clone()
    }

    /// 是否已移除
    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    fn live_state(&self) -> ConfigResult<MutexGuard<'_, ConfigurationState>> {
        let state = self.state.lock();
        if state.removed {
            return Err(ConfigError::removed(&self.pid));
        }
        Ok(state)
    }

    /// 原子地读取属性与变更计数
    pub fn snapshot(&self) -> ConfigResult<(Properties, u64)> {
        let state = self.live_state()?;
        Ok((state.properties.clone(), state.change_count))
    }

    /// 属性不同时替换属性并递增变更计数，不调度通知
    ///
    /// 返回 (是否变更, 当前变更计数)。
    pub fn update_without_notification_if_different(
        &self,
        properties: Properties,
    ) -> ConfigResult<(bool, u64)> {
        let mut state = self.live_state()?;
        if state.properties == properties {
            return Ok((false, state.change_count));
        }
        state.properties = properties;
        state.change_count += 1;
        Ok((true, state.change_count))
    }

    /// 变更计数等于期望值时标记移除，不调度通知
    pub fn remove_without_notification_if_change_count_equals(
        &self,
        expected_change_count: u64,
    ) -> ConfigResult<bool> {
        let mut state = self.live_state()?;
        if state.change_count != expected_change_count {
            trace!(
                pid = %self.pid,
                expected = expected_change_count,
                actual = state.change_count,
                "变更计数不一致，不移除配置"
            );
            return Ok(false);
        }
        state.removed = true;
        Ok(true)
    }

    /// 断开与配置管理核心的关联，之后不再发出任何通知
    pub fn invalidate(&self) {
        self.admin.lock().take();
    }

    fn notify_updated(&self, change_count: u64) -> ThreadpoolSafeFuture {
        let admin = self.admin.lock();
        match admin.as_ref().and_then(Weak::upgrade) {
            Some(admin) => admin.notify_configuration_updated(&self.pid, change_count, self.strand()),
            None => ThreadpoolSafeFuture::ready(),
        }
    }
}

impl Configuration for ConfigurationImpl {
    fn get_pid(&self) -> ConfigResult<String> {
        self.live_state().map(|_| self.pid.clone())
    }

    fn get_factory_pid(&self) -> ConfigResult<String> {
        self.live_state().map(|_| self.factory_pid.clone())
    }

    fn get_properties(&self) -> ConfigResult<Properties> {
        Ok(self.live_state()?.properties.clone())
    }

    fn get_change_count(&self) -> ConfigResult<u64> {
        Ok(self.live_state()?.change_count)
    }

    fn update(&self, properties: Properties) -> ConfigResult<NotificationFuture> {
        Ok(self.safe_update(properties)?.retrieve_future())
    }

    fn update_if_different(
        &self,
        properties: Properties,
    ) -> ConfigResult<(bool, NotificationFuture)> {
        let (updated, future) = self.safe_update_if_different(properties)?;
        Ok((updated, future.retrieve_future()))
    }

    fn remove(&self) -> ConfigResult<NotificationFuture> {
        Ok(self.safe_remove()?.retrieve_future())
    }

    fn safe_update(&self, properties: Properties) -> ConfigResult<ThreadpoolSafeFuture> {
        let change_count = {
            let mut state = self.live_state()?;
            state.properties = properties;
            state.change_count += 1;
            state.change_count
        };
        Ok(self.notify_updated(change_count))
    }

    fn safe_update_if_different(
        &self,
        properties: Properties,
    ) -> ConfigResult<(bool, ThreadpoolSafeFuture)> {
        let (updated, change_count) = self.update_without_notification_if_different(properties)?;
        if !updated {
            return Ok((false, ThreadpoolSafeFuture::ready()));
        }
        Ok((true, self.notify_updated(change_count)))
    }

    fn safe_remove(&self) -> ConfigResult<ThreadpoolSafeFuture> {
        let change_count = {
            let mut state = self.live_state()?;
            state.removed = true;
            state.change_count += 1;
            state.change_count
        };

        let mut admin = self.admin.lock();
        let future = match admin.take().and_then(|admin| admin.upgrade()) {
            Some(admin) => {
                admin.notify_configuration_removed(&self.pid, self.id, change_count, self.strand())
            }
            None => ThreadpoolSafeFuture::ready(),
        };
        Ok(future)
    }
}

impl fmt::Debug for ConfigurationImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConfigurationImpl")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("factory_pid", &self.factory_pid)
            .field("change_count", &state.change_count)
            .field("removed", &state.removed)
            .finish()
    }
}
