//! 配置管理服务的启动与停止

use crate::admin::ConfigurationAdminImpl;
use crate::async_work::CmAsyncWorkService;
use crate::extension::CmBundleExtension;
use crate::private::ConfigurationAdminPrivate;
use crate::settings::CmSettings;
use config_abstractions::{AsyncWorkService, ConfigurationAdmin};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use infrastructure_common::pid::keys;
use infrastructure_common::{ConfigResult, Properties};
use parking_lot::Mutex;
use registry_abstractions::{
    BundleEvent, BundleEventKind, BundleId, BundleInfo, ListenerToken, ServiceReference,
    ServiceRegistry, ServiceRegistryExt,
};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// 已加载配置的模块扩展
type Extensions = DashMap<BundleId, CmBundleExtension>;

struct Running {
    registry: Arc<dyn ServiceRegistry>,
    async_work: Arc<CmAsyncWorkService>,
    admin: Arc<ConfigurationAdminImpl>,
    admin_reference: ServiceReference,
    bundle_token: ListenerToken,
    extensions: Arc<Extensions>,
}

/// 配置管理服务激活器
///
/// `start` 创建异步任务服务与配置管理核心，把核心注册为 [`ConfigurationAdmin`] 服务，
/// 并为每个带 `cm` 清单头的已启动模块加载配置。
pub struct CmActivator {
    settings: CmSettings,
    running: Mutex<Option<Running>>,
}

impl CmActivator {
    /// 以指定运行参数创建，尚未启动
    pub fn new(settings: CmSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(None),
        }
    }

    /// 启动配置管理服务，已启动时不做任何事
    pub fn start(&self, registry: Arc<dyn ServiceRegistry>) -> ConfigResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            warn!("配置管理服务已经启动");
            return Ok(());
        }

        let async_work = CmAsyncWorkService::new(registry.clone(), &self.settings)?;
        let admin = ConfigurationAdminImpl::new(
            registry.clone(),
            async_work.clone() as Arc<dyn AsyncWorkService>,
            self.settings.clone(),
        );
        let admin_reference = registry.register::<dyn ConfigurationAdmin>(
            admin.clone(),
            None,
            Properties::new(),
        );

        let extensions: Arc<Extensions> = Arc::new(DashMap::new());
        let bundle_token = {
            let extensions = extensions.clone();
            let admin = Arc::downgrade(&admin);
            registry.add_bundle_listener(Arc::new(move |event: &BundleEvent| {
                handle_bundle_event(&extensions, &admin, event);
            }))
        };

        for bundle in registry.active_bundles() {
            bundle_started(&extensions, admin.clone(), &bundle);
        }

        info!(
            admin_service_id = admin_reference.id(),
            bundles = extensions.len(),
            "配置管理服务已启动"
        );
        *running = Some(Running {
            registry,
            async_work,
            admin,
            admin_reference,
            bundle_token,
            extensions,
        });
        Ok(())
    }

    /// 停止配置管理服务
    ///
    /// 撤销全部模块配置，关闭配置管理核心并等待所有通知完成。
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.registry.remove_bundle_listener(running.bundle_token);
        running.registry.unregister_service(running.admin_reference.id());
        running.extensions.clear();
        running.admin.shutdown();
        running.async_work.shutdown();
        info!("配置管理服务已停止");
    }

    /// 正在运行的配置管理核心
    pub fn admin(&self) -> Option<Arc<ConfigurationAdminImpl>> {
        self.running.lock().as_ref().map(|running| running.admin.clone())
    }

    /// 已加载配置的模块数量
    pub fn extension_count(&self) -> usize {
        self.running
            .lock()
            .as_ref()
            .map_or(0, |running| running.extensions.len())
    }
}

impl Default for CmActivator {
    fn default() -> Self {
        Self::new(CmSettings::default())
    }
}

impl std::fmt::Debug for CmActivator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmActivator")
            .field("running", &self.running.lock().is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

fn private_admin(admin: &Weak<ConfigurationAdminImpl>) -> Option<Arc<dyn ConfigurationAdminPrivate>> {
    admin
        .upgrade()
        .map(|admin| admin as Arc<dyn ConfigurationAdminPrivate>)
}

fn handle_bundle_event(
    extensions: &Extensions,
    admin: &Weak<ConfigurationAdminImpl>,
    event: &BundleEvent,
) {
    match event.kind {
        BundleEventKind::Started => {
            if let Some(admin) = private_admin(admin) {
                bundle_started(extensions, admin, &event.bundle);
            }
        }
        BundleEventKind::Stopping => {
            if extensions.remove(&event.bundle.id).is_some() {
                debug!(bundle = %event.bundle.symbolic_name, "模块停止，已撤销其配置");
            }
        }
    }
}

fn bundle_started(
    extensions: &Extensions,
    admin: Arc<dyn ConfigurationAdminPrivate>,
    bundle: &BundleInfo,
) {
    let Some(metadata) = bundle.header(keys::CM_KEY) else {
        return;
    };
    let Entry::Vacant(entry) = extensions.entry(bundle.id) else {
        return;
    };

    match CmBundleExtension::new(bundle, metadata, admin) {
        Ok(extension) => {
            entry.insert(extension);
        }
        Err(e) => {
            error!(
                bundle = %bundle.symbolic_name,
                error = %e,
                "加载模块配置失败"
            );
        }
    }
}
