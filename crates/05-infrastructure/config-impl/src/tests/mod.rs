//! 配置管理实现测试

mod configuration_tests;

use crate::{ConfigurationAdminImpl, FallbackAsyncWorkService};
use crate::settings::CmSettings;
use config_abstractions::{
    AsyncWorkService, ConfigurationEvent, ConfigurationException, ConfigurationListener,
    ManagedService, ManagedServiceError, ManagedServiceFactory, WorkItem,
};
use infrastructure_common::pid::keys;
use infrastructure_common::Properties;
use parking_lot::Mutex;
use registry_abstractions::ServiceRegistry;
use registry_impl::InMemoryServiceRegistry;
use std::collections::VecDeque;
use std::sync::{Arc, Once};

/// 记录每次 `updated` 调用的 ManagedService
#[derive(Default)]
pub(crate) struct RecordingService {
    pub calls: Mutex<Vec<Properties>>,
    pub reject_with: Mutex<Option<ConfigurationException>>,
}

impl RecordingService {
    pub fn calls(&self) -> Vec<Properties> {
        self.calls.lock().clone()
    }
}

impl ManagedService for RecordingService {
    fn updated(&self, properties: &Properties) -> Result<(), ManagedServiceError> {
        self.calls.lock().push(properties.clone());
        match self.reject_with.lock().clone() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// 记录 `updated` / `removed` 调用的 ManagedServiceFactory
#[derive(Default)]
pub(crate) struct RecordingFactory {
    pub updated: Mutex<Vec<(String, Properties)>>,
    pub removed: Mutex<Vec<String>>,
}

impl RecordingFactory {
    pub fn updated_for(&self, pid: &str) -> Vec<Properties> {
        self.updated
            .lock()
            .iter()
            .filter(|(p, _)| p == pid)
            .map(|(_, props)| props.clone())
            .collect()
    }

    pub fn removed_count(&self, pid: &str) -> usize {
        self.removed.lock().iter().filter(|p| *p == pid).count()
    }
}

impl ManagedServiceFactory for RecordingFactory {
    fn updated(&self, pid: &str, properties: &Properties) -> Result<(), ManagedServiceError> {
        self.updated.lock().push((pid.to_string(), properties.clone()));
        Ok(())
    }

    fn removed(&self, pid: &str) -> Result<(), ManagedServiceError> {
        self.removed.lock().push(pid.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    pub events: Mutex<Vec<ConfigurationEvent>>,
}

impl ConfigurationListener for RecordingListener {
    fn configuration_event(&self, event: &ConfigurationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// 手动执行的任务服务，任务只在调用 [`run_all`](Self::run_all) 时执行
#[derive(Default)]
pub(crate) struct ManualWorkService {
    queue: Mutex<VecDeque<WorkItem>>,
}

impl ManualWorkService {
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// 执行队列中的全部任务（包括执行过程中新提交的任务），返回执行数量
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        loop {
            let Some(task) = self.queue.lock().pop_front() else {
                return count;
            };
            task();
            count += 1;
        }
    }

    /// 按后进先出的顺序执行队列中的全部任务，返回执行数量
    pub fn run_all_newest_first(&self) -> usize {
        let mut count = 0;
        loop {
            let Some(task) = self.queue.lock().pop_back() else {
                return count;
            };
            task();
            count += 1;
        }
    }
}

impl AsyncWorkService for ManualWorkService {
    fn post(&self, task: WorkItem) {
        self.queue.lock().push_back(task);
    }
}

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
pub(crate) fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub(crate) fn pid_properties(pid: &str) -> Properties {
    Properties::new().with(keys::SERVICE_PID, pid)
}

pub(crate) struct Fixture {
    pub registry: Arc<InMemoryServiceRegistry>,
    pub admin: Arc<ConfigurationAdminImpl>,
    pub worker: Arc<FallbackAsyncWorkService>,
}

impl Fixture {
    pub fn new() -> Self {
        init_test_logger();
        let registry = Arc::new(InMemoryServiceRegistry::new());
        let worker = Arc::new(FallbackAsyncWorkService::new("cm-test-worker").unwrap());
        let admin = ConfigurationAdminImpl::new(
            registry.clone() as Arc<dyn ServiceRegistry>,
            worker.clone() as Arc<dyn AsyncWorkService>,
            CmSettings::default(),
        );
        Self {
            registry,
            admin,
            worker,
        }
    }

    pub fn settle(&self) {
        self.admin.wait_for_all_async();
    }

    pub fn shutdown(self) {
        self.admin.shutdown();
        self.worker.shutdown();
    }
}
