//! 异步任务服务适配
//!
//! [`CmAsyncWorkService`] 跟踪注册表中由宿主提供的 [`AsyncWorkService`]，
//! 没有可用实现时退回内置的 [`FallbackAsyncWorkService`]。

use crate::settings::CmSettings;
use config_abstractions::{AsyncWorkService, WorkItem};
use infrastructure_common::{ConfigError, ConfigResult};
use parking_lot::{Mutex, RwLock};
use registry_abstractions::{ServiceReference, ServiceRegistry, ServiceTrackerCustomizer};
use registry_impl::ServiceTracker;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// 执行任务并吞掉任务中的 panic
fn run_contained(task: WorkItem) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
        error!(
            panic = %crate::notification::panic_message(payload.as_ref()),
            "异步任务执行时发生 panic"
        );
    }
}

/// 内置单线程执行器
///
/// 任务按提交顺序在一个命名线程上执行。工作线程继承创建时的 tracing dispatcher。
/// 关闭或丢弃后不再接受新任务，已排队的任务仍会执行完。
pub struct FallbackAsyncWorkService {
    sender: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_name: String,
}

impl FallbackAsyncWorkService {
    /// 启动工作线程
    pub fn new(thread_name: impl Into<String>) -> ConfigResult<Self> {
        let thread_name = thread_name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<WorkItem>();
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    trace!("内置执行器工作线程启动");
                    while let Some(task) = receiver.blocking_recv() {
                        run_contained(task);
                    }
                    trace!("内置执行器工作线程退出");
                });
            })
            .map_err(|source| ConfigError::WorkerSpawnFailed {
                name: thread_name.clone(),
                source,
            })?;

        debug!(thread = %thread_name, "内置执行器已启动");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            thread_name,
        })
    }

    /// 停止接受新任务，等待已排队的任务执行完毕
    ///
    /// 在工作线程自身上调用时不等待。
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!(thread = %self.thread_name, "内置执行器工作线程异常退出");
            }
        }
    }

    /// 工作线程名
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

impl AsyncWorkService for FallbackAsyncWorkService {
    fn post(&self, task: WorkItem) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    warn!(thread = %self.thread_name, "内置执行器已退出，任务被丢弃");
                }
            }
            None => debug!(thread = %self.thread_name, "内置执行器已关闭，任务被丢弃"),
        }
    }
}

impl Drop for FallbackAsyncWorkService {
    fn drop(&mut self) {
        // 只关闭队列，工作线程在后台把剩余任务执行完
        self.sender.get_mut().take();
    }
}

impl std::fmt::Debug for FallbackAsyncWorkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackAsyncWorkService")
            .field("thread_name", &self.thread_name)
            .field("accepting", &self.sender.lock().is_some())
            .finish()
    }
}

#[derive(Default)]
struct StrandQueue {
    tasks: VecDeque<WorkItem>,
    running: bool,
}

/// 串行执行器
///
/// 把任务排入自己的队列，再向底层执行器提交一个排空队列的任务，
/// 保证同一串行执行器上的任务不会并发执行。
pub struct StrandAsyncWorkService {
    target: Arc<dyn AsyncWorkService>,
    queue: Arc<Mutex<StrandQueue>>,
}

impl StrandAsyncWorkService {
    /// 创建提交到 `target` 的串行执行器
    pub fn new(target: Arc<dyn AsyncWorkService>) -> Self {
        Self {
            target,
            queue: Arc::new(Mutex::new(StrandQueue::default())),
        }
    }

    fn drain(queue: &Mutex<StrandQueue>) {
        loop {
            let task = {
                let mut queue = queue.lock();
                match queue.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        queue.running = false;
                        return;
                    }
                }
            };
            run_contained(task);
        }
    }
}

impl AsyncWorkService for StrandAsyncWorkService {
    fn post(&self, task: WorkItem) {
        {
            let mut queue = self.queue.lock();
            queue.tasks.push_back(task);
            if queue.running {
                return;
            }
            queue.running = true;
        }

        let queue = self.queue.clone();
        self.target.post(Box::new(move || Self::drain(&queue)));
    }
}

struct CurrentService {
    service: Arc<dyn AsyncWorkService>,
    /// 外部服务的引用，使用内置执行器时为 `None`
    reference: Option<ServiceReference>,
    fallback: Option<Arc<FallbackAsyncWorkService>>,
}

/// 配置管理使用的异步任务服务
///
/// 在宿主注册的实现与内置执行器之间透明切换，切换时旧执行器中已排队的任务照常执行。
pub struct CmAsyncWorkService {
    self_ref: Weak<Self>,
    current: RwLock<CurrentService>,
    tracker: Mutex<Option<ServiceTracker<dyn AsyncWorkService, CmAsyncWorkService>>>,
    thread_name: String,
}

impl CmAsyncWorkService {
    /// 创建并开始跟踪注册表中的异步任务服务
    pub fn new(registry: Arc<dyn ServiceRegistry>, settings: &CmSettings) -> ConfigResult<Arc<Self>> {
        let fallback = Arc::new(FallbackAsyncWorkService::new(&settings.fallback_thread_name)?);
        let service = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            current: RwLock::new(CurrentService {
                service: fallback.clone(),
                reference: None,
                fallback: Some(fallback),
            }),
            tracker: Mutex::new(None),
            thread_name: settings.fallback_thread_name.clone(),
        });

        let tracker = ServiceTracker::new(registry, Arc::downgrade(&service));
        tracker.open();
        *service.tracker.lock() = Some(tracker);
        Ok(service)
    }

    /// 当前是否使用内置执行器
    pub fn is_using_fallback(&self) -> bool {
        self.current.read().reference.is_none()
    }

    /// 停止跟踪，并关闭正在使用的内置执行器
    pub fn shutdown(&self) {
        let tracker = self.tracker.lock().take();
        if let Some(tracker) = tracker {
            tracker.close();
        }
        let fallback = self.current.write().fallback.take();
        if let Some(fallback) = fallback {
            fallback.shutdown();
        }
        info!("配置管理异步任务服务已停止");
    }

    fn outranks(candidate: &ServiceReference, current: &ServiceReference) -> bool {
        candidate.ranking() > current.ranking()
            || (candidate.ranking() == current.ranking() && candidate.id() < current.id())
    }
}

impl AsyncWorkService for CmAsyncWorkService {
    fn post(&self, task: WorkItem) {
        let service = self.current.read().service.clone();
        service.post(task);
    }

    fn create_strand(&self) -> Option<Arc<dyn AsyncWorkService>> {
        let this: Arc<dyn AsyncWorkService> = self.self_ref.upgrade()?;
        Some(Arc::new(StrandAsyncWorkService::new(this)))
    }
}

impl ServiceTrackerCustomizer<dyn AsyncWorkService> for CmAsyncWorkService {
    type Tracked = Arc<dyn AsyncWorkService>;

    fn adding_service(
        &self,
        reference: &ServiceReference,
        service: Arc<dyn AsyncWorkService>,
    ) -> Option<Self::Tracked> {
        let replaced = {
            let mut current = self.current.write();
            let adopt = match &current.reference {
                None => true,
                Some(current_ref) => Self::outranks(reference, current_ref),
            };
            if !adopt {
                None
            } else {
                current.service = service.clone();
                current.reference = Some(reference.clone());
                Some(current.fallback.take())
            }
        };

        if let Some(old_fallback) = replaced {
            info!(
                service_id = reference.id(),
                ranking = reference.ranking(),
                "切换到外部异步任务服务"
            );
            // 丢弃旧的内置执行器，其队列中的任务在后台执行完
            drop(old_fallback);
        }
        Some(service)
    }

    fn removed_service(&self, reference: &ServiceReference, _service: Self::Tracked) {
        let in_use = self
            .current
            .read()
            .reference
            .as_ref()
            .map(ServiceReference::id)
            == Some(reference.id());
        if !in_use {
            return;
        }

        match FallbackAsyncWorkService::new(&self.thread_name) {
            Ok(fallback) => {
                let fallback = Arc::new(fallback);
                let mut current = self.current.write();
                current.service = fallback.clone();
                current.reference = None;
                current.fallback = Some(fallback);
                info!(service_id = reference.id(), "外部异步任务服务已注销，切换回内置执行器");
            }
            Err(e) => {
                error!(service_id = reference.id(), error = %e, "无法启动内置执行器，继续使用已注销的异步任务服务");
            }
        }
    }
}

impl std::fmt::Debug for CmAsyncWorkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmAsyncWorkService")
            .field("using_fallback", &self.is_using_fallback())
            .finish()
    }
}

/// 基于 tokio 阻塞线程池的异步任务服务
///
/// 宿主运行在 tokio 上时可以注册它作为外部实现。
#[derive(Debug, Clone)]
pub struct TokioAsyncWorkService {
    handle: tokio::runtime::Handle,
}

impl TokioAsyncWorkService {
    /// 使用指定的 tokio 运行时
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// 使用当前 tokio 运行时
    pub fn current() -> ConfigResult<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| ConfigError::invalid_argument(format!("当前线程不在 tokio 运行时中: {e}")))
    }
}

impl AsyncWorkService for TokioAsyncWorkService {
    fn post(&self, task: WorkItem) {
        self.handle.spawn_blocking(move || run_contained(task));
    }
}
