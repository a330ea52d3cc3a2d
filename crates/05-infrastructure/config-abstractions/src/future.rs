//! 通知完成信号

use crate::async_work::WorkItem;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// 通知完成信号
///
/// 可克隆，既可以 `.await`，也可以调用 [`wait`](Self::wait) 阻塞等待。
/// 对应的 [`NotificationCompleter`] 调用 `complete` 或被丢弃时就绪。
#[derive(Clone)]
pub struct NotificationFuture {
    inner: Shared<BoxFuture<'static, ()>>,
}

impl NotificationFuture {
    /// 创建一对完成器与完成信号
    pub fn channel() -> (NotificationCompleter, Self) {
        let (tx, rx) = oneshot::channel::<()>();
        let future = Self {
            inner: rx.map(|_| ()).boxed().shared(),
        };
        (NotificationCompleter { tx }, future)
    }

    /// 已就绪的完成信号
    pub fn ready() -> Self {
        Self {
            inner: futures::future::ready(()).boxed().shared(),
        }
    }

    /// 是否已就绪
    pub fn is_ready(&self) -> bool {
        self.inner.clone().now_or_never().is_some()
    }

    /// 阻塞当前线程直到就绪
    pub fn wait(&self) {
        futures::executor::block_on(self.inner.clone());
    }
}

impl Future for NotificationFuture {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for NotificationFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// 通知完成器
pub struct NotificationCompleter {
    tx: oneshot::Sender<()>,
}

impl NotificationCompleter {
    /// 标记完成
    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}

impl fmt::Debug for NotificationCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotificationCompleter")
    }
}

/// 只执行一次的任务
///
/// 可以由线程池执行，也可以由等待方直接执行，先到者执行，后到者为空操作。
pub struct SingleInvokeTask {
    task: Mutex<Option<WorkItem>>,
}

impl SingleInvokeTask {
    /// 包装任务
    pub fn new(task: WorkItem) -> Arc<Self> {
        Arc::new(Self {
            task: Mutex::new(Some(task)),
        })
    }

    /// 执行任务，返回本次调用是否真正执行了任务
    pub fn invoke(&self) -> bool {
        let task = self.task.lock().take();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// 任务是否已被取走
    pub fn is_consumed(&self) -> bool {
        self.task.lock().is_none()
    }
}

impl fmt::Debug for SingleInvokeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleInvokeTask")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// 可在线程池线程上安全等待的完成信号
///
/// [`get`](Self::get) 在等待前先尝试直接执行尚未开始的通知任务，
/// 因此即使调用方占用的正是执行通知的线程也不会死锁。
#[derive(Debug, Clone)]
pub struct ThreadpoolSafeFuture {
    future: NotificationFuture,
    task: Option<Arc<SingleInvokeTask>>,
}

impl ThreadpoolSafeFuture {
    /// 由完成信号与对应的任务构建
    pub fn new(future: NotificationFuture, task: Option<Arc<SingleInvokeTask>>) -> Self {
        Self { future, task }
    }

    /// 已就绪的完成信号
    pub fn ready() -> Self {
        Self::new(NotificationFuture::ready(), None)
    }

    /// 执行尚未开始的任务，然后等待完成
    pub fn get(&self) {
        if let Some(task) = &self.task {
            task.invoke();
        }
        self.future.wait();
    }

    /// 获取底层完成信号
    pub fn retrieve_future(&self) -> NotificationFuture {
        self.future.clone()
    }

    /// 是否已就绪
    pub fn is_ready(&self) -> bool {
        self.future.is_ready()
    }
}
