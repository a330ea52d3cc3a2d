//! 异步任务服务接口

use std::sync::Arc;

/// 待执行的任务
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// 异步任务服务
///
/// 宿主可以注册自己的实现；未注册时配置管理使用内置的单线程实现。
pub trait AsyncWorkService: Send + Sync {
    /// 提交任务
    fn post(&self, task: WorkItem);

    /// 创建串行执行器，提交到其上的任务严格按顺序逐个执行
    ///
    /// 不支持时返回 `None`。
    fn create_strand(&self) -> Option<Arc<dyn AsyncWorkService>> {
        None
    }
}
