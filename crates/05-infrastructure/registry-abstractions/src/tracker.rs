//! 服务跟踪回调接口

use crate::service::ServiceReference;
use std::sync::Arc;

/// 服务跟踪回调
///
/// `S` 为被跟踪的服务接口，`Tracked` 为跟踪期间保存的对象。
pub trait ServiceTrackerCustomizer<S: ?Sized>: Send + Sync {
    /// 跟踪对象类型
    type Tracked: Send + 'static;

    /// 发现新服务，返回 `None` 表示不跟踪该服务
    fn adding_service(&self, reference: &ServiceReference, service: Arc<S>)
        -> Option<Self::Tracked>;

    /// 被跟踪的服务已移除
    fn removed_service(&self, reference: &ServiceReference, tracked: Self::Tracked);
}
