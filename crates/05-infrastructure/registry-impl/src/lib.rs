//! # 服务注册表具体实现
//!
//! 提供进程内的发布/订阅服务注册表和通用的服务跟踪器。

mod registry;
mod tracker;

#[cfg(test)]
mod tests;

pub use registry::InMemoryServiceRegistry;
pub use tracker::ServiceTracker;
