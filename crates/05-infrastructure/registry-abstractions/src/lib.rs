//! # Service Registry Abstractions
//!
//! 宿主服务注册表与模块（bundle）模型的抽象层，配置管理核心只通过这些接口
//! 感知服务的出现、消失以及模块的启动、停止。
//!
//! ## 核心接口
//!
//! - [`ServiceRegistry`] - 服务注册表接口
//! - [`ServiceRegistryExt`] - 按接口类型注册与获取服务的便捷方法
//! - [`ServiceTrackerCustomizer`] - 服务跟踪回调接口
//! - [`BundleInfo`] / [`BundleEvent`] - 模块信息与生命周期事件

pub mod bundle;
pub mod errors;
pub mod registry;
pub mod service;
pub mod tracker;

pub use bundle::*;
pub use errors::*;
pub use registry::*;
pub use service::*;
pub use tracker::*;
