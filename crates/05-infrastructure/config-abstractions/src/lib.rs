//! # Configuration Admin Abstractions
//!
//! 配置管理抽象层，定义配置对象、配置管理服务以及配置消费者的核心接口。
//!
//! ## 核心接口
//!
//! - [`Configuration`] - 以 PID 标识的配置对象
//! - [`ConfigurationAdmin`] - 配置管理服务
//! - [`ManagedService`] / [`ManagedServiceFactory`] - 配置消费者
//! - [`ConfigurationListener`] - 配置事件监听器
//! - [`AsyncWorkService`] - 异步任务执行服务
//! - [`NotificationFuture`] / [`ThreadpoolSafeFuture`] - 通知完成信号

pub mod admin;
pub mod async_work;
pub mod configuration;
pub mod events;
pub mod filter;
pub mod future;
pub mod managed;

pub use admin::*;
pub use async_work::*;
pub use configuration::*;
pub use events::*;
pub use filter::*;
pub use future::*;
pub use managed::*;
