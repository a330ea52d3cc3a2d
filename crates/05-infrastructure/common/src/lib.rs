//! # Infrastructure Common
//!
//! 配置管理子系统各 crate 共享的基础类型。
//!
//! ## 核心组件
//!
//! - [`ConfigError`] - 统一错误类型
//! - [`Properties`] - 大小写不敏感的配置属性集合
//! - [`pid`] - PID 约定与清单键名

pub mod errors;
pub mod pid;
pub mod properties;

pub use errors::*;
pub use pid::{factory_instance_pid, factory_pid_of, FACTORY_PID_SEPARATOR};
pub use properties::*;
