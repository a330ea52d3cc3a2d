//! # Configuration Admin Implementation
//!
//! 配置管理服务的具体实现。
//!
//! ## 主要组件
//!
//! - [`ConfigurationAdminImpl`] - 配置管理核心，维护配置对象并向消费者分发变更
//! - [`ConfigurationImpl`] - 配置对象
//! - [`CmAsyncWorkService`] - 在宿主实现与内置执行器之间切换的异步任务服务
//! - [`CmBundleExtension`] - 加载模块清单中声明的配置
//! - [`CmActivator`] - 启动与停止配置管理服务
//! - [`SimpleConfigurationFilter`] - 列出配置时使用的简单过滤器

pub mod activator;
pub mod admin;
pub mod async_work;
pub mod configuration;
pub mod extension;
pub mod filter;
pub mod metadata;
pub(crate) mod notification;
pub mod private;
pub mod settings;

pub use activator::CmActivator;
pub use admin::ConfigurationAdminImpl;
pub use async_work::{
    CmAsyncWorkService, FallbackAsyncWorkService, StrandAsyncWorkService, TokioAsyncWorkService,
};
pub use configuration::ConfigurationImpl;
pub use extension::CmBundleExtension;
pub use filter::SimpleConfigurationFilter;
pub use metadata::{
    parse_metadata, ConfigurationMetadata, MetadataParser, MetadataParserFactory,
    MetadataParserV1,
};
pub use private::{ConfigurationAddedInfo, ConfigurationAdminPrivate, ConfigurationId};
pub use settings::CmSettings;

#[cfg(test)]
mod tests;
