//! 模块扩展：模块启动时加载其声明的配置，停止时撤销

use crate::metadata::parse_metadata;
use crate::notification::panic_message;
use crate::private::{ConfigurationAddedInfo, ConfigurationAdminPrivate};
use infrastructure_common::{ConfigError, ConfigResult};
use registry_abstractions::{BundleId, BundleInfo};
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// 单个模块的配置扩展
///
/// 创建时解析模块清单中的配置并交给配置管理核心，丢弃时按创建时记录的
/// (PID, 变更计数, 配置标识) 移除这些配置。
pub struct CmBundleExtension {
    bundle_id: BundleId,
    bundle_name: String,
    admin: Arc<dyn ConfigurationAdminPrivate>,
    added: Vec<ConfigurationAddedInfo>,
}

impl CmBundleExtension {
    /// 解析模块的配置数据并添加到配置管理核心
    pub fn new(
        bundle: &BundleInfo,
        metadata: &Value,
        admin: Arc<dyn ConfigurationAdminPrivate>,
    ) -> ConfigResult<Self> {
        if bundle.symbolic_name.is_empty() {
            return Err(ConfigError::invalid_argument("模块符号名不能为空"));
        }
        match metadata.as_object() {
            Some(object) if !object.is_empty() => {}
            _ => {
                return Err(ConfigError::invalid_argument(format!(
                    "模块 {} 的配置元数据必须是非空对象",
                    bundle.symbolic_name
                )))
            }
        }

        let configurations = parse_metadata(metadata)?;
        let added = admin.add_configurations(configurations);
        debug!(
            bundle = %bundle.symbolic_name,
            configurations = added.len(),
            "已加载模块声明的配置"
        );

        Ok(Self {
            bundle_id: bundle.id,
            bundle_name: bundle.symbolic_name.clone(),
            admin,
            added,
        })
    }

    /// 所属模块 ID
    pub fn bundle_id(&self) -> BundleId {
        self.bundle_id
    }

    /// 本扩展添加的配置
    pub fn added_configurations(&self) -> &[ConfigurationAddedInfo] {
        &self.added
    }
}

impl Drop for CmBundleExtension {
    fn drop(&mut self) {
        let admin = &self.admin;
        let added = &self.added;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| admin.remove_configurations(added))) {
            error!(
                bundle = %self.bundle_name,
                "移除模块配置时发生异常: {}",
                panic_message(payload.as_ref())
            );
        } else {
            debug!(bundle = %self.bundle_name, "已移除模块声明的配置");
        }
    }
}

impl fmt::Debug for CmBundleExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmBundleExtension")
            .field("bundle_id", &self.bundle_id)
            .field("bundle_name", &self.bundle_name)
            .field("added", &self.added)
            .finish()
    }
}
