//! 配置管理运行参数

use infrastructure_common::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::{debug, error};

/// 配置管理运行参数
///
/// 通过 `CM_` 前缀的环境变量覆盖，例如 `CM_INSTANCE_NAME_LENGTH=8`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CmSettings {
    /// 内置单线程执行器的线程名
    pub fallback_thread_name: String,
    /// 配置更新通知完成后是否以 debug 级别输出属性内容
    pub log_properties_on_update: bool,
    /// 工厂配置随机实例名长度，实例名冲突时逐次加长
    pub instance_name_length: NonZeroUsize,
}

impl Default for CmSettings {
    fn default() -> Self {
        Self {
            fallback_thread_name: "cm-fallback-worker".to_string(),
            log_properties_on_update: true,
            instance_name_length: NonZeroUsize::MIN.saturating_add(5),
        }
    }
}

impl CmSettings {
    /// 以默认值为基础，叠加 `CM_` 前缀的环境变量
    pub fn from_env() -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("CM").try_parsing(true))
            .build()
            .map_err(|e| {
                error!("配置管理运行参数构建失败: {}", e);
                ConfigError::SettingsError {
                    source: Box::new(e),
                }
            })?;

        let result: Self = settings.try_deserialize().map_err(|e| {
            error!("配置管理运行参数绑定失败: {}", e);
            ConfigError::SettingsError {
                source: Box::new(e),
            }
        })?;

        debug!("配置管理运行参数: {:?}", result);
        Ok(result)
    }
}
