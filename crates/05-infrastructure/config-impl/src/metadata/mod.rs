//! 模块清单中声明的配置元数据解析
//!
//! 清单数据按 `version` 选择解析器，解析结果为 (PID, 属性) 列表。

mod v1;

pub use v1::MetadataParserV1;

use infrastructure_common::pid::keys;
use infrastructure_common::{ConfigError, ConfigResult, Properties};
use serde_json::Value;

/// 单个配置的元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationMetadata {
    /// 配置 PID
    pub pid: String,
    /// 配置属性
    pub properties: Properties,
}

impl ConfigurationMetadata {
    /// 创建配置元数据
    pub fn new(pid: impl Into<String>, properties: Properties) -> Self {
        Self {
            pid: pid.into(),
            properties,
        }
    }
}

/// 元数据解析器
pub trait MetadataParser: Send + Sync {
    /// 解析清单中的配置数据
    ///
    /// 单个条目格式错误时跳过并记录日志；整体结构错误时返回错误。
    fn parse_and_get_configuration_metadata(
        &self,
        metadata: &Value,
    ) -> ConfigResult<Vec<ConfigurationMetadata>>;
}

/// 按版本创建解析器
pub struct MetadataParserFactory;

impl MetadataParserFactory {
    /// 创建对应版本的解析器，目前只支持版本 1
    pub fn create(version: i64) -> ConfigResult<Box<dyn MetadataParser>> {
        match version {
            1 => Ok(Box::new(MetadataParserV1)),
            _ => Err(ConfigError::UnsupportedVersion { version }),
        }
    }
}

/// 读取清单版本号
pub fn extract_version(metadata: &Value) -> ConfigResult<i64> {
    let version = metadata
        .get(keys::CM_VERSION)
        .ok_or_else(|| ConfigError::missing_key(keys::CM_VERSION))?;
    version
        .as_i64()
        .ok_or_else(|| ConfigError::type_mismatch(keys::CM_VERSION, "integer"))
}

/// 解析完整的清单配置数据
pub fn parse_metadata(metadata: &Value) -> ConfigResult<Vec<ConfigurationMetadata>> {
    let version = extract_version(metadata)?;
    MetadataParserFactory::create(version)?.parse_and_get_configuration_metadata(metadata)
}
