//! 版本 1 的清单格式
//!
//! ```json
//! { "version": 1, "configurations": [ { "pid": "a.b", "properties": { "k": 1 } } ] }
//! ```

use super::{ConfigurationMetadata, MetadataParser};
use infrastructure_common::pid::keys;
use infrastructure_common::{ConfigError, ConfigResult, Properties};
use serde_json::Value;
use tracing::warn;

/// 版本 1 解析器
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataParserV1;

impl MetadataParserV1 {
    fn parse_entry(entry: &Value) -> Result<ConfigurationMetadata, String> {
        let object = entry
            .as_object()
            .ok_or_else(|| "条目不是对象".to_string())?;

        let pid = match object.get(keys::CM_PID) {
            Some(Value::String(pid)) if !pid.is_empty() => pid.clone(),
            Some(Value::String(_)) => return Err("pid 为空".to_string()),
            Some(_) => return Err("pid 不是字符串".to_string()),
            None => return Err(format!("缺少 '{}' 属性", keys::CM_PID)),
        };

        let properties = match object.get(keys::CM_PROPERTIES) {
            Some(Value::Object(map)) => Properties::from_json_object(map),
            Some(_) => return Err("properties 不是对象".to_string()),
            None => return Err(format!("缺少 '{}' 属性", keys::CM_PROPERTIES)),
        };

        Ok(ConfigurationMetadata { pid, properties })
    }
}

impl MetadataParser for MetadataParserV1 {
    fn parse_and_get_configuration_metadata(
        &self,
        metadata: &Value,
    ) -> ConfigResult<Vec<ConfigurationMetadata>> {
        let entries = metadata
            .get(keys::CM_CONFIGURATIONS)
            .ok_or_else(|| ConfigError::missing_key(keys::CM_CONFIGURATIONS))?
            .as_array()
            .ok_or_else(|| ConfigError::type_mismatch(keys::CM_CONFIGURATIONS, "array"))?;

        let mut parsed = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match Self::parse_entry(entry) {
                Ok(configuration) => parsed.push(configuration),
                Err(reason) => warn!(index, reason = %reason, "跳过格式错误的配置条目"),
            }
        }
        Ok(parsed)
    }
}
