//! 简单的配置过滤器

use config_abstractions::ConfigurationFilter;
use infrastructure_common::{ConfigError, ConfigResult, Properties};
use serde_json::Value;

/// 代表 PID 的伪属性名
const PID_KEY: &str = "pid";

/// 只支持单个相等条件的过滤器
///
/// 语法为 `key=value` 或 `(key=value)`，键名忽略大小写；值为 `*` 时只要求属性存在。
/// 键名 `pid` 匹配配置的 PID。
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleConfigurationFilter;

impl SimpleConfigurationFilter {
    /// 创建过滤器
    pub fn new() -> Self {
        Self
    }

    fn parse(filter: &str) -> ConfigResult<(&str, &str)> {
        let invalid = |message: &str| ConfigError::InvalidFilter {
            filter: filter.to_string(),
            message: message.to_string(),
        };

        let mut expression = filter.trim();
        if let Some(inner) = expression.strip_prefix('(') {
            expression = inner
                .strip_suffix(')')
                .ok_or_else(|| invalid("括号不匹配"))?;
        }

        let (key, value) = expression
            .split_once('=')
            .ok_or_else(|| invalid("缺少 '='"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid("键名为空"));
        }
        if key.contains(['(', ')', '&', '|', '!']) {
            return Err(invalid("不支持复合表达式"));
        }
        Ok((key, value.trim()))
    }

    fn value_matches(actual: &Value, expected: &str) -> bool {
        match actual {
            Value::String(s) => s == expected,
            Value::Array(items) => items.iter().any(|item| Self::value_matches(item, expected)),
            Value::Null => false,
            other => other.to_string() == expected,
        }
    }
}

impl ConfigurationFilter for SimpleConfigurationFilter {
    fn matches(&self, filter: &str, pid: &str, properties: &Properties) -> ConfigResult<bool> {
        let (key, expected) = Self::parse(filter)?;

        if key.eq_ignore_ascii_case(PID_KEY) && !properties.contains_key(key) {
            return Ok(expected == "*" || pid == expected);
        }

        Ok(match properties.get(key) {
            None => false,
            Some(_) if expected == "*" => true,
            Some(actual) => Self::value_matches(actual, expected),
        })
    }
}
