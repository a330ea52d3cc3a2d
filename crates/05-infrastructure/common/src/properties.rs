//! 配置属性映射
//!
//! 属性键大小写不敏感，属性值为动态类型的 [`serde_json::Value`]。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 大小写不敏感的属性键
///
/// 保留首次插入时的原始写法，比较与哈希时忽略 ASCII 大小写。
#[derive(Debug, Clone)]
pub struct PropertyKey(String);

impl PropertyKey {
    /// 创建新的属性键
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 获取原始键名
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 配置属性集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: HashMap<PropertyKey, Value>,
}

impl Properties {
    /// 创建空属性集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式插入属性
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// 插入属性，键已存在（忽略大小写）时保留原键名并返回旧值
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(PropertyKey::new(key), value.into())
    }

    /// 获取属性值
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&PropertyKey::new(key))
    }

    /// 获取字符串属性值
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// 按复合键获取属性值
    ///
    /// 先按完整键查找；找不到时把 `a.b.c` 拆分为逐级查找，
    /// 对象按键名、数组按下标下钻。
    pub fn get_compound(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.get(key) {
            return Some(value);
        }

        let mut parts = key.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// 移除属性
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(&PropertyKey::new(key))
    }

    /// 是否包含属性
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&PropertyKey::new(key))
    }

    /// 属性数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 遍历属性
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 从 JSON 对象构建属性集合
    pub fn from_json_object(map: &Map<String, Value>) -> Self {
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// 转换为 JSON 对象（按键名排序，便于日志输出）
    pub fn to_json(&self) -> Value {
        let mut keys: Vec<&PropertyKey> = self.entries.keys().collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let map = keys
            .into_iter()
            .map(|k| (k.as_str().to_string(), self.entries[k].clone()))
            .collect::<Map<String, Value>>();
        Value::Object(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_object(&map))
    }
}
