//! 模块（bundle）信息与生命周期事件

use serde_json::{Map, Value};
use std::fmt;

/// 模块 ID
pub type BundleId = u64;

/// 模块状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    /// 已安装，未启动
    Installed,
    /// 已启动
    Active,
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleState::Installed => write!(f, "Installed"),
            BundleState::Active => write!(f, "Active"),
        }
    }
}

/// 模块信息
#[derive(Debug, Clone, PartialEq)]
pub struct BundleInfo {
    /// 模块 ID
    pub id: BundleId,
    /// 模块符号名
    pub symbolic_name: String,
    /// 模块清单头
    pub headers: Map<String, Value>,
}

impl BundleInfo {
    /// 创建模块信息
    pub fn new(id: BundleId, symbolic_name: impl Into<String>, headers: Map<String, Value>) -> Self {
        Self {
            id,
            symbolic_name: symbolic_name.into(),
            headers,
        }
    }

    /// 获取清单头
    pub fn header(&self, key: &str) -> Option<&Value> {
        self.headers.get(key)
    }
}

/// 模块生命周期事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleEventKind {
    /// 模块已启动
    Started,
    /// 模块即将停止
    Stopping,
}

/// 模块生命周期事件
#[derive(Debug, Clone)]
pub struct BundleEvent {
    /// 事件类型
    pub kind: BundleEventKind,
    /// 发生事件的模块
    pub bundle: BundleInfo,
}
