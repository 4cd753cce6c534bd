//! 告警领域模型
//!
//! `Alert` / `AlertGroup` 在解码时构建，之后只读。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 告警状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertStatus {
    #[default]
    Unknown,
    /// 正在触发
    Firing,
    /// 已恢复
    Resolved,
}

/// 单条告警
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alert {
    /// 稳定指纹
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub starts_at: Option<DateTime<Utc>>,
    /// 触发中的告警没有结束时间
    pub ends_at: Option<DateTime<Utc>>,
    pub status: AlertStatus,
    /// 标识告警身份的标签
    pub labels: BTreeMap<String, String>,
    /// 描述性注解
    pub annotations: BTreeMap<String, String>,
    /// 告警来源链接
    #[serde(rename = "GeneratorURL")]
    pub generator_url: String,
}

impl Alert {
    /// 读取标签值，不存在时返回空字符串
    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }

    pub fn is_resolved(&self) -> bool {
        self.status == AlertStatus::Resolved
    }
}

/// 一批共享分组键的告警，保持上游到达顺序
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlertGroup {
    #[serde(rename = "ID")]
    pub id: String,
    /// 分组级标签
    pub labels: BTreeMap<String, String>,
    pub alerts: Vec<Alert>,
}

impl AlertGroup {
    /// 触发中的告警
    pub fn firing_alerts(&self) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| a.is_firing()).collect()
    }

    /// 已恢复的告警
    pub fn resolved_alerts(&self) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| a.is_resolved()).collect()
    }

    pub fn has_firing(&self) -> bool {
        self.alerts.iter().any(Alert::is_firing)
    }

    pub fn has_resolved(&self) -> bool {
        self.alerts.iter().any(Alert::is_resolved)
    }
}
