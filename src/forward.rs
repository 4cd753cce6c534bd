//! 转发服务 - 按目标标签拆分告警组并分发到所有通知器
//!
//! 分发是尽力而为的：单个通知器失败只记录日志，不影响其他通知器，
//! 也不会让 `forward` 返回错误。

use crate::error::{Error, Result};
use crate::model::AlertGroup;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 默认的目标标签
pub const DEFAULT_CHAT_ID_LABEL: &str = "chat_id";

/// 单次转发请求的路由属性
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// 没有目标标签的告警发往这里；为空时使用通知器自己的默认目标
    pub custom_chat_id: String,
}

/// 交给通知器的投递单元
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// 为空表示使用通知器的默认目标
    pub chat_id: String,
    pub alert_group: AlertGroup,
}

/// 通知后端
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 投递一条通知。`cancel` 已取消时应跳过发送并返回成功
    async fn notify(&self, cancel: &CancellationToken, notification: &Notification) -> Result<()>;

    /// 稳定的类型标识（用于日志和指标）
    fn notifier_type(&self) -> &str;
}

/// 转发服务
#[async_trait]
pub trait ForwardService: Send + Sync {
    /// `alert_group` 为 `None` 时返回 `Error::InvalidAlertGroup`
    async fn forward(
        &self,
        cancel: &CancellationToken,
        props: &Properties,
        alert_group: Option<&AlertGroup>,
    ) -> Result<()>;
}

/// Forwarder 配置
#[derive(Clone)]
pub struct ForwarderConfig {
    /// 决定路由的告警标签
    pub alert_label_chat_id: String,
    /// 不能为空
    pub notifiers: Vec<Arc<dyn Notifier>>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            alert_label_chat_id: DEFAULT_CHAT_ID_LABEL.to_string(),
            notifiers: Vec::new(),
        }
    }
}

/// 默认的转发服务实现
pub struct Forwarder {
    alert_label_chat_id: String,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        if config.notifiers.is_empty() {
            return Err(Error::InvalidConfiguration(
                "notifiers can't be empty".to_string(),
            ));
        }

        let alert_label_chat_id = if config.alert_label_chat_id.is_empty() {
            DEFAULT_CHAT_ID_LABEL.to_string()
        } else {
            config.alert_label_chat_id
        };

        for notifier in &config.notifiers {
            info!(notifier = notifier.notifier_type(), "Registering notifier");
        }

        Ok(Self {
            alert_label_chat_id,
            notifiers: config.notifiers,
        })
    }

    /// 按目标标签拆分告警组，每个目标生成一条通知
    ///
    /// 同一目标内的告警保持原始相对顺序；目标之间的顺序不作保证。
    pub fn build_notifications(
        &self,
        props: &Properties,
        alert_group: &AlertGroup,
    ) -> Vec<Notification> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut partitions: Vec<(&str, AlertGroup)> = Vec::new();

        for alert in &alert_group.alerts {
            let destination = alert.label(&self.alert_label_chat_id);
            let slot = *index.entry(destination).or_insert_with(|| {
                let id = if destination.is_empty() {
                    alert_group.id.clone()
                } else {
                    format!("{}-{}", alert_group.id, destination)
                };
                partitions.push((
                    destination,
                    AlertGroup {
                        id,
                        labels: alert_group.labels.clone(),
                        alerts: Vec::new(),
                    },
                ));
                partitions.len() - 1
            });
            partitions[slot].1.alerts.push(alert.clone());
        }

        partitions
            .into_iter()
            .map(|(destination, group)| Notification {
                // 没有目标标签的分区回落到请求级别的 chat ID
                chat_id: if destination.is_empty() {
                    props.custom_chat_id.clone()
                } else {
                    destination.to_string()
                },
                alert_group: group,
            })
            .collect()
    }
}

#[async_trait]
impl ForwardService for Forwarder {
    async fn forward(
        &self,
        cancel: &CancellationToken,
        props: &Properties,
        alert_group: Option<&AlertGroup>,
    ) -> Result<()> {
        let alert_group = alert_group.ok_or_else(|| {
            Error::InvalidAlertGroup("alert group can't be empty".to_string())
        })?;

        let notifications = self.build_notifications(props, alert_group);
        debug!(
            alert_group_id = %alert_group.id,
            alerts = alert_group.alerts.len(),
            notifications = notifications.len(),
            "Forwarding alert group"
        );

        for notifier in &self.notifiers {
            for notification in &notifications {
                notify_logged(notifier.as_ref(), cancel, notification).await;
            }
        }

        Ok(())
    }
}

/// 调用单个通知器，失败时只记录日志
pub(crate) async fn notify_logged(
    notifier: &dyn Notifier,
    cancel: &CancellationToken,
    notification: &Notification,
) {
    if let Err(e) = notifier.notify(cancel, notification).await {
        error!(
            notifier = notifier.notifier_type(),
            alert_group_id = %notification.alert_group.id,
            chat_id = %notification.chat_id,
            error = %e,
            "Could not notify alert group"
        );
    }
}
