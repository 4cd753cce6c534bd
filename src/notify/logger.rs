//! 日志通知器 - 只打印渲染后的消息，用于开发和 dry-run

use super::template::TemplateRenderer;
use crate::error::Result;
use crate::forward::{Notification, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct LoggerNotifier {
    renderer: Arc<dyn TemplateRenderer>,
}

impl LoggerNotifier {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Notifier for LoggerNotifier {
    async fn notify(&self, _cancel: &CancellationToken, notification: &Notification) -> Result<()> {
        let text = self.renderer.render(&notification.alert_group)?;
        info!(
            notifier = "logger",
            alert_group_id = %notification.alert_group.id,
            alerts = notification.alert_group.alerts.len(),
            chat_id = %notification.chat_id,
            "alert: {}",
            text
        );
        Ok(())
    }

    fn notifier_type(&self) -> &str {
        "logger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::AlertGroup;
    use crate::notify::template::{CustomTemplateRenderer, DefaultTemplateRenderer};

    fn notification() -> Notification {
        Notification {
            chat_id: String::new(),
            alert_group: AlertGroup {
                id: "group".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_logger_notifier_renders() {
        let notifier = LoggerNotifier::new(Arc::new(DefaultTemplateRenderer));
        assert_eq!(notifier.notifier_type(), "logger");
        assert!(notifier
            .notify(&CancellationToken::new(), &notification())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_logger_notifier_propagates_render_errors() {
        let renderer = CustomTemplateRenderer::new("{{ Missing.Field }}").unwrap();
        let notifier = LoggerNotifier::new(Arc::new(renderer));

        let result = notifier
            .notify(&CancellationToken::new(), &notification())
            .await;
        assert!(matches!(result, Err(Error::RenderTemplate(_))));
    }
}
