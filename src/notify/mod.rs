//! 通知后端与消息模板
//!
//! - `TemplateRenderer`：把告警组渲染成消息文本
//! - `TelegramNotifier`：通过 Telegram Bot API 发送
//! - `LoggerNotifier`：只打印渲染结果（dry-run）
//! - `NoopNotifier`：空实现

pub mod logger;
pub mod telegram;
pub mod template;

pub use logger::LoggerNotifier;
pub use telegram::{TelegramConfig, TelegramNotifier};
pub use template::{CustomTemplateRenderer, DefaultTemplateRenderer, TemplateRenderer};

use crate::error::Result;
use crate::forward::{Notification, Notifier};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 什么都不做的通知器
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _cancel: &CancellationToken,
        _notification: &Notification,
    ) -> Result<()> {
        Ok(())
    }

    fn notifier_type(&self) -> &str {
        "noop"
    }
}
