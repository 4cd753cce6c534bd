//! Telegram 通知器 - 通过 Bot API 的 sendMessage 发送告警
//!
//! 通知的 chat ID 为空时发往配置的默认 chat。消息使用 HTML parse mode。

use super::template::TemplateRenderer;
use crate::error::{Error, Result};
use crate::forward::{Notification, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Telegram Bot API 基础 URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram 通知器配置
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub api_token: String,
    /// 默认 chat（群组/频道）ID，例如 `-1001234567891`
    pub default_chat_id: i64,
    /// API 基础 URL（测试时指向 mock 服务）
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            default_chat_id: 0,
            base_url: TELEGRAM_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// sendMessage 请求体
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Bot API 响应
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
    renderer: Arc<dyn TemplateRenderer>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, renderer: Arc<dyn TemplateRenderer>) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(Error::InvalidConfiguration(
                "telegram api token is required".to_string(),
            ));
        }
        if config.default_chat_id == 0 {
            return Err(Error::InvalidConfiguration(
                "telegram default chat ID is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::InvalidConfiguration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            renderer,
        })
    }

    fn chat_id_for(&self, notification: &Notification) -> String {
        if notification.chat_id.is_empty() {
            self.config.default_chat_id.to_string()
        } else {
            notification.chat_id.clone()
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_token
        )
    }
}

fn comm_error(message: impl Into<String>) -> Error {
    Error::Communication {
        backend: "telegram",
        message: message.into(),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, cancel: &CancellationToken, notification: &Notification) -> Result<()> {
        let alert_group_id = &notification.alert_group.id;
        if cancel.is_cancelled() {
            info!(
                alert_group_id = %alert_group_id,
                "Context cancelled, not notifying alerts"
            );
            return Ok(());
        }

        let text = self.renderer.render(&notification.alert_group)?;
        let chat_id = self.chat_id_for(notification);
        let request = SendMessageRequest {
            chat_id: &chat_id,
            text: &text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // URL 里带有 token，错误信息中去掉
        let response = self
            .client
            .post(self.send_message_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| comm_error(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| {
                comm_error(format!("invalid response ({}): {}", status, e.without_url()))
            })?;

        if !status.is_success() || !body.ok {
            return Err(comm_error(
                body.description
                    .unwrap_or_else(|| format!("unexpected status {}", status)),
            ));
        }

        debug!(
            alert_group_id = %alert_group_id,
            chat_id = %chat_id,
            alerts = notification.alert_group.alerts.len(),
            "Telegram message sent"
        );
        Ok(())
    }

    fn notifier_type(&self) -> &str {
        "telegram"
    }
}
