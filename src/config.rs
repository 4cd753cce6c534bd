//! 命令行与环境变量配置
//!
//! 每个参数都可以通过 `ALERTGRAM_*` 环境变量设置。

use crate::error::{Error, Result};
use crate::forward::DEFAULT_CHAT_ID_LABEL;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "alertgram")]
#[command(about = "Alertgram - 把 Alertmanager 告警转发到 Telegram")]
#[command(version)]
pub struct AppConfig {
    /// webhook 服务监听地址
    #[arg(
        long = "alertmanager.listen-address",
        env = "ALERTGRAM_ALERTMANAGER_LISTEN_ADDRESS",
        default_value = "0.0.0.0:8080"
    )]
    pub listen_address: String,

    /// 接收 Alertmanager webhook 的路径
    #[arg(
        long = "alertmanager.webhook-path",
        env = "ALERTGRAM_ALERTMANAGER_WEBHOOK_PATH",
        default_value = "/alerts"
    )]
    pub webhook_path: String,

    /// 覆盖默认 chat 的 query 参数名
    #[arg(
        long = "alertmanager.chat-id-query-string",
        env = "ALERTGRAM_ALERTMANAGER_CHAT_ID_QUERY_STRING",
        default_value = "chat-id"
    )]
    pub chat_id_query_string: String,

    /// dead man's switch 路径
    #[arg(
        long = "alertmanager.dead-mans-switch-path",
        env = "ALERTGRAM_ALERTMANAGER_DEAD_MANS_SWITCH_PATH",
        default_value = "/alerts/dms"
    )]
    pub dead_mans_switch_path: String,

    /// Telegram bot token
    #[arg(
        long = "telegram.api-token",
        env = "ALERTGRAM_TELEGRAM_API_TOKEN",
        default_value = "",
        hide_env_values = true
    )]
    pub telegram_api_token: String,

    /// 默认 Telegram chat ID
    #[arg(
        long = "telegram.chat-id",
        env = "ALERTGRAM_TELEGRAM_CHAT_ID",
        default_value_t = 0,
        allow_hyphen_values = true
    )]
    pub telegram_chat_id: i64,

    /// 指标服务监听地址
    #[arg(
        long = "metrics.listen-address",
        env = "ALERTGRAM_METRICS_LISTEN_ADDRESS",
        default_value = "0.0.0.0:8081"
    )]
    pub metrics_listen_address: String,

    #[arg(long = "metrics.path", env = "ALERTGRAM_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    #[arg(
        long = "metrics.health-path",
        env = "ALERTGRAM_METRICS_HEALTH_PATH",
        default_value = "/status"
    )]
    pub health_path: String,

    /// 启用 dead man's switch
    #[arg(long = "dead-mans-switch.enable", env = "ALERTGRAM_DEAD_MANS_SWITCH_ENABLE")]
    pub dead_mans_switch_enable: bool,

    /// 多久没收到看门狗告警就激活，例如 `15m`、`1h30m`
    #[arg(
        long = "dead-mans-switch.interval",
        env = "ALERTGRAM_DEAD_MANS_SWITCH_INTERVAL",
        default_value = "15m",
        value_parser = parse_duration
    )]
    pub dead_mans_switch_interval: Duration,

    /// 激活通知发往的 chat，为空时使用默认 chat
    #[arg(
        long = "dead-mans-switch.chat-id",
        env = "ALERTGRAM_DEAD_MANS_SWITCH_CHAT_ID",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub dead_mans_switch_chat_id: String,

    /// 不发送到 Telegram，只打印消息
    #[arg(long = "notify.dry-run", env = "ALERTGRAM_NOTIFY_DRY_RUN")]
    pub notify_dry_run: bool,

    /// 自定义消息模板文件
    #[arg(long = "notify.template-path", env = "ALERTGRAM_NOTIFY_TEMPLATE_PATH")]
    pub notify_template_path: Option<PathBuf>,

    /// 决定告警目标 chat 的标签
    #[arg(
        long = "alert.label-chat-id",
        env = "ALERTGRAM_ALERT_LABEL_CHAT_ID",
        default_value = DEFAULT_CHAT_ID_LABEL
    )]
    pub alert_label_chat_id: String,

    /// 输出调试日志
    #[arg(long, env = "ALERTGRAM_DEBUG")]
    pub debug: bool,
}

impl AppConfig {
    /// 检查参数之间的约束
    pub fn validate(&self) -> Result<()> {
        if !self.notify_dry_run {
            if self.telegram_api_token.is_empty() {
                return Err(Error::InvalidConfiguration(
                    "telegram api token is required".to_string(),
                ));
            }
            if self.telegram_chat_id == 0 {
                return Err(Error::InvalidConfiguration(
                    "telegram chat ID is required".to_string(),
                ));
            }
        }

        if self.dead_mans_switch_enable && self.dead_mans_switch_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "dead man's switch interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// 解析 `500ms`、`30s`、`15m`、`1h30m` 这类时长
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let input = s.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if digits == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|e| format!("invalid duration {:?}: {}", input, e))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let secs_per_unit = match unit {
            "ms" => {
                total = total
                    .checked_add(Duration::from_millis(value))
                    .ok_or_else(|| format!("duration {:?} is too large", input))?;
                continue;
            }
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        let secs = value
            .checked_mul(secs_per_unit)
            .ok_or_else(|| format!("duration {:?} is too large", input))?;
        total = total
            .checked_add(Duration::from_secs(secs))
            .ok_or_else(|| format!("duration {:?} is too large", input))?;
    }

    Ok(total)
}
