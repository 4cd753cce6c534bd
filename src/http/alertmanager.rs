//! Alertmanager webhook 接入
//!
//! 只支持 v4 格式的 webhook 消息：
//! <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>

use crate::deadmansswitch::{DeadMansSwitch, DisabledDeadMansSwitch};
use crate::error::Error;
use crate::forward::{ForwardService, Properties};
use crate::model::{Alert, AlertGroup, AlertStatus};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const DEFAULT_WEBHOOK_PATH: &str = "/alerts";
pub const DEFAULT_CHAT_ID_QUERY_STRING: &str = "chat-id";
pub const DEFAULT_DEAD_MANS_SWITCH_PATH: &str = "/alerts/dms";

const SUPPORTED_VERSION: &str = "4";
const ALERT_NAME_LABEL: &str = "alertname";

/// v4 webhook 消息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookMessage {
    pub version: String,
    pub group_key: String,
    pub truncated_alerts: u64,
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<WebhookAlert>,
    pub group_labels: BTreeMap<String, String>,
    pub common_labels: BTreeMap<String, String>,
    pub common_annotations: BTreeMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
}

/// webhook 中的单条告警
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookAlert {
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

impl WebhookMessage {
    /// 解析请求体
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// 转换为领域模型，只接受 v4
    pub fn to_domain(&self) -> Result<AlertGroup, Error> {
        if self.version != SUPPORTED_VERSION {
            return Err(Error::Decode(format!(
                "not supported alert group version {:?}",
                self.version
            )));
        }

        let alerts = self
            .alerts
            .iter()
            .map(|a| Alert {
                id: a.fingerprint.clone(),
                name: a.labels.get(ALERT_NAME_LABEL).cloned().unwrap_or_default(),
                starts_at: non_zero_time(a.starts_at),
                ends_at: non_zero_time(a.ends_at),
                status: status_to_domain(&a.status),
                labels: a.labels.clone(),
                annotations: a.annotations.clone(),
                generator_url: a.generator_url.clone(),
            })
            .collect();

        Ok(AlertGroup {
            id: self.group_key.clone(),
            labels: self.group_labels.clone(),
            alerts,
        })
    }
}

fn status_to_domain(status: &str) -> AlertStatus {
    match status {
        "firing" => AlertStatus::Firing,
        "resolved" => AlertStatus::Resolved,
        _ => AlertStatus::Unknown,
    }
}

/// Alertmanager 用 `0001-01-01T00:00:00Z` 表示未设置
fn non_zero_time(t: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    t.filter(|t| t.year() > 1)
}

/// 路由配置
#[derive(Clone)]
pub struct WebhookConfig {
    pub webhook_path: String,
    pub chat_id_query_string: String,
    pub dead_mans_switch_path: String,
    pub forwarder: Arc<dyn ForwardService>,
    pub dead_mans_switch: Arc<dyn DeadMansSwitch>,
    /// 为 false 时不注册 dead man's switch 路由
    pub dead_mans_switch_enabled: bool,
    /// 进程级关闭信号，每个请求派生一个子令牌
    pub shutdown: CancellationToken,
}

impl WebhookConfig {
    pub fn new(forwarder: Arc<dyn ForwardService>, shutdown: CancellationToken) -> Self {
        Self {
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            chat_id_query_string: DEFAULT_CHAT_ID_QUERY_STRING.to_string(),
            dead_mans_switch_path: DEFAULT_DEAD_MANS_SWITCH_PATH.to_string(),
            forwarder,
            dead_mans_switch: Arc::new(DisabledDeadMansSwitch),
            dead_mans_switch_enabled: false,
            shutdown,
        }
    }
}

#[derive(Clone)]
struct WebhookState {
    forwarder: Arc<dyn ForwardService>,
    dead_mans_switch: Arc<dyn DeadMansSwitch>,
    chat_id_query_string: Arc<str>,
    shutdown: CancellationToken,
}

/// 构建 webhook 路由
pub fn router(config: WebhookConfig) -> Router {
    let mut router = Router::new().route(&config.webhook_path, post(handle_alerts));
    if config.dead_mans_switch_enabled {
        router = router.route(&config.dead_mans_switch_path, post(handle_dead_mans_switch));
    }

    router.with_state(WebhookState {
        forwarder: config.forwarder,
        dead_mans_switch: config.dead_mans_switch,
        chat_id_query_string: config.chat_id_query_string.into(),
        shutdown: config.shutdown,
    })
}

/// 错误响应
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn from_error(err: &Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

fn decode(body: &[u8]) -> Result<AlertGroup, ApiError> {
    WebhookMessage::from_slice(body)
        .and_then(|msg| msg.to_domain())
        .map_err(|e| {
            error!(error = %e, "Could not decode alertmanager webhook");
            ApiError::from_error(&e)
        })
}

async fn handle_alerts(
    State(state): State<WebhookState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let alert_group = decode(&body)?;
    let props = Properties {
        custom_chat_id: query
            .get(state.chat_id_query_string.as_ref())
            .cloned()
            .unwrap_or_default(),
    };
    debug!(
        alert_group_id = %alert_group.id,
        alerts = alert_group.alerts.len(),
        custom_chat_id = %props.custom_chat_id,
        "Received alert group"
    );

    let cancel = state.shutdown.child_token();
    state
        .forwarder
        .forward(&cancel, &props, Some(&alert_group))
        .await
        .map_err(|e| {
            error!(alert_group_id = %alert_group.id, error = %e, "Error forwarding alert group");
            ApiError::from_error(&e)
        })?;

    Ok(StatusCode::OK)
}

async fn handle_dead_mans_switch(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let alert_group = decode(&body)?;
    state
        .dead_mans_switch
        .push_switch(Some(&alert_group))
        .await
        .map_err(|e| {
            error!(error = %e, "Error pushing dead man's switch");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            }
        })?;

    Ok(StatusCode::OK)
}
