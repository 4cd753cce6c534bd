//! HTTP 接入层
//!
//! - `alertmanager`：Alertmanager webhook 与 dead man's switch 端点
//! - `metrics`：指标快照与健康检查
//!
//! 两个服务器都可以通过 `with_request_metrics` 记录每个请求的耗时和状态。

pub mod alertmanager;
pub mod metrics;

use crate::metrics::{MetricsRecorder, Observation, COMPONENT_HTTP};
use anyhow::{Context, Result};
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 关闭后等待在途请求完成的最长时间
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub const SERVICE_ALERTMANAGER_API: &str = "alertmanager-api";
pub const SERVICE_METRICS: &str = "metrics";

/// 没有匹配到任何路由的请求
pub const UNMATCHED_PATH: &str = "unmatched";

#[derive(Clone)]
struct RequestMetrics {
    service: &'static str,
    recorder: Arc<dyn MetricsRecorder>,
}

/// 给 `router` 加上请求指标，operation 为匹配到的路由模板，5xx 记为失败
pub fn with_request_metrics(
    router: Router,
    service: &'static str,
    recorder: Arc<dyn MetricsRecorder>,
) -> Router {
    router.layer(middleware::from_fn_with_state(
        RequestMetrics { service, recorder },
        record_request,
    ))
}

async fn record_request(
    State(metrics): State<RequestMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.recorder.observe(&Observation {
        component: COMPONENT_HTTP,
        kind: metrics.service,
        operation: &path,
        success: !response.status().is_server_error(),
        duration: started.elapsed(),
    });

    response
}

/// 在 `listen_address` 上运行 `router`，直到 `shutdown` 被取消
pub async fn serve(
    name: &'static str,
    listen_address: &str,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("failed to bind {} server to {}", name, listen_address))?;
    info!(server = name, addr = %listen_address, "HTTP server listening");

    let signal = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.with_context(|| format!("{} server failed", name))?;
        }
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(DRAIN_TIMEOUT).await;
        } => {
            warn!(server = name, "Drain timeout exceeded, dropping in-flight requests");
        }
    }

    info!(server = name, "HTTP server stopped");
    Ok(())
}
