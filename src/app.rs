//! 组装服务并运行 HTTP 服务器

use crate::config::AppConfig;
use crate::deadmansswitch::{
    DeadMansSwitch, DeadMansSwitchConfig, DeadMansSwitchService, DisabledDeadMansSwitch,
};
use crate::forward::{ForwardService, Forwarder, ForwarderConfig, Notifier};
use crate::http::{self, alertmanager::WebhookConfig};
use crate::metrics::{InMemoryRecorder, Measured, MetricsRecorder};
use crate::notify::{
    CustomTemplateRenderer, DefaultTemplateRenderer, LoggerNotifier, TelegramConfig,
    TelegramNotifier, TemplateRenderer,
};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 组装好的核心服务
pub struct Services {
    pub forwarder: Arc<dyn ForwardService>,
    /// 未启用时为 `DisabledDeadMansSwitch`
    pub dead_mans_switch: Arc<dyn DeadMansSwitch>,
    pub dead_mans_switch_enabled: bool,
    pub recorder: Arc<InMemoryRecorder>,
}

fn build_renderer(
    config: &AppConfig,
    recorder: Arc<dyn MetricsRecorder>,
) -> Result<Arc<dyn TemplateRenderer>> {
    let Some(path) = config.notify_template_path.as_ref() else {
        return Ok(Arc::new(Measured::template_renderer(
            "default",
            recorder,
            Arc::new(DefaultTemplateRenderer),
        )));
    };

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    let renderer = CustomTemplateRenderer::new(source)
        .with_context(|| format!("invalid template {}", path.display()))?;
    info!(path = %path.display(), "Using custom alert template");

    Ok(Arc::new(Measured::template_renderer(
        "custom",
        recorder,
        Arc::new(renderer),
    )))
}

fn build_notifier(
    config: &AppConfig,
    renderer: Arc<dyn TemplateRenderer>,
    recorder: Arc<dyn MetricsRecorder>,
) -> Result<Arc<dyn Notifier>> {
    if config.notify_dry_run {
        info!("Dry run enabled, alerts will only be logged");
        let notifier = Arc::new(LoggerNotifier::new(renderer));
        return Ok(Arc::new(Measured::notifier(recorder, notifier)));
    }

    let notifier = TelegramNotifier::new(
        TelegramConfig {
            api_token: config.telegram_api_token.clone(),
            default_chat_id: config.telegram_chat_id,
            ..Default::default()
        },
        renderer,
    )?;
    Ok(Arc::new(Measured::notifier(recorder, Arc::new(notifier))))
}

/// 创建转发服务与看门狗，必须在 tokio 运行时内调用
///
/// 看门狗任务绑定在 `lifetime` 上。
pub fn build_services(config: &AppConfig, lifetime: &CancellationToken) -> Result<Services> {
    let recorder = Arc::new(InMemoryRecorder::new());
    let sink: Arc<dyn MetricsRecorder> = recorder.clone();

    let renderer = build_renderer(config, sink.clone())?;
    let notifier = build_notifier(config, renderer, sink.clone())?;

    let forwarder = Forwarder::new(ForwarderConfig {
        alert_label_chat_id: config.alert_label_chat_id.clone(),
        notifiers: vec![notifier.clone()],
    })?;
    let forwarder: Arc<dyn ForwardService> =
        Arc::new(Measured::forward_service(sink.clone(), Arc::new(forwarder)));

    let dead_mans_switch: Arc<dyn DeadMansSwitch> = if config.dead_mans_switch_enable {
        let service = DeadMansSwitchService::new(
            lifetime.clone(),
            DeadMansSwitchConfig {
                interval: config.dead_mans_switch_interval,
                custom_chat_id: config.dead_mans_switch_chat_id.clone(),
                notifiers: vec![notifier],
            },
        )?;
        info!(
            interval = ?config.dead_mans_switch_interval,
            "Dead man's switch enabled"
        );
        Arc::new(Measured::dead_mans_switch(sink, Arc::new(service)))
    } else {
        Arc::new(DisabledDeadMansSwitch)
    };

    Ok(Services {
        forwarder,
        dead_mans_switch,
        dead_mans_switch_enabled: config.dead_mans_switch_enable,
        recorder,
    })
}

/// Alertmanager 路由
pub fn webhook_router(
    config: &AppConfig,
    services: &Services,
    shutdown: CancellationToken,
) -> Router {
    let router = http::alertmanager::router(WebhookConfig {
        webhook_path: config.webhook_path.clone(),
        chat_id_query_string: config.chat_id_query_string.clone(),
        dead_mans_switch_path: config.dead_mans_switch_path.clone(),
        forwarder: services.forwarder.clone(),
        dead_mans_switch: services.dead_mans_switch.clone(),
        dead_mans_switch_enabled: services.dead_mans_switch_enabled,
        shutdown,
    });
    http::with_request_metrics(
        router,
        http::SERVICE_ALERTMANAGER_API,
        services.recorder.clone(),
    )
}

/// 指标与健康检查路由
pub fn metrics_router(config: &AppConfig, services: &Services) -> Router {
    let router = http::metrics::router(
        &config.metrics_path,
        &config.health_path,
        services.recorder.clone(),
    );
    http::with_request_metrics(router, http::SERVICE_METRICS, services.recorder.clone())
}

/// 运行到 `shutdown` 被取消或任一服务器出错
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    config.validate()?;
    let services = build_services(&config, &shutdown)?;

    let webhook = webhook_router(&config, &services, shutdown.clone());
    let metrics = metrics_router(&config, &services);

    let result = tokio::try_join!(
        http::serve("alertmanager", &config.listen_address, webhook, shutdown.clone()),
        http::serve("metrics", &config.metrics_listen_address, metrics, shutdown.clone()),
    );

    // 一个服务器失败时让其他组件一起退出
    shutdown.cancel();
    result.map(|_| ())
}
