//! 指标记录
//!
//! `Measured<T>` 是一个透明的装饰器：包装转发服务、通知器、看门狗或模板渲染器，
//! 在每次调用前后记录耗时和成功与否，不改变输入、输出和错误。

use crate::deadmansswitch::DeadMansSwitch;
use crate::error::Result;
use crate::forward::{ForwardService, Notification, Notifier, Properties};
use crate::model::AlertGroup;
use crate::notify::TemplateRenderer;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const COMPONENT_FORWARD: &str = "forward";
pub const COMPONENT_NOTIFIER: &str = "notifier";
pub const COMPONENT_DEAD_MANS_SWITCH: &str = "deadmansswitch";
pub const COMPONENT_TEMPLATE_RENDERER: &str = "template_renderer";
pub const COMPONENT_HTTP: &str = "http";

/// 一次操作的观测值
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<'a> {
    pub component: &'a str,
    /// 实现类型，例如通知器的 `notifier_type()`；没有时为空
    pub kind: &'a str,
    pub operation: &'a str,
    pub success: bool,
    pub duration: Duration,
}

/// 指标接收端
pub trait MetricsRecorder: Send + Sync {
    fn observe(&self, observation: &Observation<'_>);
}

/// 丢弃所有观测值
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn observe(&self, _observation: &Observation<'_>) {}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SeriesKey {
    component: String,
    kind: String,
    operation: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct SeriesStats {
    count: u64,
    errors: u64,
    total: Duration,
    max: Duration,
}

/// 单个序列的聚合快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub component: String,
    pub kind: String,
    pub operation: String,
    pub count: u64,
    pub errors: u64,
    pub total_seconds: f64,
    pub max_seconds: f64,
}

/// 在内存中按 (component, kind, operation) 聚合
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    series: Mutex<BTreeMap<SeriesKey, SeriesStats>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前所有序列，按 key 排序
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        series
            .iter()
            .map(|(key, stats)| SeriesSnapshot {
                component: key.component.clone(),
                kind: key.kind.clone(),
                operation: key.operation.clone(),
                count: stats.count,
                errors: stats.errors,
                total_seconds: stats.total.as_secs_f64(),
                max_seconds: stats.max.as_secs_f64(),
            })
            .collect()
    }
}

impl MetricsRecorder for InMemoryRecorder {
    fn observe(&self, observation: &Observation<'_>) {
        let key = SeriesKey {
            component: observation.component.to_string(),
            kind: observation.kind.to_string(),
            operation: observation.operation.to_string(),
        };
        let mut series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        let stats = series.entry(key).or_default();
        stats.count += 1;
        if !observation.success {
            stats.errors += 1;
        }
        stats.total += observation.duration;
        stats.max = stats.max.max(observation.duration);
    }
}

/// 计时装饰器
pub struct Measured<T: ?Sized> {
    inner: Arc<T>,
    recorder: Arc<dyn MetricsRecorder>,
    component: &'static str,
    kind: String,
}

impl<T: ?Sized> Measured<T> {
    fn wrap(
        component: &'static str,
        kind: impl Into<String>,
        recorder: Arc<dyn MetricsRecorder>,
        inner: Arc<T>,
    ) -> Self {
        Self {
            inner,
            recorder,
            component,
            kind: kind.into(),
        }
    }

    fn record(&self, operation: &str, success: bool, started: Instant) {
        self.recorder.observe(&Observation {
            component: self.component,
            kind: &self.kind,
            operation,
            success,
            duration: started.elapsed(),
        });
    }

    async fn measure<R, F>(&self, operation: &str, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.record(operation, result.is_ok(), started);
        result
    }
}

impl<T: ForwardService + ?Sized> Measured<T> {
    pub fn forward_service(recorder: Arc<dyn MetricsRecorder>, inner: Arc<T>) -> Self {
        Self::wrap(COMPONENT_FORWARD, "", recorder, inner)
    }
}

impl<T: Notifier + ?Sized> Measured<T> {
    /// kind 取自被包装通知器的类型
    pub fn notifier(recorder: Arc<dyn MetricsRecorder>, inner: Arc<T>) -> Self {
        let kind = inner.notifier_type().to_string();
        Self::wrap(COMPONENT_NOTIFIER, kind, recorder, inner)
    }
}

impl<T: DeadMansSwitch + ?Sized> Measured<T> {
    pub fn dead_mans_switch(recorder: Arc<dyn MetricsRecorder>, inner: Arc<T>) -> Self {
        Self::wrap(COMPONENT_DEAD_MANS_SWITCH, "", recorder, inner)
    }
}

impl<T: TemplateRenderer + ?Sized> Measured<T> {
    pub fn template_renderer(
        renderer_kind: &str,
        recorder: Arc<dyn MetricsRecorder>,
        inner: Arc<T>,
    ) -> Self {
        Self::wrap(COMPONENT_TEMPLATE_RENDERER, renderer_kind, recorder, inner)
    }
}

#[async_trait]
impl<T: ForwardService + ?Sized> ForwardService for Measured<T> {
    async fn forward(
        &self,
        cancel: &CancellationToken,
        props: &Properties,
        alert_group: Option<&AlertGroup>,
    ) -> Result<()> {
        self.measure("forward", self.inner.forward(cancel, props, alert_group))
            .await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Measured<T> {
    async fn notify(&self, cancel: &CancellationToken, notification: &Notification) -> Result<()> {
        self.measure("notify", self.inner.notify(cancel, notification))
            .await
    }

    fn notifier_type(&self) -> &str {
        self.inner.notifier_type()
    }
}

#[async_trait]
impl<T: DeadMansSwitch + ?Sized> DeadMansSwitch for Measured<T> {
    async fn push_switch(&self, alert_group: Option<&AlertGroup>) -> Result<()> {
        self.measure("push_switch", self.inner.push_switch(alert_group))
            .await
    }
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for Measured<T> {
    fn render(&self, alert_group: &AlertGroup) -> Result<String> {
        let started = Instant::now();
        let result = self.inner.render(alert_group);
        self.record("render", result.is_ok(), started);
        result
    }
}
