//! Alertgram - 把 Prometheus Alertmanager 告警转发到 Telegram

pub mod app;
pub mod config;
pub mod deadmansswitch;
pub mod error;
pub mod forward;
pub mod http;
pub mod metrics;
pub mod model;
pub mod notify;

#[cfg(test)]
mod test_helpers;

pub use config::AppConfig;
pub use deadmansswitch::{
    DeadMansSwitch, DeadMansSwitchConfig, DeadMansSwitchService, DisabledDeadMansSwitch,
};
pub use error::{Error, Result};
pub use forward::{ForwardService, Forwarder, ForwarderConfig, Notification, Notifier, Properties};
pub use metrics::{InMemoryRecorder, Measured, MetricsRecorder, NoopRecorder};
pub use model::{Alert, AlertGroup, AlertStatus};
pub use notify::{
    CustomTemplateRenderer, DefaultTemplateRenderer, LoggerNotifier, NoopNotifier, TelegramConfig,
    TelegramNotifier, TemplateRenderer,
};
