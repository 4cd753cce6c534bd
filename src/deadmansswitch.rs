//! Dead man's switch 看门狗
//!
//! 在固定间隔内如果没有收到任何告警（`push_switch`），就认为上游监控链路已经
//! 失效，向所有通知器发送一条合成的 critical 告警。
//!
//! 看门狗是一个后台任务，只通过容量为 1 的信号通道和取消令牌与外界交互。
//! 生命周期令牌取消后任务永久停止，不能重新启动。

use crate::error::{Error, Result};
use crate::forward::{notify_logged, Notification, Notifier};
use crate::model::{Alert, AlertGroup, AlertStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 合成告警的固定身份
pub const ACTIVATION_ALERT_NAME: &str = "DeadMansSwitchActive";

const ACTIVATION_MESSAGE: &str = "The Dead man's switch has been activated! \
This usually means that your monitoring/alerting system is not working";

/// Dead man's switch
#[async_trait]
pub trait DeadMansSwitch: Send + Sync {
    /// 重置计时器。`None` 视为没有信号，直接返回
    async fn push_switch(&self, alert_group: Option<&AlertGroup>) -> Result<()>;
}

/// 看门狗配置
#[derive(Clone)]
pub struct DeadMansSwitchConfig {
    pub interval: Duration,
    /// 激活通知发往的 chat，为空时使用通知器默认目标
    pub custom_chat_id: String,
    pub notifiers: Vec<Arc<dyn Notifier>>,
}

/// 运行中的看门狗句柄
pub struct DeadMansSwitchService {
    switch_tx: mpsc::Sender<()>,
    lifetime: CancellationToken,
}

impl DeadMansSwitchService {
    /// 启动看门狗，必须在 tokio 运行时内调用
    ///
    /// 任务与 `lifetime` 绑定：令牌取消后进入终止状态。
    pub fn new(lifetime: CancellationToken, config: DeadMansSwitchConfig) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "dead man's switch interval must be greater than zero".to_string(),
            ));
        }

        let (switch_tx, switch_rx) = mpsc::channel(1);
        let watchdog = Watchdog {
            interval: config.interval,
            custom_chat_id: config.custom_chat_id,
            notifiers: config.notifiers,
            lifetime: lifetime.clone(),
            switch_rx,
        };
        tokio::spawn(watchdog.run());

        Ok(Self { switch_tx, lifetime })
    }
}

#[async_trait]
impl DeadMansSwitch for DeadMansSwitchService {
    async fn push_switch(&self, alert_group: Option<&AlertGroup>) -> Result<()> {
        if alert_group.is_none() {
            return Ok(());
        }

        // 生命周期结束后的 push 是无操作
        tokio::select! {
            biased;

            _ = self.lifetime.cancelled() => {
                debug!("Dead man's switch already stopped, ignoring push");
            }

            sent = self.switch_tx.send(()) => {
                if sent.is_err() {
                    debug!("Dead man's switch receiver gone, ignoring push");
                }
            }
        }

        Ok(())
    }
}

/// 后台任务状态，只属于看门狗任务本身
struct Watchdog {
    interval: Duration,
    custom_chat_id: String,
    notifiers: Vec<Arc<dyn Notifier>>,
    lifetime: CancellationToken,
    switch_rx: mpsc::Receiver<()>,
}

impl Watchdog {
    async fn run(mut self) {
        info!(interval = ?self.interval, "Dead man's switch started");

        loop {
            tokio::select! {
                biased;

                _ = self.lifetime.cancelled() => {
                    info!("Lifetime done, stopping dead man's switch");
                    break;
                }

                Some(()) = self.switch_rx.recv() => {
                    debug!("Dead man's switch pushed, interval restarted");
                }

                _ = tokio::time::sleep(self.interval) => {
                    warn!(
                        interval = ?self.interval,
                        "No switch pushed during interval, dead man's switch activated"
                    );
                    self.activate().await;
                }
            }
        }
    }

    async fn activate(&self) {
        let notification = Notification {
            chat_id: self.custom_chat_id.clone(),
            alert_group: activation_alert_group(),
        };

        for notifier in &self.notifiers {
            notify_logged(notifier.as_ref(), &self.lifetime, &notification).await;
        }
    }
}

/// 构建激活时发送的合成告警组
pub fn activation_alert_group() -> AlertGroup {
    let labels = BTreeMap::from([
        ("alertname".to_string(), ACTIVATION_ALERT_NAME.to_string()),
        ("severity".to_string(), "critical".to_string()),
        ("origin".to_string(), "alertgram".to_string()),
    ]);
    let annotations = BTreeMap::from([("message".to_string(), ACTIVATION_MESSAGE.to_string())]);

    AlertGroup {
        id: ACTIVATION_ALERT_NAME.to_string(),
        labels: BTreeMap::new(),
        alerts: vec![Alert {
            id: ACTIVATION_ALERT_NAME.to_string(),
            name: ACTIVATION_ALERT_NAME.to_string(),
            starts_at: Some(Utc::now()),
            ends_at: None,
            status: AlertStatus::Firing,
            labels,
            annotations,
            generator_url: String::new(),
        }],
    }
}

/// 看门狗关闭时使用的空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDeadMansSwitch;

#[async_trait]
impl DeadMansSwitch for DisabledDeadMansSwitch {
    async fn push_switch(&self, _alert_group: Option<&AlertGroup>) -> Result<()> {
        Ok(())
    }
}
