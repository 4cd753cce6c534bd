//! 集成测试共用的 mock 组件

#![allow(dead_code)]

use alertgram::{AlertGroup, DeadMansSwitch, Error, ForwardService, Properties, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// mock 转发服务的返回结果
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Ok,
    InvalidConfiguration,
    Communication,
}

pub struct MockForwarder {
    outcome: Outcome,
    calls: Mutex<Vec<(Properties, AlertGroup)>>,
}

impl MockForwarder {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Properties, AlertGroup)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForwardService for MockForwarder {
    async fn forward(
        &self,
        _cancel: &CancellationToken,
        props: &Properties,
        alert_group: Option<&AlertGroup>,
    ) -> Result<()> {
        let group = alert_group
            .cloned()
            .ok_or_else(|| Error::InvalidAlertGroup("alert group can't be empty".to_string()))?;
        self.calls.lock().unwrap().push((props.clone(), group));

        match self.outcome {
            Outcome::Ok => Ok(()),
            Outcome::InvalidConfiguration => {
                Err(Error::InvalidConfiguration("bad chat".to_string()))
            }
            Outcome::Communication => Err(Error::Communication {
                backend: "mock",
                message: "unreachable".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct MockDeadMansSwitch {
    pushes: Mutex<Vec<AlertGroup>>,
}

impl MockDeadMansSwitch {
    pub fn pushes(&self) -> Vec<AlertGroup> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadMansSwitch for MockDeadMansSwitch {
    async fn push_switch(&self, alert_group: Option<&AlertGroup>) -> Result<()> {
        if let Some(group) = alert_group {
            self.pushes.lock().unwrap().push(group.clone());
        }
        Ok(())
    }
}

/// Alertmanager v4 webhook 请求体，告警为 (fingerprint, status, alertname)
pub fn webhook_body(version: &str, alerts: &[(&str, &str, &str)]) -> String {
    let alerts: Vec<serde_json::Value> = alerts
        .iter()
        .map(|(fingerprint, status, name)| {
            serde_json::json!({
                "status": status,
                "labels": {"alertname": name, "severity": "warning"},
                "annotations": {"message": "something happened"},
                "startsAt": "2026-10-18T10:00:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus.test/graph",
                "fingerprint": fingerprint,
            })
        })
        .collect();

    serde_json::json!({
        "version": version,
        "groupKey": "test-group",
        "truncatedAlerts": 0,
        "status": "firing",
        "receiver": "alertgram",
        "groupLabels": {"alertname": "HighLatency"},
        "commonLabels": {},
        "commonAnnotations": {},
        "externalURL": "http://alertmanager.test",
        "alerts": alerts,
    })
    .to_string()
}
