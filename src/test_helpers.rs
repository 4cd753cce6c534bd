//! 单元测试用的 mock 组件

use crate::error::{Error, Result};
use crate::forward::{Notification, Notifier};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// 记录收到的通知，可选地每次都返回错误
pub(crate) struct RecordingNotifier {
    name: String,
    fail: bool,
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _cancel: &CancellationToken, notification: &Notification) -> Result<()> {
        self.received.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(Error::Communication {
                backend: "mock",
                message: "whatever".to_string(),
            });
        }
        Ok(())
    }

    fn notifier_type(&self) -> &str {
        &self.name
    }
}
