//! # Toast Notifier
//!
//! Transient messages shown over the page. Each toast removes itself after
//! the configured duration; timers are independent, so dismissing one
//! never shortens another.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub kind: ToastKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ToastNotifier {
    tx: Arc<watch::Sender<Vec<Toast>>>,
    duration: Duration,
}

impl ToastNotifier {
    pub fn new(duration: Duration) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            tx: Arc::new(tx),
            duration,
        }
    }

    /// Queues a toast and schedules its removal.
    ///
    /// Outside a Tokio runtime no timer can be scheduled; the toast then
    /// stays until [`ToastNotifier::dismiss`] is called.
    pub fn show(&self, message: impl Into<String>, kind: ToastKind) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
            created_at: Utc::now(),
        };
        let id = toast.id;
        debug!(%id, ?kind, message = %toast.message, "Toast shown");
        self.tx.send_modify(|toasts| toasts.push(toast));

        match Handle::try_current() {
            Ok(handle) => {
                let notifier = self.clone();
                let duration = self.duration;
                handle.spawn(async move {
                    tokio::time::sleep(duration).await;
                    notifier.dismiss(id);
                });
            }
            Err(_) => warn!(%id, "No runtime for toast timer, toast stays until dismissed"),
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.show(message, ToastKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.show(message, ToastKind::Error)
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.show(message, ToastKind::Info)
    }

    /// Shows `success_message` for `Ok`, the error's own text for `Err`.
    pub fn report<T>(&self, result: &ApiResult<T>, success_message: &str) -> Uuid {
        match result {
            Ok(_) => self.success(success_message),
            Err(e) => self.error(e.user_message()),
        }
    }

    /// Removes a toast early. Unknown or already expired ids are ignored.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.tx.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|t| t.id != id);
            toasts.len() != before
        })
    }

    pub fn active(&self) -> Vec<Toast> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.tx.subscribe()
    }
}
