//! Notification events and their fan-out to subscribed chats.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use log::error;
use log::info;
use log::warn;
use tokio::sync::RwLock;

use crate::dispatch::error::SendError;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;

pub mod error;
pub mod telegram;

/// Send attempts each recipient gets before they are skipped.
const MAX_SEND_ATTEMPTS: u32 = 3;

/// Upper bound honored when the API asks for a long retry pause.
const MAX_RETRY_WAIT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    SlotsAvailable {
        checked_at: DateTime<Utc>,
        detail: String,
        target_url: String,
    },
    MonitorDegraded {
        consecutive_errors: i64,
        detail: String,
    },
    Test,
}

impl NotificationEvent {
    /// Builds the message text sent to every recipient.
    pub fn render(&self) -> String {
        match self {
            Self::SlotsAvailable {
                checked_at,
                detail,
                target_url,
            } => format!(
                "🚨 Appointment slots may be available! 🚨\n\nSeen at {} UTC:\n{}\n\nBook here: {}",
                checked_at.format("%Y-%m-%d %H:%M:%S"),
                detail,
                target_url
            ),
            Self::MonitorDegraded {
                consecutive_errors,
                detail,
            } => format!(
                "⚠️ The monitor has failed {consecutive_errors} checks in a row and may need attention.\nLast error: {detail}"
            ),
            Self::Test => "🔔 Test notification. You are subscribed and reachable.".to_string(),
        }
    }
}

/// Transport used to reach a chat. Implemented by the Telegram client.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub sent: u32,
    pub failed: u32,
    pub at: DateTime<Utc>,
}

pub struct Dispatcher {
    db: Arc<Repository>,
    messenger: Arc<dyn Messenger>,
    last_report: RwLock<Option<DeliveryReport>>,
}

impl Dispatcher {
    pub fn new(db: Arc<Repository>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            db,
            messenger,
            last_report: RwLock::new(None),
        }
    }

    /// Delivers `event` to every active subscriber, oldest subscription first.
    ///
    /// A failing recipient is logged and skipped. One unreachable chat never
    /// blocks the rest of the list.
    ///
    /// # Performance
    /// * DB calls: 1
    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<DeliveryReport, DatabaseError> {
        let subscribers = self.db.subscriber.select_active().await?;
        let text = event.render();

        let mut sent = 0;
        let mut failed = 0;
        for subscriber in &subscribers {
            match self.send_with_retry(subscriber.chat_id, &text).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    error!("Failed to notify chat {}: {e}", subscriber.chat_id);
                    failed += 1;
                }
            }
        }

        let report = DeliveryReport {
            sent,
            failed,
            at: Utc::now(),
        };
        info!("Dispatched notification to {sent} chats ({failed} failed).");
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// The most recent fan-out outcome, if any notification went out yet.
    pub async fn last_report(&self) -> Option<DeliveryReport> {
        self.last_report.read().await.clone()
    }

    /// Honors rate-limit pauses a bounded number of times, then gives up.
    async fn send_with_retry(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let mut attempt = 1;
        loop {
            match self.messenger.send_text(chat_id, text).await {
                Err(SendError::RateLimited { retry_after }) if attempt < MAX_SEND_ATTEMPTS => {
                    let wait = retry_after.min(MAX_RETRY_WAIT_SECS);
                    warn!("Rate limited sending to chat {chat_id}, retrying in {wait}s.");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
