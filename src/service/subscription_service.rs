//! Chat subscription management service.

use std::sync::Arc;

use log::info;

use crate::model::SubscriberModel;
use crate::model::SubscriberRole;
use crate::repository::Repository;
use crate::service::error::ServiceError;

pub enum SubscribeResult {
    /// Successfully subscribed to notifications
    Success { subscriber: SubscriberModel },
    /// Already subscribed to notifications
    AlreadySubscribed { subscriber: SubscriberModel },
}

pub enum UnsubscribeResult {
    /// Successfully unsubscribed from notifications
    Success,
    /// There was no active subscription for this chat
    NotSubscribed,
}

/// Service for managing notification subscriptions.
pub struct SubscriptionService {
    pub db: Arc<Repository>,
    admin_ids: Vec<i64>,
}

impl SubscriptionService {
    /// Creates a new subscription service.
    pub fn new(db: Arc<Repository>, admin_ids: Vec<i64>) -> Self {
        Self { db, admin_ids }
    }

    /// Admin standing comes from configuration, not from being subscribed.
    pub fn is_admin(&self, chat_id: i64) -> bool {
        self.admin_ids.contains(&chat_id)
    }

    pub fn role_for(&self, chat_id: i64) -> SubscriberRole {
        if self.is_admin(chat_id) {
            SubscriberRole::Admin
        } else {
            SubscriberRole::Member
        }
    }

    /// Subscribes a chat to notifications, reactivating a past subscription
    /// if one exists.
    ///
    /// # Performance
    /// * DB calls: 2
    pub async fn subscribe(&self, chat_id: i64) -> Result<SubscribeResult, ServiceError> {
        // DB 1
        let existing = self.db.subscriber.select(chat_id).await?;
        let already_active = existing.is_some_and(|subscriber| subscriber.active);

        // DB 2
        let subscriber = self.db.subscriber.upsert(chat_id, self.role_for(chat_id)).await?;

        if already_active {
            Ok(SubscribeResult::AlreadySubscribed { subscriber })
        } else {
            info!("Chat {chat_id} subscribed to notifications.");
            Ok(SubscribeResult::Success { subscriber })
        }
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn unsubscribe(&self, chat_id: i64) -> Result<UnsubscribeResult, ServiceError> {
        if self.db.subscriber.deactivate(chat_id).await? {
            info!("Chat {chat_id} unsubscribed from notifications.");
            Ok(UnsubscribeResult::Success)
        } else {
            Ok(UnsubscribeResult::NotSubscribed)
        }
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn list_active(&self) -> Result<Vec<SubscriberModel>, ServiceError> {
        Ok(self.db.subscriber.select_active().await?)
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn is_active_subscriber(&self, chat_id: i64) -> Result<bool, ServiceError> {
        let subscriber = self.db.subscriber.select(chat_id).await?;
        Ok(subscriber.is_some_and(|subscriber| subscriber.active))
    }
}
