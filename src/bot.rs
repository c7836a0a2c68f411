//! Telegram chat interface: long polling, command dispatch, replies.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::bot::commands::Command;
use crate::bot::error::BotError;
use crate::dispatch::Dispatcher;
use crate::dispatch::NotificationEvent;
use crate::dispatch::telegram::TelegramApi;
use crate::dispatch::telegram::Update;
use crate::monitor::MonitorError;
use crate::monitor::SlotMonitor;
use crate::service::subscription_service::SubscribeResult;
use crate::service::subscription_service::SubscriptionService;
use crate::service::subscription_service::UnsubscribeResult;

pub mod checks;
pub mod commands;
pub mod error;
pub mod views;

/// How long one getUpdates call holds when nothing is pending.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before retrying after a failed poll.
const POLL_RETRY_WAIT: Duration = Duration::from_secs(5);

pub struct Bot {
    api: Arc<TelegramApi>,
    monitor: Arc<SlotMonitor>,
    dispatcher: Arc<Dispatcher>,
    subscriptions: Arc<SubscriptionService>,
    running: AtomicBool,
}

impl Bot {
    pub fn new(
        api: Arc<TelegramApi>,
        monitor: Arc<SlotMonitor>,
        dispatcher: Arc<Dispatcher>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Arc<Self> {
        info!("Initializing Bot.");
        Arc::new(Self {
            api,
            monitor,
            dispatcher,
            subscriptions,
            running: AtomicBool::new(false),
        })
    }

    /// Starts the long-polling loop.
    pub fn start(self: &Arc<Self>) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Starting bot update loop.");
            let bot = self.clone();
            tokio::spawn(async move { bot.run_loop().await });
        }
    }

    /// Stops the long-polling loop after the current poll returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_loop(self: Arc<Self>) {
        let mut offset = 0;
        while self.running.load(Ordering::SeqCst) {
            let updates = match self.api.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Failed to fetch updates: {e}");
                    tokio::time::sleep(POLL_RETRY_WAIT).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Err(e) = self.handle_update(update).await {
                    error!("Error handling update: {e}");
                }
            }
        }
        info!("Bot update loop exited.");
    }

    async fn handle_update(&self, update: Update) -> Result<(), BotError> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(text) = message.text else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        let reply = match Command::parse(&text) {
            None => return Ok(()),
            Some(Err(BotError::InvalidCommandArgument { parameter, reason })) => {
                views::invalid_argument(&parameter, &reason)
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(command)) => {
                debug!("Chat {chat_id} issued {command:?}.");
                self.execute(chat_id, command).await?
            }
        };

        self.api.send_message(chat_id, &reply).await?;
        Ok(())
    }

    /// Runs one command and produces the reply text.
    async fn execute(&self, chat_id: i64, command: Command) -> Result<String, BotError> {
        if checks::requires_subscription(&command)
            && !self.subscriptions.is_active_subscriber(chat_id).await?
        {
            return Ok(views::must_subscribe());
        }
        if checks::requires_admin(&command) && !self.subscriptions.is_admin(chat_id) {
            return Ok(views::admin_only());
        }

        match command {
            Command::Start => Ok(views::welcome()),
            Command::Help => Ok(views::help()),
            Command::Status => {
                let status = self.monitor.status().await;
                let delivery = self.dispatcher.last_report().await;
                Ok(views::status(&status, delivery.as_ref()))
            }
            Command::Subscribe => {
                let result = self.subscriptions.subscribe(chat_id).await?;
                Ok(views::subscribed(matches!(
                    result,
                    SubscribeResult::AlreadySubscribed { .. }
                )))
            }
            Command::Unsubscribe => {
                let result = self.subscriptions.unsubscribe(chat_id).await?;
                Ok(views::unsubscribed(matches!(
                    result,
                    UnsubscribeResult::Success
                )))
            }
            Command::StartMonitor { interval_secs } => {
                match self.monitor.start(interval_secs).await {
                    Ok(outcome) => Ok(views::monitor_started(&outcome)),
                    Err(MonitorError::IntervalOutOfBounds { got }) => {
                        Ok(views::invalid_interval(got))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Command::StopMonitor => Ok(views::monitor_stopped(&self.monitor.stop().await?)),
            Command::SetInterval { interval_secs } => {
                match self.monitor.set_interval(interval_secs).await {
                    Ok(interval) => Ok(views::interval_set(interval.as_secs())),
                    Err(MonitorError::IntervalOutOfBounds { got }) => {
                        Ok(views::invalid_interval(got))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Command::ListSubscribers => {
                let subscribers = self.subscriptions.list_active().await?;
                Ok(views::subscriber_list(&subscribers))
            }
            Command::Test => {
                let report = self.dispatcher.dispatch(&NotificationEvent::Test).await?;
                Ok(views::test_sent(&report))
            }
        }
    }
}
