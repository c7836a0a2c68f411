//! User-facing reply texts.

use crate::dispatch::DeliveryReport;
use crate::model::SubscriberModel;
use crate::monitor::MAX_INTERVAL_SECS;
use crate::monitor::MIN_INTERVAL_SECS;
use crate::monitor::MonitorStatus;
use crate::monitor::StartOutcome;
use crate::monitor::StopOutcome;

pub fn welcome() -> String {
    "👋 Hello! I watch the appointment page and shout when slots open up.\n\
     Use /subscribe to get notified and /help to see everything I can do."
        .to_string()
}

pub fn help() -> String {
    "Available commands:\n\
     /status - what the monitor is doing\n\
     /subscribe - receive slot notifications\n\
     /unsubscribe - stop receiving notifications\n\
     /start_monitor [seconds] - start checking (subscribers only)\n\
     /stop_monitor - stop checking (subscribers only)\n\
     /set_interval <seconds> - change how often I check\n\
     /list_subscribers - list active subscribers (admins only)\n\
     /test - send a test notification to everyone (admins only)"
        .to_string()
}

pub fn status(status: &MonitorStatus, delivery: Option<&DeliveryReport>) -> String {
    let mut text = String::from("📊 Monitor status\n");

    text.push_str(&format!(
        "Running: {}\n",
        if status.running { "yes" } else { "no" }
    ));
    text.push_str(&format!("Interval: {}s\n", status.interval.as_secs()));

    match (status.last_checked_at, status.last_status) {
        (Some(at), Some(last)) => {
            text.push_str(&format!(
                "Last check: {} UTC ({last})\n",
                at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        _ => text.push_str("Last check: never\n"),
    }

    if let Some(detail) = &status.last_detail {
        text.push_str(&format!("Detail: {detail}\n"));
    }
    if status.consecutive_errors > 0 {
        text.push_str(&format!("Errors in a row: {}\n", status.consecutive_errors));
    }
    if let Some(path) = &status.last_evidence_path {
        text.push_str(&format!("Evidence: {path}\n"));
    }
    if let Some(report) = delivery {
        text.push_str(&format!(
            "Last notification: {} sent, {} failed at {} UTC\n",
            report.sent,
            report.failed,
            report.at.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    text.trim_end().to_string()
}

pub fn subscribed(already: bool) -> String {
    if already {
        "ℹ️ You are already subscribed.".to_string()
    } else {
        "✅ Subscribed! You will hear from me when slots appear.".to_string()
    }
}

pub fn unsubscribed(was_subscribed: bool) -> String {
    if was_subscribed {
        "👋 Unsubscribed. You will not receive further notifications.".to_string()
    } else {
        "ℹ️ You were not subscribed.".to_string()
    }
}

pub fn monitor_started(outcome: &StartOutcome) -> String {
    match outcome {
        StartOutcome::Started { interval } => {
            format!("▶️ Monitoring started. Checking every {}s.", interval.as_secs())
        }
        StartOutcome::AlreadyRunning { interval } => {
            format!(
                "ℹ️ Monitoring is already running. Interval is now {}s.",
                interval.as_secs()
            )
        }
    }
}

pub fn monitor_stopped(outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped => "⏹️ Monitoring stopped.".to_string(),
        StopOutcome::NotRunning => "ℹ️ Monitoring is not running.".to_string(),
    }
}

pub fn interval_set(secs: u64) -> String {
    format!("⏱️ Interval set to {secs}s.")
}

pub fn invalid_interval(got: u64) -> String {
    format!(
        "⚠️ The interval must be between {MIN_INTERVAL_SECS}s and {MAX_INTERVAL_SECS}s; got {got}s."
    )
}

pub fn invalid_argument(parameter: &str, reason: &str) -> String {
    format!("⚠️ Invalid {parameter}: {reason}")
}

pub fn subscriber_list(subscribers: &[SubscriberModel]) -> String {
    if subscribers.is_empty() {
        return "👥 No active subscribers.".to_string();
    }

    let mut text = format!("👥 Active subscribers ({}):\n", subscribers.len());
    for subscriber in subscribers {
        text.push_str(&format!(
            "• {} ({}), since {}\n",
            subscriber.chat_id,
            subscriber.role,
            subscriber.subscribed_at.format("%Y-%m-%d")
        ));
    }
    text.trim_end().to_string()
}

pub fn test_sent(report: &DeliveryReport) -> String {
    format!(
        "🔔 Test sent to {} chats ({} failed).",
        report.sent, report.failed
    )
}

pub fn must_subscribe() -> String {
    "🔒 You need an active subscription to control monitoring. Use /subscribe first.".to_string()
}

pub fn admin_only() -> String {
    "🔒 This command is restricted to admins.".to_string()
}
