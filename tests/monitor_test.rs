use std::sync::Arc;
use std::time::Duration;

use cita_bot::dispatch::Dispatcher;
use cita_bot::model::ProbeStatus;
use cita_bot::model::SubscriberRole;
use cita_bot::monitor::MonitorError;
use cita_bot::monitor::SlotMonitor;
use cita_bot::monitor::StartOutcome;
use cita_bot::monitor::StopOutcome;
use cita_bot::repository::Repository;
use cita_bot::repository::table::TableBase;

mod common;

use common::RecordingMessenger;
use common::ScriptedProber;

const TARGET_URL: &str = "https://example.test/cita";
const SLOTS_MARKER: &str = "slots may be available";
const DEGRADED_MARKER: &str = "checks in a row";

async fn setup_monitor(
    db: &Arc<Repository>,
    prober: &ScriptedProber,
    messenger: &RecordingMessenger,
) -> Arc<SlotMonitor> {
    db.subscriber
        .upsert(777, SubscriberRole::Member)
        .await
        .expect("Failed to subscribe test chat");

    let dispatcher = Arc::new(Dispatcher::new(db.clone(), Arc::new(messenger.clone())));
    SlotMonitor::new(
        db.clone(),
        Arc::new(prober.clone()),
        dispatcher,
        TARGET_URL,
        Duration::from_secs(60),
    )
    .await
    .expect("Failed to create monitor")
}

async fn run_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_notifies_on_edges_into_available_only() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![
        ProbeStatus::Unavailable,
        ProbeStatus::Unavailable,
        ProbeStatus::Available,
        ProbeStatus::Available,
        ProbeStatus::Unavailable,
        ProbeStatus::Available,
    ]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    let outcome = monitor.start(Some(30)).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { .. }));

    run_for(200).await;
    assert!(
        common::wait_until(|| messenger.sent_containing(SLOTS_MARKER) == 2).await,
        "expected exactly two slot notifications, got {}",
        messenger.sent_containing(SLOTS_MARKER)
    );

    // Two availability windows, one notification each.
    assert_eq!(messenger.sent_containing(SLOTS_MARKER), 2);
    assert_eq!(messenger.sent_containing(DEGRADED_MARKER), 0);
    assert!(prober.probes() >= 6);
    assert!(messenger.sent().iter().all(|(chat_id, _)| *chat_id == 777));

    let status = monitor.status().await;
    assert!(status.running);
    assert_eq!(status.consecutive_errors, 0);

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_degraded_alert_fires_once_per_error_streak() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![
        ProbeStatus::Error,
        ProbeStatus::Error,
        ProbeStatus::Error,
        ProbeStatus::Available,
        ProbeStatus::Error,
        ProbeStatus::Error,
        ProbeStatus::Error,
    ]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    monitor.start(Some(30)).await.unwrap();
    run_for(260).await;

    assert!(
        common::wait_until(|| messenger.sent_containing(DEGRADED_MARKER) == 2).await,
        "expected two degraded alerts, got {}",
        messenger.sent_containing(DEGRADED_MARKER)
    );

    // The recovery in between notified once and reset the error streak.
    assert_eq!(messenger.sent_containing(SLOTS_MARKER), 1);
    assert_eq!(messenger.sent_containing(DEGRADED_MARKER), 2);

    // Fallback probes are unavailable, so the streak ends at zero.
    assert_eq!(monitor.status().await.consecutive_errors, 0);

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_updates_interval_only() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    let first = monitor.start(Some(60)).await.unwrap();
    assert!(matches!(first, StartOutcome::Started { interval } if interval == Duration::from_secs(60)));

    run_for(5).await;
    assert!(common::wait_until(|| prober.probes() >= 1).await);

    let second = monitor.start(Some(30)).await.unwrap();
    assert!(
        matches!(second, StartOutcome::AlreadyRunning { interval } if interval == Duration::from_secs(30))
    );
    assert_eq!(monitor.status().await.interval, Duration::from_secs(30));

    let before = prober.probes();
    run_for(95).await;
    assert!(
        common::wait_until(|| prober.probes() >= before + 3).await,
        "expected the faster cadence to add probes"
    );

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_out_of_bounds_intervals_are_rejected() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    // Rejected outright while stopped; nothing starts.
    let denied = monitor.start(Some(5)).await;
    assert!(matches!(
        denied,
        Err(MonitorError::IntervalOutOfBounds { got: 5 })
    ));
    run_for(120).await;
    assert_eq!(prober.probes(), 0);
    assert!(!monitor.status().await.running);

    monitor.start(Some(30)).await.unwrap();
    assert!(monitor.set_interval(10).await.is_err());
    assert!(monitor.set_interval(86_401).await.is_err());
    assert_eq!(monitor.status().await.interval, Duration::from_secs(30));
    assert!(monitor.status().await.running);

    monitor.set_interval(86_400).await.unwrap();
    assert_eq!(monitor.status().await.interval, Duration::from_secs(86_400));

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_interval_survives() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    monitor.start(Some(45)).await.unwrap();
    run_for(5).await;
    assert!(common::wait_until(|| prober.probes() >= 1).await);

    assert!(matches!(monitor.stop().await.unwrap(), StopOutcome::Stopped));
    assert!(matches!(
        monitor.stop().await.unwrap(),
        StopOutcome::NotRunning
    ));

    let before = prober.probes();
    run_for(200).await;
    assert_eq!(prober.probes(), before, "no probes while stopped");

    // Restarting without an argument keeps the stored interval.
    let outcome = monitor.start(None).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { interval } if interval == Duration::from_secs(45)));

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_preserves_running_state_for_restore() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    monitor.start(Some(30)).await.unwrap();
    run_for(5).await;
    assert!(common::wait_until(|| prober.probes() >= 1).await);

    monitor.shutdown().await;
    let before = prober.probes();
    run_for(120).await;
    assert_eq!(prober.probes(), before, "no probes after shutdown");

    // A new monitor over the same database resumes automatically.
    let dispatcher = Arc::new(Dispatcher::new(db.clone(), Arc::new(messenger.clone())));
    let restored = SlotMonitor::new(
        db.clone(),
        Arc::new(prober.clone()),
        dispatcher,
        TARGET_URL,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert!(restored.restore().await);
    run_for(65).await;
    assert!(
        common::wait_until(|| prober.probes() > before).await,
        "restored monitor should probe again"
    );
    assert_eq!(restored.status().await.interval, Duration::from_secs(30));

    restored.shutdown().await;
    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_restore_stays_stopped_when_state_says_stopped() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    assert!(!monitor.restore().await);
    run_for(120).await;
    assert_eq!(prober.probes(), 0);
    assert!(!monitor.status().await.running);

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_probes_never_overlap() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::new(vec![]);
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    // Each probe takes five times the interval.
    prober.set_delay(Duration::from_secs(150));
    monitor.start(Some(30)).await.unwrap();

    run_for(400).await;
    assert_eq!(prober.max_in_flight(), 1, "probe cycles must not overlap");
    assert!(prober.probes() >= 2);
    assert!(
        prober.probes() <= 4,
        "missed ticks should be skipped, not queued (got {})",
        prober.probes()
    );

    common::teardown_db(db_path).await;
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failures_suppress_and_then_stop() {
    let (db, db_path) = common::setup_db().await;
    let prober = ScriptedProber::with_fallback(
        vec![ProbeStatus::Unavailable],
        ProbeStatus::Available,
    );
    let messenger = RecordingMessenger::new();
    let monitor = setup_monitor(&db, &prober, &messenger).await;

    monitor.start(Some(30)).await.unwrap();
    run_for(5).await;
    assert!(common::wait_until(|| prober.probes() >= 1).await);

    // Break persistence before the first available probe.
    db.monitor_state.drop_table().await.unwrap();

    run_for(200).await;

    // The edge into available was seen but never persisted, so nothing
    // went out, and repeated failures shut the monitor down.
    assert_eq!(messenger.sent_containing(SLOTS_MARKER), 0);
    assert!(!monitor.status().await.running);

    let before = prober.probes();
    run_for(120).await;
    assert_eq!(prober.probes(), before, "monitor stays stopped");

    common::teardown_db(db_path).await;
}
