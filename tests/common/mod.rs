use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cita_bot::dispatch::Messenger;
use cita_bot::dispatch::error::SendError;
use cita_bot::model::ProbeStatus;
use cita_bot::probe::ProbeReport;
use cita_bot::probe::Prober;
use cita_bot::repository::Repository;
use uuid::Uuid;

pub async fn setup_db() -> (Arc<Repository>, PathBuf) {
    let uuid = Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("cita-bot-test-{}.db", uuid));
    let db_url = format!("sqlite://{}", db_path.to_str().unwrap());

    let db = Repository::new(&db_url, db_path.to_str().unwrap())
        .await
        .expect("Failed to create database");

    db.init_schema().await.expect("Failed to initialize schema");

    (Arc::new(db), db_path)
}

pub async fn teardown_db(db_path: PathBuf) {
    if db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
}

/// Polls `condition` with short sleeps, bounded so a broken test still ends.
#[allow(dead_code)]
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let mut attempts = 0;
    while !condition() && attempts < 50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        attempts += 1;
    }
    condition()
}

// SCRIPTED PROBER

/// Prober that plays back a fixed sequence of statuses, then a fallback.
#[derive(Clone)]
#[allow(dead_code)]
pub struct ScriptedProber {
    pub state: Arc<RwLock<ScriptedProberState>>,
}

#[allow(dead_code)]
pub struct ScriptedProberState {
    pub script: VecDeque<ProbeStatus>,
    pub fallback: ProbeStatus,
    pub probe_delay: Duration,
    pub probes: u32,
    pub in_flight: u32,
    pub max_in_flight: u32,
}

impl Default for ScriptedProberState {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: ProbeStatus::Unavailable,
            probe_delay: Duration::ZERO,
            probes: 0,
            in_flight: 0,
            max_in_flight: 0,
        }
    }
}

#[allow(dead_code)]
impl ScriptedProber {
    pub fn new(script: Vec<ProbeStatus>) -> Self {
        Self::with_fallback(script, ProbeStatus::Unavailable)
    }

    pub fn with_fallback(script: Vec<ProbeStatus>, fallback: ProbeStatus) -> Self {
        Self {
            state: Arc::new(RwLock::new(ScriptedProberState {
                script: script.into(),
                fallback,
                ..Default::default()
            })),
        }
    }

    /// Makes every probe take `delay` before reporting.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().probe_delay = delay;
    }

    pub fn probes(&self) -> u32 {
        self.state.read().unwrap().probes
    }

    pub fn max_in_flight(&self) -> u32 {
        self.state.read().unwrap().max_in_flight
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self) -> ProbeReport {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.probes += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.probe_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let status = {
            let mut state = self.state.write().unwrap();
            state.in_flight -= 1;
            let fallback = state.fallback;
            state.script.pop_front().unwrap_or(fallback)
        };

        ProbeReport {
            status,
            detail: format!("scripted {status}"),
            checked_at: Utc::now(),
            evidence_path: None,
        }
    }
}

// RECORDING MESSENGER

/// Messenger that records sends and can simulate failures per chat.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingMessenger {
    pub state: Arc<RwLock<RecordingMessengerState>>,
}

#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingMessengerState {
    pub sent: Vec<(i64, String)>,
    pub rate_limit_next: u32,
    pub fail_chat_ids: Vec<i64>,
    pub attempts: u32,
}

#[allow(dead_code)]
impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.state.read().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Counts delivered messages whose text contains `marker`.
    pub fn sent_containing(&self, marker: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|(_, text)| text.contains(marker))
            .count()
    }

    pub fn attempts(&self) -> u32 {
        self.state.read().unwrap().attempts
    }

    /// The next `n` send attempts are answered with a rate limit.
    pub fn set_rate_limit_next(&self, n: u32) {
        self.state.write().unwrap().rate_limit_next = n;
    }

    /// All sends to `chat_id` fail as if the bot were blocked.
    pub fn fail_chat(&self, chat_id: i64) {
        self.state.write().unwrap().fail_chat_ids.push(chat_id);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let mut state = self.state.write().unwrap();
        state.attempts += 1;

        if state.rate_limit_next > 0 {
            state.rate_limit_next -= 1;
            return Err(SendError::RateLimited { retry_after: 1 });
        }
        if state.fail_chat_ids.contains(&chat_id) {
            return Err(SendError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        state.sent.push((chat_id, text.to_string()));
        Ok(())
    }
}
