//! Availability probing through a headless browser.
//!
//! A probe drives one fresh browser session through the booking widget's
//! entry flow: open the page, accept the greeting alert, click the continue
//! control, wait for the slot listing, read it, classify it. Every outcome
//! is reported as a [`ProbeReport`], never as an error.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::warn;
use rand::Rng;

use crate::model::ProbeStatus;
use crate::probe::classifier::SlotClassifier;
use crate::probe::error::WebDriverError;
use crate::probe::webdriver::ElementHandle;
use crate::probe::webdriver::Session;
use crate::probe::webdriver::WebDriverClient;

pub mod classifier;
pub mod error;
pub mod webdriver;

/// URL fragment the widget lands on once the slot listing is shown.
const SERVICES_FRAGMENT: &str = "#services";

/// The continue control is labeled inconsistently across widget versions.
const CONTINUE_XPATH: &str =
    "//button[contains(normalize-space(.), 'Continue') or contains(normalize-space(.), 'Continuar')]";

// Short randomized pauses between steps, roughly human-paced.
const SETTLE_AFTER_OPEN: RangeInclusive<u64> = 200..=900;
const SETTLE_AFTER_ALERT: RangeInclusive<u64> = 700..=1400;
const SETTLE_BEFORE_READ: RangeInclusive<u64> = 900..=1700;

/// How long the slot listing may take to appear after the continue click.
const FRAGMENT_WAIT: Duration = Duration::from_secs(30);
const FRAGMENT_POLL: Duration = Duration::from_millis(500);

/// Outcome of one availability check.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    pub detail: String,
    pub checked_at: DateTime<Utc>,
    pub evidence_path: Option<PathBuf>,
}

/// Anything that can answer "are there slots right now?".
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self) -> ProbeReport;
}

pub struct PageProber {
    driver: WebDriverClient,
    classifier: SlotClassifier,
    target_url: String,
    screenshot_path: PathBuf,
    screenshot_on_slots: bool,
    probe_timeout: Duration,
}

impl PageProber {
    pub fn new(
        driver: WebDriverClient,
        classifier: SlotClassifier,
        target_url: &str,
        screenshot_path: PathBuf,
        screenshot_on_slots: bool,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            classifier,
            target_url: target_url.to_string(),
            screenshot_path,
            screenshot_on_slots,
            probe_timeout,
        }
    }

    async fn run_flow(&self, session: &Session) -> Result<(ProbeStatus, String), WebDriverError> {
        settle(SETTLE_AFTER_OPEN).await;
        self.driver.set_timeouts(session, self.probe_timeout).await?;
        self.driver.navigate(session, &self.target_url).await?;

        if self.driver.accept_alert(session).await? {
            debug!("Accepted entry alert");
        }
        settle(SETTLE_AFTER_ALERT).await;

        let Some(control) = self.find_continue_control(session).await? else {
            return Ok((ProbeStatus::Blocked, "confirmation control not found".to_string()));
        };
        self.driver.click(session, &control).await?;
        self.driver.accept_alert(session).await?;

        if !self.wait_for_fragment(session).await? {
            return Ok((ProbeStatus::Blocked, "slot listing never loaded".to_string()));
        }
        settle(SETTLE_BEFORE_READ).await;

        let Some(body) = self.driver.find(session, "css selector", "body").await? else {
            return Ok((ProbeStatus::Blocked, "page has no readable body".to_string()));
        };
        let text = self.driver.text(session, &body).await?;
        let verdict = self.classifier.classify(&text);
        Ok((verdict.status, verdict.detail))
    }

    /// Tries the known shapes of the continue control, most specific first.
    async fn find_continue_control(
        &self,
        session: &Session,
    ) -> Result<Option<ElementHandle>, WebDriverError> {
        if let Some(el) = self.driver.find(session, "css selector", "#idCaptchaButton").await? {
            return Ok(Some(el));
        }
        if let Some(el) = self.driver.find(session, "xpath", CONTINUE_XPATH).await? {
            return Ok(Some(el));
        }
        self.driver.find(session, "css selector", "input[type='submit']").await
    }

    /// Polls the session URL until it lands on the slot listing fragment.
    async fn wait_for_fragment(&self, session: &Session) -> Result<bool, WebDriverError> {
        let deadline = tokio::time::Instant::now() + FRAGMENT_WAIT;
        loop {
            let url = self.driver.current_url(session).await?;
            if url.contains(SERVICES_FRAGMENT) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(FRAGMENT_POLL).await;
        }
    }

    /// Captures a screenshot into the single evidence file, best effort.
    async fn capture_evidence(&self, session: &Session, status: ProbeStatus) -> Option<PathBuf> {
        if status == ProbeStatus::Available && !self.screenshot_on_slots {
            return None;
        }

        let png = match self.driver.screenshot(session).await {
            Ok(png) => png,
            Err(e) => {
                debug!("Failed to capture screenshot: {e}");
                return None;
            }
        };

        if let Some(parent) = self.screenshot_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!("Failed to create screenshot directory: {e}");
            return None;
        }

        match tokio::fs::write(&self.screenshot_path, &png).await {
            Ok(()) => Some(self.screenshot_path.clone()),
            Err(e) => {
                warn!("Failed to write screenshot: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Prober for PageProber {
    async fn probe(&self) -> ProbeReport {
        let checked_at = Utc::now();

        let session = match self.driver.new_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open browser session: {e}");
                return ProbeReport {
                    status: ProbeStatus::Error,
                    detail: e.to_string(),
                    checked_at,
                    evidence_path: None,
                };
            }
        };

        let flow = tokio::time::timeout(self.probe_timeout, self.run_flow(&session));
        let (status, detail) = match flow.await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!("Probe failed: {e}");
                (ProbeStatus::Error, e.to_string())
            }
            Err(_) => (
                ProbeStatus::Blocked,
                "page did not reach the slot listing in time".to_string(),
            ),
        };

        let evidence_path = self.capture_evidence(&session, status).await;

        if let Err(e) = self.driver.delete_session(&session).await {
            debug!("Failed to close browser session: {e}");
        }

        ProbeReport {
            status,
            detail,
            checked_at,
            evidence_path,
        }
    }
}

async fn settle(range: RangeInclusive<u64>) {
    let millis = rand::rng().random_range(range);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
