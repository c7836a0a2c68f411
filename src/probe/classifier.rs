use regex::Regex;

use crate::model::ProbeStatus;

/// How much of the page text is kept as the availability summary.
const SUMMARY_LEN: usize = 350;

/// Phrases the booking widget renders when every slot is taken.
const NO_SLOT_PHRASES: [&str; 2] = ["No hay horas disponibles", "Inténtelo de nuevo"];

/// Verdict over the rendered slot listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: ProbeStatus,
    pub detail: String,
}

/// Decides whether the rendered page text announces free slots.
///
/// The widget shows a fixed phrase when nothing is bookable, so the check is
/// phrase matching, not structure parsing: any known no-slot phrase means
/// unavailable, anything else that made it past the continue flow means slots.
pub struct SlotClassifier {
    patterns: Vec<String>,
    whitespace: Regex,
}

impl SlotClassifier {
    pub fn new() -> Self {
        Self::with_patterns(NO_SLOT_PHRASES.iter().map(|s| s.to_string()).collect())
    }

    /// A classifier with custom no-slot phrases, matched case-insensitively.
    pub fn with_patterns(patterns: Vec<String>) -> Self {
        let whitespace = Regex::new(r"\s+").expect("Failed to compile whitespace regex");
        Self { patterns, whitespace }
    }

    pub fn classify(&self, page_text: &str) -> Classification {
        let normalized = self.whitespace.replace_all(page_text.trim(), " ").to_string();
        let lowered = normalized.to_lowercase();

        for pattern in &self.patterns {
            if lowered.contains(&pattern.to_lowercase()) {
                return Classification {
                    status: ProbeStatus::Unavailable,
                    detail: pattern.clone(),
                };
            }
        }

        Classification {
            status: ProbeStatus::Available,
            detail: normalized.chars().take(SUMMARY_LEN).collect(),
        }
    }
}
