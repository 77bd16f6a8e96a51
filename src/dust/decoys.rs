//! Decoy content: the texts sealed into decoy blobs.
//!
//! Fresh decoy texts come from an external content service behind the
//! [`DecoyContentProvider`] trait. The engine never depends on it succeeding:
//! a failing provider degrades to the built-in texts.

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::warn;

use crate::config::{ProviderConfig, ProviderKind};

/// Texts used when dynamic decoys are disabled.
pub const STATIC_DECOYS: [&str; 5] = [
    "The meeting is scheduled for 3 PM in conference room B. Please come prepared to discuss the quarterly budget review. A copy of the preliminary report has been emailed to all attendees.",
    "Reminder: System maintenance is scheduled for Saturday from 1 AM to 3 AM. Services may be intermittently unavailable during this window.",
    "Final draft of the proposal is attached. Please review for any errors or omissions before the EOD deadline.",
    "Note to self: research flights to Denver for the conference in July. Check hotel availability near the convention center.",
    "The sensor data indicates a nominal temperature fluctuation of 0.5 degrees over the last hour, which is within expected operational parameters.",
];

/// Texts used when the provider fails.
pub const FALLBACK_DECOYS: [&str; 3] = [
    "Agenda for Q3 sync: Review of sales figures, presentation of the new marketing strategy, and an open forum for team feedback. Please come prepared.",
    "Grocery list: Almond milk, whole wheat bread, avocados, chicken breast, quinoa, spinach, and a bag of coffee beans. Check for a coupon on the app.",
    "The package was delivered to the front porch at approximately 3:15 PM according to the tracking information. No signature was required.",
];

/// Filler for providers that return fewer texts than requested.
const PADDING_DECOY: &str = "This is a fallback decoy text. The generated response was incomplete.";

/// Errors from a decoy content provider.
#[derive(Error, Debug)]
pub enum DecoyError {
    #[error("Decoy provider is not configured")]
    NotConfigured,

    #[error("Decoy provider returned no texts")]
    Empty,

    #[error("Decoy provider failed: {0}")]
    Provider(String),
}

/// Source of plausible decoy texts.
#[async_trait]
pub trait DecoyContentProvider: Send + Sync {
    /// Produces `count` distinct, mundane texts.
    async fn decoy_texts(&self, count: usize) -> Result<Vec<String>, DecoyError>;
}

/// Provider backed by the built-in text list.
#[derive(Debug, Clone, Default)]
pub struct StaticDecoyProvider;

#[async_trait]
impl DecoyContentProvider for StaticDecoyProvider {
    async fn decoy_texts(&self, count: usize) -> Result<Vec<String>, DecoyError> {
        Ok(pick(&STATIC_DECOYS, count))
    }
}

/// Provider for a configured external service.
///
/// The core performs no network I/O. Offline configurations answer from the
/// built-in list; any other provider kind must be supplied by the embedding
/// application through its own [`DecoyContentProvider`] implementation.
#[derive(Debug, Clone)]
pub struct ConfiguredDecoyProvider {
    config: ProviderConfig,
}

impl ConfiguredDecoyProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DecoyContentProvider for ConfiguredDecoyProvider {
    async fn decoy_texts(&self, count: usize) -> Result<Vec<String>, DecoyError> {
        match self.config.provider {
            ProviderKind::Offline => Ok(pick(&STATIC_DECOYS, count)),
            ProviderKind::Hosted | ProviderKind::Local => Err(DecoyError::NotConfigured),
        }
    }
}

/// Shuffles `pool` and takes up to `count` entries.
fn pick(pool: &[&str], count: usize) -> Vec<String> {
    let mut texts: Vec<String> = pool.iter().map(|s| s.to_string()).collect();
    texts.shuffle(&mut OsRng);
    texts.truncate(count);
    texts
}

/// Trims or pads provider output to exactly `count` texts.
pub fn fit_to_count(mut texts: Vec<String>, count: usize) -> Vec<String> {
    texts.truncate(count);
    while texts.len() < count {
        texts.push(PADDING_DECOY.to_string());
    }
    texts
}

/// Gathers `count` decoy texts, degrading to the built-in list on failure.
pub async fn gather_decoy_texts(
    provider: &dyn DecoyContentProvider,
    count: usize,
    dynamic: bool,
) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    if !dynamic {
        return pick(&STATIC_DECOYS, count);
    }
    match provider.decoy_texts(count).await {
        Ok(texts) if !texts.is_empty() => fit_to_count(texts, count),
        Ok(_) => {
            warn!(error = %DecoyError::Empty, "decoy generation failed, using static decoys");
            fit_to_count(pick(&FALLBACK_DECOYS, count), count)
        }
        Err(e) => {
            warn!(error = %e, "decoy generation failed, using static decoys");
            fit_to_count(pick(&FALLBACK_DECOYS, count), count)
        }
    }
}
