use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PageQuality {
    #[default]
    Data,
    DataSaver,
}

impl PageQuality {
    /// Path segment used by the image server for this quality mode.
    pub fn segment(self) -> &'static str {
        match self {
            PageQuality::Data => "data",
            PageQuality::DataSaver => "data-saver",
        }
    }
}

/// Page image URLs for one chapter, in reading order.
///
/// Built from a short-lived image server grant, so it goes stale and has to be
/// resolved again rather than persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    pub chapter_id: Uuid,
    pub quality: PageQuality,
    pub urls: Vec<Url>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl PageSet {
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// URL of a 1-based page number.
    pub fn page(&self, number: usize) -> Option<&Url> {
        number.checked_sub(1).and_then(|i| self.urls.get(i))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}
