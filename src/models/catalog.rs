use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
    #[default]
    Unknown,
}

impl MangaStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ongoing" => MangaStatus::Ongoing,
            "completed" => MangaStatus::Completed,
            "hiatus" => MangaStatus::Hiatus,
            "cancelled" => MangaStatus::Cancelled,
            _ => MangaStatus::Unknown,
        }
    }
}

impl fmt::Display for MangaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MangaStatus::Ongoing => "ongoing",
            MangaStatus::Completed => "completed",
            MangaStatus::Hiatus => "hiatus",
            MangaStatus::Cancelled => "cancelled",
            MangaStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Size variant requested from the cover image server.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoverSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl CoverSize {
    pub fn tag(self) -> &'static str {
        match self {
            CoverSize::Small => "256.jpg",
            CoverSize::Medium => "512.jpg",
            CoverSize::Large => ".jpg",
        }
    }
}

/// Rating and view count as recorded by the persistent store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayMetrics {
    pub rating: Option<f32>,
    pub view_count: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub author: String,
    pub artist: String,
    pub status: MangaStatus,
    pub cover_url: String,
    pub genres: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub metrics: Option<DisplayMetrics>,
}

impl CatalogEntry {
    pub fn with_metrics(mut self, metrics: DisplayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\n\tid: {}\n\tslug: {}\n\tauthor: {}\n\tartist: {}\n\tstatus: {}\n\tgenres: {}\n\tcover: {}",
            self.title,
            self.id,
            self.slug,
            self.author,
            self.artist,
            self.status,
            self.genres.join(", "),
            self.cover_url
        )
    }
}

/// Opaque handle that is later resolved into page image URLs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChapterContentRef(pub Uuid);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChapterEntry {
    pub id: Uuid,
    pub manga_id: Uuid,
    pub number: f64,
    pub volume: Option<String>,
    pub title: Option<String>,
    pub pages: u32,
    pub translated_language: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_ref: ChapterContentRef,
}

impl ChapterEntry {
    /// Sorts ascending by chapter number. Equal numbers keep their source order.
    pub fn sort_for_display(chapters: &mut [ChapterEntry]) {
        chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
    }
}

impl fmt::Display for ChapterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chapter {}", self.number)?;
        if let Some(title) = &self.title {
            write!(f, " - {}", title)?;
        }
        write!(f, " ({} pages)", self.pages)
    }
}
