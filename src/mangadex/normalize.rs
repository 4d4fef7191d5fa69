//! Turns raw catalog records into the UI-ready [`CatalogEntry`] and
//! [`ChapterEntry`] shapes.
//!
//! Nothing in here fails on a missing field. Each lookup has a fallback chain
//! ending in a fixed sentinel so the views always have something to show.

use chrono::{DateTime, Utc};
use log::debug;
use url::{form_urlencoded, Url};
use uuid::Uuid;

use super::records::{ChapterRecord, LocalizedString, MangaRecord};
use crate::configuration::Settings;
use crate::models::{
    CatalogEntry, ChapterContentRef, ChapterEntry, CoverSize, MangaStatus, PageQuality,
};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const NO_DESCRIPTION: &str = "No description available";
pub const FALLBACK_LOCALE: &str = "en";

const COVER_ART: &str = "cover_art";
const GENRE_GROUP: &str = "genre";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorRole {
    Author,
    Artist,
}

impl CreatorRole {
    fn relationship_type(self) -> &'static str {
        match self {
            CreatorRole::Author => "author",
            CreatorRole::Artist => "artist",
        }
    }

    fn unknown(self) -> &'static str {
        match self {
            CreatorRole::Author => "Unknown Author",
            CreatorRole::Artist => "Unknown Artist",
        }
    }
}

/// Where cover images live and how their URLs are routed.
#[derive(Debug, Clone)]
pub struct CoverTemplate {
    pub uploads_base_url: Url,
    pub image_proxy: Option<String>,
    pub placeholder: String,
}

impl Default for CoverTemplate {
    fn default() -> Self {
        CoverTemplate::from(&Settings::default())
    }
}

impl From<&Settings> for CoverTemplate {
    fn from(settings: &Settings) -> Self {
        CoverTemplate {
            uploads_base_url: settings.uploads_base_url.clone(),
            image_proxy: settings.image_proxy.clone(),
            placeholder: settings.placeholder_cover.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub locale: String,
    pub cover_size: CoverSize,
    pub covers: CoverTemplate,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions::from(&Settings::default())
    }
}

impl From<&Settings> for NormalizeOptions {
    fn from(settings: &Settings) -> Self {
        NormalizeOptions {
            locale: settings.preferred_locale.clone(),
            cover_size: settings.cover_size,
            covers: CoverTemplate::from(settings),
        }
    }
}

/// Preferred locale, then English, then whatever comes first. Empty values are
/// skipped at every step.
fn pick_localized<'a>(s: &'a LocalizedString, locale: &str) -> Option<&'a str> {
    let non_empty = |v: &&str| !v.is_empty();
    s.get(locale)
        .filter(non_empty)
        .or_else(|| s.get(FALLBACK_LOCALE).filter(non_empty))
        .or_else(|| s.iter().map(|(_, v)| v).find(non_empty))
}

pub fn resolve_title(record: &MangaRecord, locale: &str) -> String {
    pick_localized(&record.attributes.title, locale)
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}

pub fn resolve_description(record: &MangaRecord, locale: &str) -> String {
    pick_localized(&record.attributes.description, locale)
        .unwrap_or(NO_DESCRIPTION)
        .to_string()
}

/// Only the first relationship with the role counts, even if it has no name.
pub fn resolve_creator(record: &MangaRecord, role: CreatorRole) -> String {
    record
        .relationships
        .iter()
        .find(|rel| rel.kind == role.relationship_type())
        .and_then(|rel| rel.attributes.as_ref())
        .and_then(|attrs| attrs.name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(role.unknown())
        .to_string()
}

pub fn resolve_cover_reference(record: &MangaRecord) -> Option<String> {
    record
        .relationships
        .iter()
        .find(|rel| rel.kind == COVER_ART)
        .and_then(|rel| rel.attributes.as_ref())
        .and_then(|attrs| attrs.file_name.clone())
        .filter(|file_name| !file_name.is_empty())
}

pub fn resolve_cover_url(
    cover_ref: Option<&str>,
    owner_id: Uuid,
    size: CoverSize,
    template: &CoverTemplate,
) -> String {
    let Some(cover_ref) = cover_ref else {
        return template.placeholder.clone();
    };

    let cover_url = format!(
        "{base}/covers/{owner}/{cover}{tag}",
        base = template.uploads_base_url.as_str().trim_end_matches('/'),
        owner = owner_id,
        cover = cover_ref,
        tag = size.tag()
    );

    match &template.image_proxy {
        Some(prefix) => {
            let encoded: String = form_urlencoded::byte_serialize(cover_url.as_bytes()).collect();
            format!("{}{}", prefix, encoded)
        }
        None => cover_url,
    }
}

pub fn resolve_genres(record: &MangaRecord, locale: &str) -> Vec<String> {
    record
        .attributes
        .tags
        .iter()
        .filter(|tag| tag.attributes.group == GENRE_GROUP)
        .filter_map(|tag| pick_localized(&tag.attributes.name, locale))
        .map(String::from)
        .collect()
}

pub fn resolve_status(record: &MangaRecord) -> MangaStatus {
    record
        .attributes
        .status
        .as_deref()
        .map(MangaStatus::parse)
        .unwrap_or_default()
}

pub fn derive_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Lenient float parse. The upstream chapter field is free text, so only the
/// longest leading number counts: `"12abc"` is 12, `"abc"` is 0.
pub fn parse_chapter_number(raw: &str) -> f64 {
    match numeric_prefix(raw.trim()).parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// `[sign] digits [. digits] [e [sign] digits]`, with at least one mantissa digit.
fn numeric_prefix(s: &str) -> &str {
    let b = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if b.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        let frac_digits = frac_end - (end + 1);
        if mantissa_digits > 0 || frac_digits > 0 {
            mantissa_digits += frac_digits;
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return "";
    }

    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(b.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    &s[..end]
}

pub fn build_page_set(
    base_url: &str,
    content_hash: &str,
    filenames: &[String],
) -> Result<Vec<Url>, url::ParseError> {
    build_page_set_with_quality(base_url, content_hash, filenames, PageQuality::Data)
}

pub fn build_page_set_with_quality(
    base_url: &str,
    content_hash: &str,
    filenames: &[String],
    quality: PageQuality,
) -> Result<Vec<Url>, url::ParseError> {
    let base_url = base_url.trim_end_matches('/');
    filenames
        .iter()
        .map(|filename| {
            Url::parse(&format!(
                "{base}/{quality_mode}/{chapter_hash}/{page_filename}",
                base = base_url,
                quality_mode = quality.segment(),
                chapter_hash = content_hash,
                page_filename = filename
            ))
        })
        .collect()
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

pub fn normalize_manga(record: &MangaRecord, options: &NormalizeOptions) -> CatalogEntry {
    let title = resolve_title(record, &options.locale);
    let mut slug = derive_slug(&title);
    if slug.is_empty() {
        // Titles made only of non-latin characters
        slug = record.id.to_string();
    }

    let cover_ref = resolve_cover_reference(record);
    let cover_url = resolve_cover_url(
        cover_ref.as_deref(),
        record.id,
        options.cover_size,
        &options.covers,
    );

    debug!("Normalized manga {} as \"{}\" ({})", record.id, title, slug);

    CatalogEntry {
        id: record.id,
        slug,
        description: resolve_description(record, &options.locale),
        author: resolve_creator(record, CreatorRole::Author),
        artist: resolve_creator(record, CreatorRole::Artist),
        status: resolve_status(record),
        cover_url,
        genres: resolve_genres(record, &options.locale),
        created_at: parse_timestamp(record.attributes.created_at.as_deref()),
        updated_at: parse_timestamp(record.attributes.updated_at.as_deref()),
        metrics: None,
        title,
    }
}

/// Manga id from the chapter's `manga` relationship.
pub fn owning_manga(record: &ChapterRecord) -> Option<Uuid> {
    record
        .relationships
        .iter()
        .find(|rel| rel.kind == "manga")
        .and_then(|rel| rel.id)
}

/// The owning manga comes from the chapter's `manga` relationship when present.
pub fn normalize_chapter(record: &ChapterRecord, fallback_manga_id: Uuid) -> ChapterEntry {
    let attrs = &record.attributes;
    let manga_id = owning_manga(record).unwrap_or(fallback_manga_id);

    ChapterEntry {
        id: record.id,
        manga_id,
        number: parse_chapter_number(attrs.chapter.as_deref().unwrap_or_default()),
        volume: attrs.volume.clone().filter(|v| !v.is_empty()),
        title: attrs.title.clone().filter(|t| !t.is_empty()),
        pages: attrs.pages.unwrap_or_default(),
        translated_language: attrs.translated_language.clone(),
        published_at: parse_timestamp(attrs.publish_at.as_deref()),
        content_ref: ChapterContentRef(record.id),
    }
}
