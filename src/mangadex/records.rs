//! Raw catalog records as returned by the MangaDex API.
//!
//! Only the fields the normalizer reads are modelled. Everything apart from the
//! entity `id` is optional here: absent attributes decode to their defaults and
//! the fallback rules in [`super::normalize`] take over from there.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::models::PageQuality;

/// A locale-keyed string map, kept in the record's own key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedString(Vec<(String, String)>);

impl LocalizedString {
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == locale)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// The API sends `[]` instead of `{}` for an empty map, and a value may be null.
impl<'de> Deserialize<'de> for LocalizedString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(LocalizedString(entries))
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TagAttributes {
    pub name: LocalizedString,
    pub group: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Tag {
    #[serde(default)]
    pub attributes: TagAttributes,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipAttributes {
    pub name: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Relationship {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<Uuid>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub attributes: Option<RelationshipAttributes>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MangaAttributes {
    pub title: LocalizedString,
    pub description: LocalizedString,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<String>,
    pub tags: Vec<Tag>,
    #[serde(deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub updated_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MangaRecord {
    pub id: Uuid,
    #[serde(default)]
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterAttributes {
    #[serde(deserialize_with = "lenient")]
    pub volume: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub chapter: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub translated_language: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub pages: Option<u32>,
    #[serde(deserialize_with = "lenient")]
    pub publish_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChapterRecord {
    pub id: Uuid,
    #[serde(default)]
    pub attributes: ChapterAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Image server handshake for one chapter.
///
/// Unlike the entity records every field here is structural: without them no
/// page URL can be built. Either filename list may be missing; the one the
/// reader asks for is checked when the pages are built.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeServer {
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    pub hash: String,
    #[serde(default)]
    pub data: Option<Vec<String>>,
    #[serde(default)]
    pub data_saver: Option<Vec<String>>,
}

impl AtHomeChapter {
    pub fn filenames(&self, quality: PageQuality) -> Option<&[String]> {
        match quality {
            PageQuality::Data => self.data.as_deref(),
            PageQuality::DataSaver => self.data_saver.as_deref(),
        }
    }
}

/// `{ "data": T }` envelope used by single-entity endpoints.
#[derive(Deserialize, Debug)]
pub struct Entity<T> {
    pub data: T,
}

/// `{ "data": [T], "total": n }` envelope used by list endpoints.
#[derive(Deserialize, Debug)]
pub struct Collection<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Decodes a value, treating anything of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
