//! Fetch-then-normalize pipelines over a [`CatalogSource`].
//!
//! Each method is an explicit sequence of dependent calls. The first failing
//! step ends the pipeline and its error, carrying the resource it was fetching,
//! is returned as is. Nothing is retried or cached here.

use chrono::Utc;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::configuration::Settings;
use crate::error::{CatalogError, Result};
use crate::mangadex::normalize::{self, NormalizeOptions};
use crate::mangadex::records::{AtHomeServer, ChapterRecord, Collection, Entity, MangaRecord};
use crate::mangadex_client::{CatalogSource, SourceRequest};
use crate::models::{CatalogEntry, ChapterEntry, PageQuality, PageSet};
use crate::reader::Navigator;

const INCLUDES: [&str; 3] = ["cover_art", "author", "artist"];
const CONTENT_RATINGS: [&str; 3] = ["safe", "suggestive", "erotica"];
const FEED_PAGE_SIZE: u32 = 500;
const SLUG_SEARCH_LIMIT: u32 = 10;

/// Everything the reader needs to open one chapter.
#[derive(Debug, Clone)]
pub struct OpenedChapter {
    pub manga: CatalogEntry,
    pub chapter: ChapterEntry,
    pub pages: PageSet,
}

impl OpenedChapter {
    pub fn navigator(&self) -> Navigator {
        Navigator::new(
            self.manga.slug.clone(),
            self.chapter.number,
            self.pages.len() as u32,
        )
    }
}

pub struct Catalog<S> {
    source: S,
    options: NormalizeOptions,
    popular: Vec<Uuid>,
    page_quality: PageQuality,
    page_ttl: Duration,
}

impl<S: CatalogSource> Catalog<S> {
    pub fn new(source: S, settings: &Settings) -> Self {
        Catalog {
            source,
            options: NormalizeOptions::from(settings),
            popular: settings.popular_manga.clone(),
            page_quality: settings.page_quality,
            page_ttl: settings.page_ttl(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn get<T: DeserializeOwned>(&self, request: SourceRequest) -> Result<T> {
        let value: Value = self.source.fetch(&request).await?;
        serde_json::from_value(value).map_err(|e| CatalogError::malformed(request.resource(), e))
    }

    fn normalize_all(&self, records: &[MangaRecord]) -> Vec<CatalogEntry> {
        records
            .iter()
            .map(|record| normalize::normalize_manga(record, &self.options))
            .collect()
    }

    pub async fn search(&self, title: &str, limit: u32) -> Result<Vec<CatalogEntry>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(Vec::new());
        }

        let request = SourceRequest::new("/manga")
            .param("title", title)
            .param("limit", limit)
            .params("includes[]", INCLUDES)
            .params("contentRating[]", CONTENT_RATINGS)
            .param("order[relevance]", "desc");
        let result: Collection<MangaRecord> = self.get(request).await?;
        debug!("Search \"{}\" returned {} manga", title, result.data.len());

        Ok(self.normalize_all(&result.data))
    }

    pub async fn manga(&self, id: Uuid) -> Result<CatalogEntry> {
        let request = SourceRequest::new(format!("/manga/{}", id)).params("includes[]", INCLUDES);
        let result: Entity<MangaRecord> = self.get(request).await?;

        Ok(normalize::normalize_manga(&result.data, &self.options))
    }

    pub async fn manga_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = SourceRequest::new("/manga")
            .params("ids[]", ids)
            .params("includes[]", INCLUDES)
            .param("limit", ids.len());
        let result: Collection<MangaRecord> = self.get(request).await?;

        Ok(self.normalize_all(&result.data))
    }

    pub async fn popular(&self) -> Result<Vec<CatalogEntry>> {
        self.manga_by_ids(&self.popular).await
    }

    /// Looks a manga up by slug. Slugs are not unique upstream: when several
    /// titles derive the same slug, the first search hit wins. A slug that is
    /// a manga id (titles with no latin characters) is fetched directly.
    pub async fn manga_by_slug(&self, slug: &str) -> Result<CatalogEntry> {
        if let Ok(id) = slug.parse::<Uuid>() {
            return self.manga(id).await;
        }

        let query = slug.replace('-', " ");
        self.search(&query, SLUG_SEARCH_LIMIT)
            .await?
            .into_iter()
            .find(|entry| entry.slug == slug)
            .ok_or_else(|| CatalogError::not_found(format!("manga with slug {}", slug)))
    }

    /// All chapters in the preferred locale, ascending by chapter number.
    pub async fn chapters(&self, manga_id: Uuid) -> Result<Vec<ChapterEntry>> {
        let mut offset: u32 = 0;
        let mut records: Vec<ChapterRecord> = Vec::new();
        loop {
            let request = SourceRequest::new(format!("/manga/{}/feed", manga_id))
                .params("translatedLanguage[]", [self.options.locale.as_str()])
                .param("order[chapter]", "asc")
                .param("limit", FEED_PAGE_SIZE)
                .param("offset", offset);
            let mut result: Collection<ChapterRecord> = self.get(request).await?;
            let fetched = result.data.len() as u32;
            records.append(&mut result.data);

            offset += FEED_PAGE_SIZE;
            let total = result.total.unwrap_or(0);
            if fetched == 0 || offset >= total {
                break;
            }
        }

        let mut chapters: Vec<ChapterEntry> = records
            .iter()
            .map(|record| normalize::normalize_chapter(record, manga_id))
            .collect();
        ChapterEntry::sort_for_display(&mut chapters);
        debug!("Manga {} has {} chapters", manga_id, chapters.len());

        Ok(chapters)
    }

    pub async fn chapter(&self, id: Uuid) -> Result<ChapterEntry> {
        let request = SourceRequest::new(format!("/chapter/{}", id));
        let resource = request.resource();
        let result: Entity<ChapterRecord> = self.get(request).await?;
        let manga_id = normalize::owning_manga(&result.data)
            .ok_or_else(|| CatalogError::malformed(resource, "chapter has no manga relationship"))?;

        Ok(normalize::normalize_chapter(&result.data, manga_id))
    }

    /// First chapter whose parsed number equals `number`.
    pub async fn find_chapter(&self, manga_id: Uuid, number: f64) -> Result<ChapterEntry> {
        self.chapters(manga_id)
            .await?
            .into_iter()
            .find(|chapter| chapter.number == number)
            .ok_or_else(|| {
                CatalogError::not_found(format!("chapter {} of manga {}", number, manga_id))
            })
    }

    /// Image server handshake, then one URL per page in server order.
    pub async fn page_set(&self, chapter_id: Uuid, quality: PageQuality) -> Result<PageSet> {
        let request = SourceRequest::new(format!("/at-home/server/{}", chapter_id));
        let resource = request.resource();
        let at_home: AtHomeServer = self.get(request).await?;

        let filenames = at_home.chapter.filenames(quality).ok_or_else(|| {
            let field = match quality {
                PageQuality::Data => "data",
                PageQuality::DataSaver => "dataSaver",
            };
            CatalogError::malformed(resource.clone(), format!("missing chapter.{}", field))
        })?;
        let urls = normalize::build_page_set_with_quality(
            &at_home.base_url,
            &at_home.chapter.hash,
            filenames,
            quality,
        )
        .map_err(|e| CatalogError::malformed(resource, format!("invalid baseUrl: {}", e)))?;
        debug!("Chapter {} resolved to {} pages", chapter_id, urls.len());

        Ok(PageSet {
            chapter_id,
            quality,
            urls,
            fetched_at: Utc::now(),
            ttl: self.page_ttl,
        })
    }

    /// Slug, then manga, then its chapters, then the page handshake.
    pub async fn open_chapter(&self, slug: &str, number: f64) -> Result<OpenedChapter> {
        info!("Opening {} chapter {}", slug, number);
        let manga = self.manga_by_slug(slug).await?;
        let chapter = self.find_chapter(manga.id, number).await?;
        let pages = self.page_set(chapter.content_ref.0, self.page_quality).await?;

        Ok(OpenedChapter {
            manga,
            chapter,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const TOG: &str = "304ceac3-8cdb-4fe7-acf7-2b6ff7a60613";
    const CH1: &str = "b77668ed-0810-4327-9684-46ca371e370e";
    const CH2: &str = "69060a67-1d4e-4110-9d29-838bfd99917f";

    /// Answers by path and records every request it sees.
    #[derive(Default)]
    struct FakeSource {
        responses: Vec<(String, Result<Value>)>,
        seen: Mutex<Vec<SourceRequest>>,
    }

    impl FakeSource {
        fn with(mut self, path: &str, value: Value) -> Self {
            self.responses.push((path.to_string(), Ok(value)));
            self
        }

        fn failing(mut self, path: &str, error: CatalogError) -> Self {
            self.responses.push((path.to_string(), Err(error)));
            self
        }

        fn paths(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch(&self, request: &SourceRequest) -> Result<Value> {
            self.seen.lock().unwrap().push(request.clone());
            let offset = request
                .params
                .iter()
                .find(|(k, _)| k == "offset")
                .map(|(_, v)| v.clone());
            let key = match offset {
                Some(offset) => format!("{}@{}", request.path, offset),
                None => request.path.clone(),
            };
            match self
                .responses
                .iter()
                .find(|(path, _)| *path == key || *path == request.path)
            {
                Some((_, Ok(value))) => Ok(value.clone()),
                Some((_, Err(CatalogError::NotFound { resource }))) => {
                    Err(CatalogError::not_found(resource.clone()))
                }
                Some((_, Err(e))) => Err(CatalogError::UpstreamFailure {
                    resource: request.resource(),
                    status: Some(503),
                    reason: e.to_string(),
                }),
                None => Err(CatalogError::not_found(request.resource())),
            }
        }
    }

    fn catalog(source: FakeSource) -> Catalog<FakeSource> {
        Catalog::new(source, &Settings::default())
    }

    fn manga_json(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "type": "manga",
            "attributes": {
                "title": {"en": title},
                "description": [],
                "status": "completed",
                "tags": [
                    {"attributes": {"group": "genre", "name": {"en": "Action"}}},
                    {"attributes": {"group": "theme", "name": {"en": "School"}}}
                ]
            },
            "relationships": [
                {"id": "37f5cce0-8070-4ada-96e5-fa24b1bd4ff9", "type": "author", "attributes": {"name": "SIU"}},
                {"id": "0aea9f43-d85a-40e7-b1f3-7f3d21a4d706", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}}
            ]
        })
    }

    fn chapter_json(id: &str, number: &str) -> Value {
        json!({
            "id": id,
            "type": "chapter",
            "attributes": {"chapter": number, "pages": 2, "translatedLanguage": "en"},
            "relationships": [{"id": TOG, "type": "manga"}]
        })
    }

    fn at_home_json() -> Value {
        json!({
            "result": "ok",
            "baseUrl": "https://node.example.net/token",
            "chapter": {"hash": "abc", "data": ["1.png", "2.png"], "dataSaver": ["1.jpg", "2.jpg"]}
        })
    }

    #[tokio::test]
    async fn search_normalizes_results() {
        let source = FakeSource::default().with(
            "/manga",
            json!({"data": [manga_json(TOG, "Tower of God")], "total": 1}),
        );
        let catalog = catalog(source);
        let results = catalog.search("tower", 20).await.unwrap();

        assert_eq!(1, results.len());
        let entry = &results[0];
        assert_eq!("tower-of-god", entry.slug);
        assert_eq!("No description available", entry.description);
        assert_eq!(vec!["Action"], entry.genres);
        assert!(entry.cover_url.ends_with("/cover.jpg512.jpg"));

        let seen = catalog.source().seen.lock().unwrap();
        let params = &seen[0].params;
        assert!(params.contains(&("title".into(), "tower".into())));
        assert!(params.contains(&("includes[]".into(), "cover_art".into())));
        assert!(params.contains(&("contentRating[]".into(), "erotica".into())));
    }

    #[tokio::test]
    async fn blank_search_skips_fetch() {
        let catalog = catalog(FakeSource::default());
        assert!(catalog.search("   ", 20).await.unwrap().is_empty());
        assert!(catalog.manga_by_ids(&[]).await.unwrap().is_empty());
        assert!(catalog.source().paths().is_empty());
    }

    #[tokio::test]
    async fn manga_by_slug_requires_exact_slug() {
        let source = FakeSource::default().with(
            "/manga",
            json!({"data": [
                manga_json(CH2, "Tower of God: Side Story"),
                manga_json(TOG, "Tower of God"),
            ]}),
        );
        let catalog = catalog(source);

        let entry = catalog.manga_by_slug("tower-of-god").await.unwrap();
        assert_eq!(TOG, entry.id.to_string());

        let err = catalog.manga_by_slug("tower-of-dog").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn chapters_page_through_feed() {
        let feed = format!("/manga/{}/feed", TOG);
        let source = FakeSource::default()
            .with(
                &format!("{}@0", feed),
                json!({"data": [chapter_json(CH2, "10"), chapter_json(CH1, "2")], "total": 501}),
            )
            .with(
                &format!("{}@500", feed),
                json!({"data": [chapter_json(CH1, "oneshot")], "total": 501}),
            );
        let catalog = catalog(source);
        let chapters = catalog.chapters(TOG.parse().unwrap()).await.unwrap();

        let numbers: Vec<f64> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(vec![0.0, 2.0, 10.0], numbers);
        assert_eq!(vec![feed.clone(), feed], catalog.source().paths());
    }

    #[tokio::test]
    async fn missing_chapter_is_not_found() {
        let feed = format!("/manga/{}/feed", TOG);
        let source = FakeSource::default()
            .with(&feed, json!({"data": [chapter_json(CH1, "1")], "total": 1}));
        let catalog = catalog(source);

        let err = catalog.find_chapter(TOG.parse().unwrap(), 4.0).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
        assert!(err.resource().contains("chapter 4"));
    }

    #[tokio::test]
    async fn page_set_from_handshake() {
        let source = FakeSource::default().with(&format!("/at-home/server/{}", CH1), at_home_json());
        let catalog = catalog(source);
        let id: Uuid = CH1.parse().unwrap();

        let pages = catalog.page_set(id, PageQuality::Data).await.unwrap();
        let urls: Vec<_> = pages.urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            vec![
                "https://node.example.net/token/data/abc/1.png",
                "https://node.example.net/token/data/abc/2.png"
            ],
            urls
        );
        assert_eq!(Duration::from_secs(3600), pages.ttl);
        assert!(!pages.is_stale());

        let pages = catalog.page_set(id, PageQuality::DataSaver).await.unwrap();
        assert_eq!(
            "https://node.example.net/token/data-saver/abc/1.jpg",
            pages.page(1).unwrap().as_str()
        );
    }

    #[tokio::test]
    async fn handshake_without_base_url_is_malformed() {
        let path = format!("/at-home/server/{}", CH1);
        let source = FakeSource::default().with(
            &path,
            json!({"result": "ok", "chapter": {"hash": "abc", "data": ["1.png"]}}),
        );
        let catalog = catalog(source);

        let err = catalog
            .page_set(CH1.parse().unwrap(), PageQuality::Data)
            .await
            .unwrap_err();
        match err {
            CatalogError::MalformedResponse { resource, .. } => assert_eq!(path, resource),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_chapter_runs_every_step() {
        let source = FakeSource::default()
            .with("/manga", json!({"data": [manga_json(TOG, "Tower of God")]}))
            .with(
                &format!("/manga/{}/feed", TOG),
                json!({"data": [chapter_json(CH1, "1"), chapter_json(CH2, "2")], "total": 2}),
            )
            .with(&format!("/at-home/server/{}", CH2), at_home_json());
        let catalog = catalog(source);

        let opened = catalog.open_chapter("tower-of-god", 2.0).await.unwrap();
        assert_eq!("Tower of God", opened.manga.title);
        assert_eq!(CH2, opened.chapter.id.to_string());
        assert_eq!(2, opened.pages.len());

        let navigator = opened.navigator();
        assert_eq!(1, navigator.page());
        assert_eq!(2, navigator.total_pages());
        assert_eq!(
            vec![
                "/manga".to_string(),
                format!("/manga/{}/feed", TOG),
                format!("/at-home/server/{}", CH2)
            ],
            catalog.source().paths()
        );
    }

    #[tokio::test]
    async fn open_chapter_stops_at_first_failure() {
        let source = FakeSource::default()
            .with("/manga", json!({"data": [manga_json(TOG, "Tower of God")]}))
            .failing(
                &format!("/manga/{}/feed", TOG),
                CatalogError::malformed("feed", "unavailable"),
            );
        let catalog = catalog(source);

        let err = catalog.open_chapter("tower-of-god", 1.0).await.unwrap_err();
        assert!(matches!(err, CatalogError::UpstreamFailure { status: Some(503), .. }));
        // The handshake is never attempted
        assert_eq!(2, catalog.source().paths().len());
    }

    #[tokio::test]
    async fn manga_by_id_and_popular() {
        let source = FakeSource::default()
            .with(&format!("/manga/{}", TOG), json!({"data": manga_json(TOG, "Tower of God")}))
            .with("/manga", json!({"data": [manga_json(TOG, "Tower of God")]}));
        let catalog = catalog(source);

        let entry = catalog.manga(TOG.parse().unwrap()).await.unwrap();
        assert_eq!("SIU", entry.author);

        let popular = catalog.popular().await.unwrap();
        assert_eq!(1, popular.len());
        let seen = catalog.source().seen.lock().unwrap();
        let ids = seen[1].params.iter().filter(|(k, _)| k == "ids[]").count();
        assert_eq!(8, ids);
        assert!(seen[1].params.contains(&("limit".into(), "8".into())));
    }

    #[tokio::test]
    async fn id_slug_resolves_by_id() {
        let mut record = manga_json(TOG, "");
        record["attributes"]["title"] = json!({"ja": "神之塔"});
        let source = FakeSource::default()
            .with(&format!("/manga/{}", TOG), json!({"data": record.clone()}))
            .with("/manga", json!({"data": [record]}));
        let catalog = catalog(source);

        let popular = catalog.popular().await.unwrap();
        assert_eq!(TOG, popular[0].slug);

        let entry = catalog.manga_by_slug(&popular[0].slug).await.unwrap();
        assert_eq!(TOG, entry.id.to_string());
        assert_eq!("神之塔", entry.title);
        assert_eq!(
            vec!["/manga".to_string(), format!("/manga/{}", TOG)],
            catalog.source().paths()
        );
    }

    #[tokio::test]
    async fn missing_page_list_is_malformed() {
        let path = format!("/at-home/server/{}", CH1);
        let source = FakeSource::default().with(
            &path,
            json!({"baseUrl": "https://node.example.net", "chapter": {"hash": "abc", "data": ["1.png"]}}),
        );
        let catalog = catalog(source);
        let id: Uuid = CH1.parse().unwrap();

        assert_eq!(1, catalog.page_set(id, PageQuality::Data).await.unwrap().len());
        match catalog.page_set(id, PageQuality::DataSaver).await.unwrap_err() {
            CatalogError::MalformedResponse { resource, detail } => {
                assert_eq!(path, resource);
                assert_eq!("missing chapter.dataSaver", detail);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn chapter_by_id_takes_owning_manga() {
        let source = FakeSource::default()
            .with(&format!("/chapter/{}", CH1), json!({"data": chapter_json(CH1, "3")}))
            .with(
                &format!("/chapter/{}", CH2),
                json!({"data": {"id": CH2, "attributes": {"chapter": "4"}, "relationships": []}}),
            );
        let catalog = catalog(source);

        let chapter = catalog.chapter(CH1.parse().unwrap()).await.unwrap();
        assert_eq!(TOG, chapter.manga_id.to_string());
        assert_eq!(3.0, chapter.number);

        let err = catalog.chapter(CH2.parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, CatalogError::MalformedResponse { .. }));
        assert_eq!(format!("/chapter/{}", CH2), err.resource());
    }

    #[tokio::test]
    async fn unknown_chapter_by_id_is_not_found() {
        let catalog = catalog(FakeSource::default());
        let err = catalog.chapter(CH1.parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }
}
