use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;
use url::Url;
use uuid::{uuid, Uuid};

use crate::models::{CoverSize, PageQuality};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,
    #[serde(default = "default_uploads_base_url")]
    pub uploads_base_url: Url,
    /// Pass-through relay used when the catalog can't be reached directly.
    #[serde(default)]
    pub relay_url: Option<Url>,
    /// Prefix that cover URLs are url-encoded onto, e.g. `https://proxy/raw?url=`.
    #[serde(default)]
    pub image_proxy: Option<String>,
    #[serde(default = "default_placeholder_cover")]
    pub placeholder_cover: String,
    #[serde(default = "default_preferred_locale")]
    pub preferred_locale: String,
    #[serde(default)]
    pub cover_size: CoverSize,
    #[serde(default)]
    pub page_quality: PageQuality,
    #[serde(default = "default_page_ttl_secs")]
    pub page_ttl_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_popular_manga")]
    pub popular_manga: Vec<Uuid>,
}

impl Settings {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(Environment::with_prefix("MANGA_READER"))
            .build()?;
        builder.try_deserialize()
    }

    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: default_api_base_url(),
            uploads_base_url: default_uploads_base_url(),
            relay_url: None,
            image_proxy: None,
            placeholder_cover: default_placeholder_cover(),
            preferred_locale: default_preferred_locale(),
            cover_size: CoverSize::default(),
            page_quality: PageQuality::default(),
            page_ttl_secs: default_page_ttl_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            popular_manga: default_popular_manga(),
        }
    }
}

fn default_api_base_url() -> Url {
    Url::parse("https://api.mangadex.org").expect("static url")
}

fn default_uploads_base_url() -> Url {
    Url::parse("https://uploads.mangadex.org").expect("static url")
}

fn default_placeholder_cover() -> String {
    "/placeholder.svg".into()
}

fn default_preferred_locale() -> String {
    "en".into()
}

// Handshake grants expire after roughly an hour
fn default_page_ttl_secs() -> u64 {
    60 * 60
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into()
}

fn default_popular_manga() -> Vec<Uuid> {
    vec![
        uuid!("32d76d19-8a05-4db0-9fc2-e0b0648fe9d0"),
        uuid!("304ceac3-8cdb-4fe7-acf7-2b6ff7a60613"),
        uuid!("b0b721ff-c388-4486-aa0f-c2b0bb321512"),
        uuid!("58bc83a0-1808-484e-88b9-17e167469e23"),
        uuid!("0aea9f43-d85a-40e7-b1f3-7f3d21a4d706"),
        uuid!("37f5cce0-8070-4ada-96e5-fa24b1bd4ff9"),
        uuid!("a1c7c817-4e59-43b7-9365-09675a149a6f"),
        uuid!("d1a9fdeb-f713-407f-960c-8326b586e6fd"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config() {
        let c = Settings::new("reader.test.json").unwrap();

        assert_eq!("https://api.example.org/", c.api_base_url.as_str());
        assert_eq!(
            Some("https://relay.example.org/functions/v1/mangadex-proxy"),
            c.relay_url.as_ref().map(Url::as_str)
        );
        assert_eq!("ja", c.preferred_locale);
        assert_eq!(CoverSize::Small, c.cover_size);
        assert_eq!(PageQuality::DataSaver, c.page_quality);
        assert_eq!(1, c.max_retries);

        let popular = vec![
            uuid!("32d76d19-8a05-4db0-9fc2-e0b0648fe9d0"),
            uuid!("304ceac3-8cdb-4fe7-acf7-2b6ff7a60613"),
        ];
        assert_eq!(popular, c.popular_manga);

        // Keys absent from the file fall back to defaults
        assert_eq!("https://uploads.mangadex.org/", c.uploads_base_url.as_str());
        assert_eq!("/placeholder.svg", c.placeholder_cover);
        assert_eq!(Duration::from_secs(3600), c.page_ttl());
        assert_eq!(None, c.image_proxy);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let c = Settings::new("does-not-exist").unwrap();
        let d = Settings::default();

        assert_eq!(d.api_base_url, c.api_base_url);
        assert_eq!(d.preferred_locale, c.preferred_locale);
        assert_eq!(8, c.popular_manga.len());
        assert_eq!(CoverSize::Medium, c.cover_size);
        assert_eq!(PageQuality::Data, c.page_quality);
    }
}
