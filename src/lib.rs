pub mod catalog;
pub mod configuration;
pub mod error;
pub mod mangadex;
pub mod mangadex_client;
pub mod models;
pub mod reader;
pub mod run;

pub use catalog::{Catalog, OpenedChapter};
pub use configuration::Settings;
pub use error::CatalogError;
pub use mangadex_client::{CatalogSource, HttpCatalogSource, SourceRequest};
pub use models::Cli;
pub use run::run;
