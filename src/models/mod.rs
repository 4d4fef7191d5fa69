pub mod catalog;
pub mod cli;
pub mod pages;

pub use catalog::{
    CatalogEntry, ChapterContentRef, ChapterEntry, CoverSize, DisplayMetrics, MangaStatus,
};
pub use cli::{Cli, Command};
pub use pages::{PageQuality, PageSet};
