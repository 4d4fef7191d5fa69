use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Browse and read manga from the MangaDex catalog")]
pub struct Cli {
    #[arg(short, long, default_value = "manga-reader")]
    pub config_file: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the featured manga from the configuration
    Popular,
    /// Search the catalog by title
    Search {
        title: String,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one manga
    Manga { slug: String },
    /// List a manga's chapters
    Chapters { slug: String },
    /// Print the page image URLs of a chapter
    Pages { slug: String, chapter: f64 },
    /// Read a chapter page by page from the terminal
    Read { slug: String, chapter: f64 },
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
