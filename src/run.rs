use anyhow::Context;
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::catalog::{Catalog, OpenedChapter};
use crate::configuration::Settings;
use crate::mangadex_client::{CatalogSource, HttpCatalogSource};
use crate::models::{CatalogEntry, Command};
use crate::reader::{dispatch, Intent, Key, ReaderEvent, ReaderSession, ReaderSnapshot, ReadingMode};

const READ_HELP: &str = "n: next, p: previous, g <page>: go to page, +/-: skip 5 pages, m: toggle mode, b: back to manga, q: quit";

pub async fn run(command: Command, settings: Settings) -> anyhow::Result<()> {
    match &settings.relay_url {
        Some(relay) => info!("Catalog: {} (through {})", settings.api_base_url, relay),
        None => info!("Catalog: {}", settings.api_base_url),
    }

    let source = HttpCatalogSource::new(&settings).context("Unable to build HTTP client")?;
    let catalog = Catalog::new(source, &settings);

    match command {
        Command::Popular => print_entries(&catalog.popular().await?),
        Command::Search { title, limit } => print_entries(&catalog.search(&title, limit).await?),
        Command::Manga { slug } => println!("{}", catalog.manga_by_slug(&slug).await?),
        Command::Chapters { slug } => {
            let manga = catalog.manga_by_slug(&slug).await?;
            info!("Listing chapters of {}", manga.title);
            for chapter in catalog.chapters(manga.id).await? {
                println!("{}", chapter);
            }
        }
        Command::Pages { slug, chapter } => {
            let opened = catalog.open_chapter(&slug, chapter).await?;
            for url in &opened.pages.urls {
                println!("{}", url);
            }
        }
        Command::Read { slug, chapter } => read(&catalog, slug, chapter).await?,
    }

    info!("Finished!");
    Ok(())
}

fn print_entries(entries: &[CatalogEntry]) {
    for entry in entries {
        println!("{}\n", entry);
    }
}

/// Parses one line typed into the terminal reader.
pub fn parse_read_command(line: &str) -> Option<ReaderEvent> {
    let mut parts = line.split_whitespace();
    let event = match parts.next() {
        None | Some("n") => ReaderEvent::Key(Key::ArrowRight),
        Some("p") => ReaderEvent::Key(Key::ArrowLeft),
        Some("b") => ReaderEvent::Key(Key::Escape),
        Some("m") => ReaderEvent::ToggleMode,
        Some("+") => ReaderEvent::Skip(5),
        Some("-") => ReaderEvent::Skip(-5),
        Some("g") => ReaderEvent::GoTo(parts.next()?.parse().ok()?),
        Some(_) => return None,
    };
    Some(event)
}

fn print_page(opened: &OpenedChapter, snapshot: &ReaderSnapshot) {
    println!(
        "[{}] page {}/{} ({:.0}%)",
        match snapshot.mode {
            ReadingMode::Continuous => "continuous",
            ReadingMode::Paged => "paged",
        },
        snapshot.page,
        snapshot.total_pages,
        snapshot.progress
    );
    match snapshot.mode {
        ReadingMode::Paged => {
            if let Some(url) = opened.pages.page(snapshot.page as usize) {
                println!("{}", url);
            }
        }
        ReadingMode::Continuous => {
            for url in &opened.pages.urls {
                println!("{}", url);
            }
        }
    }
}

async fn read<S: CatalogSource>(
    catalog: &Catalog<S>,
    slug: String,
    mut number: f64,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", READ_HELP);

    loop {
        let mut opened = catalog.open_chapter(&slug, number).await?;
        println!("{} - {}", opened.manga.title, opened.chapter);

        let (events_tx, events_rx) = mpsc::channel(16);
        let (intents_tx, mut intents_rx) = mpsc::channel(4);
        let session = ReaderSession::new(opened.navigator());
        let (snapshots_tx, mut snapshots_rx) = watch::channel(session.snapshot());
        let task = tokio::spawn(session.run(events_rx, intents_tx, snapshots_tx));
        print_page(&opened, &snapshots_rx.borrow());

        let intent = loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break None };
                    if line.trim() == "q" {
                        break None;
                    }
                    let Some(event) = parse_read_command(&line) else {
                        println!("{}", READ_HELP);
                        continue;
                    };

                    if opened.pages.is_stale() {
                        debug!("Page URLs for chapter {} expired, resolving again", opened.chapter.id);
                        opened.pages = catalog.page_set(opened.chapter.id, opened.pages.quality).await?;
                    }

                    let Some(snapshot) = dispatch(&events_tx, &mut snapshots_rx, event).await else {
                        break None;
                    };
                    print_page(&opened, &snapshot);
                }
                intent = intents_rx.recv() => break intent,
            }
        };

        drop(events_tx);
        task.await?;

        match intent {
            Some(Intent::Chapter { number: next, .. }) => number = next,
            Some(Intent::MangaDetail { manga_slug }) => {
                println!("{}", catalog.manga_by_slug(&manga_slug).await?);
                return Ok(());
            }
            None => return Ok(()),
        }
    }
}
