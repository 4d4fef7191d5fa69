use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    /// All pages stacked in one vertical scroll.
    #[default]
    Continuous,
    /// One page at a time.
    Paged,
}

impl ReadingMode {
    pub fn toggled(self) -> Self {
        match self {
            ReadingMode::Continuous => ReadingMode::Paged,
            ReadingMode::Paged => ReadingMode::Continuous,
        }
    }
}

/// A navigation request for the router. The navigator never checks that the
/// target exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Chapter { manga_slug: String, number: f64 },
    MangaDetail { manga_slug: String },
}

/// Page position inside one chapter. Lives as long as the chapter view.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    manga_slug: String,
    chapter_number: f64,
    page: u32,
    total_pages: u32,
    mode: ReadingMode,
}

impl Navigator {
    pub fn new(manga_slug: impl Into<String>, chapter_number: f64, total_pages: u32) -> Self {
        Navigator {
            manga_slug: manga_slug.into(),
            chapter_number,
            page: 1,
            total_pages,
            mode: ReadingMode::default(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn manga_slug(&self) -> &str {
        &self.manga_slug
    }

    pub fn chapter_number(&self) -> f64 {
        self.chapter_number
    }

    // Chapter routes are addressed by whole numbers, so 12.5 steps to 13 and 11.
    fn adjacent_chapter(&self, offset: f64) -> f64 {
        self.chapter_number.trunc() + offset
    }

    fn chapter_intent(&self, number: f64) -> Intent {
        Intent::Chapter {
            manga_slug: self.manga_slug.clone(),
            number,
        }
    }

    pub fn detail_intent(&self) -> Intent {
        Intent::MangaDetail {
            manga_slug: self.manga_slug.clone(),
        }
    }

    pub fn advance(&mut self) -> Option<Intent> {
        if self.page < self.total_pages {
            self.page += 1;
            return None;
        }
        Some(self.chapter_intent(self.adjacent_chapter(1.0)))
    }

    pub fn retreat(&mut self) -> Option<Intent> {
        if self.page > 1 {
            self.page -= 1;
            return None;
        }
        let previous = self.adjacent_chapter(-1.0);
        if previous > 0.0 {
            Some(self.chapter_intent(previous))
        } else {
            None
        }
    }

    /// Jumps to a page, clamped into the chapter. An empty chapter stays on page 1.
    pub fn go_to(&mut self, page: i64) {
        let last = i64::from(self.total_pages.max(1));
        self.page = page.clamp(1, last) as u32;
    }

    pub fn skip(&mut self, delta: i64) {
        self.go_to(i64::from(self.page) + delta);
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn progress(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        f64::from(self.page) / f64::from(self.total_pages) * 100.0
    }
}
