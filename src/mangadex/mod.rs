pub mod normalize;
pub mod records;

pub use normalize::{CoverTemplate, CreatorRole, NormalizeOptions};
pub use records::{AtHomeServer, ChapterRecord, MangaRecord};
