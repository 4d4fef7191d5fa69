//! Chapter reader state: page position, reading mode, input mapping and the
//! auto-hiding controls.

pub mod controls;
pub mod input;
pub mod navigator;
pub mod session;

pub use controls::Controls;
pub use input::{Key, KeyOutcome};
pub use navigator::{Intent, Navigator, ReadingMode};
pub use session::{dispatch, ReaderEvent, ReaderSession, ReaderSnapshot};
