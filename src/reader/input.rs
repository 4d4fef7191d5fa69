use super::navigator::{Intent, Navigator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Space,
    Escape,
    Other,
}

impl Key {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Key {
        match name {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            " " | "Space" | "Spacebar" => Key::Space,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyOutcome {
    pub intent: Option<Intent>,
    /// Whether the host should suppress the key's default action (scrolling).
    pub prevent_default: bool,
}

impl Navigator {
    pub fn key(&mut self, key: Key) -> KeyOutcome {
        let (intent, prevent_default) = match key {
            Key::ArrowRight | Key::Space => (self.advance(), true),
            Key::ArrowLeft => (self.retreat(), true),
            Key::Escape => (Some(self.detail_intent()), false),
            Key::Other => (None, false),
        };
        KeyOutcome {
            intent,
            prevent_default,
        }
    }

    /// Click on the page surface: right half advances, anything else retreats.
    pub fn click(&mut self, x: f64, width: f64) -> Option<Intent> {
        if x > width / 2.0 {
            self.advance()
        } else {
            self.retreat()
        }
    }
}
