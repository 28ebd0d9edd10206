//! Menu callback payloads (`video|<id>`, `audio|bestaudio`, `search|<url>`, `ignore`).

use crate::media::{JobKind, BEST_AUDIO};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Select { kind: JobKind, variant_id: String },
    Search { url: String },
    Ignore,
}

impl CallbackAction {
    /// Parses callback data; `None` for anything malformed.
    pub fn parse(data: &str) -> Option<Self> {
        if data == "ignore" {
            return Some(CallbackAction::Ignore);
        }
        let (tag, value) = data.split_once('|')?;
        if value.is_empty() {
            return None;
        }
        match tag {
            "search" => Some(CallbackAction::Search {
                url: value.to_string(),
            }),
            _ => JobKind::parse(tag).map(|kind| CallbackAction::Select {
                kind,
                variant_id: value.to_string(),
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Select { kind, variant_id } => format!("{}|{}", kind.as_str(), variant_id),
            CallbackAction::Search { url } => format!("search|{url}"),
            CallbackAction::Ignore => "ignore".to_string(),
        }
    }

    pub fn video(variant_id: &str) -> Self {
        CallbackAction::Select {
            kind: JobKind::Video,
            variant_id: variant_id.to_string(),
        }
    }

    pub fn best_audio() -> Self {
        CallbackAction::Select {
            kind: JobKind::Audio,
            variant_id: BEST_AUDIO.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_payloads() {
        assert_eq!(CallbackAction::parse("video|137"), Some(CallbackAction::video("137")));
        assert_eq!(CallbackAction::parse("audio|bestaudio"), Some(CallbackAction::best_audio()));
        assert_eq!(
            CallbackAction::parse("search|https://e.com/watch?v=a|b"),
            Some(CallbackAction::Search {
                url: "https://e.com/watch?v=a|b".into()
            })
        );
        assert_eq!(CallbackAction::parse("ignore"), Some(CallbackAction::Ignore));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "video", "video|", "gif|1", "|x", "ignore|x"] {
            assert_eq!(CallbackAction::parse(bad), None, "{bad}");
        }
    }

    #[test]
    fn encode_matches_parse() {
        for action in [
            CallbackAction::video("22"),
            CallbackAction::best_audio(),
            CallbackAction::Search {
                url: "https://e.com/x".into(),
            },
            CallbackAction::Ignore,
        ] {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }
}
