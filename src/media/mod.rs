//! Media references and locally allocated ephemeral handles.

pub mod handles;

pub use handles::HandleRegistry;

use std::fmt;

/// Scheme prefix of process-local handles. Locations carrying it are
/// playable verbatim and never go through the storage service.
pub const EPHEMERAL_SCHEME: &str = "blob:";

/// A stored media location, either a stable backend reference or an
/// ephemeral process-local handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaReference {
    location: String,
    ephemeral: bool,
}

impl MediaReference {
    /// Classify a location by its scheme.
    pub fn parse(location: impl Into<String>) -> Self {
        let location = location.into();
        let ephemeral = location.starts_with(EPHEMERAL_SCHEME);
        Self {
            location,
            ephemeral,
        }
    }

    pub fn ephemeral(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ephemeral: true,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detects_blob_scheme() {
        assert!(MediaReference::parse("blob:abc").is_ephemeral());
        assert!(!MediaReference::parse("media-42").is_ephemeral());
        assert!(!MediaReference::parse("https://cdn/ex.mp4").is_ephemeral());
    }

    #[test]
    fn test_display_is_location() {
        let r = MediaReference::parse("clips/a.mp4");
        assert_eq!(r.to_string(), "clips/a.mp4");
    }
}
