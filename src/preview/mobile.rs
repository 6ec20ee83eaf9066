//! What to show, especially where there is no pointer hover.

use super::PreviewState;

/// Mobile behavior once a preview is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilePolicy {
    /// Show the poster; play when the user taps it.
    Poster,
    /// No poster to show, so start a muted preview right away.
    MutedAutoplay,
}

impl MobilePolicy {
    pub fn choose(poster_url: Option<&str>) -> Self {
        match poster_url {
            Some(p) if !p.trim().is_empty() => MobilePolicy::Poster,
            _ => MobilePolicy::MutedAutoplay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Loading placeholder, nothing to show yet.
    Placeholder,
    Poster,
    Video,
    Error,
}

pub fn presentation(state: PreviewState, playing: bool, poster_url: Option<&str>) -> Presentation {
    let has_poster = poster_url.is_some_and(|p| !p.trim().is_empty());
    match state {
        PreviewState::PlaybackError => Presentation::Error,
        PreviewState::Ready if playing || !has_poster => Presentation::Video,
        _ if has_poster => Presentation::Poster,
        _ => Presentation::Placeholder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_depends_on_poster() {
        assert_eq!(MobilePolicy::choose(Some("https://cdn/p.jpg")), MobilePolicy::Poster);
        assert_eq!(MobilePolicy::choose(Some("  ")), MobilePolicy::MutedAutoplay);
        assert_eq!(MobilePolicy::choose(None), MobilePolicy::MutedAutoplay);
    }

    #[test]
    fn test_presentation() {
        let poster = Some("p.jpg");
        assert_eq!(presentation(PreviewState::Resolving, false, None), Presentation::Placeholder);
        assert_eq!(presentation(PreviewState::Resolving, false, poster), Presentation::Poster);
        assert_eq!(presentation(PreviewState::Ready, false, poster), Presentation::Poster);
        assert_eq!(presentation(PreviewState::Ready, true, poster), Presentation::Video);
        assert_eq!(presentation(PreviewState::Ready, false, None), Presentation::Video);
        assert_eq!(presentation(PreviewState::PlaybackError, false, poster), Presentation::Error);
    }
}
