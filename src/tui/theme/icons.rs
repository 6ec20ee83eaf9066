//! Nerd Font glyphs (https://www.nerdfonts.com)

#[derive(Debug, Clone)]
pub struct Icons {
    pub play: &'static str,
    pub pause: &'static str,
    pub idle: &'static str,
    pub video: &'static str,
    pub help: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub selected: &'static str,
    pub bullet: &'static str,
}

impl Icons {
    pub const fn nerd() -> Self {
        Self {
            play: "\u{f04b}",     // nf-fa-play
            pause: "\u{f04c}",    // nf-fa-pause
            idle: "\u{f10c}",     // nf-fa-circle_o
            video: "\u{f03d}",    // nf-fa-video_camera
            help: "\u{f059}",     // nf-fa-question_circle
            success: "\u{f00c}",  // nf-fa-check
            error: "\u{f00d}",    // nf-fa-times
            selected: "\u{f054} ", // nf-fa-chevron_right
            bullet: "•",
        }
    }
}

/// Loading spinner frames
pub struct LoadingSpinner;

impl LoadingSpinner {
    pub const BRAILLE: [&'static str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

    /// One frame per tick.
    pub fn frame(tick: u64) -> &'static str {
        Self::BRAILLE[tick as usize % Self::BRAILLE.len()]
    }
}
