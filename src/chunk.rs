//! Text chunking and spoken-time estimation.
//!
//! Long input text is cut into bounded pieces before generation because the
//! neural backend is only reliable up to roughly 14 seconds of speech per
//! call.  Two splitting modes exist:
//!
//! - **by words** — group every `split_words` whitespace-delimited words,
//!   re-joined with single spaces (original formatting is not preserved);
//! - **by lines** — group every `split_lines` non-blank lines, re-joined
//!   with newlines.
//!
//! Word mode takes precedence when both counts are positive; with both at
//! zero the input passes through as a single chunk.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default speaking rate used by [`estimate_spoken_time`].
pub const DEFAULT_WPM: f32 = 150.0;

/// Chunk length (seconds) beyond which the backend becomes unreliable.
pub const DEFAULT_TIME_LIMIT: f32 = 14.0;

/// Split `text` into generation-sized chunks.
///
/// Word mode collapses all intra-chunk whitespace to single spaces; line
/// mode drops blank and whitespace-only lines entirely.  Empty input in
/// word mode yields an empty vector (there are no words to group).
pub fn split_text(text: &str, split_words: usize, split_lines: usize) -> Vec<String> {
    if split_words > 0 {
        let words: Vec<&str> = text.split_whitespace().collect();
        words
            .chunks(split_words)
            .map(|group| group.join(" "))
            .collect()
    } else if split_lines > 0 {
        let lines: Vec<&str> = text
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .collect();
        lines
            .chunks(split_lines)
            .map(|group| group.join("\n"))
            .collect()
    } else {
        vec![text.to_string()]
    }
}

/// Bracketed spans like `[laughs]` or `[clears throat]` are stage
/// directions for the model, not spoken words.
static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

/// Advisory spoken-duration estimate for one chunk of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpokenTime {
    /// Estimated duration in seconds at the given words-per-minute rate.
    pub seconds: f32,
    /// True iff `seconds` strictly exceeds the supplied time limit.
    pub over_limit: bool,
}

/// Estimate how long `text` takes to speak at `wpm` words per minute.
///
/// Bracketed annotation spans are stripped before counting words.  The
/// result is advisory only — it never blocks generation, it just lets the
/// caller warn that a chunk is likely too long for the backend.
pub fn estimate_spoken_time(text: &str, wpm: f32, time_limit: f32) -> SpokenTime {
    let spoken = RE_BRACKETED.replace_all(text, "");
    let word_count = spoken.split_whitespace().count();
    let seconds = (word_count as f32 / wpm) * 60.0;
    SpokenTime { seconds, over_limit: seconds > time_limit }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
