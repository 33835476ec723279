//! Filename parsing for library imports.
//!
//! Processors turn a file path into a best-effort guess about the content it
//! holds. Parsing never fails: when no convention matches, the whole file
//! stem becomes a low-confidence title so a metadata search can still run.

mod movie;
mod tv;

pub use movie::MovieProcessor;
pub use tv::TvProcessor;

use reelvault_common::MediaKind;
use std::path::Path;

/// Best-effort parse of a media filename.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGuess {
    /// Cleaned title ready for metadata lookup.
    pub title: String,
    /// Release year if present in the name.
    pub year: Option<u16>,
    /// Season number, for TV content.
    pub season: Option<u16>,
    /// Episode numbers, in order. Multi-episode files carry more than one.
    pub episodes: Vec<u16>,
    /// Absolute episode number for ordering conventions without seasons.
    pub absolute: Option<u32>,
    /// How strongly the filename matched a known convention (0.0 - 1.0).
    pub confidence: f64,
}

impl ParsedGuess {
    /// Fallback guess carrying the whole file stem as the title.
    fn fallback(stem: &str) -> Self {
        Self {
            title: clean_title(stem),
            year: None,
            season: None,
            episodes: Vec::new(),
            absolute: None,
            confidence: 0.3,
        }
    }
}

/// A filename parser for one kind of media.
pub trait FileProcessor: Send + Sync {
    fn media_kind(&self) -> MediaKind;
    fn parse(&self, path: &Path) -> ParsedGuess;
}

/// Dispatch table keyed by [`MediaKind`], built once at startup.
pub struct ProcessorSet {
    movie: MovieProcessor,
    tv: TvProcessor,
}

impl ProcessorSet {
    pub fn new() -> Self {
        Self {
            movie: MovieProcessor::new(),
            tv: TvProcessor::new(),
        }
    }

    pub fn processor(&self, kind: MediaKind) -> &dyn FileProcessor {
        match kind {
            MediaKind::Movie => &self.movie,
            MediaKind::Tv => &self.tv,
        }
    }

    pub fn parse(&self, kind: MediaKind, path: &Path) -> ParsedGuess {
        self.processor(kind).parse(path)
    }
}

impl Default for ProcessorSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize separators and strip bracketed noise from a title fragment.
fn clean_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;

    for ch in raw.chars() {
        match ch {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '.' | '_' | '-' => out.push(' '),
            _ => out.push(ch),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_strips_brackets_and_separators() {
        assert_eq!(clean_title("The.Matrix [1999 remaster]"), "The Matrix");
        assert_eq!(clean_title("some_show-name"), "some show name");
    }

    #[test]
    fn test_dispatch_by_kind() {
        let set = ProcessorSet::new();
        assert_eq!(set.processor(MediaKind::Movie).media_kind(), MediaKind::Movie);
        assert_eq!(set.processor(MediaKind::Tv).media_kind(), MediaKind::Tv);
    }
}
