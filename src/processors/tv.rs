//! TV episode filename parsing.

use regex::Regex;
use reelvault_common::MediaKind;
use std::path::Path;
use std::sync::LazyLock;

use super::{clean_title, stem_of, FileProcessor, ParsedGuess};

/// SxxEyy with optional extra episodes (S01E01E02) or ranges (S01E01-E03).
static SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)S(\d{1,4})[ ._]?E(\d{1,4})((?:[ ._-]*E\d{1,4})*)").unwrap()
});

/// Trailing episode tokens; the separator decides concatenation vs. range.
static EXTRA_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([ ._-]*)E(\d{1,4})").unwrap());

/// 1x05 convention. Season capped at two digits so 1920x1080 never matches.
static SEASON_X_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[ ._(\[-])(\d{1,2})x(\d{2,3})(?:[ ._)\]-]|$)").unwrap());

/// Verbose "Season 1 Episode 5" form.
static SEASON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Season[ ._]*(\d{1,4})[ ._]*Episode[ ._]*(\d{1,4})").unwrap()
});

/// Absolute numbering, e.g. "Show - 103". Anchored to the end of the stem so
/// years inside titles are not mistaken for episode numbers.
static ABSOLUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_ ]+(\d{1,4})\s*$").unwrap());

/// Parses episode filenames in scene and library naming conventions.
///
/// Conventions are tried from most to least specific; the first hit wins.
#[derive(Debug, Default)]
pub struct TvProcessor;

impl TvProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl FileProcessor for TvProcessor {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Tv
    }

    fn parse(&self, path: &Path) -> ParsedGuess {
        let stem = stem_of(path);

        if let Some(caps) = SEASON_EPISODE.captures(stem) {
            let season: Option<u16> = caps[1].parse().ok();
            let mut episodes: Vec<u16> = Vec::new();
            if let Ok(ep) = caps[2].parse() {
                episodes.push(ep);
            }
            if let Some(extra) = caps.get(3) {
                for extra_caps in EXTRA_EPISODE.captures_iter(extra.as_str()) {
                    let Ok(ep) = extra_caps[2].parse::<u16>() else {
                        continue;
                    };
                    // A dashed token ("E01-E03") is an inclusive range.
                    match episodes.last().copied() {
                        Some(prev) if extra_caps[1].contains('-') && ep > prev => {
                            episodes.extend(prev + 1..=ep);
                        }
                        _ => episodes.push(ep),
                    }
                }
            }
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            return ParsedGuess {
                title: clean_title(&stem[..start]),
                year: None,
                season,
                episodes,
                absolute: None,
                confidence: 0.9,
            };
        }

        if let Some(caps) = SEASON_WORD.captures(stem) {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            return ParsedGuess {
                title: clean_title(&stem[..start]),
                year: None,
                season: caps[1].parse().ok(),
                episodes: caps[2].parse().into_iter().collect(),
                absolute: None,
                confidence: 0.85,
            };
        }

        if let Some(caps) = SEASON_X_EPISODE.captures(stem) {
            let start = caps.get(1).map(|m| m.start()).unwrap_or(0);
            return ParsedGuess {
                title: clean_title(&stem[..start]),
                year: None,
                season: caps[1].parse().ok(),
                episodes: caps[2].parse().into_iter().collect(),
                absolute: None,
                confidence: 0.85,
            };
        }

        if let Some(caps) = ABSOLUTE.captures(stem) {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let title = clean_title(&stem[..start]);
            if !title.is_empty() {
                return ParsedGuess {
                    title,
                    year: None,
                    season: None,
                    episodes: Vec::new(),
                    absolute: caps[1].parse().ok(),
                    confidence: 0.6,
                };
            }
        }

        ParsedGuess::fallback(stem)
    }
}
