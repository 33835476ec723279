//! Movie filename parsing.

use regex::Regex;
use reelvault_common::MediaKind;
use std::path::Path;
use std::sync::LazyLock;

use super::{clean_title, stem_of, FileProcessor, ParsedGuess};

/// Year token bounded by separators or string edges, e.g. ".1999." or "(2010)".
static YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[ ._(\[-])((?:19|20)\d{2})(?:[ ._)\]-]|$)").unwrap()
});

/// Parses movie release names of the form `Title.2010.1080p.x264-GROUP.mkv`.
///
/// The year is the title boundary: everything before the last plausible year
/// token is the title, everything after is release noise. Names without a
/// year fall back to the whole stem at low confidence.
#[derive(Debug, Default)]
pub struct MovieProcessor;

impl MovieProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl FileProcessor for MovieProcessor {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Movie
    }

    fn parse(&self, path: &Path) -> ParsedGuess {
        let stem = stem_of(path);

        // Take the last year token so titles like "2001 A Space Odyssey 1968"
        // keep the leading number as part of the title.
        let year_match = YEAR.captures_iter(stem).last();

        let Some(caps) = year_match else {
            return ParsedGuess::fallback(stem);
        };

        let year_group = caps.get(1).map(|m| (m.start(), m.as_str()));
        let Some((year_start, year_str)) = year_group else {
            return ParsedGuess::fallback(stem);
        };

        let title = clean_title(&stem[..year_start]);
        if title.is_empty() {
            // Nothing before the year, e.g. a bare "2012.mkv". Treat the year
            // itself as the title.
            return ParsedGuess {
                title: year_str.to_string(),
                year: None,
                season: None,
                episodes: Vec::new(),
                absolute: None,
                confidence: 0.3,
            };
        }

        ParsedGuess {
            title,
            year: year_str.parse().ok(),
            season: None,
            episodes: Vec::new(),
            absolute: None,
            confidence: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(name: &str) -> ParsedGuess {
        MovieProcessor::new().parse(&PathBuf::from(name))
    }

    #[test]
    fn test_dotted_release_name() {
        let guess = parse("Inception.2010.1080p.BluRay.x264-GROUP.mkv");
        assert_eq!(guess.title, "Inception");
        assert_eq!(guess.year, Some(2010));
        assert!(guess.confidence >= 0.9);
    }

    #[test]
    fn test_spaces_and_parens() {
        let guess = parse("The Matrix (1999).mkv");
        assert_eq!(guess.title, "The Matrix");
        assert_eq!(guess.year, Some(1999));
    }

    #[test]
    fn test_underscore_separators() {
        let guess = parse("Blade_Runner_1982_Directors_Cut.mp4");
        assert_eq!(guess.title, "Blade Runner");
        assert_eq!(guess.year, Some(1982));
    }

    #[test]
    fn test_leading_number_kept_in_title() {
        let guess = parse("2001.A.Space.Odyssey.1968.mkv");
        assert_eq!(guess.title, "2001 A Space Odyssey");
        assert_eq!(guess.year, Some(1968));
    }

    #[test]
    fn test_no_year_falls_back_to_stem() {
        let guess = parse("Some Obscure Film.mkv");
        assert_eq!(guess.title, "Some Obscure Film");
        assert_eq!(guess.year, None);
        assert!(guess.confidence <= 0.3);
    }

    #[test]
    fn test_bracket_noise_stripped() {
        let guess = parse("Akira [remastered] 1988.mkv");
        assert_eq!(guess.title, "Akira");
        assert_eq!(guess.year, Some(1988));
    }

    #[test]
    fn test_never_errors_on_garbage() {
        let guess = parse("....mkv");
        assert!(guess.confidence <= 0.3);
    }
}
