//! Core type definitions for media links, metadata, and streams.
//!
//! This module defines the enums used throughout reelvault for categorizing
//! libraries, filesystem entities, metadata records, and probed streams. All
//! enums serialize in snake_case, matching their database text columns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media a library root (and the files under it) contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Film content; files parse into title + year.
    Movie,
    /// Series content; files parse into show title + season/episode.
    Tv,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Tv => write!(f, "tv"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

/// How a media link entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Discovered by scanning a local library folder.
    Local,
    /// Registered by a torrent download completing.
    Download,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Download => write!(f, "download"),
        }
    }
}

impl std::str::FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "download" => Ok(Self::Download),
            _ => Err(format!("Invalid link type: {}", s)),
        }
    }
}

/// Role of a media link within a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Descriptor {
    /// A registered library root folder.
    RootDirectory,
    /// A video file.
    Video,
    /// An audio file.
    Audio,
    /// A sidecar subtitle file.
    Subtitle,
    /// A poster/artwork image file.
    Image,
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootDirectory => write!(f, "root_directory"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for Descriptor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root_directory" => Ok(Self::RootDirectory),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "subtitle" => Ok(Self::Subtitle),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid descriptor: {}", s)),
        }
    }
}

/// Type of a metadata record in the content hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// A standalone movie.
    Movie,
    /// A TV series (top of the hierarchy).
    TvShow,
    /// A season within a show.
    TvSeason,
    /// A single episode within a season.
    TvEpisode,
}

impl MediaType {
    /// Whether records of this type sit at the top of a hierarchy.
    pub fn is_root(self) -> bool {
        matches!(self, Self::Movie | Self::TvShow)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::TvShow => write!(f, "tv_show"),
            Self::TvSeason => write!(f, "tv_season"),
            Self::TvEpisode => write!(f, "tv_episode"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv_show" => Ok(Self::TvShow),
            "tv_season" => Ok(Self::TvSeason),
            "tv_episode" => Ok(Self::TvEpisode),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// Kind of probed elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Subtitle stream.
    Subtitle,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

impl std::str::FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "subtitle" => Ok(Self::Subtitle),
            _ => Err(format!("Invalid stream kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_media_kind_roundtrip() {
        for kind in [MediaKind::Movie, MediaKind::Tv] {
            assert_eq!(MediaKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert!(MediaKind::from_str("music").is_err());
    }

    #[test]
    fn test_descriptor_roundtrip() {
        for desc in [
            Descriptor::RootDirectory,
            Descriptor::Video,
            Descriptor::Audio,
            Descriptor::Subtitle,
            Descriptor::Image,
        ] {
            assert_eq!(Descriptor::from_str(&desc.to_string()).unwrap(), desc);
        }
    }

    #[test]
    fn test_media_type_roundtrip() {
        for mt in [
            MediaType::Movie,
            MediaType::TvShow,
            MediaType::TvSeason,
            MediaType::TvEpisode,
        ] {
            assert_eq!(MediaType::from_str(&mt.to_string()).unwrap(), mt);
        }
    }

    #[test]
    fn test_media_type_is_root() {
        assert!(MediaType::Movie.is_root());
        assert!(MediaType::TvShow.is_root());
        assert!(!MediaType::TvSeason.is_root());
        assert!(!MediaType::TvEpisode.is_root());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&MediaType::TvEpisode).unwrap(),
            "\"tv_episode\""
        );
        assert_eq!(
            serde_json::to_string(&Descriptor::RootDirectory).unwrap(),
            "\"root_directory\""
        );
    }

    #[test]
    fn test_link_type_roundtrip() {
        for lt in [LinkType::Local, LinkType::Download] {
            assert_eq!(LinkType::from_str(&lt.to_string()).unwrap(), lt);
        }
    }
}
