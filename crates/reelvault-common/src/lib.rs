//! Reelvault-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across reelvault:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for media links, metadata, users, etc.
//! - **Core Types**: Enums for media kinds, link descriptors, and stream kinds
//! - **Path Utilities**: Descriptor inference from file extensions
//! - **Error Handling**: Common error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use reelvault_common::{MediaLinkId, MediaKind, Descriptor, Error, Result};
//! use reelvault_common::paths::descriptor_for_path;
//! use std::path::Path;
//!
//! let link_id = MediaLinkId::new();
//! let kind = MediaKind::Movie;
//!
//! assert_eq!(
//!     descriptor_for_path(Path::new("movie.mkv")),
//!     Some(Descriptor::Video)
//! );
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("media link"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
