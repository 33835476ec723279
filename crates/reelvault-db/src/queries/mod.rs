//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - media_links: filesystem entity records, path lookups, cascade deletes
//! - metadata: content hierarchy records and remote-id dedup
//! - playback: per-user playback position states
//! - encodings: probed stream encodings per media link

pub mod encodings;
pub mod media_links;
pub mod metadata;
pub mod playback;
