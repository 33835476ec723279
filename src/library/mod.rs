//! Library management.
//!
//! This module owns the import pipeline: registering library folders, scanning
//! them into media links, matching links to metadata, probing streams, and
//! removing entries. The scan diffs the filesystem against known links so
//! repeated scans are idempotent.

pub mod analyzer;
pub mod matcher;

pub use analyzer::AnalyzeOutcome;
pub use matcher::MatchOutcome;

use dashmap::DashMap;
use reelvault_common::{paths, Descriptor, LinkType, MediaKind, MediaLinkId, Result, UserId};
use reelvault_db::{
    models::MediaLink,
    pool::{get_conn, DbPool, PooledConnection},
    queries::media_links,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::MatchPolicy;
use crate::metadata::MetadataManager;
use crate::probe::FileProber;
use crate::processors::ProcessorSet;
use crate::state::{EventBus, ScanEvent, ScanSummary};

/// How many walked files between scan progress events.
const PROGRESS_EVERY: u32 = 50;

/// Result of registering a library folder.
#[derive(Debug)]
pub enum AddFolderResult {
    /// The folder was registered as a new root-directory link.
    Success(MediaLink),
    /// The path is missing or not a directory.
    FileError { exists: bool, is_directory: bool },
    /// A link for this path is already registered.
    LinkAlreadyExists,
    /// The insert failed at the database layer.
    DatabaseError(String),
}

/// Cooperative cancellation flag for a running scan.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-link advisory locks shared by matching and analysis.
///
/// Overlapping refreshes of the same link serialize here so they cannot
/// race-create duplicate metadata rows.
#[derive(Clone, Default)]
pub(crate) struct LinkLocks {
    locks: Arc<DashMap<MediaLinkId, Arc<Mutex<()>>>>,
}

impl LinkLocks {
    pub(crate) async fn lock(&self, id: MediaLinkId) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// Orchestrates library imports end to end.
pub struct LibraryManager {
    pool: DbPool,
    metadata: Arc<MetadataManager>,
    processors: ProcessorSet,
    prober: FileProber,
    events: EventBus,
    policy: MatchPolicy,
    link_locks: LinkLocks,
}

impl LibraryManager {
    pub fn new(
        pool: DbPool,
        metadata: Arc<MetadataManager>,
        prober: FileProber,
        events: EventBus,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            pool,
            metadata,
            processors: ProcessorSet::new(),
            prober,
            events,
            policy,
            link_locks: LinkLocks::default(),
        }
    }

    pub(crate) fn conn(&self) -> Result<PooledConnection> {
        get_conn(&self.pool)
    }

    pub(crate) fn metadata_manager(&self) -> &Arc<MetadataManager> {
        &self.metadata
    }

    pub(crate) fn processors(&self) -> &ProcessorSet {
        &self.processors
    }

    pub(crate) fn prober(&self) -> &FileProber {
        &self.prober
    }

    pub(crate) fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub(crate) fn locks(&self) -> &LinkLocks {
        &self.link_locks
    }

    /// Subscribe to scan progress events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Register a directory as a library root.
    ///
    /// Root-directory links never carry metadata; they exist to anchor scans
    /// and prefix cascades.
    pub fn add_library_folder(
        &self,
        user_id: UserId,
        path: &Path,
        media_kind: MediaKind,
    ) -> AddFolderResult {
        let exists = path.exists();
        let is_directory = path.is_dir();
        if !exists || !is_directory {
            return AddFolderResult::FileError {
                exists,
                is_directory,
            };
        }

        let path_str = path.to_string_lossy().to_string();
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => return AddFolderResult::DatabaseError(e.to_string()),
        };

        match media_links::get_link_by_path(&conn, &path_str) {
            Ok(Some(_)) => return AddFolderResult::LinkAlreadyExists,
            Ok(None) => {}
            Err(e) => return AddFolderResult::DatabaseError(e.to_string()),
        }

        let link = MediaLink::new(
            LinkType::Local,
            Descriptor::RootDirectory,
            path_str,
            media_kind,
        );

        match media_links::insert_link(&conn, &link) {
            Ok(()) => {
                info!(user_id = %user_id, path = %link.file_path, kind = %media_kind, "Registered library folder");
                AddFolderResult::Success(link)
            }
            Err(e) => AddFolderResult::DatabaseError(e.to_string()),
        }
    }

    /// Scan a library root, diffing the filesystem against known links.
    ///
    /// New media files become links, links whose file disappeared are
    /// removed, and everything else is skipped. Progress is broadcast on the
    /// event bus. Cancellation keeps rows persisted so far.
    pub fn scan(&self, root_id: MediaLinkId, cancel: &CancelFlag) -> Result<ScanSummary> {
        let conn = self.conn()?;
        let root = media_links::get_link(&conn, root_id)?
            .ok_or_else(|| reelvault_common::Error::not_found(format!("media link {root_id}")))?;

        if root.descriptor != Descriptor::RootDirectory {
            return Err(reelvault_common::Error::invalid_input(format!(
                "scan target {} is not a root directory",
                root.file_path
            )));
        }

        info!(root = %root.file_path, "Scanning library root");
        self.events.emit(ScanEvent::Started {
            root_path: root.file_path.clone(),
        });

        let mut summary = ScanSummary::default();
        let mut found = 0u32;

        // Paths already imported under this root.
        let known: std::collections::HashMap<String, MediaLink> =
            media_links::list_links_under(&conn, &root.file_path)?
                .into_iter()
                .map(|l| (l.file_path.clone(), l))
                .collect();
        let mut seen = std::collections::HashSet::new();

        for entry in WalkDir::new(&root.file_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if cancel.is_cancelled() {
                info!(root = %root.file_path, "Scan cancelled");
                self.events.emit(ScanEvent::Cancelled {
                    root_path: root.file_path.clone(),
                });
                return Ok(summary);
            }

            let file_path = entry.path();
            if file_path.is_dir() {
                continue;
            }
            found += 1;

            let Some(descriptor) = paths::descriptor_for_path(file_path) else {
                debug!(path = %file_path.display(), "Unrecognized extension, skipping");
                summary.skipped += 1;
                continue;
            };

            let path_str = file_path.to_string_lossy().to_string();
            if known.contains_key(&path_str) {
                seen.insert(path_str);
                summary.skipped += 1;
                continue;
            }

            let mut link =
                MediaLink::new(LinkType::Local, descriptor, path_str.clone(), root.media_kind);
            link.parent_id = Some(root.id);

            match media_links::insert_link(&conn, &link) {
                Ok(()) => {
                    debug!(path = %link.file_path, descriptor = %descriptor, "Imported file");
                    seen.insert(path_str);
                    summary.added += 1;
                }
                Err(e) => {
                    warn!(path = %link.file_path, error = %e, "Failed to import file");
                    summary.skipped += 1;
                }
            }

            if found % PROGRESS_EVERY == 0 {
                self.events.emit(ScanEvent::Progress {
                    root_path: root.file_path.clone(),
                    found,
                    added: summary.added,
                    removed: summary.removed,
                });
            }
        }

        // Links whose backing file disappeared.
        for (path, link) in &known {
            if !seen.contains(path) && !Path::new(path).exists() {
                if media_links::delete_link(&conn, link.id)? {
                    debug!(path = %path, "Removed link for missing file");
                    summary.removed += 1;
                }
            }
        }

        info!(
            root = %root.file_path,
            added = summary.added,
            removed = summary.removed,
            skipped = summary.skipped,
            "Scan complete"
        );
        self.events.emit(ScanEvent::Completed {
            root_path: root.file_path.clone(),
            summary,
        });

        Ok(summary)
    }

    /// Remove a media link.
    ///
    /// Root-directory links cascade to everything under their path. Metadata
    /// records always survive removal.
    pub fn remove_media_link(&self, link_id: MediaLinkId) -> Result<bool> {
        let conn = self.conn()?;
        let Some(link) = media_links::get_link(&conn, link_id)? else {
            return Ok(false);
        };

        if link.descriptor == Descriptor::RootDirectory {
            let removed = media_links::delete_links_under(&conn, &link.file_path)?;
            info!(root = %link.file_path, removed, "Removed library root and its files");
        }

        media_links::delete_link(&conn, link.id)
    }

    /// Find media files on disk under `path` that have no link in the
    /// database. Read-only; nothing is imported.
    pub fn find_unmapped_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.is_dir() {
            return Err(reelvault_common::Error::filesystem(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let conn = self.conn()?;
        let mut unmapped = Vec::new();

        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file_path = entry.path();
            if file_path.is_dir() || paths::descriptor_for_path(file_path).is_none() {
                continue;
            }

            let path_str = file_path.to_string_lossy();
            if media_links::get_link_by_path(&conn, &path_str)?.is_none() {
                unmapped.push(file_path.to_path_buf());
            }
        }

        unmapped.sort();
        Ok(unmapped)
    }

    /// List directory contents one level deep: subdirectories always, plain
    /// files only when `show_files` is set.
    pub fn list_files(&self, root: &Path, show_files: bool) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(reelvault_common::Error::filesystem(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() || show_files {
                entries.push(path);
            }
        }

        entries.sort();
        Ok(entries)
    }

    /// List all registered library roots.
    pub fn list_roots(&self) -> Result<Vec<MediaLink>> {
        let conn = self.conn()?;
        media_links::list_roots(&conn)
    }
}
