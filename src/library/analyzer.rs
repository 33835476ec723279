//! Stream analysis for imported media files.
//!
//! Analysis probes a link's file with ffprobe and persists the discovered
//! elementary streams as encoding rows. Only video and audio files are
//! analyzed; a link that already has encodings is skipped unless the caller
//! asks to overwrite. One failing file never aborts the rest of a batch.

use chrono::Utc;
use reelvault_common::{Descriptor, MediaLinkId, Result, StreamEncodingId};
use reelvault_db::models::StreamEncoding;
use reelvault_db::queries::encodings;
use std::path::Path;
use tracing::{debug, info, warn};

use super::LibraryManager;

/// Outcome of analyzing one media link.
#[derive(Debug)]
pub enum AnalyzeOutcome {
    /// Streams were probed and persisted.
    Analyzed {
        link_id: MediaLinkId,
        streams: usize,
        duration_secs: Option<f64>,
    },
    /// The link was left untouched.
    Skipped { link_id: MediaLinkId, reason: String },
    /// Probing or persisting failed.
    Failed { link_id: MediaLinkId, error: String },
}

impl LibraryManager {
    /// Analyze a batch of media links, one outcome per input id.
    pub async fn analyze_media_files(
        &self,
        link_ids: &[MediaLinkId],
        overwrite: bool,
    ) -> Vec<AnalyzeOutcome> {
        let mut outcomes = Vec::with_capacity(link_ids.len());
        for &link_id in link_ids {
            let outcome = match self.analyze_one(link_id, overwrite).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(link_id = %link_id, error = %e, "Analysis failed");
                    AnalyzeOutcome::Failed {
                        link_id,
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn analyze_one(&self, link_id: MediaLinkId, overwrite: bool) -> Result<AnalyzeOutcome> {
        let _guard = self.locks().lock(link_id).await;

        let link = self.load_link(link_id)?;
        match link.descriptor {
            Descriptor::Video | Descriptor::Audio => {}
            other => {
                return Ok(AnalyzeOutcome::Skipped {
                    link_id,
                    reason: format!("{other} links are not analyzed"),
                });
            }
        }

        {
            let conn = self.conn()?;
            if !overwrite && encodings::has_encodings(&conn, link_id)? {
                debug!(link_id = %link_id, "Encodings already present, skipping");
                return Ok(AnalyzeOutcome::Skipped {
                    link_id,
                    reason: "already analyzed".to_string(),
                });
            }
        }

        let probed = self.prober().probe(Path::new(&link.file_path)).await?;

        let now = Utc::now();
        let rows: Vec<StreamEncoding> = probed
            .streams
            .iter()
            .map(|stream| StreamEncoding {
                id: StreamEncodingId::new(),
                media_link_id: link_id,
                stream_kind: stream.kind,
                stream_index: stream.index,
                codec: stream.codec.clone(),
                width: stream.width,
                height: stream.height,
                channels: stream.channels,
                language: stream.language.clone(),
                is_default: stream.is_default,
                created_at: now,
            })
            .collect();

        let mut conn = self.conn()?;
        encodings::replace_encodings(&mut conn, link_id, &rows)?;

        info!(
            link_id = %link_id,
            path = %link.file_path,
            streams = rows.len(),
            "Analyzed media file"
        );
        Ok(AnalyzeOutcome::Analyzed {
            link_id,
            streams: rows.len(),
            duration_secs: probed.duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchPolicy;
    use crate::metadata::MetadataManager;
    use crate::probe::FileProber;
    use crate::state::EventBus;
    use reelvault_common::{LinkType, MediaKind, StreamKind};
    use reelvault_db::models::MediaLink;
    use reelvault_db::pool::{init_memory_pool, DbPool};
    use reelvault_db::queries::media_links;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn manager_with_prober(pool: DbPool, ffprobe: PathBuf) -> LibraryManager {
        LibraryManager::new(
            pool,
            Arc::new(MetadataManager::new()),
            FileProber::new(ffprobe),
            EventBus::default(),
            MatchPolicy::default(),
        )
    }

    fn insert_link(pool: &DbPool, descriptor: Descriptor, path: &str) -> MediaLinkId {
        let conn = pool.get().unwrap();
        let link = MediaLink::new(LinkType::Local, descriptor, path, MediaKind::Movie);
        media_links::insert_link(&conn, &link).unwrap();
        link.id
    }

    /// Write an executable stand-in for ffprobe that prints fixed JSON.
    fn fake_ffprobe(dir: &Path, json: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffprobe");
        std::fs::write(&path, format!("#!/bin/sh\ncat <<'EOF'\n{json}\nEOF\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video",
             "width": 1920, "height": 1080, "disposition": {"default": 1}},
            {"index": 1, "codec_name": "aac", "codec_type": "audio",
             "channels": 2, "tags": {"language": "eng"}}
        ],
        "format": {"duration": "5400.5"}
    }"#;

    #[tokio::test]
    async fn test_analyze_persists_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let ffprobe = fake_ffprobe(tmp.path(), PROBE_JSON);
        let pool = init_memory_pool().unwrap();
        let manager = manager_with_prober(pool.clone(), ffprobe);
        let link_id = insert_link(&pool, Descriptor::Video, "/movies/film.mkv");

        let outcomes = manager.analyze_media_files(&[link_id], false).await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            AnalyzeOutcome::Analyzed {
                streams,
                duration_secs,
                ..
            } => {
                assert_eq!(*streams, 2);
                assert_eq!(*duration_secs, Some(5400.5));
            }
            other => panic!("expected Analyzed, got {other:?}"),
        }

        let conn = pool.get().unwrap();
        let persisted = encodings::list_encodings(&conn, link_id).unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].stream_kind, StreamKind::Video);
        assert_eq!(persisted[0].codec, "h264");
        assert_eq!(persisted[1].channels, Some(2));
    }

    #[tokio::test]
    async fn test_analyzed_link_skipped_without_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let ffprobe = fake_ffprobe(tmp.path(), PROBE_JSON);
        let pool = init_memory_pool().unwrap();
        let manager = manager_with_prober(pool.clone(), ffprobe);
        let link_id = insert_link(&pool, Descriptor::Video, "/movies/film.mkv");

        manager.analyze_media_files(&[link_id], false).await;
        let second = manager.analyze_media_files(&[link_id], false).await;
        assert!(matches!(second[0], AnalyzeOutcome::Skipped { .. }));

        // Overwrite forces a fresh probe.
        let third = manager.analyze_media_files(&[link_id], true).await;
        assert!(matches!(third[0], AnalyzeOutcome::Analyzed { .. }));

        let conn = pool.get().unwrap();
        assert_eq!(encodings::list_encodings(&conn, link_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_media_descriptors_skipped() {
        let pool = init_memory_pool().unwrap();
        let manager = manager_with_prober(pool.clone(), PathBuf::from("ffprobe"));
        let subtitle = insert_link(&pool, Descriptor::Subtitle, "/movies/film.srt");
        let image = insert_link(&pool, Descriptor::Image, "/movies/cover.jpg");

        let outcomes = manager.analyze_media_files(&[subtitle, image], false).await;
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, AnalyzeOutcome::Skipped { .. })));
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_abort_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        // Bad prober path: every probe fails.
        let manager =
            manager_with_prober(pool.clone(), tmp.path().join("missing-ffprobe"));
        let video = insert_link(&pool, Descriptor::Video, "/movies/film.mkv");
        let subtitle = insert_link(&pool, Descriptor::Subtitle, "/movies/film.srt");

        let outcomes = manager.analyze_media_files(&[video, subtitle], false).await;
        assert!(matches!(outcomes[0], AnalyzeOutcome::Failed { .. }));
        assert!(matches!(outcomes[1], AnalyzeOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_unknown_link_fails_cleanly() {
        let pool = init_memory_pool().unwrap();
        let manager = manager_with_prober(pool, PathBuf::from("ffprobe"));

        let outcomes = manager
            .analyze_media_files(&[MediaLinkId::new()], false)
            .await;
        assert!(matches!(outcomes[0], AnalyzeOutcome::Failed { .. }));
    }
}
