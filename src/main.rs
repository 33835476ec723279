mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use futures::StreamExt;
use reelvault::config::{self, Config};
use reelvault::library::{
    AddFolderResult, AnalyzeOutcome, CancelFlag, LibraryManager, MatchOutcome,
};
use reelvault::metadata::{MetadataManager, TmdbProvider};
use reelvault::probe::FileProber;
use reelvault::state::EventBus;
use reelvault::streaming::StreamManager;
use reelvault_common::{Descriptor, MediaKind, MediaLinkId, UserId};
use reelvault_db::models::MediaLink;
use reelvault_db::pool::{init_pool, DbPool};
use reelvault_db::queries::media_links;
use std::path::Path;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelvault=debug,reelvault_db=debug,reelvault_common=debug".to_string()
        } else {
            "reelvault=info,reelvault_db=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = config::load_config_or_default(cli.config.as_deref())?;
    let (manager, pool) = build_library(&config)?;
    let manager = Arc::new(manager);

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::AddFolder { path, kind } => add_folder(&manager, &path, &kind),
        Commands::Scan { root } => rt.block_on(scan(manager, pool, root.as_deref())),
        Commands::Refresh { path, force } => {
            rt.block_on(refresh(&manager, &pool, path.as_deref(), force))
        }
        Commands::Analyze { path, overwrite } => {
            rt.block_on(analyze(&manager, &pool, path.as_deref(), overwrite))
        }
        Commands::Unmapped { path } => unmapped(&manager, &path),
        Commands::List { files } => list(&manager, &pool, files),
        Commands::ContinueWatching { user } => continue_watching(&config, &pool, &user),
    }
}

fn build_library(config: &Config) -> Result<(LibraryManager, DbPool)> {
    let db_path = config.database.path.to_string_lossy();
    let pool = init_pool(&db_path).context("failed to open database")?;

    let mut metadata = MetadataManager::new();
    if let Some(api_key) = &config.tmdb.api_key {
        metadata.register(Arc::new(TmdbProvider::new(
            api_key.clone(),
            config.tmdb.requests_per_second,
        )));
    } else {
        tracing::warn!("No TMDB API key configured; metadata matching is unavailable");
    }

    let manager = LibraryManager::new(
        pool.clone(),
        Arc::new(metadata),
        FileProber::new(config.tools.ffprobe()),
        EventBus::default(),
        config.matching.clone(),
    );
    Ok((manager, pool))
}

fn add_folder(manager: &LibraryManager, path: &Path, kind: &str) -> Result<()> {
    let kind: MediaKind = kind
        .parse()
        .map_err(|_| anyhow::anyhow!("kind must be 'movie' or 'tv'"))?;

    match manager.add_library_folder(UserId::new(), path, kind) {
        AddFolderResult::Success(link) => {
            println!("Registered {} as a {} library", link.file_path, kind);
            Ok(())
        }
        AddFolderResult::FileError { exists: false, .. } => {
            anyhow::bail!("{} does not exist", path.display())
        }
        AddFolderResult::FileError { .. } => {
            anyhow::bail!("{} is not a directory", path.display())
        }
        AddFolderResult::LinkAlreadyExists => {
            anyhow::bail!("{} is already registered", path.display())
        }
        AddFolderResult::DatabaseError(e) => anyhow::bail!("database error: {e}"),
    }
}

async fn scan(manager: Arc<LibraryManager>, pool: DbPool, root: Option<&Path>) -> Result<()> {
    let roots = resolve_roots(&pool, root)?;
    if roots.is_empty() {
        println!("No library roots registered");
        return Ok(());
    }

    // Print progress events while the scan walks the filesystem.
    let events = BroadcastStream::new(manager.subscribe());
    let printer = tokio::spawn(events.for_each(|event| async {
        if let Ok(event) = event {
            if let Ok(json) = serde_json::to_string(&event) {
                println!("{json}");
            }
        }
    }));

    for root in roots {
        let manager = manager.clone();
        let root_id = root.id;
        let summary =
            tokio::task::spawn_blocking(move || manager.scan(root_id, &CancelFlag::new()))
                .await??;
        println!(
            "{}: {} added, {} removed, {} skipped",
            root.file_path, summary.added, summary.removed, summary.skipped
        );
    }

    printer.abort();
    Ok(())
}

async fn refresh(
    manager: &LibraryManager,
    pool: &DbPool,
    path: Option<&Path>,
    force: bool,
) -> Result<()> {
    let user = UserId::new();
    let links = collect_links(pool, path)?;

    let mut matched = 0usize;
    for link in links {
        if link.descriptor != Descriptor::Video {
            continue;
        }
        if link.metadata_id.is_some() && !force {
            continue;
        }

        match manager.refresh_metadata(user, link.id, force).await {
            Ok(MatchOutcome::Matched(meta)) => {
                matched += 1;
                println!("{} -> {}", link.file_path, meta.title);
            }
            Ok(MatchOutcome::Candidates(candidates)) => {
                println!(
                    "{}: ambiguous, {} candidates (best: {})",
                    link.file_path,
                    candidates.len(),
                    candidates[0].title
                );
            }
            Ok(MatchOutcome::NoMatch) => {
                println!("{}: no match", link.file_path);
            }
            Err(e) => {
                println!("{}: error: {e}", link.file_path);
            }
        }
    }

    println!("Matched {matched} files");
    Ok(())
}

async fn analyze(
    manager: &LibraryManager,
    pool: &DbPool,
    path: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let ids: Vec<MediaLinkId> = collect_links(pool, path)?
        .into_iter()
        .filter(|l| matches!(l.descriptor, Descriptor::Video | Descriptor::Audio))
        .map(|l| l.id)
        .collect();

    let outcomes = manager.analyze_media_files(&ids, overwrite).await;
    for outcome in &outcomes {
        match outcome {
            AnalyzeOutcome::Analyzed {
                link_id, streams, ..
            } => println!("{link_id}: {streams} streams"),
            AnalyzeOutcome::Skipped { link_id, reason } => println!("{link_id}: skipped ({reason})"),
            AnalyzeOutcome::Failed { link_id, error } => println!("{link_id}: failed ({error})"),
        }
    }
    Ok(())
}

fn unmapped(manager: &LibraryManager, path: &Path) -> Result<()> {
    let files = manager.find_unmapped_files(path)?;
    if files.is_empty() {
        println!("No unmapped files under {}", path.display());
        return Ok(());
    }
    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}

fn list(manager: &LibraryManager, pool: &DbPool, files: bool) -> Result<()> {
    let roots = manager.list_roots()?;
    if roots.is_empty() {
        println!("No library roots registered");
        return Ok(());
    }

    let conn = pool.get().context("failed to get database connection")?;
    for root in roots {
        println!("{} [{}]", root.file_path, root.media_kind);
        if files {
            for link in media_links::list_links_under(&conn, &root.file_path)? {
                let matched = if link.metadata_id.is_some() { "*" } else { " " };
                println!("  {matched} {} ({})", link.file_path, link.descriptor);
            }
        }
    }
    Ok(())
}

fn continue_watching(config: &Config, pool: &DbPool, user: &str) -> Result<()> {
    let user_id = UserId::parse(user).context("user must be a UUID")?;
    let manager = StreamManager::new(pool.clone(), &config.transcode, config.tools.ffmpeg());

    let states = manager.continue_watching(user_id)?;
    if states.is_empty() {
        println!("Nothing in progress");
        return Ok(());
    }

    let conn = pool.get().context("failed to get database connection")?;
    for state in states {
        let path = media_links::get_link(&conn, state.media_link_id)?
            .map(|l| l.file_path)
            .unwrap_or_else(|| state.media_link_id.to_string());
        if state.runtime > 0.0 {
            println!(
                "{path}: {:.0}% ({:.0}s of {:.0}s)",
                state.position / state.runtime * 100.0,
                state.position,
                state.runtime
            );
        } else {
            println!("{path}: {:.0}s", state.position);
        }
    }
    Ok(())
}

fn resolve_roots(pool: &DbPool, root: Option<&Path>) -> Result<Vec<MediaLink>> {
    let conn = pool.get().context("failed to get database connection")?;
    match root {
        Some(path) => {
            let link = media_links::get_link_by_path(&conn, &path.to_string_lossy())?
                .with_context(|| format!("{} is not a registered root", path.display()))?;
            Ok(vec![link])
        }
        None => Ok(media_links::list_roots(&conn)?),
    }
}

fn collect_links(pool: &DbPool, path: Option<&Path>) -> Result<Vec<MediaLink>> {
    let conn = pool.get().context("failed to get database connection")?;
    match path {
        Some(path) => Ok(media_links::list_links_under(
            &conn,
            &path.to_string_lossy(),
        )?),
        None => {
            let mut links = Vec::new();
            for root in media_links::list_roots(&conn)? {
                links.extend(media_links::list_links_under(&conn, &root.file_path)?);
            }
            Ok(links)
        }
    }
}
