use std::{
    collections::BTreeMap,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use futures_util::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use inquire::Confirm;
use tracing_subscriber::{filter::LevelFilter, fmt};

use mediaops_app::brightcove::refids::{apply_fixes, improper_videos, plan_fixes};
use mediaops_app::brightcove::upload::{
    MetadataIndex, PlanSources, music_index, preflight, scan_videos, source_id_index,
};
use mediaops_app::brightcove::{
    BrightcoveClient, BrightcoveError, UploadEvent, UploadSummary, Uploader, propose_fix,
    snapshot_by_folder,
};
use mediaops_app::caas::{
    CaasClient, CaasEnricher, CaasRecord, ElasticRequest, EnrichEvent, EnrichOptions,
    EnrichSummary, QueryConfig, lookup_urls, write_records_csv,
};
use mediaops_app::cli::{
    BrightcoveArgs, BrightcoveCommands, BrightcoveDeleteArgs, BrightcoveFixRefIdsArgs,
    BrightcoveReportArgs, BrightcoveSnapshotArgs, BrightcoveUploadArgs, CaasArgs, CaasBatchArgs,
    CaasCommands, CaasEnrichArgs, CaasLookupArgs, CaasQueryArgs, Cli, Commands, CompareArgs,
    FilesArchiveArgs, FilesArgs, FilesCommands, FilesCopyArchiveArgs, FilesDuplicatesArgs,
    FilesFindEndingsArgs, FilesRenameArgs, FilesSortArgs, FilesSuffixCopyArgs, VimeoArgs,
    VimeoCommands, VimeoReportArgs, YoutubeArgs, YoutubeCommands, YoutubeMetricsArgs,
    YoutubeSnapshotArgs,
};
use mediaops_app::compare::{compare_titles, missing_video_info};
use mediaops_app::config::{self, AppConfig, AppConfigError};
use mediaops_app::constants::{BRIGHTCOVE_SNAPSHOT_PREFIX, YOUTUBE_SNAPSHOT_PREFIX};
use mediaops_app::error::AppError;
use mediaops_app::files::archiver::{destinations, run_archive};
use mediaops_app::files::copier::{Copier, mark_pending};
use mediaops_app::files::renamer::{RenameOptions, RenameReport, rename_exports};
use mediaops_app::files::sort::{duplicates, find_endings, sort_by_country, suffix_copy};
use mediaops_app::ledger::{LedgerEntry, LedgerWriter};
use mediaops_app::paths::AppPaths;
use mediaops_app::report::{self, confirm_overwrite, today_stamp};
use mediaops_app::sheets::{SheetsClient, Spreadsheet, SpreadsheetLocator};
use mediaops_app::vimeo::{
    VimeoClient, created_dates_report, stats_report, write_created_dates_csv,
};
use mediaops_app::youtube::metrics::split_metrics;
use mediaops_app::youtube::{
    PlaylistItem, ReportQuery, channel_clients, collect_metrics, collect_uploads,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let verbosity = cli.verbose;

    match cli.command {
        Some(Commands::Caas(args)) => run_caas(args, verbosity).await?,
        Some(Commands::Brightcove(args)) => run_brightcove(args, verbosity).await?,
        Some(Commands::Youtube(args)) => run_youtube(args).await?,
        Some(Commands::Vimeo(args)) => run_vimeo(args).await?,
        Some(Commands::Compare(args)) => run_compare(args)?,
        Some(Commands::Files(args)) => run_files(args).await?,
        None => {
            Cli::print_help();
        }
    }

    Ok(())
}

/// Streamed commands draw a progress bar at verbosity 0, so logging starts
/// switched off for them.
fn determine_log_level(cli: &Cli) -> LevelFilter {
    let shows_progress = match cli.command.as_ref() {
        Some(Commands::Caas(args)) => matches!(args.command, CaasCommands::Enrich(_)),
        Some(Commands::Brightcove(args)) => {
            matches!(&args.command, BrightcoveCommands::Upload(upload) if !upload.dry_run)
        }
        _ => false,
    };
    match (shows_progress, cli.verbose) {
        (true, 0) => LevelFilter::OFF,
        (true, 1) | (false, 0) => LevelFilter::INFO,
        (true, 2) | (false, 1) => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn make_progress_bar(unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} [{{elapsed_precise}}] {{pos}}/{{len}} {unit} ({{eta}}) {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Refuse to clobber an existing report unless forced or confirmed.
fn ensure_writable(path: &Path, force: bool) -> Result<(), AppError> {
    if confirm_overwrite(path, force)? {
        Ok(())
    } else {
        Err(AppError::OverwriteDeclined {
            path: path.to_path_buf(),
        })
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

fn app_paths(cfg: &AppConfig) -> Result<AppPaths, AppError> {
    Ok(AppPaths::new(&cfg.storage.path)?)
}

async fn open_spreadsheet(cfg: &AppConfig, locator: &str) -> Result<Spreadsheet, AppError> {
    let client = SheetsClient::from_config(&cfg.sheets, &cfg.http)?;
    Ok(client.open(&SpreadsheetLocator::parse(locator)).await?)
}

// ---------------------------------------------------------------------------
// caas

async fn run_caas(args: CaasArgs, verbosity: u8) -> Result<(), AppError> {
    match args.command {
        CaasCommands::Query(args) => caas_query(args).await,
        CaasCommands::Batch(args) => caas_batch(args).await,
        CaasCommands::Enrich(args) => caas_enrich(args, verbosity).await,
        CaasCommands::LookupUrls(args) => caas_lookup(args).await,
    }
}

async fn caas_query(args: CaasQueryArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    ensure_writable(&args.output, args.force)?;
    let client = CaasClient::from_config(&cfg.caas, &cfg.http)?;
    let query = QueryConfig::load(
        args.query_config
            .as_deref()
            .unwrap_or(&cfg.caas.query_config_path),
    )?;
    let request =
        ElasticRequest::load(args.request.as_deref().unwrap_or(&cfg.caas.elastic_request_path))?;

    let mut pages = Box::pin(client.pages(&query, request, args.pagination.into(), args.max_pages));
    let mut records = Vec::new();
    let mut page_count = 0usize;
    while let Some(page) = pages.next().await {
        let page = page?;
        page_count += 1;
        records.extend(page.entities.iter().map(CaasRecord::from_entity));
        tracing::info!(
            page = page_count,
            found = page.found,
            records = records.len(),
            "fetched CaaS page"
        );
    }

    let written = write_records_csv(&args.output, &records)?;
    println!(
        "Wrote {written} records from {page_count} pages to {}",
        args.output.display()
    );
    Ok(())
}

async fn caas_batch(args: CaasBatchArgs) -> Result<(), AppError> {
    let mut ids = args.ids;
    if let Some(path) = args.ids_file.as_deref() {
        ids.extend(read_lines(path)?);
    }
    ids = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(AppError::Usage("no entity ids given".to_string()));
    }

    let cfg = config::load()?;
    ensure_writable(&args.output, args.force)?;
    let client = CaasClient::from_config(&cfg.caas, &cfg.http)?;
    let entities = client.get_batch(&ids).await?;
    let records: Vec<CaasRecord> = entities.iter().map(CaasRecord::from_entity).collect();
    let written = write_records_csv(&args.output, &records)?;
    println!(
        "Fetched {} of {} ids; wrote {written} records to {}",
        entities.len(),
        ids.len(),
        args.output.display()
    );
    Ok(())
}

async fn caas_enrich(args: CaasEnrichArgs, verbosity: u8) -> Result<(), AppError> {
    let cfg = config::load()?;
    let urls = read_lines(&args.urls)?;
    let client = CaasClient::from_config(&cfg.caas, &cfg.http)?;

    let ledger_path = app_paths(&cfg)?.enrich_ledger();
    let ledger = LedgerWriter::open(&ledger_path).await?;
    tracing::debug!(path = %ledger_path.display(), "opened enrichment ledger");

    let options = EnrichOptions::builder()
        .output_dir(args.output_dir)
        .skip(args.skip)
        .maybe_limit(args.limit)
        .worker_count(NonZeroUsize::new(args.workers).unwrap_or(NonZeroUsize::MIN))
        .build();

    let progress = (verbosity == 0).then(|| make_progress_bar("urls"));
    let mut tracker = EnrichTracker::new(progress.clone(), ledger);
    let mut stream = Box::pin(CaasEnricher::new(client).enrich_stream(urls, options));
    let summary = process_enrich_stream(&mut stream, &mut tracker).await?;
    tracker.ledger.close().await?;

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed: {} found, {} written, {} not found, {} failed",
            summary.found, summary.written, summary.not_found, summary.failed
        ));
    } else {
        tracing::info!(
            queued = summary.queued,
            found = summary.found,
            written = summary.written,
            not_found = summary.not_found,
            failed = summary.failed,
            "CaaS enrichment completed"
        );
    }
    Ok(())
}

async fn process_enrich_stream<S>(
    stream: &mut S,
    tracker: &mut EnrichTracker,
) -> Result<EnrichSummary, AppError>
where
    S: Stream<Item = Result<EnrichEvent, mediaops_app::caas::CaasError>> + Unpin,
{
    while let Some(event) = stream.next().await {
        if let Some(summary) = tracker.handle_event(event?).await {
            return Ok(summary);
        }
    }
    Err(AppError::StreamEnded { what: "enrichment" })
}

struct EnrichTracker {
    progress: Option<ProgressBar>,
    ledger: LedgerWriter,
}

impl EnrichTracker {
    fn new(progress: Option<ProgressBar>, ledger: LedgerWriter) -> Self {
        Self { progress, ledger }
    }

    async fn handle_event(&mut self, event: EnrichEvent) -> Option<EnrichSummary> {
        match event {
            EnrichEvent::Started { total } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.set_length(total as u64);
                    pb.set_message("looking up articles".to_string());
                } else {
                    tracing::info!(total, "enrichment started");
                }
            }
            EnrichEvent::Queued { ordinal, url } => {
                tracing::debug!(ordinal, url = %url, "queued url");
            }
            EnrichEvent::Found { url, records } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                    pb.set_message(format!("found {url}"));
                } else {
                    tracing::info!(url = %url, records, "article found");
                }
            }
            EnrichEvent::RecordWritten { url, url_md5, path } => {
                let entry = LedgerEntry::new(url.clone(), url_md5, path.clone());
                if let Err(err) = self.ledger.write(&entry).await {
                    tracing::warn!(url = %url, error = %err, "failed to write ledger entry");
                }
                tracing::debug!(url = %url, path = %path.display(), "record written");
            }
            EnrichEvent::NotFound { url } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                    pb.set_message(format!("not found {url}"));
                } else {
                    tracing::info!(url = %url, "article not found");
                }
            }
            EnrichEvent::Failed { url, error } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                    pb.set_message(format!("failed {url}"));
                }
                tracing::warn!(url = %url, error = %error, "enrichment failed");
            }
            EnrichEvent::Completed { summary } => return Some(summary),
        }
        None
    }
}

async fn caas_lookup(args: CaasLookupArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let client = CaasClient::from_config(&cfg.caas, &cfg.http)?;
    let worksheet = open_spreadsheet(&cfg, &args.spreadsheet)
        .await?
        .worksheet(&args.worksheet);

    let summary = lookup_urls(&client, &worksheet, &cfg.caas.lookup).await?;
    for (source, tally) in &summary.per_source {
        println!("{source}: {}/{} found", tally.found, tally.searched);
    }
    println!(
        "Total: {}/{} found, {} cells updated",
        summary.totals.found, summary.totals.searched, summary.cells_updated
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// brightcove

async fn run_brightcove(args: BrightcoveArgs, verbosity: u8) -> Result<(), AppError> {
    let cfg = config::load()?;
    let client = BrightcoveClient::from_config(&cfg.brightcove, &cfg.http)?;
    match args.command {
        BrightcoveCommands::Folders => {
            for (name, id) in client.folders().await? {
                println!("{name}\t{id}");
            }
            Ok(())
        }
        BrightcoveCommands::Snapshot(args) => brightcove_snapshot(&cfg, &client, args).await,
        BrightcoveCommands::AuditRefIds(args) => brightcove_audit(&client, args).await,
        BrightcoveCommands::FixRefIds(args) => brightcove_fix(&client, args).await,
        BrightcoveCommands::Delete(args) => brightcove_delete(&client, args).await,
        BrightcoveCommands::Upload(args) => brightcove_upload(&cfg, client, args, verbosity).await,
    }
}

async fn brightcove_snapshot(
    cfg: &AppConfig,
    client: &BrightcoveClient,
    args: BrightcoveSnapshotArgs,
) -> Result<(), AppError> {
    let snapshot = snapshot_by_folder(client).await?;
    let stamp = args.stamp.unwrap_or_else(today_stamp);
    let dir = app_paths(cfg)?.snapshots_dir()?;
    let path = report::write_snapshot(&dir, BRIGHTCOVE_SNAPSHOT_PREFIX, &stamp, &snapshot)?;
    let videos: usize = snapshot.values().map(Vec::len).sum();
    println!(
        "Saved {videos} videos across {} folders to {}",
        snapshot.len(),
        path.display()
    );
    Ok(())
}

async fn brightcove_audit(
    client: &BrightcoveClient,
    args: BrightcoveReportArgs,
) -> Result<(), AppError> {
    let videos = client.list_videos(None).await?;
    let improper = improper_videos(&videos);
    let rows: Vec<[String; 4]> = improper
        .iter()
        .map(|video| {
            let reference = video.reference_id.clone().unwrap_or_default();
            let proposed = propose_fix(&reference).unwrap_or_default();
            [video.id.clone(), video.name.clone(), reference, proposed]
        })
        .collect();

    for [id, name, reference, proposed] in &rows {
        println!("{id}\t{name}\t{reference}\t{proposed}");
    }
    println!("{} of {} videos have malformed reference ids", rows.len(), videos.len());

    if let Some(path) = args.output.as_deref() {
        report::write_rows(
            path,
            &["VIDEO_ID", "NAME", "REFERENCE_ID", "PROPOSED"],
            rows.iter(),
        )?;
    }
    Ok(())
}

async fn brightcove_fix(
    client: &BrightcoveClient,
    args: BrightcoveFixRefIdsArgs,
) -> Result<(), AppError> {
    let videos = client.list_videos(None).await?;
    let fixes = plan_fixes(&videos);
    for fix in &fixes {
        println!("{}\t{} -> {}", fix.video_id, fix.old, fix.new);
    }
    if args.dry_run {
        println!("{} reference ids would change", fixes.len());
        return Ok(());
    }

    let outcome = apply_fixes(client, fixes).await?;
    println!(
        "Updated {} reference ids; {} already in use",
        outcome.updated.len(),
        outcome.conflicts.len()
    );
    for fix in &outcome.conflicts {
        println!("conflict: {} wanted {}", fix.video_id, fix.new);
    }
    Ok(())
}

async fn brightcove_delete(
    client: &BrightcoveClient,
    args: BrightcoveDeleteArgs,
) -> Result<(), AppError> {
    if !args.force {
        let confirmed = Confirm::new(&format!("Delete {} videos?", args.video_ids.len()))
            .with_default(false)
            .prompt()
            .map_err(report::ReportError::Prompt)?;
        if !confirmed {
            println!("Nothing deleted.");
            return Ok(());
        }
    }
    for video_id in &args.video_ids {
        client.delete_video(video_id).await?;
        println!("deleted {video_id}");
    }
    Ok(())
}

async fn brightcove_upload(
    cfg: &AppConfig,
    client: BrightcoveClient,
    args: BrightcoveUploadArgs,
    verbosity: u8,
) -> Result<(), AppError> {
    let upload_cfg = &cfg.brightcove.upload;
    let search_dir = required_path(args.search_dir, &upload_cfg.search_dir, "brightcove.upload.search_dir")?;
    let uploaded_dir = required_path(
        args.uploaded_dir,
        &upload_cfg.uploaded_dir,
        "brightcove.upload.uploaded_dir",
    )?;
    let stills_dir = required_path(args.stills_dir, &upload_cfg.stills_dir, "brightcove.upload.stills_dir")?;
    let metadata_csv = required_path(
        args.metadata_csv,
        &upload_cfg.metadata_csv,
        "brightcove.upload.metadata_csv",
    )?;
    let music_locator = upload_cfg
        .music_spreadsheet
        .as_deref()
        .ok_or(AppConfigError::Missing {
            key: "brightcove.upload.music_spreadsheet",
        })?;
    let master_locator = upload_cfg
        .master_spreadsheet
        .as_deref()
        .ok_or(AppConfigError::Missing {
            key: "brightcove.upload.master_spreadsheet",
        })?;

    let videos = scan_videos(&search_dir)?;
    if videos.is_empty() {
        println!("No videos in {}", search_dir.display());
        return Ok(());
    }

    let metadata = MetadataIndex::from_csv(&metadata_csv)?;
    let music_records = open_spreadsheet(cfg, music_locator)
        .await?
        .worksheet(&upload_cfg.music_worksheet)
        .records()
        .await?;
    let master = open_spreadsheet(cfg, master_locator).await?;
    let mut source_sheets = Vec::with_capacity(upload_cfg.source_worksheets.len());
    for title in &upload_cfg.source_worksheets {
        source_sheets.push(master.worksheet(title).records().await?);
    }
    let music = music_index(&music_records);
    let source_ids = source_id_index(source_sheets.iter().map(Vec::as_slice));

    let sources = PlanSources {
        metadata: &metadata,
        music: &music,
        source_ids: &source_ids,
        stills_dir: &stills_dir,
    };
    let plans = preflight(videos, sources)?;
    if args.dry_run {
        for plan in &plans {
            println!(
                "{}\t{}\t{}",
                plan.video.file_name,
                plan.metadata.reference_id,
                plan.still.display()
            );
        }
        println!("{} videos ready to upload", plans.len());
        return Ok(());
    }

    let folders = client.folders().await?;
    let state = args.state.unwrap_or_else(|| cfg.brightcove.video_state.clone());
    let uploader = Uploader::new(client, folders, state, uploaded_dir);

    let progress = (verbosity == 0).then(|| make_progress_bar("videos"));
    let mut tracker = UploadTracker::new(progress.clone());
    let mut stream = Box::pin(uploader.upload_stream(plans));
    let summary = process_upload_stream(&mut stream, &mut tracker).await?;

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed: {} created, {} replaced, {} moved",
            summary.created, summary.replaced, summary.moved
        ));
    } else {
        tracing::info!(
            total = summary.total,
            created = summary.created,
            replaced = summary.replaced,
            moved = summary.moved,
            "Brightcove upload completed"
        );
    }
    Ok(())
}

fn required_path(
    arg: Option<PathBuf>,
    configured: &Option<PathBuf>,
    key: &'static str,
) -> Result<PathBuf, AppError> {
    arg.or_else(|| configured.clone())
        .ok_or_else(|| AppConfigError::Missing { key }.into())
}

async fn process_upload_stream<S>(
    stream: &mut S,
    tracker: &mut UploadTracker,
) -> Result<UploadSummary, AppError>
where
    S: Stream<Item = Result<UploadEvent, BrightcoveError>> + Unpin,
{
    while let Some(event) = stream.next().await {
        if let Some(summary) = tracker.handle_event(event?) {
            return Ok(summary);
        }
    }
    Err(AppError::StreamEnded { what: "upload" })
}

struct UploadTracker {
    progress: Option<ProgressBar>,
}

impl UploadTracker {
    fn new(progress: Option<ProgressBar>) -> Self {
        Self { progress }
    }

    fn message(&self, message: String) {
        match self.progress.as_ref() {
            Some(pb) => pb.set_message(message),
            None => tracing::info!("{message}"),
        }
    }

    fn handle_event(&mut self, event: UploadEvent) -> Option<UploadSummary> {
        match event {
            UploadEvent::Started { total } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.set_length(total as u64);
                }
                self.message(format!("uploading {total} videos"));
            }
            UploadEvent::Created { file_name, video_id } => {
                self.message(format!("created {video_id} for {file_name}"));
            }
            UploadEvent::Replacing { file_name, video_id } => {
                self.message(format!("replacing sources of {video_id} with {file_name}"));
            }
            UploadEvent::SourceUploaded { file_name, source } => {
                self.message(format!("{file_name}: uploaded {}", source.display()));
            }
            UploadEvent::Ingested { file_name, video_id } => {
                self.message(format!("{file_name}: ingest submitted for {video_id}"));
            }
            UploadEvent::Moved { file_name, to } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                }
                self.message(format!("{file_name}: moved to {}", to.display()));
            }
            UploadEvent::Completed { summary } => return Some(summary),
        }
        None
    }
}

// ---------------------------------------------------------------------------
// youtube / vimeo / compare

async fn run_youtube(args: YoutubeArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    match args.command {
        YoutubeCommands::Metrics(args) => youtube_metrics(&cfg, args).await,
        YoutubeCommands::Snapshot(args) => youtube_snapshot(&cfg, args).await,
    }
}

async fn youtube_metrics(cfg: &AppConfig, args: YoutubeMetricsArgs) -> Result<(), AppError> {
    let clients = channel_clients(&cfg.youtube, &cfg.http, args.channel.as_deref())?;
    let defaults = ReportQuery::default();
    let query = ReportQuery {
        metrics: split_metrics(&args.metrics),
        start_date: args.start_date,
        end_date: args.end_date.unwrap_or(defaults.end_date),
        sort: args.sort,
    };

    let mut metrics = collect_metrics(&clients, &query).await;
    metrics.compute_totals();
    for metric in &query.metrics {
        println!("{metric}");
        for (country, value) in metrics.sorted(metric) {
            println!("  {country}\t{value}");
        }
    }
    if let Some(path) = args.output.as_deref() {
        let rows = metrics.write_csv(path)?;
        println!("Wrote {rows} rows to {}", path.display());
    }
    Ok(())
}

async fn youtube_snapshot(cfg: &AppConfig, args: YoutubeSnapshotArgs) -> Result<(), AppError> {
    let clients = channel_clients(&cfg.youtube, &cfg.http, args.channel.as_deref())?;
    let snapshot = collect_uploads(&clients).await;
    let dir = app_paths(cfg)?.snapshots_dir()?;
    let path = report::write_snapshot(&dir, YOUTUBE_SNAPSHOT_PREFIX, &today_stamp(), &snapshot)?;
    for (country, items) in &snapshot {
        println!("{country}\t{}", items.len());
    }
    println!("Saved snapshot to {}", path.display());
    Ok(())
}

async fn run_vimeo(args: VimeoArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let client = VimeoClient::from_config(&cfg.vimeo, &cfg.http)?;
    match args.command {
        VimeoCommands::Stats(VimeoReportArgs { output, force }) => {
            ensure_writable(&output, force)?;
            let report = stats_report(&client.videos().await?);
            report.write_csv(&output)?;
            println!(
                "{} videos: {} plays, {} likes, {} seconds",
                report.rows.len(),
                report.total_plays,
                report.total_likes,
                report.total_duration
            );
        }
        VimeoCommands::CreatedDates(VimeoReportArgs { output, force }) => {
            ensure_writable(&output, force)?;
            let rows = created_dates_report(&client.videos().await?)?;
            let written = write_created_dates_csv(&output, &rows)?;
            println!("Wrote {written} rows to {}", output.display());
        }
    }
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let stamp = args.stamp.unwrap_or_else(today_stamp);
    let dir = app_paths(&cfg)?.snapshots_dir()?;
    let youtube: BTreeMap<String, Vec<PlaylistItem>> =
        report::read_snapshot(&dir, YOUTUBE_SNAPSHOT_PREFIX, &stamp)?;
    let brightcove: BTreeMap<String, Vec<String>> =
        report::read_snapshot(&dir, BRIGHTCOVE_SNAPSHOT_PREFIX, &stamp)?;

    let items = youtube
        .get(&args.country.to_uppercase())
        .cloned()
        .unwrap_or_default();
    let youtube_titles: Vec<String> = items.iter().map(|item| item.snippet.title.clone()).collect();
    let brightcove_titles = brightcove.get(&args.country).cloned().unwrap_or_default();

    ensure_writable(&args.output, args.force)?;
    let comparison = compare_titles(&youtube_titles, &brightcove_titles);
    comparison.write_csv(&args.output)?;
    println!(
        "YouTube: {}  Brightcove: {}  difference: {}",
        comparison.youtube_count,
        comparison.brightcove_count,
        comparison.difference()
    );

    if let Some(path) = args.missing_output.as_deref() {
        let on_brightcove: Vec<String> = brightcove_titles
            .iter()
            .map(|title| title.trim().to_lowercase())
            .collect();
        let missing: Vec<String> = youtube_titles
            .into_iter()
            .filter(|title| !on_brightcove.contains(&title.trim().to_lowercase()))
            .collect();
        let info = missing_video_info(&missing, &items);
        ensure_writable(path, args.force)?;
        report::write_rows(
            path,
            &["TITLE", "URL", "DESCRIPTION"],
            info.iter().map(|video| {
                [
                    video.title.as_str(),
                    video.url.as_deref().unwrap_or_default(),
                    video.description.as_str(),
                ]
            }),
        )?;
        println!("{} YouTube videos missing from Brightcove", info.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// files

async fn run_files(args: FilesArgs) -> Result<(), AppError> {
    match args.command {
        FilesCommands::Rename(args) => files_rename(args).await,
        FilesCommands::SortByCountry(args) => files_sort(args).await,
        FilesCommands::SuffixCopy(args) => files_suffix_copy(args).await,
        FilesCommands::FindEndings(args) => files_find_endings(args).await,
        FilesCommands::Duplicates(args) => files_duplicates(args).await,
        FilesCommands::CopyArchive(args) => files_copy_archive(args).await,
        FilesCommands::Archive(args) => files_archive(args).await,
    }
}

async fn files_rename(args: FilesRenameArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let renamer = cfg.files.renamer.clone().unwrap_or_default();
    let root = required_path(args.root, &renamer.root, "files.renamer.root")?;
    let by_country_dir = required_path(
        args.by_country_dir,
        &renamer.by_country_dir,
        "files.renamer.by_country_dir",
    )?;
    let reports = app_paths(&cfg)?.reports_dir()?;
    let stamp = today_stamp();
    let records_csv = args
        .records
        .unwrap_or_else(|| reports.join(format!("rename_records_{stamp}.csv")));
    let dirs_csv = args
        .dirs
        .unwrap_or_else(|| reports.join(format!("rename_dirs_{stamp}.csv")));

    let opts = RenameOptions::builder()
        .root(root)
        .by_country_dir(by_country_dir)
        .dry_run(args.dry_run)
        .build();
    let (report, result) = tokio::task::spawn_blocking(move || {
        let mut report = RenameReport::default();
        let result = rename_exports(&opts, &mut report);
        (report, result)
    })
    .await?;

    report.write_records(&records_csv, &dirs_csv)?;
    println!(
        "{} files ({:.2} GB / {:.2} GB*), {} renamed, {} copied",
        report.file_count,
        report.gigabytes(),
        report.gigabytes_1024(),
        report.renamed,
        report.copied
    );
    for (country, count) in &report.per_country {
        println!("  {country}\t{count}");
    }
    println!("Records: {}", records_csv.display());
    result?;
    Ok(())
}

async fn files_sort(args: FilesSortArgs) -> Result<(), AppError> {
    let FilesSortArgs { root, dest, output } = args;
    let copied = tokio::task::spawn_blocking(move || sort_by_country(&root, &dest)).await??;
    println!("Copied {} exports", copied.len());
    if let Some(path) = output.as_deref() {
        report::write_rows(
            path,
            &["SRC_FILE", "COPIED_FILE"],
            copied.iter().map(|(src, copy)| {
                [src.display().to_string(), copy.display().to_string()]
            }),
        )?;
    }
    Ok(())
}

async fn files_suffix_copy(args: FilesSuffixCopyArgs) -> Result<(), AppError> {
    let FilesSuffixCopyArgs { root, dest, suffix } = args;
    let copied = tokio::task::spawn_blocking(move || suffix_copy(&root, &dest, &suffix)).await??;
    println!("Copied {} files", copied.len());
    Ok(())
}

async fn files_find_endings(args: FilesFindEndingsArgs) -> Result<(), AppError> {
    let FilesFindEndingsArgs {
        root,
        endings,
        output,
    } = args;
    let found = tokio::task::spawn_blocking(move || find_endings(&root, &endings)).await??;
    emit_paths(&found, output.as_deref())
}

async fn files_duplicates(args: FilesDuplicatesArgs) -> Result<(), AppError> {
    let FilesDuplicatesArgs { root, output } = args;
    let dupes = tokio::task::spawn_blocking(move || duplicates(&root)).await??;
    emit_paths(&dupes, output.as_deref())
}

fn emit_paths(paths: &[PathBuf], output: Option<&Path>) -> Result<(), AppError> {
    match output {
        Some(path) => {
            let written = report::write_lines(path, paths.iter().map(|p| p.display().to_string()))?;
            println!("Wrote {written} paths to {}", path.display());
        }
        None => {
            for path in paths {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

async fn files_copy_archive(args: FilesCopyArchiveArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let copier_cfg = cfg.files.require_copier()?.clone();
    let country_columns = copier_cfg.country_columns.clone();
    let pending_title = copier_cfg.pending_worksheet.clone();

    let summary = tokio::task::spawn_blocking(move || {
        let copier = Copier::new(copier_cfg);
        copier.preflight()?;
        copier.run()
    })
    .await??;

    for (flag, files) in &summary.by_flag {
        let mut files = files.clone();
        files.sort();
        println!("{} ({})", flag.as_ref(), files.len());
        for file in files {
            println!("  {file}");
        }
    }
    if !summary.stills.is_empty() {
        println!("stills ({})", summary.stills.len());
        for still in &summary.stills {
            println!("  {still}");
        }
    }
    for zip in &summary.zipped {
        println!("zipped {}", zip.display());
    }
    if summary.is_empty() {
        println!("Nothing to copy.");
    }

    if args.skip_sheet || summary.sheet_updates.is_empty() {
        return Ok(());
    }
    let worksheet = open_spreadsheet(&cfg, cfg.files.require_master_spreadsheet()?)
        .await?
        .worksheet(&pending_title);
    let marked = mark_pending(&worksheet, &summary.sheet_updates, &country_columns).await?;
    println!(
        "Marked {marked} of {} videos in {}",
        summary.sheet_updates.len(),
        worksheet.title()
    );
    Ok(())
}

async fn files_archive(args: FilesArchiveArgs) -> Result<(), AppError> {
    let cfg = config::load()?;
    let archiver = cfg.files.require_archiver()?;
    let spreadsheet = open_spreadsheet(&cfg, cfg.files.require_master_spreadsheet()?).await?;
    let pending = spreadsheet.worksheet(&archiver.pending_worksheet);
    let archived = spreadsheet.worksheet(&archiver.archived_worksheet);

    let report = run_archive(&pending, &archived, archiver, args.dry_run).await?;
    println!("ready: {}", report.ready);
    println!("found: {}", report.found.len());
    for project in &report.found {
        let (zip_path, move_path) = destinations(project, archiver);
        println!(
            "  {} -> {} / {}",
            project.name,
            zip_path.display(),
            move_path.display()
        );
    }
    println!("missing: {}", report.missing.len());
    for name in &report.missing {
        println!("  {name}");
    }
    for outcome in &report.archived {
        if !outcome.moved {
            println!("not moved: {}", outcome.project.name);
        }
    }
    if !args.dry_run {
        println!("archived: {}", report.archived.len());
    }
    Ok(())
}
