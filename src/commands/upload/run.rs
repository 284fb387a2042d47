use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use super::events::EventLog;
use super::pipeline::{IngestConfig, ingest_batch};
use crate::cli::UploadArgs;
use crate::encoding::DEFAULT_CANDIDATES;
use crate::model::{UploadRunManifest, UploadedFile};
use crate::store::SqliteStore;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

const UPLOAD_EXTENSIONS: [&str; 2] = ["csv", "txt"];

pub fn run(args: UploadArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("upload-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "upload_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let config = build_config(&args)?;
    let files = read_uploads(&args.files)?;

    info!(
        run_id = %run_id,
        db = %db_path.display(),
        files = files.len(),
        dry_run = args.dry_run,
        "starting upload"
    );

    let mut store = SqliteStore::open(&db_path)?.rollback_only(args.dry_run);
    let mut events = EventLog::default();
    let batch = ingest_batch(&mut store, &files, &config, &mut events)?;

    let status = if batch.all_succeeded() {
        "completed"
    } else {
        "failed"
    };

    let mut notes = vec![batch.detail_message()];
    if args.dry_run {
        notes.push("Dry run: every file transaction was rolled back.".to_string());
    }
    if !events.is_empty() {
        notes.push(format!("{} rows or fields were tolerated; see per-file summaries.", events.len()));
    }

    let manifest = UploadRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        db_path: db_path.display().to_string(),
        dry_run: args.dry_run,
        encoding_candidates: config
            .encodings
            .iter()
            .map(|encoding| encoding.as_str().to_string())
            .collect(),
        delimiter: char::from(config.delimiter).to_string(),
        fallback_step_offset: config.fallback_step_offset,
        files: batch.files.clone(),
        notes,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote upload run manifest");

    if !batch.all_succeeded() {
        bail!("{}", batch.detail_message());
    }

    info!(run_id = %run_id, files = batch.files.len(), "upload completed");
    Ok(())
}

fn build_config(args: &UploadArgs) -> Result<IngestConfig> {
    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", args.delimiter);
    }

    let encodings = if args.encodings.is_empty() {
        DEFAULT_CANDIDATES.to_vec()
    } else {
        args.encodings.clone()
    };

    Ok(IngestConfig {
        encodings,
        delimiter: args.delimiter as u8,
        fallback_step_offset: args.fallback_step_offset,
    })
}

fn read_uploads(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut upload_paths = Vec::new();
    for path in paths {
        if path.is_dir() {
            upload_paths.extend(discover_uploads(path)?);
        } else {
            upload_paths.push(path.clone());
        }
    }

    if upload_paths.is_empty() {
        bail!("no upload files found");
    }

    upload_paths
        .into_iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(ToOwned::to_owned)
                .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            Ok(UploadedFile::new(file_name, bytes))
        })
        .collect()
}

fn discover_uploads(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut uploads = Vec::new();

    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_upload = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                UPLOAD_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false);

        if is_upload {
            uploads.push(path);
        }
    }

    uploads.sort();
    Ok(uploads)
}
