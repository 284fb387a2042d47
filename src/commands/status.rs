use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::schema::ALL_VARIANTS;

const RUN_MANIFEST_PREFIX: &str = "upload_run_";

/// The parts of an upload run manifest that `status` reports.
#[derive(Debug, Deserialize)]
struct RunHeadline {
    run_id: String,
    status: String,
    started_at: String,
    updated_at: String,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    files: Vec<FileHeadline>,
}

#[derive(Debug, Deserialize)]
struct FileHeadline {
    file_name: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args.resolved_db_path();

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_run_manifest(&manifest_dir)? {
        Some(path) => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let run: RunHeadline = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let failed = run
                .files
                .iter()
                .filter(|file| file.status != "succeeded")
                .count();

            info!(
                path = %path.display(),
                run_id = %run.run_id,
                status = %run.status,
                started_at = %run.started_at,
                updated_at = %run.updated_at,
                dry_run = run.dry_run,
                files = run.files.len(),
                failed,
                "loaded latest upload run manifest"
            );
            for file in run.files.iter().filter(|file| file.status != "succeeded") {
                warn!(
                    file = %file.file_name,
                    message = %file.message.as_deref().unwrap_or_default(),
                    "file failed in latest run"
                );
            }
        }
        None => warn!(path = %manifest_dir.display(), "no upload run manifest found"),
    }

    if db_path.exists() {
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let counts = StoreCounts::load(&conn)?;

        info!(
            path = %db_path.display(),
            schema_version = %counts.schema_version.as_deref().unwrap_or("unknown"),
            base_records = counts.base_records,
            files = counts.file_names.len(),
            "database status"
        );
        for (table, count) in &counts.detail_records {
            info!(table = %table, records = count, "detail table");
        }
        for file_name in &counts.file_names {
            info!(file = %file_name, "stored file");
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

#[derive(Debug, Default)]
struct StoreCounts {
    schema_version: Option<String>,
    base_records: i64,
    detail_records: Vec<(&'static str, i64)>,
    file_names: Vec<String>,
}

impl StoreCounts {
    fn load(conn: &Connection) -> Result<Self> {
        let schema_version = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'db_schema_version'",
                [],
                |row| row.get(0),
            )
            .ok();

        let base_records = query_count(conn, "SELECT COUNT(*) FROM assessment_base")?;

        let mut detail_records = Vec::with_capacity(ALL_VARIANTS.len());
        for variant in ALL_VARIANTS {
            let table = variant.table_name();
            let count = query_count(conn, &format!("SELECT COUNT(*) FROM {table}"))?;
            detail_records.push((table, count));
        }

        let mut statement = conn
            .prepare("SELECT DISTINCT file_name FROM assessment_base ORDER BY file_name")
            .context("failed to prepare file name query")?;
        let file_names = statement
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Self {
            schema_version,
            base_records,
            detail_records,
            file_names,
        })
    }
}

/// Newest `upload_run_<ts>.json`; the compact UTC timestamp sorts lexically.
fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?
            .path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(RUN_MANIFEST_PREFIX) && name.ends_with(".json"));
        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

fn query_count(conn: &Connection, sql: &str) -> Result<i64> {
    let count = conn
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("count query failed: {sql}"))?;
    Ok(count)
}
