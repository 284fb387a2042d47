use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::encoding::TextEncoding;

#[derive(Parser, Debug)]
#[command(
    name = "drill-ingest",
    version,
    about = "Ingest escape-door drill assessment sheets into a local record store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Upload(UploadArgs),
    Status(StatusArgs),
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(long, default_value = ".cache/drill-ingest")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Files to upload; a directory contributes every .csv/.txt file inside it.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Candidate encodings in the order they are tried (repeatable).
    #[arg(long = "encoding", value_enum)]
    pub encodings: Vec<TextEncoding>,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// First step column when no total-duration header is present.
    #[arg(long, default_value_t = 7)]
    pub fallback_step_offset: usize,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/drill-ingest")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long, default_value = ".cache/drill-ingest")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub file_name: Option<String>,

    #[arg(long)]
    pub vehicle_model: Option<String>,

    #[arg(long)]
    pub assessment_item: Option<String>,

    /// Only records whose total duration exceeds this `M:SS.f` value.
    #[arg(long)]
    pub slower_than: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// List distinct (vehicle model, assessment item) pairs instead of records.
    #[arg(long, default_value_t = false)]
    pub combinations: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl UploadArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }
}

impl StatusArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }
}

impl ShowArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }
}

fn resolve_db_path(cache_root: &std::path::Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| cache_root.join("assessments.sqlite"))
}
