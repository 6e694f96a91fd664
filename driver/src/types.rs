use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxStatus {
    Creating,
    Running,
    Stopped,
    Exited,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountPropagation {
    Private,
    RPrivate,
    Shared,
    RShared,
    Slave,
    RSlave,
}

impl Default for MountPropagation {
    fn default() -> Self {
        MountPropagation::RPrivate
    }
}

impl MountPropagation {
    pub fn as_bind_suffix(&self) -> &'static str {
        match self {
            MountPropagation::Private => "private",
            MountPropagation::RPrivate => "rprivate",
            MountPropagation::Shared => "shared",
            MountPropagation::RShared => "rshared",
            MountPropagation::Slave => "slave",
            MountPropagation::RSlave => "rslave",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub propagation: MountPropagation,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Box {
    pub id: String,
    pub image: String,
    pub status: BoxStatus,
    pub labels: BTreeMap<String, String>,
    pub cmd: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub mounts: Option<Vec<Mount>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoxRequest {
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub cmd: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
}

#[derive(Debug, Clone)]
pub enum FilterField {
    Id(String),
    Label(Option<String>, Option<String>),
    Ancestor(String),
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: FilterField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSpec {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default = "default_true")]
    pub tty: bool,
    #[serde(default = "default_true")]
    pub attach_stdout: bool,
    #[serde(default = "default_true")]
    pub attach_stderr: bool,
    #[serde(default)]
    pub attach_stdin: bool,
}

fn default_true() -> bool {
    true
}

/// A live exec session: a byte stream to the process's stdin, a byte
/// stream from its stdout/stderr (already frame-encoded by the driver in
/// non-tty mode), and an opaque handle used to later fetch the exit code.
pub struct ExecAttach {
    pub input: std::pin::Pin<std::boxed::Box<dyn AsyncWrite + Send>>,
    pub output: std::pin::Pin<std::boxed::Box<dyn AsyncRead + Send>>,
    pub handle: ExecHandle,
}

#[derive(Debug, Clone)]
pub struct ExecHandle {
    pub box_id: String,
    pub exec_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStat {
    pub name: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractOptions {
    #[serde(default)]
    pub no_overwrite_dir_non_dir: bool,
    #[serde(default)]
    pub copy_uid_gid: bool,
}

pub type ArchiveReader = std::pin::Pin<std::boxed::Box<dyn AsyncRead + Send>>;
