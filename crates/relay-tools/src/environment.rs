//! The `ExecutionEnvironment` trait — the opaque boundary the built-in
//! tool bodies delegate to (§6). Concrete filesystem/process semantics
//! live in `local`, not here.

use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GrepOptions {
    pub case_sensitive: bool,
    pub max_results: Option<usize>,
    pub include_pattern: Option<String>,
    pub context_lines: usize,
    /// Reserved; see `EnvVarPolicy` docs and DESIGN.md — treated as a
    /// no-op until a gitignore filterer is supplied.
    pub respect_git_ignore: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub timeout_ms: Option<u64>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("{0}")]
    Io(String),
    #[error("path escapes workspace: {0}")]
    PathEscape(String),
}

pub type EnvResult<T> = Result<T, EnvError>;

/// Filesystem/process operations the built-in tools delegate to. One
/// instance is shared across a session's tool dispatch; implementations
/// must be `Send + Sync` since parallel tool dispatch may call several
/// methods concurrently.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    async fn initialize(&self) -> EnvResult<()> {
        Ok(())
    }
    async fn cleanup(&self) -> EnvResult<()> {
        Ok(())
    }

    /// 1-based line-numbered text, matching the read-tool schema's offset
    /// convention for the Anthropic/OpenAI tool families.
    async fn read_file(&self, path: &str, offset: Option<usize>, limit: Option<usize>) -> EnvResult<String>;
    /// Unmodified file contents, with no line numbering — used by
    /// `edit_file` to locate an exact `old_string` match.
    async fn read_file_raw(&self, path: &str) -> EnvResult<String>;
    async fn write_file(&self, path: &str, content: &str) -> EnvResult<()>;
    async fn delete_file(&self, path: &str) -> EnvResult<()>;
    async fn file_exists(&self, path: &str) -> bool;
    async fn list_directory(&self, path: &str, depth: usize) -> EnvResult<Vec<DirEntryInfo>>;
    async fn exec_command(&self, command: &str, options: ExecOptions) -> EnvResult<ExecOutput>;
    async fn grep(&self, pattern: &str, path: &str, options: GrepOptions) -> EnvResult<String>;
    async fn glob(&self, pattern: &str, path: &str) -> EnvResult<Vec<String>>;

    fn working_directory(&self) -> PathBuf;
    fn platform(&self) -> &str {
        std::env::consts::OS
    }
    fn os_version(&self) -> String {
        "unknown".to_string()
    }
}

/// How subprocess environment variables are inherited from the host
/// process (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVarPolicy {
    InheritNone,
    InheritCore,
    InheritAll,
}

const SENSITIVE_SUFFIXES: &[&str] = &["_API_KEY", "_SECRET", "_TOKEN", "_PASSWORD", "_CREDENTIAL"];

const CORE_ALLOWLIST: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "LANG", "TERM", "TMPDIR", "GOPATH", "CARGO_HOME",
    "NVM_DIR", "RUSTUP_HOME", "PYENV_ROOT", "JAVA_HOME", "NODE_PATH",
];

fn is_sensitive(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SENSITIVE_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// Filters the host process environment per `policy`, always stripping
/// sensitive-looking names regardless of policy.
pub fn filter_env_vars(policy: EnvVarPolicy, host_env: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    host_env
        .into_iter()
        .filter(|(name, _)| !is_sensitive(name))
        .filter(|(name, _)| match policy {
            EnvVarPolicy::InheritNone => false,
            EnvVarPolicy::InheritCore => CORE_ALLOWLIST.contains(&name.as_str()),
            EnvVarPolicy::InheritAll => true,
        })
        .collect()
}
