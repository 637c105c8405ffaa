//! Concrete tool executors, each a thin adapter from a tool's JSON
//! arguments to an `ExecutionEnvironment` call. Grounded on the teacher's
//! individual `Tool::execute` bodies in `tools/*.rs`, generalized to
//! delegate through the environment boundary instead of touching the
//! filesystem directly.

use crate::environment::{ExecOptions, ExecutionEnvironment, GrepOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

fn str_arg(args: &Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing required argument: {key}"))
}

fn usize_arg(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

pub struct ReadFileExecutor {
    env: Arc<dyn ExecutionEnvironment>,
    zero_based_offset: bool,
}

impl ReadFileExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>, zero_based_offset: bool) -> Self {
        Self { env, zero_based_offset }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for ReadFileExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "path")?;
        let offset = usize_arg(&args, "offset").map(|o| if self.zero_based_offset { o + 1 } else { o });
        let limit = usize_arg(&args, "limit");
        self.env.read_file(&path, offset, limit).await.map_err(|e| e.to_string())
    }
}

pub struct WriteFileExecutor {
    env: Arc<dyn ExecutionEnvironment>,
}

impl WriteFileExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for WriteFileExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "path")?;
        let content = str_arg(&args, "content")?;
        self.env.write_file(&path, &content).await.map_err(|e| e.to_string())?;
        Ok(format!("wrote {} bytes to {path}", content.len()))
    }
}

/// `replace_all: bool` (Anthropic family) or `expected_replacements: u32`
/// (Gemini family), never both; the executor accepts either key.
pub struct EditFileExecutor {
    env: Arc<dyn ExecutionEnvironment>,
}

impl EditFileExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for EditFileExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, "file_path")?;
        let old_string = str_arg(&args, "old_string")?;
        let new_string = str_arg(&args, "new_string")?;
        let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);
        let expected_replacements = args.get("expected_replacements").and_then(Value::as_u64).map(|n| n as usize);

        let current = self.env.read_file_raw(&path).await.map_err(|e| e.to_string())?;
        let occurrences = current.matches(old_string.as_str()).count();
        if occurrences == 0 {
            return Err(format!("old_string not found in {path}"));
        }
        if let Some(expected) = expected_replacements {
            if occurrences != expected {
                return Err(format!(
                    "expected {expected} occurrences of old_string, found {occurrences}"
                ));
            }
        } else if occurrences > 1 && !replace_all {
            return Err(format!(
                "old_string occurs {occurrences} times in {path}; pass replace_all or narrow the match"
            ));
        }

        let updated = current.replacen(&old_string, &new_string, if replace_all { occurrences } else { 1 });
        self.env.write_file(&path, &updated).await.map_err(|e| e.to_string())?;
        Ok(format!("replaced {occurrences} occurrence(s) in {path}"))
    }
}

pub struct ShellExecutor {
    env: Arc<dyn ExecutionEnvironment>,
    default_timeout_ms: u64,
}

impl ShellExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>, default_timeout_ms: u64) -> Self {
        Self { env, default_timeout_ms }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for ShellExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = str_arg(&args, "command")?;
        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(self.default_timeout_ms);
        let cwd = args.get("cwd").and_then(Value::as_str).map(PathBuf::from);
        let options = ExecOptions {
            timeout_ms: Some(timeout_ms),
            cwd,
            env: Vec::new(),
        };
        let output = self.env.exec_command(&command, options).await.map_err(|e| e.to_string())?;
        if output.timed_out {
            return Err(format!("command timed out after {timeout_ms}ms"));
        }
        Ok(format!(
            "exit_code={}\nstdout:\n{}\nstderr:\n{}",
            output.exit_code, output.stdout, output.stderr
        ))
    }
}

pub struct GrepExecutor {
    env: Arc<dyn ExecutionEnvironment>,
}

impl GrepExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for GrepExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let pattern = str_arg(&args, "pattern")?;
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        let options = GrepOptions {
            case_sensitive: args.get("case_sensitive").and_then(Value::as_bool).unwrap_or(false),
            include_pattern: args.get("include").and_then(Value::as_str).map(str::to_string),
            context_lines: usize_arg(&args, "context_lines").unwrap_or(0),
            ..Default::default()
        };
        self.env.grep(&pattern, &path, options).await.map_err(|e| e.to_string())
    }
}

pub struct GlobExecutor {
    env: Arc<dyn ExecutionEnvironment>,
}

impl GlobExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for GlobExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let pattern = str_arg(&args, "pattern")?;
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        let hits = self.env.glob(&pattern, &path).await.map_err(|e| e.to_string())?;
        Ok(hits.join("\n"))
    }
}

pub struct ListDirExecutor {
    env: Arc<dyn ExecutionEnvironment>,
}

impl ListDirExecutor {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl relay_core::ToolExecutor for ListDirExecutor {
    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        let depth = usize_arg(&args, "depth").unwrap_or(1);
        let entries = self.env.list_directory(&path, depth).await.map_err(|e| e.to_string())?;
        Ok(entries
            .into_iter()
            .map(|e| format!("{}{}", e.name, if e.is_dir { "/" } else { "" }))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// `apply_patch` is catalogued (§6) but its body is explicitly out of
/// scope; this executor reports that clearly rather than silently
/// no-opping, so a model that calls it gets an actionable tool result.
pub struct ApplyPatchExecutor;

#[async_trait]
impl relay_core::ToolExecutor for ApplyPatchExecutor {
    async fn execute(&self, _args: Value) -> Result<String, String> {
        Err("apply_patch has no built-in body; wire a provider-specific patch applier".to_string())
    }
}
