//! Reference `ExecutionEnvironment`: a local-filesystem, local-process
//! implementation. Grounded on the teacher's individual tool bodies
//! (read/write/bash/grep/glob), generalized behind the trait boundary.

use crate::environment::{
    DirEntryInfo, EnvError, EnvResult, EnvVarPolicy, ExecOptions, ExecOutput, ExecutionEnvironment,
    GrepOptions,
};
use async_trait::async_trait;
use globset::{Glob, GlobSetBuilder};
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const DEFAULT_READ_LIMIT: usize = 2000;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;
const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;
const MAX_GREP_RESULTS: usize = 5000;
const MAX_GLOB_RESULTS: usize = 1000;

pub struct LocalExecutionEnvironment {
    workspace_root: PathBuf,
    env_var_policy: EnvVarPolicy,
}

impl LocalExecutionEnvironment {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            env_var_policy: EnvVarPolicy::InheritCore,
        }
    }

    pub fn with_env_var_policy(mut self, policy: EnvVarPolicy) -> Self {
        self.env_var_policy = policy;
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            dirs::home_dir().map(|h| h.join(rest)).unwrap_or_else(|| PathBuf::from(path))
        } else if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.workspace_root.join(path)
        };
        expanded.canonicalize().unwrap_or(expanded)
    }

    fn should_skip_dir(name: &str) -> bool {
        name.starts_with('.') || name == "node_modules" || name == "target"
    }
}

#[async_trait]
impl ExecutionEnvironment for LocalExecutionEnvironment {
    async fn read_file(&self, path: &str, offset: Option<usize>, limit: Option<usize>) -> EnvResult<String> {
        let resolved = self.resolve(path);
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| EnvError::Io(format!("{}: {e}", resolved.display())))?;
        let lines: Vec<&str> = content.lines().collect();
        let start = offset.unwrap_or(1).saturating_sub(1).min(lines.len());
        let limit = limit.unwrap_or(DEFAULT_READ_LIMIT);
        let end = (start + limit).min(lines.len());
        let numbered: Vec<String> = lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", start + i + 1, line))
            .collect();
        Ok(numbered.join("\n"))
    }

    async fn read_file_raw(&self, path: &str) -> EnvResult<String> {
        let resolved = self.resolve(path);
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| EnvError::Io(format!("{}: {e}", resolved.display())))
    }

    async fn write_file(&self, path: &str, content: &str) -> EnvResult<()> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| EnvError::Io(e.to_string()))?;
        }
        tokio::fs::write(&resolved, content).await.map_err(|e| EnvError::Io(e.to_string()))
    }

    async fn delete_file(&self, path: &str) -> EnvResult<()> {
        let resolved = self.resolve(path);
        tokio::fs::remove_file(&resolved).await.map_err(|e| EnvError::Io(e.to_string()))
    }

    async fn file_exists(&self, path: &str) -> bool {
        tokio::fs::metadata(self.resolve(path)).await.is_ok()
    }

    async fn list_directory(&self, path: &str, depth: usize) -> EnvResult<Vec<DirEntryInfo>> {
        let root = self.resolve(path);
        let mut entries = Vec::new();
        let mut walker = walkdir::WalkDir::new(&root).max_depth(depth.max(1)).into_iter();
        walker.next(); // skip the root entry itself
        for entry in walker.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            if Self::should_skip_dir(&name) && entry.file_type().is_dir() {
                continue;
            }
            let metadata = entry.metadata().ok();
            entries.push(DirEntryInfo {
                name,
                is_dir: entry.file_type().is_dir(),
                size: metadata.map(|m| m.len()),
            });
        }
        Ok(entries)
    }

    async fn exec_command(&self, command: &str, options: ExecOptions) -> EnvResult<ExecOutput> {
        let timeout_secs = options
            .timeout_ms
            .map(|ms| (ms / 1000).max(1))
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS)
            .min(MAX_COMMAND_TIMEOUT_SECS);
        let cwd = options.cwd.clone().unwrap_or_else(|| self.workspace_root.clone());

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command).current_dir(&cwd);
        cmd.env_clear();
        let inherited = crate::environment::filter_env_vars(self.env_var_policy, std::env::vars());
        for (key, value) in inherited.into_iter().chain(options.env.iter().cloned()) {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().map_err(|e| EnvError::Io(e.to_string()))?;
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let wait_result = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), child.wait()).await;

        let (status, timed_out) = match wait_result {
            Ok(result) => (result.map_err(|e| EnvError::Io(e.to_string()))?, false),
            Err(_) => {
                let _ = child.kill().await;
                (child.wait().await.map_err(|e| EnvError::Io(e.to_string()))?, true)
            }
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut pipe) = stdout_pipe.take() {
            let _ = pipe.read_to_string(&mut stdout).await;
        }
        if let Some(mut pipe) = stderr_pipe.take() {
            let _ = pipe.read_to_string(&mut stderr).await;
        }

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn grep(&self, pattern: &str, path: &str, options: GrepOptions) -> EnvResult<String> {
        let root = self.resolve(path);
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| EnvError::Io(format!("invalid pattern: {e}")))?;

        let include_set = match &options.include_pattern {
            Some(p) => {
                let mut builder = GlobSetBuilder::new();
                builder.add(Glob::new(p).map_err(|e| EnvError::Io(e.to_string()))?);
                Some(builder.build().map_err(|e| EnvError::Io(e.to_string()))?)
            }
            None => None,
        };

        let mut matches = Vec::new();
        let max_results = options.max_results.unwrap_or(MAX_GREP_RESULTS).min(MAX_GREP_RESULTS);

        for entry in walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !Self::should_skip_dir(name) || !e.file_type().is_dir())
                    .unwrap_or(true)
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(set) = &include_set {
                if !set.is_match(entry.path()) {
                    continue;
                }
            }
            let Ok(bytes) = tokio::fs::read(entry.path()).await else { continue };
            if bytes[..bytes.len().min(512)].contains(&0) {
                continue;
            }
            let content = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = content.lines().collect();
            for (i, line) in lines.iter().enumerate() {
                if matches.len() >= max_results {
                    break;
                }
                if regex.is_match(line) {
                    let start_ctx = i.saturating_sub(options.context_lines);
                    let end_ctx = (i + options.context_lines + 1).min(lines.len());
                    for (j, ctx_line) in lines[start_ctx..end_ctx].iter().enumerate() {
                        let marker = if start_ctx + j == i { ">" } else { " " };
                        matches.push(format!(
                            "{}:{}:{} {}",
                            entry.path().display(),
                            start_ctx + j + 1,
                            marker,
                            ctx_line
                        ));
                    }
                    matches.push("--".to_string());
                }
            }
            if matches.len() >= max_results {
                break;
            }
        }

        Ok(matches.join("\n"))
    }

    async fn glob(&self, pattern: &str, path: &str) -> EnvResult<Vec<String>> {
        let root = self.resolve(path);
        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| EnvError::Io(e.to_string()))?
            .compile_matcher();

        let mut hits: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if glob.is_match(relative) {
                let mtime = entry.metadata().ok().and_then(|m| m.modified().ok()).unwrap_or(std::time::UNIX_EPOCH);
                hits.push((entry.path().to_path_buf(), mtime));
            }
        }
        hits.sort_by(|a, b| b.1.cmp(&a.1));
        hits.truncate(MAX_GLOB_RESULTS);
        Ok(hits.into_iter().map(|(p, _)| p.display().to_string()).collect())
    }

    fn working_directory(&self) -> PathBuf {
        self.workspace_root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_file_numbers_lines_from_one() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma\n").await.unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let out = env.read_file("a.txt", None, None).await.unwrap();
        assert!(out.starts_with("     1\talpha"));
        assert!(out.contains("     3\tgamma"));
    }

    #[tokio::test]
    async fn read_file_respects_offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\nfour\n").await.unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let out = env.read_file("a.txt", Some(2), Some(1)).await.unwrap();
        assert_eq!(out, "     2\ttwo");
    }

    #[tokio::test]
    async fn write_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        env.write_file("nested/sub/out.txt", "hi").await.unwrap();
        let content = tokio::fs::read_to_string(dir.path().join("nested/sub/out.txt")).await.unwrap();
        assert_eq!(content, "hi");
    }

    #[tokio::test]
    async fn delete_file_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        tokio::fs::write(&path, "bye").await.unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        assert!(env.file_exists("gone.txt").await);
        env.delete_file("gone.txt").await.unwrap();
        assert!(!env.file_exists("gone.txt").await);
    }

    #[tokio::test]
    async fn exec_command_captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let out = env.exec_command("echo hello", ExecOptions::default()).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, 0);
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn exec_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let options = ExecOptions {
            timeout_ms: Some(100),
            ..Default::default()
        };
        let out = env.exec_command("sleep 5", options).await.unwrap();
        assert!(out.timed_out);
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn exec_command_strips_sensitive_env_under_inherit_all() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path()).with_env_var_policy(EnvVarPolicy::InheritAll);
        std::env::set_var("RELAY_TEST_API_KEY", "super-secret");
        let out = env
            .exec_command("echo ${RELAY_TEST_API_KEY:-missing}", ExecOptions::default())
            .await
            .unwrap();
        std::env::remove_var("RELAY_TEST_API_KEY");
        assert_eq!(out.stdout.trim(), "missing");
    }

    #[tokio::test]
    async fn grep_finds_matching_lines_with_context() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\nneedle here\nthree\n").await.unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let out = env.grep("needle", ".", GrepOptions::default()).await.unwrap();
        assert!(out.contains("needle here"));
    }

    #[tokio::test]
    async fn glob_matches_and_sorts_by_mtime_desc() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "").await.unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
        let env = LocalExecutionEnvironment::new(dir.path());
        let hits = env.glob("*.rs", ".").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].ends_with("a.rs"));
    }
}
