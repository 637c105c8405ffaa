//! Built-in tool catalogue and registry: the `ExecutionEnvironment`
//! boundary, its local reference implementation, per-profile JSON
//! schemas, concrete executors, and the name-keyed registry that wires
//! them together for a session.

pub mod builtin;
pub mod environment;
pub mod local;
pub mod registry;
pub mod schema;

pub use environment::{
    DirEntryInfo, EnvError, EnvResult, EnvVarPolicy, ExecOptions, ExecOutput, ExecutionEnvironment, GrepOptions,
};
pub use local::LocalExecutionEnvironment;
pub use registry::ToolRegistry;
pub use schema::ToolProfile;

use relay_core::Tool;
use std::sync::Arc;

/// Builds a registry of all built-in tools for `profile`, each wired to
/// execute against `env`.
pub fn default_registry(env: Arc<dyn ExecutionEnvironment>, profile: ToolProfile) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for s in schema::catalogue(profile) {
        let executor: Arc<dyn relay_core::ToolExecutor> = match s.name.as_str() {
            "read_file" => Arc::new(builtin::ReadFileExecutor::new(env.clone(), profile == ToolProfile::Gemini)),
            "write_file" => Arc::new(builtin::WriteFileExecutor::new(env.clone())),
            "edit_file" => Arc::new(builtin::EditFileExecutor::new(env.clone())),
            "shell" => Arc::new(builtin::ShellExecutor::new(env.clone(), 120_000)),
            "grep" => Arc::new(builtin::GrepExecutor::new(env.clone())),
            "glob" => Arc::new(builtin::GlobExecutor::new(env.clone())),
            "list_dir" => Arc::new(builtin::ListDirExecutor::new(env.clone())),
            "apply_patch" => Arc::new(builtin::ApplyPatchExecutor),
            _ => continue,
        };
        registry.register(Tool::active(s, executor));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_schema_in_each_profile() {
        for profile in [ToolProfile::OpenAi, ToolProfile::Anthropic, ToolProfile::Gemini] {
            let env: Arc<dyn ExecutionEnvironment> = Arc::new(LocalExecutionEnvironment::new("."));
            let registry = default_registry(env, profile);
            assert_eq!(registry.len(), schema::catalogue(profile).len());
            assert!(registry.list().all(|t| t.is_active()));
        }
    }
}
