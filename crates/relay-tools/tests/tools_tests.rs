//! Integration tests for relay-tools: the built-in tool catalogue driven
//! end to end against a real `LocalExecutionEnvironment` over a tempdir,
//! rather than exercising each executor or schema in isolation.

use relay_tools::*;
use serde_json::json;
use std::sync::Arc;

fn env_at(root: &std::path::Path) -> Arc<dyn ExecutionEnvironment> {
    Arc::new(LocalExecutionEnvironment::new(root))
}

// ===========================================================================
// default_registry end to end
// ===========================================================================

#[tokio::test]
async fn anthropic_profile_round_trips_write_then_read_through_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::Anthropic);

    let write = registry.get("write_file").expect("write_file registered");
    let write_out = write
        .executor
        .as_ref()
        .unwrap()
        .execute(json!({"path": "notes.txt", "content": "hello world"}))
        .await
        .unwrap();
    assert!(write_out.contains("11 bytes"));

    let read = registry.get("read_file").expect("read_file registered");
    let read_out = read.executor.as_ref().unwrap().execute(json!({"path": "notes.txt"})).await.unwrap();
    assert!(read_out.contains("hello world"));
}

#[tokio::test]
async fn anthropic_profile_edit_then_grep_finds_the_replacement() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.rs"), "fn old_name() {}\n").await.unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::Anthropic);

    let edit = registry.get("edit_file").expect("edit_file registered");
    edit.executor
        .as_ref()
        .unwrap()
        .execute(json!({"file_path": "a.rs", "old_string": "old_name", "new_string": "new_name"}))
        .await
        .unwrap();

    let grep = registry.get("grep").expect("grep registered");
    let hits = grep.executor.as_ref().unwrap().execute(json!({"pattern": "new_name"})).await.unwrap();
    assert!(hits.contains("a.rs"));
}

#[tokio::test]
async fn gemini_profile_read_file_offset_is_zero_based() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("lines.txt"), "one\ntwo\nthree\n").await.unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::Gemini);

    let read = registry.get("read_file").expect("read_file registered");
    // offset=0 under Gemini's 0-based convention should still include the
    // first line, unlike Anthropic's 1-based convention where offset=0
    // would be nonsensical.
    let out = read.executor.as_ref().unwrap().execute(json!({"path": "lines.txt", "offset": 0})).await.unwrap();
    assert!(out.contains("one"));
}

#[tokio::test]
async fn gemini_profile_has_list_dir_and_anthropic_does_not() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
    tokio::fs::write(dir.path().join("sub/a.txt"), "x").await.unwrap();

    let gemini_registry = default_registry(env_at(dir.path()), ToolProfile::Gemini);
    let list_dir = gemini_registry.get("list_dir").expect("list_dir registered under gemini");
    let out = list_dir.executor.as_ref().unwrap().execute(json!({"path": "sub"})).await.unwrap();
    assert!(out.contains("a.txt"));

    let anthropic_registry = default_registry(env_at(dir.path()), ToolProfile::Anthropic);
    assert!(anthropic_registry.get("list_dir").is_none());
}

#[tokio::test]
async fn openai_profile_has_apply_patch_and_no_edit_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::OpenAi);
    assert!(registry.get("edit_file").is_none());
    let apply_patch = registry.get("apply_patch").expect("apply_patch registered under openai");
    let err = apply_patch.executor.as_ref().unwrap().execute(json!({"patch": ""})).await.unwrap_err();
    assert!(err.contains("no built-in body"));
}

#[tokio::test]
async fn shell_tool_runs_through_the_environment_and_captures_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::Anthropic);
    let shell = registry.get("shell").expect("shell registered");
    let out = shell.executor.as_ref().unwrap().execute(json!({"command": "echo hi"})).await.unwrap();
    assert!(out.contains("exit_code=0"));
    assert!(out.contains("hi"));
}

#[tokio::test]
async fn glob_tool_finds_files_through_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("a.rs"), "").await.unwrap();
    tokio::fs::write(dir.path().join("b.toml"), "").await.unwrap();
    let registry = default_registry(env_at(dir.path()), ToolProfile::Anthropic);
    let glob_tool = registry.get("glob").expect("glob registered");
    let out = glob_tool.executor.as_ref().unwrap().execute(json!({"pattern": "*.rs"})).await.unwrap();
    assert!(out.contains("a.rs"));
    assert!(!out.contains("b.toml"));
}

// ===========================================================================
// Registry ordering, exercised against real tools rather than a stub map
// ===========================================================================

#[tokio::test]
async fn registry_preserves_catalogue_order_across_every_profile() {
    for profile in [ToolProfile::OpenAi, ToolProfile::Anthropic, ToolProfile::Gemini] {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(env_at(dir.path()), profile);
        let registered_names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        let catalogue_names: Vec<_> = schema::catalogue(profile).into_iter().map(|s| s.name).collect();
        assert_eq!(registered_names, catalogue_names);
    }
}

// ===========================================================================
// Env-var policy through a real exec_command call
// ===========================================================================

#[tokio::test]
async fn inherit_none_policy_strips_the_parent_environment_from_shell_calls() {
    std::env::set_var("RELAY_TOOLS_TEST_MARKER", "should-not-leak");
    let dir = tempfile::tempdir().unwrap();
    let env = LocalExecutionEnvironment::new(dir.path()).with_env_var_policy(EnvVarPolicy::InheritNone);
    let out = env
        .exec_command("echo ${RELAY_TOOLS_TEST_MARKER:-absent}", ExecOptions::default())
        .await
        .unwrap();
    std::env::remove_var("RELAY_TOOLS_TEST_MARKER");
    assert!(out.stdout.contains("absent"));
}
