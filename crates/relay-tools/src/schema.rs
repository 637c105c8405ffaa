//! Tool JSON schema catalogue: the three profile families named in §6.
//! Each schema is grounded on the teacher's `input_schema()` bodies in
//! `tools/read.rs`/`write.rs`/`edit.rs`/`bash.rs`/`grep.rs`/`glob.rs`,
//! reshaped per family.

use relay_core::ToolSchema;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolProfile {
    OpenAi,
    Anthropic,
    Gemini,
}

/// Returns the tool schema catalogue for `profile`, in the order the
/// family's name list is given in §6.
pub fn catalogue(profile: ToolProfile) -> Vec<ToolSchema> {
    match profile {
        ToolProfile::OpenAi => vec![
            read_file_1_based(),
            write_file_schema(),
            shell_schema(),
            grep_schema(),
            glob_schema(),
            apply_patch_schema(),
        ],
        ToolProfile::Anthropic => vec![
            read_file_1_based(),
            write_file_schema(),
            edit_file_boolean_replace_all(),
            shell_schema(),
            grep_schema(),
            glob_schema(),
        ],
        ToolProfile::Gemini => vec![
            read_file_0_based(),
            write_file_schema(),
            edit_file_expected_replacements(),
            shell_schema(),
            grep_schema(),
            glob_schema(),
            list_dir_schema(),
        ],
    }
}

fn read_file_1_based() -> ToolSchema {
    ToolSchema {
        name: "read_file".to_string(),
        description: "Read a file's contents, optionally starting from a 1-based line offset.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path, absolute or workspace-relative."},
                "offset": {"type": "integer", "description": "1-based line number to start reading from."},
                "limit": {"type": "integer", "description": "Maximum number of lines to return."}
            },
            "required": ["path"]
        }),
    }
}

fn read_file_0_based() -> ToolSchema {
    ToolSchema {
        name: "read_file".to_string(),
        description: "Read a file's contents, optionally starting from a 0-based line offset.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path, absolute or workspace-relative."},
                "offset": {"type": "integer", "description": "0-based line number to start reading from."},
                "limit": {"type": "integer", "description": "Maximum number of lines to return."}
            },
            "required": ["path"]
        }),
    }
}

fn write_file_schema() -> ToolSchema {
    ToolSchema {
        name: "write_file".to_string(),
        description: "Create or overwrite a file with the given content.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        }),
    }
}

fn edit_file_boolean_replace_all() -> ToolSchema {
    ToolSchema {
        name: "edit_file".to_string(),
        description: "Replace an exact occurrence of old_string with new_string in a file. \
            old_string must be unique in the file unless replace_all is set."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "replace_all": {"type": "boolean", "default": false}
            },
            "required": ["file_path", "old_string", "new_string"]
        }),
    }
}

fn edit_file_expected_replacements() -> ToolSchema {
    ToolSchema {
        name: "edit_file".to_string(),
        description: "Replace an exact occurrence of old_string with new_string in a file. \
            The number of occurrences must match expected_replacements."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "expected_replacements": {"type": "integer", "default": 1}
            },
            "required": ["file_path", "old_string", "new_string"]
        }),
    }
}

fn shell_schema() -> ToolSchema {
    ToolSchema {
        name: "shell".to_string(),
        description: "Run a shell command in the workspace and return its stdout/stderr/exit code.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "timeout_ms": {"type": "integer"},
                "cwd": {"type": "string"}
            },
            "required": ["command"]
        }),
    }
}

fn grep_schema() -> ToolSchema {
    ToolSchema {
        name: "grep".to_string(),
        description: "Search file contents with a regular expression.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string", "default": "."},
                "case_sensitive": {"type": "boolean", "default": false},
                "include": {"type": "string", "description": "Glob to restrict which files are searched."},
                "context_lines": {"type": "integer", "default": 0}
            },
            "required": ["pattern"]
        }),
    }
}

fn glob_schema() -> ToolSchema {
    ToolSchema {
        name: "glob".to_string(),
        description: "Find files matching a glob pattern, most recently modified first.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string", "default": "."}
            },
            "required": ["pattern"]
        }),
    }
}

fn apply_patch_schema() -> ToolSchema {
    ToolSchema {
        name: "apply_patch".to_string(),
        description: "Apply a unified-diff-style patch against one or more files.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "patch": {"type": "string", "description": "The patch body, in the apply_patch envelope format."}
            },
            "required": ["patch"]
        }),
    }
}

fn list_dir_schema() -> ToolSchema {
    ToolSchema {
        name: "list_dir".to_string(),
        description: "List the contents of a directory up to a given depth.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."},
                "depth": {"type": "integer", "default": 1}
            },
            "required": []
        }),
    }
}
