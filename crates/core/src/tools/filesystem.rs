//! Filesystem tools (`spec.md` §4.2): `list_dir`, `read_file`, `read_many`,
//! `write_file`, `delete_path`, `replace_in_file`. Every path parameter
//! flows through [`crate::sandbox::resolve`]. Error message shapes are
//! preserved per-tool rather than normalized, per `SPEC_FULL.md` §4.2.A:
//! `list_dir`/`write_file`/`delete_path`/`replace_in_file` use verbose
//! sentence errors embedding the raw argument; `read_file`/`read_many` use
//! terse tags, grounded in `original_source/sources/workflow/tools.py`'s
//! `_read_file_common` helper.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use super::{Tool, ToolContext};
use crate::sandbox;

const DEFAULT_MAX_BYTES: usize = 200_000;
const MAX_READ_MANY_FILES: usize = 10;

fn escapes_root_verbose(raw_path: &str) -> Value {
    json!({ "error": format!("Path escapes ROOT: {raw_path}") })
}

// ---------------------------------------------------------------------
// list_dir
// ---------------------------------------------------------------------

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "Recursively list files and directories under a path (relative to repo root), \
         filtered by a glob. Can optionally include hidden entries."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Starting directory relative to repo root.", "default": "." },
                "glob": { "type": "string", "description": "Glob pattern to filter results.", "default": "*" },
                "include_hidden": { "type": "boolean", "description": "Include hidden files/folders.", "default": false },
            },
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let raw_path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let pattern = args.get("glob").and_then(|v| v.as_str()).unwrap_or("*");
        let include_hidden = args.get("include_hidden").and_then(|v| v.as_bool()).unwrap_or(false);

        let Ok(glob_pattern) = glob::Pattern::new(pattern) else {
            return json!({ "error": format!("invalid glob pattern: {pattern}") });
        };

        let resolved = match sandbox::resolve(&ctx.root, raw_path) {
            Ok(p) => p,
            Err(_) => return escapes_root_verbose(raw_path),
        };
        if !resolved.exists() {
            return json!({ "error": format!("Path not found: {raw_path}") });
        }

        let mut entries = Vec::new();
        walk(&resolved, &ctx.root, &glob_pattern, include_hidden, &mut entries);
        entries.sort_by(|a: &Value, b: &Value| {
            a.get("path").and_then(|v| v.as_str()).cmp(&b.get("path").and_then(|v| v.as_str()))
        });

        json!({ "entries": entries })
    }
}

fn walk(
    dir: &Path,
    root: &Path,
    pattern: &glob::Pattern,
    include_hidden: bool,
    out: &mut Vec<Value>,
) {
    let Ok(read_dir) = std::fs::read_dir(dir) else { return };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else { continue };
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if rel.components().any(|c| c.as_os_str().to_string_lossy().contains("cache")) {
            continue;
        }
        if !include_hidden
            && rel.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            continue;
        }

        let is_dir = path.is_dir();
        let name_matches = entry
            .file_name()
            .to_str()
            .map(|n| pattern.matches(n))
            .unwrap_or(false);

        if name_matches {
            if is_dir {
                out.push(json!({ "path": format!("{rel_str}/"), "is_directory": true }));
            } else {
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                out.push(json!({ "path": rel_str, "is_file": true, "bytes_size": size }));
            }
        }

        if is_dir {
            walk(&path, root, pattern, include_hidden, out);
        }
    }
}

// ---------------------------------------------------------------------
// read_file / read_many
// ---------------------------------------------------------------------

fn read_file_common(root: &Path, rel: &str, offset: usize, max_bytes: usize) -> Value {
    let resolved = match sandbox::resolve(root, rel) {
        Ok(p) => p,
        Err(_) => return json!({ "path": rel, "error": "escapes_root" }),
    };
    if !resolved.exists() {
        return json!({ "path": rel, "error": "not_found" });
    }
    if resolved.is_dir() {
        return json!({ "path": rel, "error": "is_directory" });
    }

    let raw = match std::fs::read(&resolved) {
        Ok(bytes) => bytes,
        Err(e) => return json!({ "path": rel, "error": format!("read_failed: {e}") }),
    };

    if offset > raw.len() {
        return json!({ "path": rel, "error": "offset_after_EOF" });
    }

    let end = raw.len().min(offset.saturating_add(max_bytes));
    let truncated = raw.len() > end;
    let slice = &raw[offset..end];

    match std::str::from_utf8(slice) {
        Ok(text) => json!({ "path": rel, "text": text, "truncated": truncated }),
        Err(_) => {
            let b64 = base64::engine::general_purpose::STANDARD.encode(slice);
            json!({ "path": rel, "base64_data": b64, "encoding": "base64", "truncated": truncated })
        }
    }
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read up to `max_bytes` starting from `offset` from a single file under the repo root. \
         Returns UTF-8 text if possible, else Base64-encoded bytes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to repo root." },
                "offset": { "type": "integer", "description": "Byte offset to start reading from.", "default": 0 },
                "max_bytes": { "type": "integer", "description": "Maximum number of bytes to read.", "default": 200_000, "minimum": 1 },
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return json!({ "error": "missing required parameter: path" }),
        };
        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let max_bytes = args.get("max_bytes").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MAX_BYTES as u64) as usize;
        read_file_common(&ctx.root, path, offset, max_bytes)
    }
}

pub struct ReadManyTool;

#[async_trait]
impl Tool for ReadManyTool {
    fn name(&self) -> &str {
        "read_many"
    }

    fn description(&self) -> &str {
        "Read multiple explicitly listed files under the repo root (max 10 files)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": { "type": "array", "items": { "type": "string" }, "description": "File paths relative to repo root." },
                "offset": { "type": "integer", "default": 0 },
                "max_bytes_per_file": { "type": "integer", "default": 200_000 },
            },
            "required": ["paths"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let paths: Vec<String> = match args.get("paths").and_then(|v| v.as_array()) {
            Some(arr) => arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            None => return json!({ "error": "no_files_provided" }),
        };
        if paths.is_empty() {
            return json!({ "error": "no_files_provided" });
        }
        if paths.len() > MAX_READ_MANY_FILES {
            return json!({
                "error": "too_many_files",
                "max_allowed": MAX_READ_MANY_FILES,
                "requested": paths.len(),
            });
        }

        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let max_bytes = args
            .get("max_bytes_per_file")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_BYTES as u64) as usize;

        let mut entries: Vec<Value> =
            paths.iter().map(|p| read_file_common(&ctx.root, p, offset, max_bytes)).collect();
        entries.sort_by(|a, b| {
            a.get("path").and_then(|v| v.as_str()).cmp(&b.get("path").and_then(|v| v.as_str()))
        });

        json!({ "entries": entries })
    }
}

// ---------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a UTF-8 text file under the repo root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Target file path relative to repo root." },
                "content": { "type": "string", "description": "UTF-8 text content to write." },
                "overwrite": { "type": "boolean", "default": true },
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return json!({ "error": "missing required parameter: path" }),
        };
        let content = match args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return json!({ "error": "missing required parameter: content" }),
        };
        let overwrite = args.get("overwrite").and_then(|v| v.as_bool()).unwrap_or(true);

        let resolved = match sandbox::resolve(&ctx.root, path) {
            Ok(p) => p,
            Err(_) => return escapes_root_verbose(path),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return json!({ "error": format!("Failed to create parent directories: {e}") });
            }
        }

        if resolved.exists() && !overwrite {
            return json!({ "error": format!("File already exists: {path}") });
        }

        match std::fs::write(&resolved, content) {
            Ok(()) => json!({ "ok": true }),
            Err(e) => json!({ "error": format!("Failed to write file: {e}") }),
        }
    }
}

// ---------------------------------------------------------------------
// delete_path
// ---------------------------------------------------------------------

pub struct DeletePathTool;

#[async_trait]
impl Tool for DeletePathTool {
    fn name(&self) -> &str {
        "delete_path"
    }

    fn description(&self) -> &str {
        "Delete a file or directory (recursively) under the repo root. Idempotent for \
         missing paths; refuses to delete the repo root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "Path relative to repo root to delete." } },
            "required": ["path"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return json!({ "error": "missing required parameter: path" }),
        };

        let resolved = match sandbox::resolve(&ctx.root, path) {
            Ok(p) => p,
            Err(_) => return escapes_root_verbose(path),
        };

        let canonical_root = ctx.root.canonicalize().unwrap_or_else(|_| ctx.root.clone());
        if resolved == canonical_root {
            return json!({ "error": "refuse_delete_root" });
        }
        if !resolved.exists() {
            return json!({ "ok": true });
        }

        let result = if resolved.is_dir() {
            std::fs::remove_dir_all(&resolved)
        } else {
            std::fs::remove_file(&resolved)
        };

        match result {
            Ok(()) => json!({ "ok": true }),
            Err(e) => json!({ "error": format!("Failed to delete path: {e}") }),
        }
    }
}

// ---------------------------------------------------------------------
// replace_in_file
// ---------------------------------------------------------------------

pub struct ReplaceInFileTool;

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replace_in_file"
    }

    fn description(&self) -> &str {
        "Replace exactly one occurrence of `find` with `replace` in a UTF-8 text file. \
         Fails if not found or not unique, or if find==replace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to repo root." },
                "find": { "type": "string", "description": "Substring to locate (must occur exactly once)." },
                "replace": { "type": "string", "description": "Replacement substring (must differ from `find`)." },
            },
            "required": ["path", "find", "replace"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return json!({ "error": "missing required parameter: path" }),
        };
        let find = match args.get("find").and_then(|v| v.as_str()) {
            Some(f) => f,
            None => return json!({ "error": "missing required parameter: find" }),
        };
        let replace = match args.get("replace").and_then(|v| v.as_str()) {
            Some(r) => r,
            None => return json!({ "error": "missing required parameter: replace" }),
        };

        if find == replace {
            return json!({ "error": "find_equals_replace" });
        }

        let resolved = match sandbox::resolve(&ctx.root, path) {
            Ok(p) => p,
            Err(_) => return escapes_root_verbose(path),
        };
        if !resolved.exists() {
            return json!({ "error": format!("Path not found: {path}") });
        }
        if resolved.is_dir() {
            return json!({ "error": format!("Path is a directory: {path}") });
        }

        let text = match std::fs::read(&resolved) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(t) => t,
                Err(_) => return json!({ "error": "not_utf8_text" }),
            },
            Err(e) => return json!({ "error": format!("Failed to read file: {e}") }),
        };

        let occurrences = text.matches(find).count();
        if occurrences == 0 {
            return json!({ "error": "find_not_found", "found": 0 });
        }
        if occurrences > 1 {
            return json!({ "error": "find_not_unique", "found": occurrences });
        }

        let new_text = text.replacen(find, replace, 1);
        match std::fs::write(&resolved, new_text) {
            Ok(()) => json!({ "ok": true }),
            Err(e) => json!({ "error": format!("Failed to write file: {e}") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx(root: &Path) -> ToolContext {
        ToolContext {
            root: root.to_path_buf(),
            requirements: Arc::new(crate::requirements::RequirementScope {
                title: "root".into(),
                children: crate::requirements::ScopeChildren::Requirements(vec![]),
            }),
        }
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let w = WriteFileTool
            .execute(json!({ "path": "a.txt", "content": "hello" }), &c)
            .await;
        assert_eq!(w, json!({ "ok": true }));

        let r = ReadFileTool.execute(json!({ "path": "a.txt" }), &c).await;
        assert_eq!(r["text"], "hello");
        assert_eq!(r["truncated"], false);
    }

    #[tokio::test]
    async fn write_path_escape_is_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let w = WriteFileTool
            .execute(json!({ "path": "../../etc/passwd", "content": "x" }), &c)
            .await;
        assert_eq!(w, json!({ "error": "Path escapes ROOT: ../../etc/passwd" }));
        assert!(!dir.path().parent().unwrap().join("etc/passwd").exists());
    }

    #[tokio::test]
    async fn read_file_offset_after_eof() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let c = ctx(dir.path());
        let r = ReadFileTool.execute(json!({ "path": "a.txt", "offset": 10 }), &c).await;
        assert_eq!(r["error"], "offset_after_EOF");
    }

    #[tokio::test]
    async fn read_file_offset_at_eof_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let c = ctx(dir.path());
        let r = ReadFileTool.execute(json!({ "path": "a.txt", "offset": 2 }), &c).await;
        assert_eq!(r["text"], "");
        assert_eq!(r["truncated"], false);
    }

    #[tokio::test]
    async fn empty_file_at_offset_zero_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        let c = ctx(dir.path());
        let r = ReadFileTool.execute(json!({ "path": "empty.txt" }), &c).await;
        assert_eq!(r["text"], "");
        assert_eq!(r["truncated"], false);
    }

    #[tokio::test]
    async fn read_many_caps_at_ten() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let paths: Vec<Value> = (0..11).map(|i| json!(format!("f{i}.txt"))).collect();
        let r = ReadManyTool.execute(json!({ "paths": paths }), &c).await;
        assert_eq!(r["error"], "too_many_files");
        assert_eq!(r["requested"], 11);
    }

    #[tokio::test]
    async fn read_many_exactly_ten_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "x").unwrap();
        }
        let c = ctx(dir.path());
        let paths: Vec<Value> = (0..10).map(|i| json!(format!("f{i}.txt"))).collect();
        let r = ReadManyTool.execute(json!({ "paths": paths }), &c).await;
        assert_eq!(r["entries"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn delete_path_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let a = DeletePathTool.execute(json!({ "path": "missing.txt" }), &c).await;
        let b = DeletePathTool.execute(json!({ "path": "missing.txt" }), &c).await;
        assert_eq!(a, json!({ "ok": true }));
        assert_eq!(b, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn delete_path_refuses_root() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let r = DeletePathTool.execute(json!({ "path": "." }), &c).await;
        assert_eq!(r["error"], "refuse_delete_root");
    }

    #[tokio::test]
    async fn replace_in_file_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();
        let c = ctx(dir.path());
        let r = ReplaceInFileTool
            .execute(json!({ "path": "a.txt", "find": "foo", "replace": "bar" }), &c)
            .await;
        assert_eq!(r["error"], "find_not_unique");
        assert_eq!(r["found"], 2);
    }

    #[tokio::test]
    async fn replace_in_file_changes_length_by_delta() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let c = ctx(dir.path());
        let r = ReplaceInFileTool
            .execute(json!({ "path": "a.txt", "find": "world", "replace": "there!" }), &c)
            .await;
        assert_eq!(r, json!({ "ok": true }));
        let new_len = std::fs::read_to_string(dir.path().join("a.txt")).unwrap().len();
        assert_eq!(new_len, "hello world".len() + ("there!".len() as i64 - "world".len() as i64) as usize);
    }

    #[tokio::test]
    async fn replace_in_file_rejects_equal_find_replace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();
        let c = ctx(dir.path());
        let r = ReplaceInFileTool
            .execute(json!({ "path": "a.txt", "find": "same", "replace": "same" }), &c)
            .await;
        assert_eq!(r["error"], "find_equals_replace");
    }

    #[tokio::test]
    async fn list_dir_skips_cache_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("__pycache__")).unwrap();
        std::fs::write(dir.path().join("__pycache__/x.pyc"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        std::fs::write(dir.path().join("visible.txt"), "x").unwrap();
        let c = ctx(dir.path());
        let r = ListDirTool.execute(json!({}), &c).await;
        let paths: Vec<&str> = r["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["visible.txt"]);
    }
}
