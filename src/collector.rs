// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! File collection.
//!
//! Depth-first traversal from a root URI through the host [`FileService`],
//! filtering out noise directories and non-code files before reading
//! content. Unreadable nodes are skipped with a warning, never fatal.

use crate::tree::FileInput;
use crate::workspace::{base_name, FileService};
use std::collections::VecDeque;
use tracing::{debug, warn};

const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

const BLOCKED_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    "out",
    "coverage",
    ".cache",
    "vendor",
    "target",
    "__pycache__",
    ".pytest_cache",
    ".venv",
    "venv",
];

const BLOCKED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".mp4", ".mov", ".avi", ".mkv",
    ".mp3", ".wav", ".ogg", ".zip", ".tar", ".gz", ".rar", ".7z", ".pdf", ".doc", ".docx",
    ".exe", ".dll", ".so", ".dylib", ".lock", ".log", ".min.js", ".min.css", ".map",
];

const ALLOWED_EXTENSIONS: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".py", ".java", ".cpp", ".c", ".h", ".hpp", ".cs", ".go",
    ".rs", ".rb", ".php", ".swift", ".kt", ".scala", ".sh", ".sql", ".html", ".css", ".scss",
    ".json", ".yaml", ".yml", ".xml", ".md", ".txt",
];

/// Returns the lower-cased dotted extension (last `.` onward), or `None`
/// for extensionless files.
fn dotted_extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(name[dot..].to_lowercase())
}

fn is_blocked_directory(name: &str) -> bool {
    BLOCKED_DIRECTORIES.contains(&name)
}

/// Block-listed extensions are matched as a case-insensitive suffix, not
/// via [`dotted_extension`] — that's what lets compound suffixes like
/// `.min.js` match `bundle.min.js`, which a last-dot split alone never
/// would (it would see only `.js`).
fn is_blocked_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    BLOCKED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_allowed_file(name: &str) -> bool {
    if is_blocked_extension(name) {
        return false;
    }
    match dotted_extension(name) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Walks `root_uri` and returns every accepted file as a [`FileInput`],
/// with paths relative to `root_uri`, forward-slash separated, no leading
/// slash.
pub async fn collect_files(
    file_service: &dyn FileService,
    root_uri: &str,
) -> Vec<FileInput> {
    let mut out = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back((root_uri.to_string(), String::new()));

    while let Some((uri, relative_prefix)) = queue.pop_front() {
        let node = match file_service.resolve(&uri).await {
            Ok(node) => node,
            Err(error) => {
                warn!(%uri, %error, "failed to resolve path during collection, skipping");
                continue;
            }
        };

        if node.is_directory {
            let Some(children) = node.children else {
                continue;
            };
            for child in children {
                let name = base_name(&child.resource);
                if name.is_empty() {
                    continue;
                }
                let relative = if relative_prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{relative_prefix}/{name}")
                };

                // We don't yet know if this child is itself a directory;
                // that's only knowable after resolving it. Block-listed
                // directory names are cheap to check by name alone first.
                if is_blocked_directory(&name) {
                    debug!(path = %relative, "skipping blocked directory");
                    continue;
                }
                queue.push_back((child.resource, relative));
            }
        } else if node.is_file {
            let size = node.size.unwrap_or(0);
            if size > MAX_FILE_SIZE_BYTES {
                debug!(path = %relative_prefix, size, "skipping oversized file");
                continue;
            }
            let name = base_name(&uri);
            if !is_allowed_file(&name) {
                continue;
            }
            match file_service.read(&uri).await {
                Ok(content) => out.push(FileInput {
                    path: relative_prefix.clone(),
                    content,
                    size: Some(size),
                    last_modified: None,
                }),
                Err(error) => {
                    warn!(path = %relative_prefix, %error, "failed to read file, skipping");
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{LocalFsFileService, LocalFsWorkspace, Workspace};

    #[tokio::test]
    async fn test_collects_only_allowed_code_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("main.rs"), "fn main() {}")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("logo.png"), "binary")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("Cargo.lock"), "lockfile")
            .await
            .unwrap();

        let service = LocalFsFileService;
        let ws = LocalFsWorkspace::new(dir.path());
        let root = &ws.roots()[0];

        let files = collect_files(&service, root).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "main.rs");
    }

    #[tokio::test]
    async fn test_skips_blocked_directories() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("node_modules"))
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("node_modules").join("pkg.js"),
            "ignored",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("app.js"), "console.log(1)")
            .await
            .unwrap();

        let service = LocalFsFileService;
        let ws = LocalFsWorkspace::new(dir.path());
        let root = &ws.roots()[0];

        let files = collect_files(&service, root).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "app.js");
    }

    #[tokio::test]
    async fn test_nested_directories_produce_joined_paths() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("src/nested"))
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("src/nested/util.ts"),
            "export const x = 1;",
        )
        .await
        .unwrap();

        let service = LocalFsFileService;
        let ws = LocalFsWorkspace::new(dir.path());
        let root = &ws.roots()[0];

        let files = collect_files(&service, root).await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/nested/util.ts");
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension("file.min.js"), Some(".js".to_string()));
        assert_eq!(dotted_extension("Dockerfile"), None);
        assert_eq!(dotted_extension(".gitignore"), None);
    }

    #[test]
    fn test_blocked_extension_takes_priority() {
        assert!(!is_allowed_file("bundle.min.js"));
        assert!(is_allowed_file("app.js"));
    }
}
