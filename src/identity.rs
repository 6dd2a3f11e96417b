//! File identity helpers.
//!
//! A file's identity (uid) is its path relative to the session's working root,
//! joined with `/`. The same string is used as the routing key for live
//! reload, so it must not depend on how the path was spelled by the caller.

use std::path::{Component, Path, PathBuf};

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `root` (when relative) and clean it.
pub fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        clean_path(path)
    } else {
        clean_path(&root.join(path))
    }
}

/// Relative path from directory `from` to `to`. Both are expected absolute.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = clean_path(from);
    let to = clean_path(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Join path components with `/` regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Stable identity of `path` relative to `root`.
pub fn file_identity(root: &Path, path: &Path) -> String {
    let absolute = absolutize(root, path);
    to_slash(&relative_path(root, &absolute))
}
