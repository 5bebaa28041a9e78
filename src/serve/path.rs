//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

/// Resolve a request path under `root`.
///
/// Directories resolve to their `index` file. Paths that escape `root`,
/// directly or through symlinks, resolve to nothing.
pub fn resolve_path(url: &str, root: &Path, index: &str) -> Option<PathBuf> {
    let clean = normalize_url(url)?;

    // Reject paths with suspicious patterns early
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let local = root.join(&clean);

    // Canonicalize to resolve symlinks and verify path is under root
    let canonical = local.canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join(index).canonicalize().ok()?;
        if index.starts_with(&root_canonical) && index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Normalize URL: strip query and fragment, decode, trim slashes.
///
/// `None` if the decoded path is not UTF-8 or contains a NUL.
fn normalize_url(url: &str) -> Option<String> {
    use percent_encoding::percent_decode_str;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.trim_matches('/').replace('\\', "/"))
}
