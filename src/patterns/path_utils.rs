// src/patterns/path_utils.rs

//! Utility functions for relating filesystem paths to pattern roots.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be related to `root`, which includes a
/// path that no longer exists by the time we try to canonicalize it.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // macOS reports events under /private/var/... for /var/... roots.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_str(Path::new("/w/webapp"), Path::new("/w/webapp/scripts/a.js")),
            Some("scripts/a.js".to_string())
        );
    }

    #[test]
    fn unrelated_missing_path_is_none() {
        assert_eq!(
            relative_str(Path::new("/nonexistent/root"), Path::new("/elsewhere/x.js")),
            None
        );
    }
}
