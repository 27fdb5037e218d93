#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use glob::glob;
use which::which;

/// Finds the Python interpreter used to run submissions, preferring
/// `python3` over `python`.
pub fn python_path() -> Result<PathBuf> {
    which("python3").or_else(|_| which("python")).map_err(|_| {
        anyhow!("Could not find a Python interpreter on path (python3 or python)")
    })
}

/// Resolves the interpreter to use: the explicit override when given,
/// otherwise whatever [`python_path`] finds.
pub fn resolve_python(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.components().count() == 1 => which(path)
            .with_context(|| format!("Cannot find `{}` on path", path.display())),
        Some(path) => Ok(path.to_path_buf()),
        None => python_path(),
    }
}

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    let mut found: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    found.sort();
    Ok(found)
}

/// Keeps at most `limit` characters of `text`, marking the cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("opción", 4), "opci...[truncated]");
    }
}
