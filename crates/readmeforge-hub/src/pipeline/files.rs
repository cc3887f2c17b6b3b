//! Repository file access: list, read, and write the generated README.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, info};

use readmeforge_core::config::PipelineSettings;
use readmeforge_core::error::{ForgeError, Result};

/// List files under `root` as sorted, `/`-separated relative paths.
///
/// Skips denylisted directories and filename suffixes, and hidden files
/// other than the configured keepers. `.gitignore` rules are not applied;
/// the denylists decide.
pub fn list_files(root: &Path, settings: &PipelineSettings) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(ForgeError::Config(format!(
            "Repository path is not a directory: {}",
            root.display()
        )));
    }

    let skip_dirs = settings.skip_dirs.clone();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !skip_dirs.iter().any(|d| d == name.as_ref())
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if settings.skip_extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }
        if name.starts_with('.') && !settings.keep_hidden.iter().any(|k| k == name.as_ref()) {
            continue;
        }

        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    info!("Listed {} files under {}", files.len(), root.display());
    Ok(files)
}

/// Read a repository file as text. Failures come back inline as
/// `Error reading <path>: <err>` rather than as an error.
pub fn read_file(root: &Path, rel_path: &str) -> String {
    let full = root.join(rel_path);
    match std::fs::read_to_string(&full) {
        Ok(content) => content,
        Err(e) => format!("Error reading {}: {}", rel_path, e),
    }
}

/// Write the README under `root`, creating the directory if needed.
pub fn write_readme(root: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    let path = root.join(file_name);
    std::fs::write(&path, content)?;
    info!("{} written to {}", file_name, path.display());
    Ok(path)
}
