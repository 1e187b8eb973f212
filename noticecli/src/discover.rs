//! Find the notification sheet and the arrangement tables in a folder

use anyhow::{Context, Result};
use noticecraft_core::OUTPUT_STEM;
use std::fs;
use std::path::{Path, PathBuf};

/// Workbooks found in a folder, split by role
#[derive(Debug, PartialEq)]
pub struct Discovered {
    pub notification: PathBuf,
    pub arrangements: Vec<PathBuf>,
}

/// List the `*.xls*` workbooks in `dir`, sorted by name, leaving out Office
/// lock files and earlier outputs
pub fn list_workbooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read folder {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_workbook = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.to_ascii_lowercase().starts_with("xls"));
        if is_workbook && !name.starts_with("~$") && !name.starts_with(OUTPUT_STEM) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Split `files` into the notification sheet and the arrangement tables.
///
/// Without an explicit `notification` the single file whose name contains
/// `纸` or `通知单` is used. Files named in `exclude` are dropped.
pub fn split_roles(
    files: Vec<PathBuf>,
    notification: Option<&Path>,
    exclude: &[PathBuf],
) -> Result<Discovered> {
    if files.len() < 2 {
        anyhow::bail!(
            "Found {} workbook(s); a notification sheet and at least one arrangement table are needed",
            files.len()
        );
    }

    let notification = match notification {
        Some(path) => files
            .iter()
            .find(|file| same_file(file, path))
            .cloned()
            .unwrap_or_else(|| path.to_path_buf()),
        None => match guess_notification(&files) {
            Some(i) => files[i].clone(),
            None => {
                let candidates: Vec<&str> = files
                    .iter()
                    .filter_map(|file| file_name(file))
                    .filter(|name| looks_like_notification(name))
                    .collect();
                if candidates.is_empty() {
                    anyhow::bail!(
                        "No notification sheet found (expected a file name containing 纸 or 通知单); use --notification"
                    );
                }
                anyhow::bail!(
                    "Several files look like notification sheets: {}; use --notification",
                    candidates.join(", ")
                );
            }
        },
    };

    let arrangements: Vec<PathBuf> = files
        .into_iter()
        .filter(|file| !same_file(file, &notification))
        .filter(|file| !exclude.iter().any(|excluded| same_file(file, excluded)))
        .collect();

    if arrangements.is_empty() {
        anyhow::bail!("No arrangement tables left after exclusions");
    }

    Ok(Discovered {
        notification,
        arrangements,
    })
}

fn looks_like_notification(name: &str) -> bool {
    name.contains('纸') || name.contains("通知单")
}

/// Index of the single file whose name marks it as the notification sheet
pub fn guess_notification(files: &[PathBuf]) -> Option<usize> {
    let mut matches = files
        .iter()
        .enumerate()
        .filter(|(_, file)| file_name(file).is_some_and(looks_like_notification))
        .map(|(i, _)| i);
    match (matches.next(), matches.next()) {
        (Some(i), None) => Some(i),
        _ => None,
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// A bare file name matches any file of that name in the folder
fn same_file(file: &Path, other: &Path) -> bool {
    if other.components().count() == 1 {
        file.file_name() == other.file_name()
    } else {
        file == other
    }
}
