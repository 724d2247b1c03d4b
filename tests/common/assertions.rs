//! Output directory assertions

use std::path::Path;

/// Sorted file names in `dir`
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .into_string()
                .expect("utf-8 file name")
        })
        .collect();
    names.sort();
    names
}

/// Fail if an intermediate download or partial write is left in `dir`
pub fn assert_no_artifacts(dir: &Path) {
    let leftovers: Vec<String> = list_dir(dir)
        .into_iter()
        .filter(|name| name.starts_with("tmp_") || name.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}
