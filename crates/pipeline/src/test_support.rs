//! Fixtures shared by the unit tests.

use std::path::Path;

pub const BASIC_SCHEMA: &str = include_str!("../tests/fixtures/basic_theme.json");

/// Write a theme directory named `id` under `root` with the basic schema.
pub fn write_theme(root: &Path, id: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(dir.join("layouts")).unwrap();
    std::fs::write(dir.join("theme.json"), BASIC_SCHEMA).unwrap();
}

/// Write an executable shell script standing in for the site generator.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
