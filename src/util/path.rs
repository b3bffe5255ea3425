use std::path::{Path, PathBuf};

/// Expands `~`, `$VAR` and `${VAR}` in a path; unknown variables leave it unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// `-` stands for stdin/stdout on the command line.
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}
