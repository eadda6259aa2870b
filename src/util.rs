use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Slash-separated form of a recorded path, used to group records by file.
pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut absolute = false;
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().to_string()),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Recorded paths are relative to the directory the samples were taken in.
pub fn resolve_path(root: &Path, recorded: &str) -> PathBuf {
    let path = Path::new(recorded);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_recorded_paths() {
        assert_eq!(normalize_path(Path::new("./pkg//mod.py")), "pkg/mod.py");
        assert_eq!(normalize_path(Path::new("../x.py")), "../x.py");
        assert_eq!(normalize_path(Path::new("/abs/x.py")), "/abs/x.py");
        assert_eq!(normalize_path(Path::new(".")), ".");
    }

    #[test]
    fn resolves_relative_to_root() {
        assert_eq!(resolve_path(Path::new("/repo"), "a/b.py"), PathBuf::from("/repo/a/b.py"));
        assert_eq!(resolve_path(Path::new("/repo"), "/tmp/c.py"), PathBuf::from("/tmp/c.py"));
    }

    #[test]
    fn writes_create_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.json");
        write_string(&target, "[]").unwrap();
        assert_eq!(read_to_string(&target).unwrap(), "[]");
    }
}
