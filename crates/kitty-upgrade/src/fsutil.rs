//! Small filesystem helpers shared by migrations and metadata persistence.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Replaces `path` with `content` through a sibling temp file and a rename.
///
/// Readers see either the old file or the new one, never a torn write, as
/// long as the temp file and the target share a filesystem.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Strips a leading UTF-8 byte-order mark.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Lists the entries of a directory, sorted by name.
pub fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Whether anything (including a dangling symlink) exists at `path`.
pub fn entry_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Finds symlinks under `root` whose target no longer resolves.
///
/// Links are not followed, so cycles are harmless. Unreadable subtrees are
/// skipped.
pub fn dangling_symlinks(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path_is_symlink())
        .filter(|entry| std::fs::metadata(entry.path()).is_err())
        .map(walkdir::DirEntry::into_path)
        .collect()
}
