use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::NamedTempFile;

use crate::date::PhotoDate;
use crate::error::WriteError;
use crate::metadata::DateStore;

/// Marker embedded in staged temporary file names: `.<name>.exifdate-XXXXXX.<ext>`.
pub const TEMP_MARKER: &str = ".exifdate-";

/// Writes dates through a copy of the photo and renames the copy over the original.
///
/// The original is never opened for writing. Until the final rename it is
/// byte-for-byte what it was before; after the rename it is the fully written copy.
pub struct AtomicWriter<'a> {
    store: &'a dyn DateStore,
    preserve_mtime: bool,
}

impl<'a> AtomicWriter<'a> {
    pub fn new(store: &'a dyn DateStore) -> Self {
        Self {
            store,
            preserve_mtime: false,
        }
    }

    /// Carry the original modification time over to the rewritten file.
    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    pub fn write(&self, path: &Path, date: &PhotoDate) -> Result<(), WriteError> {
        self.stage(path, date)?.commit()
    }

    /// Prepare a fully written copy next to `path` without touching `path`.
    pub fn stage(&self, path: &Path, date: &PhotoDate) -> Result<StagedWrite, WriteError> {
        let original = preflight(path)?;
        let parent = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => return Err(WriteError::NoParent(path.to_path_buf())),
        };
        let io_err = |source: io::Error| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| WriteError::NotRegularFile(path.to_path_buf()))?;
        // Keep the extension last so the metadata store recognises the container.
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}{TEMP_MARKER}"))
            .suffix(&suffix)
            .tempfile_in(parent)
            .map_err(io_err)?;
        ensure_same_device(&original, temp.path(), path)?;

        let mut source = File::open(path).map_err(io_err)?;
        io::copy(&mut source, temp.as_file_mut()).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;

        self.store.write_date(temp.path(), date)?;

        // The store may have written through its own handle.
        temp.reopen().and_then(|f| f.sync_all()).map_err(io_err)?;
        fs::set_permissions(temp.path(), original.permissions()).map_err(io_err)?;
        if self.preserve_mtime {
            let mtime = FileTime::from_last_modification_time(&original);
            filetime::set_file_mtime(temp.path(), mtime).map_err(io_err)?;
        }

        tracing::trace!(temp = %temp.path().display(), target = %path.display(), "staged write");
        Ok(StagedWrite {
            temp,
            target: path.to_path_buf(),
        })
    }
}

/// A written temporary copy waiting to replace its target.
/// Dropping it without [`StagedWrite::commit`] deletes the copy.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the copy over the target.
    pub fn commit(self) -> Result<(), WriteError> {
        let StagedWrite { temp, target } = self;
        // On failure the returned NamedTempFile is dropped, which removes it.
        temp.persist(&target).map_err(|e| WriteError::Rename {
            path: target.clone(),
            source: e.error,
        })?;
        sync_parent(&target);
        Ok(())
    }
}

/// Reject targets a rename cannot replace safely.
fn preflight(path: &Path) -> Result<fs::Metadata, WriteError> {
    let meta = fs::symlink_metadata(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // Renaming over a symlink would replace the link, not the photo.
    if !meta.file_type().is_file() {
        return Err(WriteError::NotRegularFile(path.to_path_buf()));
    }
    if meta.permissions().readonly() {
        return Err(WriteError::ReadOnly(path.to_path_buf()));
    }
    Ok(meta)
}

#[cfg(unix)]
fn ensure_same_device(original: &fs::Metadata, temp: &Path, target: &Path) -> Result<(), WriteError> {
    use std::os::unix::fs::MetadataExt;

    let temp_meta = fs::metadata(temp).map_err(|source| WriteError::Io {
        path: target.to_path_buf(),
        source,
    })?;
    if temp_meta.dev() != original.dev() {
        return Err(WriteError::CrossDevice(target.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_same_device(_original: &fs::Metadata, _temp: &Path, _target: &Path) -> Result<(), WriteError> {
    Ok(())
}

/// Best effort: make the rename itself durable.
fn sync_parent(target: &Path) {
    #[cfg(unix)]
    if let Some(parent) = target.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = target;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::test_support::{put_file, temp_artifacts, TrailerDateStore};

    fn sample_date() -> PhotoDate {
        PhotoDate::parse_exif("2019:12:09 04:36:21").unwrap()
    }

    #[test]
    fn test_write_replaces_original() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "IMG_20191209_043621.jpg", b"pixels");
        let store = TrailerDateStore::default();

        AtomicWriter::new(&store).write(&path, &sample_date()).unwrap();

        assert_eq!(store.read_date(&path).unwrap(), Some(sample_date()));
        assert!(fs::read(&path).unwrap().starts_with(b"pixels"));
        assert!(temp_artifacts(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_metadata_write_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        let store = TrailerDateStore::failing();

        let err = AtomicWriter::new(&store)
            .write(&path, &sample_date())
            .unwrap_err();

        assert!(matches!(err, WriteError::Metadata(_)));
        assert_eq!(fs::read(&path).unwrap(), b"pixels");
        assert!(temp_artifacts(dir.path()).is_empty());
    }

    #[test]
    fn test_interrupted_before_rename_keeps_original() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        let store = TrailerDateStore::default();

        let staged = AtomicWriter::new(&store).stage(&path, &sample_date()).unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        // Simulate the process dying: no commit and no cleanup.
        std::mem::forget(staged);

        assert_eq!(fs::read(&path).unwrap(), b"pixels");
        assert!(temp_path.exists());
        assert_eq!(temp_artifacts(dir.path()), vec![temp_path.clone()]);
        assert_eq!(store.read_date(&temp_path).unwrap(), Some(sample_date()));
    }

    #[test]
    fn test_dropped_stage_is_discarded() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        let store = TrailerDateStore::default();

        let staged = AtomicWriter::new(&store).stage(&path, &sample_date()).unwrap();
        assert_eq!(staged.target(), path.as_path());
        drop(staged);

        assert_eq!(fs::read(&path).unwrap(), b"pixels");
        assert!(temp_artifacts(dir.path()).is_empty());
    }

    #[test]
    fn test_temp_name_keeps_extension() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "b.JPEG", b"pixels");
        let store = TrailerDateStore::default();

        let staged = AtomicWriter::new(&store).stage(&path, &sample_date()).unwrap();
        let name = staged.temp_path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(".b.JPEG.exifdate-"));
        assert!(name.ends_with(".JPEG"));
    }

    #[test]
    fn test_read_only_rejected() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();
        let store = TrailerDateStore::default();

        let err = AtomicWriter::new(&store)
            .write(&path, &sample_date())
            .unwrap_err();

        assert!(matches!(err, WriteError::ReadOnly(_)));
        assert_eq!(store.writes.get(), 0);
    }

    #[test]
    fn test_missing_target() {
        let dir = tempdir().unwrap();
        let store = TrailerDateStore::default();
        let err = AtomicWriter::new(&store)
            .write(&dir.path().join("gone.jpg"), &sample_date())
            .unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_rejected() {
        let dir = tempdir().unwrap();
        let real = put_file(dir.path(), "real.jpg", b"pixels");
        let link = dir.path().join("link.jpg");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let store = TrailerDateStore::default();

        let err = AtomicWriter::new(&store)
            .write(&link, &sample_date())
            .unwrap_err();

        assert!(matches!(err, WriteError::NotRegularFile(_)));
        assert_eq!(fs::read(&real).unwrap(), b"pixels");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_carried_over() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let store = TrailerDateStore::default();

        AtomicWriter::new(&store).write(&path, &sample_date()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_preserve_mtime() {
        let dir = tempdir().unwrap();
        let path = put_file(dir.path(), "a.jpg", b"pixels");
        let old = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&path, old).unwrap();
        let store = TrailerDateStore::default();

        AtomicWriter::new(&store)
            .preserve_mtime(true)
            .write(&path, &sample_date())
            .unwrap();

        let meta = fs::metadata(&path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }
}
