use std::fs::File;
use std::io::{self, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;

use crate::date::{is_blank_exif, PhotoDate};
use crate::error::MetadataError;

/// Containers where little_exif writes `DateTimeOriginal` somewhere kamadak-exif reads it back.
/// PNG is excluded: little_exif stores its EXIF in a text chunk instead of `eXIf`, so the
/// date would be invisible to the next run.
pub const WRITABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "webp"];

/// Access to the single date field this tool manages.
///
/// The run controller only reads through this trait and the atomic writer only
/// writes through it, always against a temporary copy.
pub trait DateStore {
    /// `Ok(None)` when the file carries no metadata block or no date field.
    fn read_date(&self, path: &Path) -> Result<Option<PhotoDate>, MetadataError>;

    fn write_date(&self, path: &Path, date: &PhotoDate) -> Result<(), MetadataError>;

    /// Whether a date written to `path` can be read back by [`DateStore::read_date`].
    fn supports_write(&self, _path: &Path) -> bool {
        true
    }
}

/// EXIF `DateTimeOriginal`, read with kamadak-exif and written with little_exif.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifDateStore;

impl ExifDateStore {
    fn read_exif(path: &Path) -> Result<Option<exif::Exif>, MetadataError> {
        let file = File::open(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(Some(exif)),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(source) => Err(MetadataError::Malformed {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl DateStore for ExifDateStore {
    fn read_date(&self, path: &Path) -> Result<Option<PhotoDate>, MetadataError> {
        let Some(exif) = Self::read_exif(path)? else {
            return Ok(None);
        };
        let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) else {
            return Ok(None);
        };

        let raw = match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default(),
            other => format!("{:?}", other),
        };
        if is_blank_exif(&raw) {
            return Ok(None);
        }
        // A present but unparseable value still counts as a date we must not overwrite.
        PhotoDate::parse_exif(&raw)
            .map(Some)
            .ok_or_else(|| MetadataError::UnreadableDate {
                path: path.to_path_buf(),
                value: raw,
            })
    }

    fn supports_write(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| WRITABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    }

    fn write_date(&self, path: &Path, date: &PhotoDate) -> Result<(), MetadataError> {
        if !self.supports_write(path) {
            return Err(MetadataError::Unsupported {
                path: path.to_path_buf(),
            });
        }

        let write_err = |message: String| MetadataError::Write {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, message),
        };

        let mut metadata = match Metadata::new_from_path(path) {
            Ok(m) => m,
            // Starting from an empty block is only safe when there is nothing to lose.
            Err(e) => match Self::read_exif(path)? {
                None => Metadata::new(),
                Some(_) => return Err(write_err(format!("existing EXIF could not be loaded: {e}"))),
            },
        };
        metadata.set_tag(ExifTag::DateTimeOriginal(date.to_exif_string()));

        // little_exif panics on some malformed containers
        match panic::catch_unwind(AssertUnwindSafe(|| metadata.write_to_file(path))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(write_err(e.to_string())),
            Err(_) => return Err(write_err("EXIF writer panicked".to_string())),
        }

        tracing::trace!(path = %path.display(), date = %date, "wrote DateTimeOriginal");
        Ok(())
    }
}
