//! Fixtures shared by the unit tests.

use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::date::PhotoDate;
use crate::error::MetadataError;
use crate::metadata::DateStore;
use crate::rules::{DateParserRegistry, FilenameRegexRule, FolderMatch, FolderRule, ParseRule};

const TRAILER: &[u8] = b"\nEXIFDATE=";

/// Encode a small gradient image at `path`; the container follows the extension.
pub fn encoded_image(path: &Path) {
    let img = image::RgbImage::from_fn(4, 4, |x, y| image::Rgb([x as u8 * 60, y as u8 * 60, 128]));
    img.save(path).unwrap();
}

/// Minimal valid JPEG with no EXIF data (SOI + APP0 JFIF + EOI).
pub fn minimal_jpeg() -> Vec<u8> {
    vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, // APP0 marker
        0x00, 0x10, // Length: 16
        0x4A, 0x46, 0x49, 0x46, 0x00, // "JFIF\0"
        0x01, 0x01, // Version 1.1
        0x00, // Aspect ratio units: none
        0x00, 0x01, // X density: 1
        0x00, 0x01, // Y density: 1
        0x00, 0x00, // No thumbnail
        0xFF, 0xD9, // EOI
    ]
}

/// Keeps the date as a trailer appended to the file, so writer and controller
/// tests work on real files without depending on an EXIF codec.
#[derive(Default)]
pub struct TrailerDateStore {
    pub reads: Cell<usize>,
    pub writes: Cell<usize>,
    pub fail_writes: bool,
}

impl TrailerDateStore {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }
}

impl DateStore for TrailerDateStore {
    fn read_date(&self, path: &Path) -> Result<Option<PhotoDate>, MetadataError> {
        self.reads.set(self.reads.get() + 1);
        let bytes = fs::read(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(pos) = bytes.windows(TRAILER.len()).rposition(|w| w == TRAILER) else {
            return Ok(None);
        };
        let value = String::from_utf8_lossy(&bytes[pos + TRAILER.len()..]).into_owned();
        Ok(PhotoDate::parse_exif(&value))
    }

    fn write_date(&self, path: &Path, date: &PhotoDate) -> Result<(), MetadataError> {
        self.writes.set(self.writes.get() + 1);
        let write_err = |source| MetadataError::Write {
            path: path.to_path_buf(),
            source,
        };
        if self.fail_writes {
            return Err(write_err(io::Error::new(io::ErrorKind::Other, "injected failure")));
        }
        let mut file = OpenOptions::new().append(true).open(path).map_err(write_err)?;
        file.write_all(TRAILER).map_err(write_err)?;
        file.write_all(date.to_exif_string().as_bytes())
            .map_err(write_err)?;
        Ok(())
    }
}

pub const IMG_PATTERN: &str = r"IMG_(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})_(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})";

/// The `IMG_YYYYMMDD_HHMMSS` rule followed by the `Holiday0601` folder rule.
pub fn sample_registry() -> DateParserRegistry {
    let img = FilenameRegexRule::new("android", IMG_PATTERN).unwrap();
    let holiday = FolderRule::new(
        "Holiday0601",
        FolderMatch::Exact,
        PhotoDate::date_only(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()),
    )
    .unwrap();
    DateParserRegistry::new(vec![ParseRule::FilenameRegex(img), ParseRule::Folder(holiday)])
}

/// Write `bytes` at `root/rel`, creating parent directories.
pub fn put_file(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

/// Files in `dir` whose name marks them as staged temporaries.
pub fn temp_artifacts(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, crate::scan::is_temp_artifact)
        })
        .collect()
}
