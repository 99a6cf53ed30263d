//! Gzip-compressed JSON persistence of the date cache.

use super::DateCacheSnapshot;
use crate::error::{CompositorError, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

fn cache_file_error(path: &Path) -> impl FnOnce(std::io::Error) -> CompositorError + '_ {
    move |source| CompositorError::CacheFile {
        path: path.to_path_buf(),
        source,
    }
}

impl DateCacheSnapshot {
    /// Load a snapshot; a missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no date cache file, starting empty");
            return Ok(Self::default());
        }

        let file = File::open(path).map_err(cache_file_error(path))?;
        let reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
        let snapshot: Self = serde_json::from_reader(reader)?;
        debug!(path = %path.display(), entries = snapshot.len(), "loaded date cache");
        Ok(snapshot)
    }

    /// Write the snapshot atomically.
    ///
    /// The document goes to a temporary file in the target directory which then
    /// replaces `path`, so readers never see a partial cache.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(cache_file_error(dir))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(cache_file_error(dir))?;
        {
            let writer = BufWriter::new(tmp.as_file_mut());
            let mut encoder = GzEncoder::new(writer, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            let mut writer = encoder.finish().map_err(cache_file_error(path))?;
            writer.flush().map_err(cache_file_error(path))?;
        }
        tmp.persist(path).map_err(|e| cache_file_error(path)(e.error))?;

        debug!(path = %path.display(), entries = self.len(), "saved date cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_cache::{DateCacheDelta, DateCacheEntry, StatementRef};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("date_cache.json.gz");

        let mut delta = DateCacheDelta::default();
        let entry = DateCacheEntry {
            current: StatementRef::new(d(2020, 8, 28), d(2020, 6, 30)),
            q1: Some(StatementRef::new(d(2020, 4, 28), d(2020, 3, 31))),
            q2: None,
            yoy: Some(StatementRef::new(d(2019, 8, 27), d(2019, 6, 30))),
            y1: Some(StatementRef::new(d(2020, 4, 28), d(2019, 12, 31))),
            y3: None,
            y5: None,
        };
        delta.insert("000001.SZ", d(2020, 8, 28), [(d(2020, 8, 31), entry)].into());
        let (snapshot, _) = DateCacheSnapshot::default().merge(delta);

        snapshot.save(&path).unwrap();
        let loaded = DateCacheSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);

        // Saving again replaces the file in place
        snapshot.save(&path).unwrap();
        assert_eq!(DateCacheSnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = DateCacheSnapshot::load(&dir.path().join("absent.gz")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.gz");
        fs::write(&path, b"not gzip").unwrap();

        let err = DateCacheSnapshot::load(&path).unwrap_err();
        assert!(err.is_fatal());
    }
}
