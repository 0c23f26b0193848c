//! Multi-volume pack store.
//!
//! Records live in a row of `part<N>.pak` files (1-based on disk). A record
//! starts at a sector boundary in its TOC-named volume and may run off the
//! end of that file into the start of the next one.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::toc::{TocEntry, SECTOR_SIZE};
use crate::{Error, Result};

/// A directory of `part<N>.pak` volume files.
#[derive(Debug, Clone)]
pub struct VolumeSet {
    dir: PathBuf,
}

impl VolumeSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a zero-indexed volume; files on disk are numbered from 1.
    pub fn volume_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("part{}.pak", index + 1))
    }

    fn open_volume(&self, index: u32) -> Result<File> {
        let path = self.volume_path(index);
        File::open(&path).map_err(|_| Error::MissingVolume { index, path })
    }

    /// Read one record, following it into the next volume when it spans
    /// the boundary.
    pub fn read(&self, entry: &TocEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.size as usize);

        let mut file = self.open_volume(entry.volume)?;
        file.seek(SeekFrom::Start(entry.start_sector as u64 * SECTOR_SIZE))?;
        file.take(entry.size as u64).read_to_end(&mut data)?;

        if data.len() < entry.size as usize {
            let missing = entry.size as usize - data.len();
            debug!(
                "'{}' spills {missing} byte(s) into volume {}",
                entry.name,
                entry.volume + 1
            );
            let mut file = self.open_volume(entry.volume + 1)?;
            file.take(missing as u64).read_to_end(&mut data)?;
        }

        if data.len() < entry.size as usize {
            return Err(Error::ShortRecord {
                name: entry.name.clone(),
                missing: entry.size as usize - data.len(),
            });
        }
        Ok(data)
    }

    /// Write every TOC record into `out_dir`, returning the count.
    pub fn unpack_all(&self, toc: &[TocEntry], out_dir: &Path) -> Result<usize> {
        fs::create_dir_all(out_dir)?;
        for entry in toc {
            info!(
                "unpacking '{}' ({} bytes from volume {})",
                entry.name,
                entry.size,
                entry.volume + 1
            );
            fs::write(out_dir.join(&entry.name), self.read(entry)?)?;
        }
        Ok(toc.len())
    }
}
