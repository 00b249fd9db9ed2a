//! Central directory and EOCD writer.
//!
//! The directory always ends exactly at the end of the file:
//!
//! ```text
//! ┌──────────────┬─── … ───┬──────────────────────┬──────┐
//! │ local entries│  zeros  │ central records (46+n)│ EOCD │
//! └──────────────┴─── … ───┴──────────────────────┴──────┘
//!                           ^ file_size − footprint
//! ```

use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use tracing::debug;

use super::Stream;
use crate::error::{Result, ZtreamError};
use crate::header::{
    directory_len, CentralDirectoryRecord, EndOfCentralDirectory, BUFFER_SIZE,
    CENTRAL_HEADER_SIZE, EOCD_SIZE,
};

impl Stream {
    /// Write one central record per committed entry followed by the EOCD.
    ///
    /// `removed` is the name length of an entry that was listed in the
    /// directory currently on disk but is gone from `entries`; the bytes its
    /// record occupied are zeroed so no stale directory survives in front of
    /// the new one.
    pub(super) fn write_directory(&mut self, removed: Option<usize>) -> Result<()> {
        self.last_append = false;

        let entries = u16::try_from(self.entries.len()).map_err(|_| ZtreamError::StreamFull)?;
        let new_len = directory_len(self.entries.iter().map(|e| e.entry.name.len()));
        let old_len = new_len + removed.map_or(0, |n| (CENTRAL_HEADER_SIZE + n) as u64);
        let start = self
            .file_size
            .checked_sub(old_len)
            .ok_or_else(|| self.corrupt(0, "directory does not fit in the file"))?;
        let directory_offset = self.file_size - new_len;

        self.file.seek(SeekFrom::Start(start))?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, &mut self.file);
        io::copy(&mut io::repeat(0).take(old_len - new_len), &mut writer)?;

        for stored in &self.entries {
            CentralDirectoryRecord {
                method:              stored.entry.method(),
                modified:            stored.modified,
                crc32:               stored.crc32,
                compressed_size:     stored.entry.compressed_size,
                uncompressed_size:   stored.entry.uncompressed_size,
                name:                stored.entry.name.clone(),
                local_header_offset: stored.header_offset() as u32,
            }
            .write(&mut writer)?;
        }

        EndOfCentralDirectory {
            entries,
            directory_size:   (new_len - EOCD_SIZE as u64) as u32,
            directory_offset: if entries == 0 { 0 } else { directory_offset as u32 },
        }
        .write(&mut writer)?;
        writer.flush()?;

        debug!(
            path = %self.path.display(),
            entries,
            offset = directory_offset,
            len = new_len,
            "wrote central directory",
        );
        Ok(())
    }
}
