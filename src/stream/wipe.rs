//! Secure removal of a committed entry.

use std::io::{Seek, SeekFrom, Write};

use rand::RngCore;
use tracing::info;

use super::{FileCursor, Stream};
use crate::error::{Result, ZtreamError};
use crate::header::{LocalFileHeader, BUFFER_SIZE, LOCAL_HEADER_SIZE};

impl Stream {
    /// Overwrite the entry called `name` and drop it from the directory.
    ///
    /// The header, name and payload are first overwritten with random bytes,
    /// then everything after the fixed header is zeroed and a tombstone
    /// header (version 10, empty name, stored) is written whose sizes cover
    /// the zeroed region.  Later scans skip tombstones, so entries after the
    /// wiped one stay reachable.  The directory is rewritten and the file
    /// fsynced before returning.
    ///
    /// Pending entries are synced first.  A failure part way through leaves
    /// the entry listed but possibly unreadable.
    ///
    /// This is best-effort erasure.  Filesystem snapshots, flash wear
    /// levelling and copy-on-write storage can keep the old bytes around.
    pub fn wipe(&mut self, name: &str) -> Result<()> {
        if self.loaded {
            self.commit_pending()?;
        } else {
            self.load()?;
        }
        self.last_append = false;

        let index = self
            .entries
            .iter()
            .rposition(|e| e.entry.name == name)
            .ok_or_else(|| ZtreamError::NotFound(name.to_owned()))?;
        let start = self.entries[index].header_offset();

        let header = LocalFileHeader::read(FileCursor::new(&self.file, start), start)
            .map_err(|e| ZtreamError::from_header(&self.path, e))?
            .filter(|h| !h.is_wiped() && h.name == name)
            .ok_or_else(|| self.corrupt(start, "not a local file header where expected"))?;

        let extent = header.extent();
        let body = extent - LOCAL_HEADER_SIZE as u64;
        let mut buf = vec![0u8; BUFFER_SIZE];

        // Pass 1: noise over header, name and payload.
        self.file.seek(SeekFrom::Start(start))?;
        let mut rng = rand::thread_rng();
        let mut remaining = extent;
        while remaining > 0 {
            let n = remaining.min(BUFFER_SIZE as u64) as usize;
            rng.fill_bytes(&mut buf[..n]);
            self.file.write_all(&buf[..n])?;
            remaining -= n as u64;
        }

        // Pass 2: zeros after the fixed header.
        self.file.seek(SeekFrom::Start(start + LOCAL_HEADER_SIZE as u64))?;
        buf.fill(0);
        let mut crc = crc32fast::Hasher::new();
        remaining = body;
        while remaining > 0 {
            let n = remaining.min(BUFFER_SIZE as u64) as usize;
            crc.update(&buf[..n]);
            self.file.write_all(&buf[..n])?;
            remaining -= n as u64;
        }

        // Pass 3: tombstone.
        let tombstone = LocalFileHeader::wiped(crc.finalize(), body as u32);
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(&tombstone.to_bytes())?;

        let removed = self.entries.remove(index);
        self.write_directory(Some(removed.entry.name.len()))?;
        self.file.sync_all()?;

        info!(
            path = %self.path.display(),
            name,
            offset = start,
            bytes = extent,
            "wiped entry",
        );
        Ok(())
    }
}
