//! The append/read engine.
//!
//! # Lifecycle
//! [`Stream::create`] preallocates a zero-filled file of the configured size;
//! [`Stream::open`] takes the size of an existing file.  Entries are written
//! back to back from offset 0 by [`Stream::append`] but only become visible
//! to [`Stream::contents`] after [`Stream::sync`] has fsynced them.  The
//! central directory and EOCD are written at the very end of the file by
//! [`Stream::close`] (and rewritten by [`Stream::wipe`]).
//!
//! # Recovery
//! The directory is never trusted.  Opening a container scans local headers
//! forward from offset 0 until the first position that does not start with
//! a local header signature, so a container that was never closed loses at
//! most the entries appended after its last sync.
//!
//! # Concurrency
//! Mutating operations take `&mut self`.  [`Stream::read`] takes `&self` and
//! uses positional reads with per-call buffers, so concurrent readers behind
//! a shared lock (see [`crate::shared::SharedStream`]) never disturb each
//! other or the append position.

mod directory;
mod fs;
mod wipe;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::codec::{self, CompressionMethod, Deflater};
use crate::error::{Result, ZtreamError};
use crate::header::{
    directory_len, DosDateTime, LocalFileHeader, BUFFER_SIZE, CENTRAL_HEADER_SIZE,
    LOCAL_HEADER_SIZE, MAX_NAME_LENGTH,
};
use crate::options::{Config, Options};
use crate::recovery;
use crate::verifier::Verifier;

pub(crate) use self::fs::FileCursor;

/// Entry counts are 16-bit in the EOCD record.
const MAX_ENTRIES: usize = u16::MAX as usize;

// ── Entries ──────────────────────────────────────────────────────────────────

/// A stored blob as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub name:              String,
    /// Absolute offset of the payload, just past the local header and name.
    pub offset:            u32,
    /// Bytes on disk.  Smaller than `uncompressed_size` iff deflated.
    pub compressed_size:   u32,
    pub uncompressed_size: u32,
}

impl Entry {
    pub fn method(&self) -> CompressionMethod {
        CompressionMethod::for_sizes(self.compressed_size, self.uncompressed_size)
    }

    pub fn is_compressed(&self) -> bool {
        self.method() == CompressionMethod::Deflate
    }

    /// Offset of the local header, `None` if the entry cannot be valid.
    pub fn header_offset(&self) -> Option<u64> {
        u64::from(self.offset).checked_sub((LOCAL_HEADER_SIZE + self.name.len()) as u64)
    }

    /// First byte after the payload.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.compressed_size)
    }
}

/// An [`Entry`] together with the metadata its directory record needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub entry:    Entry,
    /// CRC32 of the uncompressed bytes.
    pub crc32:    u32,
    pub modified: DosDateTime,
}

impl StoredEntry {
    pub(crate) fn from_header(header: &LocalFileHeader, header_offset: u64) -> Self {
        Self {
            entry: Entry {
                name:              header.name.clone(),
                offset:            (header_offset + header.encoded_len() as u64) as u32,
                compressed_size:   header.compressed_size,
                uncompressed_size: header.uncompressed_size,
            },
            crc32:    header.crc32,
            modified: header.modified,
        }
    }

    fn header_offset(&self) -> u64 {
        u64::from(self.entry.offset) - (LOCAL_HEADER_SIZE + self.entry.name.len()) as u64
    }
}

/// Occupancy figures reported by [`Stream::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub file_size:          u64,
    pub committed:          usize,
    pub pending:            usize,
    pub deflated:           usize,
    /// Payload bytes on disk for committed and pending entries.
    pub stored_bytes:       u64,
    pub uncompressed_bytes: u64,
    /// Space left once the directory for every entry is accounted for.
    pub free_bytes:         u64,
}

// ── Stream ───────────────────────────────────────────────────────────────────

pub struct Stream {
    path:        PathBuf,
    file:        File,
    config:      Config,
    file_size:   u64,
    /// Synced entries in on-disk order.
    entries:     Vec<StoredEntry>,
    /// Written but not yet synced.
    pending:     Vec<StoredEntry>,
    deflater:    Option<Deflater>,
    loaded:      bool,
    /// The file position is at the end of the last append.
    last_append: bool,
}

impl Stream {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Create a new container at `path`, which must not exist yet, and
    /// preallocate it to the configured size.
    pub fn create<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        let config = Config::new(opts)?;
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        let file_size = u64::from(config.file_size());
        if let Err(e) = fs::preallocate(&file, file_size) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        let mut stream = Self::with_file(path, file, config, file_size);
        stream.load()?;
        info!(path = %stream.path.display(), size = file_size, "created stream");
        Ok(stream)
    }

    /// Open an existing container.  The entry list is built lazily on first
    /// use, or right away when a verifier is configured, in which case every
    /// entry is checked before this returns.
    pub fn open<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        let config = Config::for_existing(opts)?;
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size > u64::from(u32::MAX) {
            return Err(ZtreamError::corrupt(&path, 0, "file is too large to be a ztream"));
        }

        let mut stream = Self::with_file(path, file, config, file_size);
        if stream.config.has_verifier() {
            stream.load()?;
        }
        info!(path = %stream.path.display(), size = file_size, "opened stream");
        Ok(stream)
    }

    fn with_file(path: PathBuf, file: File, config: Config, file_size: u64) -> Self {
        Self {
            path,
            file,
            config,
            file_size,
            entries:     Vec::new(),
            pending:     Vec::with_capacity(32),
            deflater:    None,
            loaded:      false,
            last_append: false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }
    pub fn file_size(&self) -> u64 { self.file_size }
    pub fn config(&self) -> &Config { &self.config }
    pub fn is_loaded(&self) -> bool { self.loaded }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Rebuild the committed entry list by scanning the file.
    fn load(&mut self) -> Result<()> {
        let verifier = self.config.verifier_mut().map(|v| v as &mut dyn Verifier);
        let report = recovery::scan(&self.file, &self.path, self.file_size, verifier)?;
        debug!(
            path = %self.path.display(),
            entries = report.entries.len(),
            wiped = report.wiped.len(),
            end = report.end_offset,
            "loaded stream",
        );

        self.entries = report.entries;
        self.deflater = Some(Deflater::new(&self.config));
        self.loaded = true;
        self.last_append = false;
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.load()
    }

    // ── Write path ───────────────────────────────────────────────────────────

    /// Append `data` under `name`.
    ///
    /// The bytes are written immediately but are not durable, nor listed by
    /// [`Stream::contents`], until [`Stream::sync`].  Returns
    /// [`ZtreamError::StreamFull`] without writing anything if the entry and
    /// the directory it will eventually need do not fit.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<Entry> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(ZtreamError::NameTooLong { len: name.len(), max: MAX_NAME_LENGTH });
        }
        self.ensure_loaded()?;

        if self.entries.iter().chain(&self.pending).any(|e| e.entry.name == name) {
            return Err(ZtreamError::DuplicateName(name.to_owned()));
        }
        if self.entries.len() + self.pending.len() >= MAX_ENTRIES {
            return Err(ZtreamError::StreamFull);
        }
        let uncompressed_size = u32::try_from(data.len()).map_err(|_| ZtreamError::StreamFull)?;

        let config = &self.config;
        let payload = self
            .deflater
            .get_or_insert_with(|| Deflater::new(config))
            .encode(data)?;

        if !self.has_room(name.len(), payload.len()) {
            return Err(ZtreamError::StreamFull);
        }

        let header_offset = self.end_of_data();
        let header = LocalFileHeader::active(
            crc32fast::hash(data),
            payload.len() as u32,
            uncompressed_size,
            name,
        );

        if let Err(e) = self.write_at_end(header_offset, &header, &payload) {
            self.last_append = false;
            warn!(path = %self.path.display(), name, error = %e, "append failed");
            return Err(e.into());
        }
        self.last_append = true;

        let stored = StoredEntry::from_header(&header, header_offset);
        trace!(
            name,
            offset = stored.entry.offset,
            compressed = stored.entry.compressed_size,
            uncompressed = stored.entry.uncompressed_size,
            method = header.method.name(),
            "appended entry",
        );
        let entry = stored.entry.clone();
        self.pending.push(stored);
        Ok(entry)
    }

    fn write_at_end(&mut self, offset: u64, header: &LocalFileHeader, payload: &[u8]) -> std::io::Result<()> {
        if !self.last_append {
            self.file.seek(SeekFrom::Start(offset))?;
        }
        self.file.write_all(&header.to_bytes())?;
        self.file.write_all(payload)
    }

    /// Offset just past the last committed or pending entry.
    fn end_of_data(&self) -> u64 {
        self.pending
            .last()
            .or_else(|| self.entries.last())
            .map_or(0, |e| e.entry.end())
    }

    /// Directory footprint once every committed and pending entry is listed.
    fn directory_footprint(&self) -> u64 {
        directory_len(self.entries.iter().chain(&self.pending).map(|e| e.entry.name.len()))
    }

    /// Whether a new entry fits together with the directory it will need.
    fn has_room(&self, name_len: usize, stored_len: usize) -> bool {
        let needed = self.end_of_data()
            + self.directory_footprint()
            + (CENTRAL_HEADER_SIZE + name_len) as u64
            + (LOCAL_HEADER_SIZE + name_len) as u64
            + stored_len as u64;
        needed <= self.file_size
    }

    /// Make everything appended so far durable and visible.
    ///
    /// If the fsync fails the appended entries stay pending; the caller may
    /// retry.  A stream opened for reading that was never loaded has nothing
    /// to sync.
    pub fn sync(&mut self) -> Result<()> {
        if !self.loaded {
            return Ok(());
        }
        self.commit_pending()
    }

    fn commit_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.sync_all()?;
        debug!(path = %self.path.display(), count = self.pending.len(), "synced pending entries");
        self.entries.append(&mut self.pending);
        Ok(())
    }

    // ── Read path ────────────────────────────────────────────────────────────

    /// Read the uncompressed bytes of `entry` into the front of `buf`.
    ///
    /// `buf` must hold at least `entry.uncompressed_size` bytes.  The header
    /// on disk is cross-checked against `entry` and the CRC32 of the data is
    /// verified.
    pub fn read(&self, entry: &Entry, buf: &mut [u8]) -> Result<()> {
        let size = entry.uncompressed_size as usize;
        if buf.len() < size {
            return Err(ZtreamError::BufferTooSmall { needed: size, provided: buf.len() });
        }
        let start = entry
            .header_offset()
            .ok_or_else(|| self.corrupt(u64::from(entry.offset), "entry offset precedes its header"))?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, FileCursor::new(&self.file, start));
        let header = LocalFileHeader::read(&mut reader, start)
            .map_err(|e| ZtreamError::from_header(&self.path, e))?
            .ok_or_else(|| self.corrupt(start, "did not find a file at specified offset"))?;

        if header.is_wiped() {
            return Err(self.corrupt(start + 4, "entry has been wiped"));
        }
        if header.name != entry.name {
            return Err(self.corrupt(start + LOCAL_HEADER_SIZE as u64, "name not matching"));
        }
        if header.compressed_size != entry.compressed_size {
            return Err(self.corrupt(start + 18, "compressed size not matching"));
        }
        if header.uncompressed_size != entry.uncompressed_size {
            return Err(self.corrupt(start + 22, "uncompressed size not matching"));
        }

        let out = &mut buf[..size];
        let result = if header.is_deflated() {
            codec::inflate_exact((&mut reader).take(u64::from(header.compressed_size)), out)
        } else {
            reader.read_exact(out)
        };
        if let Err(e) = result {
            if codec::is_stream_error(&e) {
                warn!(path = %self.path.display(), name = %entry.name, error = %e, "unreadable entry data");
                return Err(self.corrupt(u64::from(entry.offset), format!("unable to read entry data: {e}")));
            }
            return Err(e.into());
        }

        if crc32fast::hash(out) != header.crc32 {
            warn!(path = %self.path.display(), name = %entry.name, "crc mismatch");
            return Err(self.corrupt(start + 14, "stored crc code not matching, indicating corrupted data"));
        }
        Ok(())
    }

    /// [`Stream::read`] into a freshly allocated buffer of the exact size.
    pub fn read_to_vec(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; entry.uncompressed_size as usize];
        self.read(entry, &mut buf)?;
        Ok(buf)
    }

    // ── Listing ──────────────────────────────────────────────────────────────

    /// Committed entries in on-disk order.  Pending entries are not listed.
    pub fn contents(&mut self) -> Result<Vec<Entry>> {
        self.ensure_loaded()?;
        Ok(self.entries.iter().map(|e| e.entry.clone()).collect())
    }

    /// The committed entry called `name`; the last one if a foreign writer
    /// stored duplicates.
    pub fn find(&mut self, name: &str) -> Result<Option<Entry>> {
        self.ensure_loaded()?;
        Ok(self.entries.iter().rev().find(|e| e.entry.name == name).map(|e| e.entry.clone()))
    }

    pub fn stats(&mut self) -> Result<Stats> {
        self.ensure_loaded()?;
        let all = || self.entries.iter().chain(&self.pending);
        let used = self.end_of_data() + self.directory_footprint();
        Ok(Stats {
            file_size:          self.file_size,
            committed:          self.entries.len(),
            pending:            self.pending.len(),
            deflated:           all().filter(|e| e.entry.is_compressed()).count(),
            stored_bytes:       all().map(|e| u64::from(e.entry.compressed_size)).sum(),
            uncompressed_bytes: all().map(|e| u64::from(e.entry.uncompressed_size)).sum(),
            free_bytes:         self.file_size.saturating_sub(used),
        })
    }

    // ── Close ────────────────────────────────────────────────────────────────

    /// Sync pending entries, write the central directory and EOCD so the
    /// file is a valid ZIP, and close it.
    ///
    /// A stream that was only opened for reading and never loaded is closed
    /// without touching the directory.  Dropping a stream without closing
    /// it is equivalent to a crash: synced entries survive, the directory is
    /// stale or missing.
    pub fn close(mut self) -> Result<()> {
        self.commit_pending()?;
        if !self.loaded {
            debug!(path = %self.path.display(), "closed stream without writing");
            return Ok(());
        }
        self.write_directory(None)?;
        self.file.sync_all()?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "closed stream");
        Ok(())
    }

    fn corrupt(&self, offset: u64, message: impl Into<String>) -> ZtreamError {
        ZtreamError::corrupt(&self.path, offset, message)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .field("loaded", &self.loaded)
            .finish()
    }
}
