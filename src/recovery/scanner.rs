//! Forward scanner over local file headers.
//!
//! # How it works
//!
//! Starting at offset 0 the scanner decodes one local header at a time and
//! jumps over its payload to the next.  It never looks at the central
//! directory.  The walk ends at the first offset that does not carry the
//! local header signature, which is normally the zero-filled gap between the
//! last entry and the directory.
//!
//! | Found at offset | Outcome |
//! |-----------------|---------|
//! | other signature | scan ends, everything before is returned |
//! | active header   | entry recorded (and verified, with a verifier) |
//! | tombstone       | region recorded in `wiped`, skipped |
//! | bad header      | `Corrupt` at the offending field |
//! | payload past EOF| `Corrupt` |
//!
//! With a [`Verifier`] every active payload is decompressed, its CRC32
//! checked, and the verifier asked whether the stored name fits the content.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use tracing::warn;

use crate::codec::is_stream_error;
use crate::error::{Result, ZtreamError};
use crate::header::{LocalFileHeader, BUFFER_SIZE, LOCAL_HEADER_SIZE};
use crate::stream::{FileCursor, StoredEntry};
use crate::verifier::Verifier;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A tombstone left behind by a wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WipedRegion {
    /// Offset of the tombstone header.
    pub offset: u64,
    /// Bytes covered, header included.
    pub len:    u64,
}

/// Result of [`scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Active entries in on-disk order.
    pub entries:    Vec<StoredEntry>,
    pub wiped:      Vec<WipedRegion>,
    /// First offset that did not start a local header.
    pub end_offset: u64,
    /// Payloads were decompressed and checked.
    pub verified:   bool,
}

impl ScanReport {
    pub fn stored_bytes(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.entry.compressed_size)).sum()
    }

    pub fn uncompressed_bytes(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.entry.uncompressed_size)).sum()
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{} entr{} ({} wiped), data ends at {}, {:.2} MiB stored / {:.2} MiB raw{}",
            self.entries.len(),
            if self.entries.len() == 1 { "y" } else { "ies" },
            self.wiped.len(),
            self.end_offset,
            self.stored_bytes() as f64 / 1024.0 / 1024.0,
            self.uncompressed_bytes() as f64 / 1024.0 / 1024.0,
            if self.verified { ", verified" } else { "" },
        )
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Walk the local headers of `file`, which is `file_size` bytes long.
///
/// Corruption is reported against `path`.  Only I/O failures and structural
/// corruption return `Err`; reaching the end of the entry run is not an
/// error.
pub fn scan(
    file:         &File,
    path:         &Path,
    file_size:    u64,
    mut verifier: Option<&mut dyn Verifier>,
) -> Result<ScanReport> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, FileCursor::new(file, 0));
    let mut report = ScanReport { verified: verifier.is_some(), ..ScanReport::default() };
    let mut offset = 0u64;

    loop {
        let header = match LocalFileHeader::read(&mut reader, offset)
            .map_err(|e| ZtreamError::from_header(path, e))?
        {
            Some(header) => header,
            None => break,
        };

        let next = offset + header.extent();
        if next > file_size {
            warn!(path = %path.display(), offset, "entry runs past the end of the file");
            return Err(ZtreamError::corrupt(
                path,
                offset + 18,
                format!("specified contents extends {} bytes beyond file", next - file_size),
            ));
        }

        if header.is_wiped() {
            report.wiped.push(WipedRegion { offset, len: header.extent() });
            reader.seek_relative(i64::from(header.compressed_size))?;
        } else {
            match verifier.as_deref_mut() {
                Some(v) => verify_payload(&mut reader, path, offset, &header, v)?,
                None => reader.seek_relative(i64::from(header.compressed_size))?,
            }
            report.entries.push(StoredEntry::from_header(&header, offset));
        }
        offset = next;
    }

    report.end_offset = offset;
    Ok(report)
}

/// Scan the container at `path` without opening it for writing.
pub fn scan_file<P: AsRef<Path>>(path: P, verifier: Option<&mut dyn Verifier>) -> Result<ScanReport> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if file_size > u64::from(u32::MAX) {
        return Err(ZtreamError::corrupt(path, 0, "file is too large to be a ztream"));
    }
    scan(&file, path, file_size, verifier)
}

/// Decompress one payload into the CRC and the verifier, leaving `reader`
/// just past the payload.
fn verify_payload<R: io::BufRead>(
    reader:   &mut R,
    path:     &Path,
    offset:   u64,
    header:   &LocalFileHeader,
    verifier: &mut dyn Verifier,
) -> Result<()> {
    let mut crc = crc32fast::Hasher::new();
    verifier.reset();

    let expected = u64::from(header.uncompressed_size);
    let payload_offset = offset + header.encoded_len() as u64;
    let mut limited = (&mut *reader).take(u64::from(header.compressed_size));

    let copied = {
        let mut tee = Tee { crc: &mut crc, verifier: &mut *verifier };
        if header.is_deflated() {
            let mut decoder = flate2::bufread::DeflateDecoder::new(&mut limited);
            io::copy(&mut (&mut decoder).take(expected), &mut tee)
        } else {
            io::copy(&mut (&mut limited).take(expected), &mut tee)
        }
    };

    let copied = match copied {
        Ok(n) => n,
        Err(e) if is_stream_error(&e) => {
            warn!(path = %path.display(), offset, error = %e, "undecodable entry");
            return Err(ZtreamError::corrupt(path, payload_offset, format!("unable to decode entry: {e}")));
        }
        Err(e) => return Err(e.into()),
    };
    if copied != expected {
        return Err(ZtreamError::corrupt(
            path,
            payload_offset,
            format!("entry decodes to {copied} bytes, expected {expected}"),
        ));
    }
    // Whatever the decoder left unread still belongs to this payload.
    io::copy(&mut limited, &mut io::sink())?;

    if crc.finalize() != header.crc32 {
        warn!(path = %path.display(), offset, name = %header.name, "crc mismatch");
        return Err(ZtreamError::corrupt(path, offset + 14, "crc not matching stored data"));
    }
    if !verifier.matches(&header.name) {
        warn!(path = %path.display(), offset, name = %header.name, "verifier rejected entry");
        return Err(ZtreamError::corrupt(
            path,
            offset + LOCAL_HEADER_SIZE as u64,
            format!("file name not matching the expected: {}", header.name),
        ));
    }
    Ok(())
}

/// Feeds the same bytes to a CRC and a verifier.
struct Tee<'a> {
    crc:      &'a mut crc32fast::Hasher,
    verifier: &'a mut dyn Verifier,
}

impl Write for Tee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.crc.update(buf);
        self.verifier.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.verifier.flush()
    }
}
