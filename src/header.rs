//! On-disk records: local file header, central directory record and the
//! end-of-central-directory (EOCD) trailer.
//!
//! # Layout
//!
//! All integers are little-endian.  A container is a ZIP file restricted to
//! the subset below; any ZIP reader can open a closed container.
//!
//! ```text
//! local file header (30 B + name)
//!   0  u32 signature  50 4B 03 04
//!   4  u16 version    20 = active entry, 10 = wiped (tombstone)
//!   6  u16 flags      0x0800 (UTF-8 names), nothing else
//!   8  u16 method     0 = stored, 8 = deflate
//!  10  u16 mod time   DOS packed, 0 for tombstones
//!  12  u16 mod date   DOS packed, 0 for tombstones
//!  14  u32 crc32      over the uncompressed bytes
//!  18  u32 compressed size
//!  22  u32 uncompressed size
//!  26  u16 name length
//!  28  u16 extra length, always 0
//!
//! central directory record (46 B + name)
//!   0  u32 signature  50 4B 01 02
//!   4  u16 version made by, 6 u16 version needed (both 20)
//!   8  u16 flags .. 28 u16 name length   (as in the local header)
//!  30  u16 extra length, 32 u16 comment length, 34 u16 disk number,
//!  36  u16 internal attributes, 38 u32 external attributes (all 0)
//!  42  u32 offset of the local header
//!
//! EOCD (24 B, ends exactly at the container size)
//!   0  u32 signature  50 4B 05 06
//!   4  u16 disk, 6 u16 directory disk (both 0)
//!   8  u16 entries on this disk, 10 u16 total entries (equal)
//!  12  u32 directory size, 16 u32 directory offset (0 if no entries)
//!  20  u16 comment length = 2, followed by two zero bytes
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

use crate::codec::CompressionMethod;

pub const LOCAL_SIGNATURE:   u32 = 0x0403_4b50;
pub const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
pub const EOCD_SIGNATURE:    u32 = 0x0605_4b50;

pub const LOCAL_HEADER_SIZE:   usize = 30;
pub const CENTRAL_HEADER_SIZE: usize = 46;
pub const EOCD_SIZE:           usize = 24;

/// Size of the scratch buffers used for copying and wiping.
pub const BUFFER_SIZE: usize = 16 * 1024;
/// Longest name a header may carry.  Never decrease: existing containers
/// would stop decoding.
pub const MAX_NAME_LENGTH: usize = BUFFER_SIZE - CENTRAL_HEADER_SIZE;

const VERSION_ACTIVE: u16 = 20;
const VERSION_WIPED:  u16 = 10;
const FLAG_UTF8:      u16 = 1 << 11;
const EOCD_COMMENT:   [u8; 2] = [0, 0];

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("corrupt header at offset {offset}: {message}")]
    Corrupt { offset: u64, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn corrupt<T>(offset: u64, message: impl Into<String>) -> Result<T, HeaderError> {
    Err(HeaderError::Corrupt { offset, message: message.into() })
}

// ── Entry kind ───────────────────────────────────────────────────────────────

/// What a local header describes.  On disk the distinction lives in the
/// version field; in memory it is never mixed up with a format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Active,
    /// A securely wiped region that scanners skip.
    Wiped,
}

impl EntryKind {
    fn version(self) -> u16 {
        match self {
            EntryKind::Active => VERSION_ACTIVE,
            EntryKind::Wiped  => VERSION_WIPED,
        }
    }

    fn from_version(version: u16) -> Option<Self> {
        match version {
            VERSION_ACTIVE => Some(EntryKind::Active),
            VERSION_WIPED  => Some(EntryKind::Wiped),
            _              => None,
        }
    }
}

// ── DOS date/time ────────────────────────────────────────────────────────────

/// Packed MS-DOS modification time and date (2-second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    pub const ZERO: DosDateTime = DosDateTime { time: 0, date: 0 };

    pub fn now() -> Self {
        Self::from_datetime(&Local::now().naive_local())
    }

    /// DOS dates span 1980-01-01 to 2107-12-31 23:59:58; times outside
    /// clamp to the nearest end.
    pub fn from_datetime(t: &NaiveDateTime) -> Self {
        if t.year() < 1980 {
            return DosDateTime { time: 0, date: (1 << 5) | 1 };
        }
        if t.year() > 2107 {
            return DosDateTime {
                time: 29 | (59 << 5) | (23 << 11),
                date: 31 | (12 << 5) | (127 << 9),
            };
        }
        let date = t.day() + (t.month() << 5) + (((t.year() - 1980) as u32) << 9);
        let time = t.second() / 2 + (t.minute() << 5) + (t.hour() << 11);
        DosDateTime { time: time as u16, date: date as u16 }
    }

    /// `None` for the all-zero tombstone stamp or other invalid values.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let year  = 1980 + i32::from(self.date >> 9);
        let month = u32::from((self.date >> 5) & 0x0f);
        let day   = u32::from(self.date & 0x1f);
        let hour  = u32::from(self.time >> 11);
        let min   = u32::from((self.time >> 5) & 0x3f);
        let sec   = u32::from(self.time & 0x1f) * 2;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, min, sec)
    }
}

// ── Local file header ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub kind:              EntryKind,
    pub method:            CompressionMethod,
    pub modified:          DosDateTime,
    pub crc32:             u32,
    pub compressed_size:   u32,
    pub uncompressed_size: u32,
    pub name:              String,
}

impl LocalFileHeader {
    /// Header for a live entry stamped with the current local time.  The
    /// method follows from the sizes: equal sizes mean stored.
    pub fn active(crc32: u32, compressed_size: u32, uncompressed_size: u32, name: &str) -> Self {
        Self {
            kind:     EntryKind::Active,
            method:   CompressionMethod::for_sizes(compressed_size, uncompressed_size),
            modified: DosDateTime::now(),
            crc32,
            compressed_size,
            uncompressed_size,
            name:     name.to_owned(),
        }
    }

    /// Tombstone covering `size` zeroed bytes after the header.  Carries no
    /// name and no time, so nothing about the erased entry or the moment of
    /// erasure survives.
    pub fn wiped(crc32: u32, size: u32) -> Self {
        Self {
            kind:              EntryKind::Wiped,
            method:            CompressionMethod::Stored,
            modified:          DosDateTime::ZERO,
            crc32,
            compressed_size:   size,
            uncompressed_size: size,
            name:              String::new(),
        }
    }

    pub fn is_wiped(&self) -> bool {
        self.kind == EntryKind::Wiped
    }

    pub fn is_deflated(&self) -> bool {
        self.method == CompressionMethod::Deflate
    }

    /// Header plus name.
    pub fn encoded_len(&self) -> usize {
        LOCAL_HEADER_SIZE + self.name.len()
    }

    /// Header, name and payload: the bytes this entry occupies on disk.
    pub fn extent(&self) -> u64 {
        self.encoded_len() as u64 + u64::from(self.compressed_size)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(LOCAL_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.kind.version())?;
        writer.write_u16::<LittleEndian>(FLAG_UTF8)?;
        writer.write_u16::<LittleEndian>(self.method.id())?;
        writer.write_u16::<LittleEndian>(self.modified.time)?;
        writer.write_u16::<LittleEndian>(self.modified.date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_all(self.name.as_bytes())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut out);
        out
    }

    /// Decode the header that starts at absolute `offset` in the container.
    ///
    /// Returns `Ok(None)` when the signature does not match, which marks the
    /// end of the written entries.  Every other deviation is corruption.
    /// Never reads past the name.
    pub fn read<R: Read>(mut reader: R, offset: u64) -> Result<Option<Self>, HeaderError> {
        let mut buf = [0u8; LOCAL_HEADER_SIZE];
        let n = read_full(&mut reader, &mut buf)?;
        if n < LOCAL_HEADER_SIZE {
            return corrupt(offset + n as u64, "found EOF when looking for file header");
        }

        let mut fields = &buf[..];
        if fields.read_u32::<LittleEndian>()? != LOCAL_SIGNATURE {
            return Ok(None);
        }

        let version = fields.read_u16::<LittleEndian>()?;
        let kind = match EntryKind::from_version(version) {
            Some(k) => k,
            None    => return corrupt(offset + 4, format!("unexpected version needed to extract: {version}")),
        };

        let flags = fields.read_u16::<LittleEndian>()?;
        if flags != FLAG_UTF8 {
            return corrupt(offset + 6, format!("expected unicode flag only: {flags:#06x}"));
        }

        let method_id = fields.read_u16::<LittleEndian>()?;
        let method = match CompressionMethod::from_id(method_id) {
            Some(m) => m,
            None    => return corrupt(offset + 8, format!("expected no compression or deflate: {method_id}")),
        };

        let time              = fields.read_u16::<LittleEndian>()?;
        let date              = fields.read_u16::<LittleEndian>()?;
        let crc32             = fields.read_u32::<LittleEndian>()?;
        let compressed_size   = fields.read_u32::<LittleEndian>()?;
        let uncompressed_size = fields.read_u32::<LittleEndian>()?;

        match method {
            CompressionMethod::Deflate if compressed_size == 0 => {
                return corrupt(offset + 18, "deflated entry with empty compressed data");
            }
            CompressionMethod::Deflate if compressed_size >= uncompressed_size => {
                return corrupt(offset + 22, "compressed data >= uncompressed data stored");
            }
            CompressionMethod::Stored if compressed_size != uncompressed_size => {
                return corrupt(offset + 22, "stored data must have equal sizes");
            }
            _ => {}
        }

        let name_len = fields.read_u16::<LittleEndian>()? as usize;
        if name_len > MAX_NAME_LENGTH {
            return corrupt(offset + 26, format!("file name too long: {name_len}"));
        }
        let extra_len = fields.read_u16::<LittleEndian>()?;
        if extra_len != 0 {
            return corrupt(offset + 28, format!("unexpected extra field of {extra_len} bytes"));
        }

        let mut name = vec![0u8; name_len];
        let n = read_full(&mut reader, &mut name)?;
        if n < name_len {
            return corrupt(offset + (LOCAL_HEADER_SIZE + n) as u64, "found EOF when reading file name");
        }
        let name = match String::from_utf8(name) {
            Ok(s)  => s,
            Err(_) => return corrupt(offset + LOCAL_HEADER_SIZE as u64, "file name is not valid UTF-8"),
        };

        Ok(Some(Self {
            kind,
            method,
            modified: DosDateTime { time, date },
            crc32,
            compressed_size,
            uncompressed_size,
            name,
        }))
    }
}

// ── Central directory ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryRecord {
    pub method:              CompressionMethod,
    pub modified:            DosDateTime,
    pub crc32:               u32,
    pub compressed_size:     u32,
    pub uncompressed_size:   u32,
    pub name:                String,
    /// Offset of the entry's local header, not of its payload.
    pub local_header_offset: u32,
}

impl CentralDirectoryRecord {
    pub fn encoded_len(&self) -> usize {
        CENTRAL_HEADER_SIZE + self.name.len()
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(CENTRAL_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(VERSION_ACTIVE)?; // made by
        writer.write_u16::<LittleEndian>(VERSION_ACTIVE)?; // needed
        writer.write_u16::<LittleEndian>(FLAG_UTF8)?;
        writer.write_u16::<LittleEndian>(self.method.id())?;
        writer.write_u16::<LittleEndian>(self.modified.time)?;
        writer.write_u16::<LittleEndian>(self.modified.date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?; // extra
        writer.write_u16::<LittleEndian>(0)?; // comment
        writer.write_u16::<LittleEndian>(0)?; // disk
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(0)?; // external attributes
        writer.write_u32::<LittleEndian>(self.local_header_offset)?;
        writer.write_all(self.name.as_bytes())?;
        Ok(())
    }

    /// Decode a record written by [`CentralDirectoryRecord::write`].
    pub fn read<R: Read>(mut reader: R, offset: u64) -> Result<Self, HeaderError> {
        let mut buf = [0u8; CENTRAL_HEADER_SIZE];
        if read_full(&mut reader, &mut buf)? < CENTRAL_HEADER_SIZE {
            return corrupt(offset, "found EOF when reading central directory record");
        }
        let mut fields = &buf[..];
        if fields.read_u32::<LittleEndian>()? != CENTRAL_SIGNATURE {
            return corrupt(offset, "missing central directory signature");
        }
        let _made_by = fields.read_u16::<LittleEndian>()?;
        let _needed  = fields.read_u16::<LittleEndian>()?;
        let _flags   = fields.read_u16::<LittleEndian>()?;
        let method_id = fields.read_u16::<LittleEndian>()?;
        let method = match CompressionMethod::from_id(method_id) {
            Some(m) => m,
            None    => return corrupt(offset + 10, format!("unsupported method: {method_id}")),
        };
        let time              = fields.read_u16::<LittleEndian>()?;
        let date              = fields.read_u16::<LittleEndian>()?;
        let crc32             = fields.read_u32::<LittleEndian>()?;
        let compressed_size   = fields.read_u32::<LittleEndian>()?;
        let uncompressed_size = fields.read_u32::<LittleEndian>()?;
        let name_len          = fields.read_u16::<LittleEndian>()? as usize;
        let mut skipped = [0u8; 12];
        fields.read_exact(&mut skipped)?;
        let local_header_offset = fields.read_u32::<LittleEndian>()?;

        if name_len > MAX_NAME_LENGTH {
            return corrupt(offset + 28, format!("file name too long: {name_len}"));
        }
        let mut name = vec![0u8; name_len];
        if read_full(&mut reader, &mut name)? < name_len {
            return corrupt(offset + CENTRAL_HEADER_SIZE as u64, "found EOF when reading file name");
        }
        let name = String::from_utf8(name).or_else(|_| {
            corrupt(offset + CENTRAL_HEADER_SIZE as u64, "file name is not valid UTF-8")
        })?;

        Ok(Self {
            method,
            modified: DosDateTime { time, date },
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            local_header_offset,
        })
    }
}

// ── End of central directory ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub entries:          u16,
    pub directory_size:   u32,
    pub directory_offset: u32,
}

impl EndOfCentralDirectory {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(EOCD_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(self.entries)?;
        writer.write_u16::<LittleEndian>(self.entries)?;
        writer.write_u32::<LittleEndian>(self.directory_size)?;
        writer.write_u32::<LittleEndian>(self.directory_offset)?;
        writer.write_u16::<LittleEndian>(EOCD_COMMENT.len() as u16)?;
        writer.write_all(&EOCD_COMMENT)?;
        Ok(())
    }

    /// Decode the trailer from the last [`EOCD_SIZE`] bytes of a container.
    pub fn read<R: Read>(mut reader: R, offset: u64) -> Result<Self, HeaderError> {
        let mut buf = [0u8; EOCD_SIZE];
        if read_full(&mut reader, &mut buf)? < EOCD_SIZE {
            return corrupt(offset, "found EOF when reading end of central directory");
        }
        let mut fields = &buf[..];
        if fields.read_u32::<LittleEndian>()? != EOCD_SIGNATURE {
            return corrupt(offset, "missing end of central directory signature");
        }
        let disk     = fields.read_u16::<LittleEndian>()?;
        let cd_disk  = fields.read_u16::<LittleEndian>()?;
        let on_disk  = fields.read_u16::<LittleEndian>()?;
        let entries  = fields.read_u16::<LittleEndian>()?;
        if disk != 0 || cd_disk != 0 || on_disk != entries {
            return corrupt(offset + 4, "multi-disk archives are not supported");
        }
        let directory_size   = fields.read_u32::<LittleEndian>()?;
        let directory_offset = fields.read_u32::<LittleEndian>()?;
        Ok(Self { entries, directory_size, directory_offset })
    }
}

/// Footprint of a directory holding entries with the given name lengths.
pub fn directory_len<I: IntoIterator<Item = usize>>(name_lens: I) -> u64 {
    name_lens
        .into_iter()
        .map(|n| (CENTRAL_HEADER_SIZE + n) as u64)
        .sum::<u64>()
        + EOCD_SIZE as u64
}

/// Like `read_exact`, but reports how many bytes arrived before EOF.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn expect_corrupt(bytes: &[u8], at: u64) {
        match LocalFileHeader::read(Cursor::new(bytes), 100) {
            Err(HeaderError::Corrupt { offset, .. }) => assert_eq!(offset, 100 + at),
            other => panic!("expected corruption at {at}, got {other:?}"),
        }
    }

    #[test]
    fn local_header_layout() {
        let mut h = LocalFileHeader::active(0xdead_beef, 7, 12, "ab");
        h.modified = DosDateTime { time: 0x1234, date: 0x5678 };
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], &[0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(&bytes[4..6], &[20, 0]);
        assert_eq!(&bytes[6..8], &[0x00, 0x08]);
        assert_eq!(&bytes[8..10], &[8, 0]);
        assert_eq!(&bytes[10..14], &[0x34, 0x12, 0x78, 0x56]);
        assert_eq!(&bytes[14..18], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&bytes[18..22], &[7, 0, 0, 0]);
        assert_eq!(&bytes[22..26], &[12, 0, 0, 0]);
        assert_eq!(&bytes[26..30], &[2, 0, 0, 0]);
        assert_eq!(&bytes[30..], b"ab");

        let back = LocalFileHeader::read(Cursor::new(&bytes), 0).unwrap().unwrap();
        assert_eq!(back, h);
        assert_eq!(back.extent(), 32 + 7);
    }

    #[test]
    fn wiped_header_has_sentinel_version_and_no_metadata() {
        let h = LocalFileHeader::wiped(42, 100);
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), LOCAL_HEADER_SIZE);
        assert_eq!(&bytes[4..6], &[10, 0]);
        assert_eq!(&bytes[8..14], &[0; 6]);

        let back = LocalFileHeader::read(Cursor::new(&bytes), 0).unwrap().unwrap();
        assert!(back.is_wiped());
        assert_eq!(back.name, "");
        assert_eq!(back.extent(), 130);
    }

    #[test]
    fn signature_mismatch_is_end_not_error() {
        let zeros = [0u8; LOCAL_HEADER_SIZE];
        assert!(LocalFileHeader::read(Cursor::new(&zeros[..]), 0).unwrap().is_none());
    }

    #[test]
    fn short_header_is_corrupt() {
        let bytes = LocalFileHeader::active(0, 3, 3, "x").to_bytes();
        expect_corrupt(&bytes[..10], 10);
        expect_corrupt(&bytes[..30], 30);
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let good = LocalFileHeader::active(0, 5, 5, "name").to_bytes();

        let mut b = good.clone();
        b[4] = 45;
        expect_corrupt(&b, 4);

        let mut b = good.clone();
        b[6] = 1;
        expect_corrupt(&b, 6);

        let mut b = good.clone();
        b[8] = 12;
        expect_corrupt(&b, 8);

        // stored with differing sizes
        let mut b = good.clone();
        b[22] = 6;
        expect_corrupt(&b, 22);

        // deflate that does not shrink
        let mut b = good.clone();
        b[8] = 8;
        expect_corrupt(&b, 22);

        let mut b = good.clone();
        b[26] = 0xff;
        b[27] = 0xff;
        expect_corrupt(&b, 26);

        let mut b = good;
        b[28] = 1;
        expect_corrupt(&b, 28);
    }

    #[test]
    fn empty_stored_payload_is_valid() {
        let bytes = LocalFileHeader::active(0, 0, 0, "empty").to_bytes();
        let h = LocalFileHeader::read(Cursor::new(&bytes), 0).unwrap().unwrap();
        assert_eq!(h.method, CompressionMethod::Stored);
        assert_eq!(h.compressed_size, 0);
    }

    #[test]
    fn central_record_layout() {
        let rec = CentralDirectoryRecord {
            method:              CompressionMethod::Stored,
            modified:            DosDateTime { time: 1, date: 2 },
            crc32:               3,
            compressed_size:     4,
            uncompressed_size:   4,
            name:                "abc".into(),
            local_header_offset: 0x0102_0304,
        };
        let mut bytes = Vec::new();
        rec.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), rec.encoded_len());
        assert_eq!(&bytes[0..4], &[0x50, 0x4b, 0x01, 0x02]);
        assert_eq!(&bytes[4..8], &[20, 0, 20, 0]);
        assert_eq!(&bytes[30..42], &[0; 12]);
        assert_eq!(&bytes[42..46], &[4, 3, 2, 1]);
        assert_eq!(&bytes[46..], b"abc");
        assert_eq!(CentralDirectoryRecord::read(Cursor::new(&bytes), 0).unwrap(), rec);
    }

    #[test]
    fn eocd_layout() {
        let eocd = EndOfCentralDirectory { entries: 3, directory_size: 150, directory_offset: 1000 };
        let mut bytes = Vec::new();
        eocd.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), EOCD_SIZE);
        assert_eq!(&bytes[8..12], &[3, 0, 3, 0]);
        assert_eq!(&bytes[20..24], &[2, 0, 0, 0]);
        assert_eq!(EndOfCentralDirectory::read(Cursor::new(&bytes), 0).unwrap(), eocd);
    }

    #[test]
    fn dos_time_packing() {
        let t = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap().and_hms_opt(13, 45, 31).unwrap();
        let dos = DosDateTime::from_datetime(&t);
        assert_eq!(dos.date, 15 + (6 << 5) + (40 << 9));
        assert_eq!(dos.time, 15 + (45 << 5) + (13 << 11));
        assert_eq!(
            dos.to_datetime(),
            NaiveDate::from_ymd_opt(2020, 6, 15).unwrap().and_hms_opt(13, 45, 30),
        );
        assert_eq!(DosDateTime::ZERO.to_datetime(), None);
    }

    #[test]
    fn dos_time_clamps_out_of_range_years() {
        let early = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            DosDateTime::from_datetime(&early).to_datetime(),
            NaiveDate::from_ymd_opt(1980, 1, 1).unwrap().and_hms_opt(0, 0, 0),
        );

        let last = NaiveDate::from_ymd_opt(2107, 12, 31).unwrap().and_hms_opt(23, 59, 58).unwrap();
        let late = NaiveDate::from_ymd_opt(2200, 3, 4).unwrap().and_hms_opt(5, 6, 7).unwrap();
        assert_eq!(DosDateTime::from_datetime(&late), DosDateTime::from_datetime(&last));
        assert_eq!(DosDateTime::from_datetime(&late).to_datetime(), Some(last));
    }

    #[test]
    fn directory_footprint() {
        assert_eq!(directory_len(std::iter::empty()), 24);
        assert_eq!(directory_len([1, 5]), 24 + 47 + 51);
    }
}
