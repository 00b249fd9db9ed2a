//! Positional file access and preallocation.
//!
//! [`FileCursor`] reads at an explicit offset without touching the shared
//! file position, so any number of readers can work on one `&File` while
//! the append path keeps its own seek position.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

pub struct FileCursor<'a> {
    file: &'a File,
    pos:  u64,
}

impl<'a> FileCursor<'a> {
    pub fn new(file: &'a File, pos: u64) -> Self {
        Self { file, pos }
    }
}

impl Read for FileCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = read_at(self.file, buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for FileCursor<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p)   => Some(p),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d)     => self.file.metadata()?.len().checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative or overflowing position")),
        }
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Reserve `len` zero-filled bytes for `file`.
#[cfg(target_os = "linux")]
pub fn preallocate(file: &File, len: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let len = libc::off_t::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "preallocation size out of range"))?;
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len) };
    match rc {
        0 => Ok(()),
        // Filesystems without fallocate support: fall back to a sparse file.
        libc::EOPNOTSUPP | libc::EINVAL => file.set_len(len as u64),
        errno => Err(io::Error::from_raw_os_error(errno)),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn preallocate(file: &File, len: u64) -> io::Result<()> {
    file.set_len(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cursor_reads_at_offset_without_moving_file() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut cursor = FileCursor::new(&file, 3);
        let mut buf = [0u8; 4];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"3456");

        cursor.seek(SeekFrom::Current(-2)).unwrap();
        cursor.read_exact(&mut buf[..2]).unwrap();
        assert_eq!(&buf[..2], b"56");

        assert_eq!(file.stream_position().unwrap(), 10);
    }

    #[test]
    fn preallocated_file_is_zero_filled() {
        let file = tempfile::tempfile().unwrap();
        preallocate(&file, 64 * 1024).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 64 * 1024);

        let mut content = Vec::new();
        FileCursor::new(&file, 0).read_to_end(&mut content).unwrap();
        assert_eq!(content.len(), 64 * 1024);
        assert!(content.iter().all(|&b| b == 0));
    }
}
