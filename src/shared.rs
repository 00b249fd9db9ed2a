//! A cloneable, thread-safe handle around one [`Stream`].
//!
//! Reads share a read lock and run in parallel; everything that moves the
//! append position or changes the entry list takes the write lock.  After
//! [`SharedStream::close`] every clone reports [`ZtreamError::Closed`].

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, ZtreamError};
use crate::options::Options;
use crate::stream::{Entry, Stats, Stream};

#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<RwLock<Option<Stream>>>,
}

impl SharedStream {
    pub fn new(stream: Stream) -> Self {
        Self { inner: Arc::new(RwLock::new(Some(stream))) }
    }

    pub fn create<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        Stream::create(path, opts).map(Self::new)
    }

    pub fn open<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        Stream::open(path, opts).map(Self::new)
    }

    fn with_read<T>(&self, f: impl FnOnce(&Stream) -> Result<T>) -> Result<T> {
        let guard = self.inner.read();
        f(guard.as_ref().ok_or(ZtreamError::Closed)?)
    }

    fn with_write<T>(&self, f: impl FnOnce(&mut Stream) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write();
        f(guard.as_mut().ok_or(ZtreamError::Closed)?)
    }

    pub fn append(&self, name: &str, data: &[u8]) -> Result<Entry> {
        self.with_write(|s| s.append(name, data))
    }

    pub fn sync(&self) -> Result<()> {
        self.with_write(Stream::sync)
    }

    /// Append and sync under one lock, so the entry is durable and listed
    /// when this returns.
    pub fn put(&self, name: &str, data: &[u8]) -> Result<Entry> {
        self.with_write(|s| {
            let entry = s.append(name, data)?;
            s.sync()?;
            Ok(entry)
        })
    }

    pub fn read(&self, entry: &Entry, buf: &mut [u8]) -> Result<()> {
        self.with_read(|s| s.read(entry, buf))
    }

    pub fn read_to_vec(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.with_read(|s| s.read_to_vec(entry))
    }

    // Listing may trigger the initial load, hence the write lock.
    pub fn contents(&self) -> Result<Vec<Entry>> {
        self.with_write(Stream::contents)
    }

    pub fn find(&self, name: &str) -> Result<Option<Entry>> {
        self.with_write(|s| s.find(name))
    }

    pub fn stats(&self) -> Result<Stats> {
        self.with_write(Stream::stats)
    }

    pub fn wipe(&self, name: &str) -> Result<()> {
        self.with_write(|s| s.wipe(name))
    }

    /// Close the underlying stream.  Only the first call on any clone does
    /// the work; later calls return [`ZtreamError::Closed`].
    pub fn close(&self) -> Result<()> {
        let stream = self.inner.write().take().ok_or(ZtreamError::Closed)?;
        stream.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small() -> Options {
        Options { file_size: Some(1 << 18), ..Options::default() }
    }

    #[test]
    fn concurrent_readers_see_the_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedStream::create(dir.path().join("s.zip"), small()).unwrap();
        let data: Vec<u8> = (0..20_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
        let entry = shared.put("blob", &data).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let entry = entry.clone();
                let data = data.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        assert_eq!(shared.read_to_vec(&entry).unwrap(), data);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        shared.close().unwrap();
    }

    #[test]
    fn concurrent_writers_each_land_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedStream::create(dir.path().join("s.zip"), small()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || shared.put(&format!("entry-{i}"), format!("payload {i}").as_bytes()).unwrap())
            })
            .collect();
        let entries: Vec<Entry> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(shared.contents().unwrap().len(), 8);
        for entry in &entries {
            let i = entry.name.trim_start_matches("entry-");
            assert_eq!(shared.read_to_vec(entry).unwrap(), format!("payload {i}").into_bytes());
        }
    }

    #[test]
    fn closed_handle_rejects_everything() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedStream::create(dir.path().join("s.zip"), small()).unwrap();
        let other = shared.clone();
        shared.close().unwrap();

        assert!(other.is_closed());
        assert!(matches!(other.append("a", b"b"), Err(ZtreamError::Closed)));
        assert!(matches!(other.contents(), Err(ZtreamError::Closed)));
        assert!(matches!(other.close(), Err(ZtreamError::Closed)));
    }
}
