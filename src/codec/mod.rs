//! Compression methods and the store-or-deflate decision made per append.
//!
//! # Heuristic
//! With sampling enabled (sample size > 0) a prefix of the payload is
//! deflated into a byte counter.  Only if the sample shrinks below
//! `threshold × sample length` is the whole payload deflated, and even then
//! the result is thrown away unless it is strictly smaller than the input.
//! Entries therefore always satisfy `compressed < uncompressed` when
//! deflated and `compressed == uncompressed` when stored.
//!
//! Payloads use raw deflate (no zlib header), as ZIP method 8 requires.

use std::borrow::Cow;
use std::io::{self, Read};

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::options::Config;

// ── Method ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
}

impl CompressionMethod {
    /// ZIP method number written to disk.
    pub fn id(self) -> u16 {
        match self {
            CompressionMethod::Stored  => 0,
            CompressionMethod::Deflate => 8,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(CompressionMethod::Stored),
            8 => Some(CompressionMethod::Deflate),
            _ => None,
        }
    }

    pub fn for_sizes(compressed: u32, uncompressed: u32) -> Self {
        if compressed == uncompressed {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionMethod::Stored  => "stored",
            CompressionMethod::Deflate => "deflate",
        }
    }
}

// ── Deflater ─────────────────────────────────────────────────────────────────

/// Reusable deflate state plus the sampling parameters from [`Config`].
pub struct Deflater {
    compress:    Compress,
    out:         Box<[u8]>,
    sample_size: usize,
    threshold:   f32,
}

impl Deflater {
    pub fn new(config: &Config) -> Self {
        Self::with_params(
            config.compression_level(),
            config.sample_compress_size(),
            config.compression_threshold(),
        )
    }

    pub fn with_params(level: u32, sample_size: usize, threshold: f32) -> Self {
        Self {
            compress:    Compress::new(Compression::new(level), false),
            out:         vec![0u8; crate::header::BUFFER_SIZE].into_boxed_slice(),
            sample_size,
            threshold,
        }
    }

    /// Bytes to store for `data`: borrowed when stored raw, owned deflate
    /// output otherwise.  Use [`CompressionMethod::for_sizes`] on the result
    /// to learn which.
    pub fn encode<'a>(&mut self, data: &'a [u8]) -> io::Result<Cow<'a, [u8]>> {
        if !self.worth_compressing(data)? {
            return Ok(Cow::Borrowed(data));
        }
        let mut compressed = Vec::with_capacity(data.len());
        self.deflate(data, |chunk| compressed.extend_from_slice(chunk))?;
        if compressed.len() >= data.len() {
            return Ok(Cow::Borrowed(data));
        }
        Ok(Cow::Owned(compressed))
    }

    /// Trial-compress a prefix of `data`, counting output without keeping it.
    pub fn worth_compressing(&mut self, data: &[u8]) -> io::Result<bool> {
        if self.sample_size == 0 || data.is_empty() {
            return Ok(false);
        }
        let sample = &data[..data.len().min(self.sample_size)];
        let produced = self.deflate(sample, |_| {})?;
        let limit = self.threshold * sample.len() as f32;
        Ok(produced > 0 && (produced as f32) < limit)
    }

    /// Run one complete raw-deflate stream over `input`, handing each output
    /// chunk to `sink`.  Returns the total output length.
    fn deflate<F: FnMut(&[u8])>(&mut self, input: &[u8], mut sink: F) -> io::Result<u64> {
        self.compress.reset();
        let mut consumed = 0usize;
        loop {
            let in_before  = self.compress.total_in();
            let out_before = self.compress.total_out();
            let status = self.compress
                .compress(&input[consumed..], &mut self.out, FlushCompress::Finish)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let read    = (self.compress.total_in() - in_before) as usize;
            let written = (self.compress.total_out() - out_before) as usize;
            consumed += read;
            sink(&self.out[..written]);

            match status {
                Status::StreamEnd => return Ok(self.compress.total_out()),
                _ if read == 0 && written == 0 => {
                    return Err(io::Error::new(io::ErrorKind::Other, "deflate made no progress"));
                }
                _ => {}
            }
        }
    }
}

// ── Inflate ──────────────────────────────────────────────────────────────────

/// Inflate exactly `out.len()` bytes from a raw deflate stream.
///
/// Truncated or malformed streams surface as `InvalidInput`, `InvalidData`
/// or `UnexpectedEof` I/O errors; callers map those to corruption.
pub fn inflate_exact<R: io::BufRead>(reader: R, out: &mut [u8]) -> io::Result<()> {
    flate2::bufread::DeflateDecoder::new(reader).read_exact(out)
}

/// True for the error kinds a bad deflate stream produces.
pub fn is_stream_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}
