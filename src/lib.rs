pub mod codec;
pub mod error;
pub mod header;
pub mod options;
pub mod recovery;
pub mod shared;
pub mod stream;
pub mod verifier;

pub use codec::CompressionMethod;
pub use error::{Result, ZtreamError};
pub use options::{Config, Options, Settings};
pub use recovery::{scan_file, ScanReport};
pub use shared::SharedStream;
pub use stream::{Entry, Stats, StoredEntry, Stream};
pub use verifier::{blake3_name, Blake3Verifier, Verifier};
