//! Streaming archive format library.
//!
//! Read and write the classic Unix archive container formats over any
//! byte stream: `ar`, old tar and POSIX ustar, and the cpio family
//! (old octal, old binary, and the SVR4 hex dialects with and without
//! payload checksums), plus the anonymized write variants `dist`,
//! `v4norm`, and `v4root` for reproducible distribution archives.
//!
//! Formats are selected by name through the static registry or
//! auto-detected from the leading bytes of an input stream. Compressed
//! inputs are recognised and reported with the decompressor to use.
//!
//! ```no_run
//! use pax_stream::{ArchiveEntry, ArchiveReader, ArchiveWriter, WriteOptions};
//!
//! # fn run() -> pax_stream::Result<()> {
//! let mut out = Vec::new();
//! let format = pax_stream::format_by_name("ustar")?;
//! let mut writer = ArchiveWriter::create(&mut out, format, WriteOptions::default())?;
//! writer.write_entry(&ArchiveEntry::regular("hello.txt", 6), b"hello\n")?;
//! writer.finish()?;
//!
//! let mut reader = ArchiveReader::open(&out[..])?;
//! while let Some(entry) = reader.next_entry()? {
//!     println!("{} ({} bytes)", entry.name, entry.stat.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod anonymize;
pub mod diag;
pub mod entry;
pub mod error;
pub mod formats;
pub mod numeric;
pub mod reader;
pub mod stream;
pub mod writer;

pub use anonymize::Anonymize;
pub use diag::Diagnostics;
pub use entry::{ArchiveEntry, EntryStat, EntryType, PAX_PATH_MAX};
pub use error::{PaxError, Result};
pub use formats::{detect, format_by_name, FormatDescriptor, ReadOutcome, WriteOutcome, FORMATS};
pub use reader::ArchiveReader;
pub use writer::{ArchiveWriter, WriteOptions};
