//! Pull-based archive reading over any byte stream.
//!
//! The reader owns the source, the detected (or requested) format
//! descriptor, and the diagnostics of the run. Each call to
//! [`ArchiveReader::next_entry`] yields the next member header; payload
//! bytes left unread by the caller are skipped automatically before the
//! following header, so metadata-only listings never touch member data.

use crate::diag::Diagnostics;
use crate::entry::ArchiveEntry;
use crate::error::Result;
use crate::formats::vcpio::payload_sum;
use crate::formats::{detect, FormatDescriptor, ReadOutcome};
use crate::stream::ArchiveSource;
use std::io::Read;

/// Lookahead window for format auto-detection, long enough for the
/// largest header in the roster.
const PROBE_SIZE: usize = 512;

pub struct ArchiveReader<'a> {
    src: ArchiveSource<'a>,
    desc: &'static FormatDescriptor,
    diag: Diagnostics,
    /// Unconsumed payload and padding of the current member.
    pending: u64,
    done: bool,
}

impl<'a> ArchiveReader<'a> {
    /// Open an archive, auto-detecting its format from the leading
    /// bytes of the stream.
    pub fn open(reader: impl Read + 'a) -> Result<Self> {
        let mut src = ArchiveSource::new(reader);
        let mut probe = [0u8; PROBE_SIZE];
        let n = src.read_lookahead(&mut probe)?;
        let desc = detect(&probe[..n])?;
        src.push_back(&probe[..n]);
        Self::start(src, desc)
    }

    /// Open an archive in an explicitly chosen format, bypassing
    /// auto-detection. Used for the anonymized write variants, which
    /// are never probed.
    pub fn with_format(reader: impl Read + 'a, desc: &'static FormatDescriptor) -> Result<Self> {
        Self::start(ArchiveSource::new(reader), desc)
    }

    fn start(mut src: ArchiveSource<'a>, desc: &'static FormatDescriptor) -> Result<Self> {
        desc.codec.start_read(&mut src)?;
        Ok(Self {
            src,
            desc,
            diag: Diagnostics::default(),
            pending: 0,
            done: false,
        })
    }

    /// The format this reader decodes.
    pub fn format(&self) -> &'static FormatDescriptor {
        self.desc
    }

    /// Advance to the next member header, skipping any unread payload
    /// of the previous member. Returns `None` at the trailer or a clean
    /// end of stream.
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        if self.done {
            return Ok(None);
        }
        if self.pending > 0 {
            self.src.skip(self.pending)?;
            self.pending = 0;
        }
        match self.desc.codec.read_header(&mut self.src, &mut self.diag)? {
            ReadOutcome::Entry(entry) => {
                self.pending = entry.skip + entry.pad;
                Ok(Some(entry))
            }
            ReadOutcome::EndOfArchive => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Read the full payload of the member just returned by
    /// [`Self::next_entry`]. For checksummed formats the stored checksum
    /// is verified against the streamed bytes; a mismatch warns and the
    /// data is returned anyway.
    pub fn read_data(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut data = vec![0u8; entry.skip as usize];
        self.src.read_exactly(&mut data)?;
        self.src.skip(entry.pad)?;
        self.pending = 0;
        if self.desc.computes_crc && entry.has_data() {
            let sum = payload_sum(&data);
            if sum != entry.crc {
                self.diag.warn(format!(
                    "checksum mismatch for {} (stored {:#x}, computed {:#x})",
                    entry.name, entry.crc, sum
                ));
            }
        }
        Ok(data)
    }

    /// Diagnostics accumulated so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Consume the reader, yielding the diagnostics of the run.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diag
    }
}
