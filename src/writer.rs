//! Push-based archive writing over any byte sink.
//!
//! The writer owns the sink, the target format descriptor, and the
//! effective anonymization mask (the caller's mask OR-ed with the
//! format's preset). Members the format cannot represent are skipped
//! with a warning rather than aborting the run; [`ArchiveWriter::finish`]
//! emits the trailer, rounds the stream up to the format's block size,
//! and hands back the diagnostics.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{ArchiveEntry, EntryType};
use crate::error::Result;
use crate::formats::vcpio::payload_sum;
use crate::formats::{FormatDescriptor, WriteOutcome};
use crate::stream::ArchiveSink;
use std::io::Write;

/// Write-side knobs.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Metadata scrubbing mask, OR-ed with the format's preset.
    pub anonymize: Anonymize,
    /// Invocation name used to prefix diagnostics.
    pub program: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            anonymize: Anonymize::empty(),
            program: "pax".into(),
        }
    }
}

pub struct ArchiveWriter<'a> {
    sink: ArchiveSink<'a>,
    desc: &'static FormatDescriptor,
    mask: Anonymize,
    diag: Diagnostics,
}

impl<'a> ArchiveWriter<'a> {
    /// Start a fresh archive, emitting any format preamble.
    pub fn create(
        writer: impl Write + 'a,
        desc: &'static FormatDescriptor,
        options: WriteOptions,
    ) -> Result<Self> {
        Self::start(writer, desc, options, false)
    }

    /// Continue an existing archive positioned after its last member
    /// (and before any trailer). The preamble is suppressed.
    pub fn append(
        writer: impl Write + 'a,
        desc: &'static FormatDescriptor,
        options: WriteOptions,
    ) -> Result<Self> {
        Self::start(writer, desc, options, true)
    }

    fn start(
        writer: impl Write + 'a,
        desc: &'static FormatDescriptor,
        options: WriteOptions,
        append: bool,
    ) -> Result<Self> {
        let mut sink = ArchiveSink::new(writer);
        desc.codec.start_write(&mut sink, append)?;
        let mask = desc.preset | options.anonymize;
        let diag = Diagnostics::new(options.program);
        if mask.contains(Anonymize::VERBOSE) {
            diag.debug(format!("-M 0x{:08X} -x {}", mask.bits(), desc.name));
        }
        Ok(Self {
            sink,
            desc,
            mask,
            diag,
        })
    }

    /// The format this writer encodes.
    pub fn format(&self) -> &'static FormatDescriptor {
        self.desc
    }

    /// The effective anonymization mask.
    pub fn mask(&self) -> Anonymize {
        self.mask
    }

    /// Write one member: scrub its metadata, encode the header, stream
    /// the payload, pad the data region. Returns `false` when the
    /// format cannot carry the member and it was skipped with a
    /// warning.
    pub fn write_entry(&mut self, entry: &ArchiveEntry, data: &[u8]) -> Result<bool> {
        let mut entry = entry.clone();
        self.mask.apply(&mut entry.stat);

        let payload: &[u8] = if self.desc.link_in_data && entry.kind == EntryType::SymLink {
            // the codec sizes the member from link_name; the bytes are
            // streamed here
            &[]
        } else if entry.kind == EntryType::HardLink && self.desc.hardlink_capable {
            // link records carry no payload
            &[]
        } else if entry.has_data() {
            entry.stat.size = data.len() as u64;
            data
        } else {
            &[]
        };
        if self.desc.computes_crc && entry.kind == EntryType::Regular {
            entry.crc = payload_sum(payload);
        }

        match self
            .desc
            .codec
            .write_header(&mut entry, &mut self.sink, self.mask, &mut self.diag)?
        {
            WriteOutcome::Skip => return Ok(false),
            WriteOutcome::Proceed => {}
        }
        if self.desc.link_in_data && entry.kind == EntryType::SymLink {
            self.sink.write_exactly(entry.link_name.as_bytes())?;
        } else {
            self.sink.write_exactly(payload)?;
        }
        self.sink.write_zeros(entry.pad)?;
        if self.mask.contains(Anonymize::DEBUG) {
            self.diag.debug(format!(
                "wrote {} mode {:o} uid {} gid {} size {}",
                entry.name, entry.stat.mode, entry.stat.uid, entry.stat.gid, entry.stat.size
            ));
        }
        Ok(true)
    }

    /// Emit the trailer, round the stream up to the format's block
    /// size, flush, and return the diagnostics of the run.
    pub fn finish(mut self) -> Result<Diagnostics> {
        self.desc.codec.write_trailer(&mut self.sink)?;
        self.sink.pad_to(self.desc.block_size)?;
        self.sink.flush()?;
        Ok(self.diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{AR, CPIO, SV4CRC, TAR, USTAR};
    use crate::reader::ArchiveReader;

    #[test]
    fn test_stream_is_block_padded() {
        for (desc, block) in [(&TAR, 10240u64), (&CPIO, 5120), (&SV4CRC, 5120)] {
            let mut out = Vec::new();
            let mut writer =
                ArchiveWriter::create(&mut out, desc, WriteOptions::default()).unwrap();
            let entry = ArchiveEntry::regular("f", 5);
            writer.write_entry(&entry, b"hello").unwrap();
            writer.finish().unwrap();
            assert_eq!(out.len() as u64 % block, 0, "{}", desc.name);
        }
    }

    #[test]
    fn test_tar_trailer_is_two_zero_blocks() {
        let mut out = Vec::new();
        let writer = ArchiveWriter::create(&mut out, &TAR, WriteOptions::default()).unwrap();
        writer.finish().unwrap();
        assert!(out.len() >= 1024);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_skipped_member_returns_false_and_warns() {
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::create(&mut out, &AR, WriteOptions::default()).unwrap();
        let entry = ArchiveEntry::new("dev/null", crate::EntryType::CharDevice);
        assert!(!writer.write_entry(&entry, b"").unwrap());
        let diag = writer.finish().unwrap();
        assert_eq!(diag.exit_status(), 1);
    }

    #[test]
    fn test_ar_long_name_end_to_end() {
        let name = "averyverylongfilenamethatexceedssixteenbytes.txt";
        let mut out = Vec::new();
        {
            let mut writer = ArchiveWriter::create(&mut out, &AR, WriteOptions::default()).unwrap();
            let entry = ArchiveEntry::regular(name, 3);
            assert!(writer.write_entry(&entry, b"obj").unwrap());
            writer.finish().unwrap();
        }
        assert_eq!(&out[..8], b"!<arch>\n");
        let mut reader = ArchiveReader::with_format(&out[..], &AR).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(reader.read_data(&entry).unwrap(), b"obj");
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_size_follows_streamed_payload() {
        // a stale stat size is corrected from the actual data
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::create(&mut out, &USTAR, WriteOptions::default()).unwrap();
        let mut entry = ArchiveEntry::regular("f", 999);
        entry.stat.mode = 0o644;
        writer.write_entry(&entry, b"four").unwrap();
        writer.finish().unwrap();
        let mut reader = ArchiveReader::open(&out[..]).unwrap();
        let back = reader.next_entry().unwrap().unwrap();
        assert_eq!(back.stat.size, 4);
    }

    #[test]
    fn test_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.cpio");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut writer = ArchiveWriter::create(file, &CPIO, WriteOptions::default()).unwrap();
            let entry = ArchiveEntry::regular("greeting", 6);
            writer.write_entry(&entry, b"hello\n").unwrap();
            writer.finish().unwrap();
        }
        let file = std::fs::File::open(&path).unwrap();
        let mut reader = ArchiveReader::open(file).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "greeting");
        assert_eq!(reader.read_data(&entry).unwrap(), b"hello\n");
    }

    #[test]
    fn test_append_suppresses_preamble() {
        let mut out = Vec::new();
        {
            let mut writer = ArchiveWriter::create(&mut out, &AR, WriteOptions::default()).unwrap();
            writer
                .write_entry(&ArchiveEntry::regular("a.o", 2), b"aa")
                .unwrap();
            writer.finish().unwrap();
        }
        // drop trailing block padding, then append a second member
        let end = 8 + 60 + 2;
        out.truncate(end);
        {
            let mut writer = ArchiveWriter::append(&mut out, &AR, WriteOptions::default()).unwrap();
            writer
                .write_entry(&ArchiveEntry::regular("b.o", 2), b"bb")
                .unwrap();
            writer.finish().unwrap();
        }
        let mut reader = ArchiveReader::with_format(&out[..], &AR).unwrap();
        assert_eq!(reader.next_entry().unwrap().unwrap().name, "a.o");
        assert_eq!(reader.next_entry().unwrap().unwrap().name, "b.o");
    }
}
