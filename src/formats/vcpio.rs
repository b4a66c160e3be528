//! SVR4 hex cpio format, with and without the payload checksum.
//!
//! 110-byte textual header: a 6-byte magic followed by thirteen 8-digit
//! lowercase hex fields:
//!
//! ```text
//! +0   magic[6] = "070701" (plain) or "070702" (checksummed)
//! +6   ino        +14  mode       +22  uid        +30  gid
//! +38  nlink      +46  mtime      +54  filesize   +62  devmajor
//! +70  devminor   +78  rdevmajor  +86  rdevminor  +94  namesize
//! +102 check
//! ```
//!
//! The name (NUL counted by namesize) follows the header; header plus
//! name is padded to a multiple of four, and so is the data region.
//! The checksum variant stores the 32-bit sum of the data bytes of
//! regular files in `check`; the plain variant stores zero. Checksums
//! are verified against the streamed payload, with a warning rather
//! than a hard stop on mismatch. The archive ends with a `TRAILER!!!`
//! member.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{dev_combine, dev_split, ArchiveEntry, EntryType, PAX_PATH_MAX};
use crate::error::{PaxError, Result};
use crate::formats::cpio::TRAILER;
use crate::formats::{clamp_field, FormatCodec, ReadOutcome, WriteOutcome};
use crate::numeric::{hex_decode, hex_field};
use crate::stream::{pad_for, ArchiveSink, ArchiveSource};

pub const HEADER_SIZE: usize = 110;

const MAGIC_PLAIN: &[u8; 6] = b"070701";
const MAGIC_CRC: &[u8; 6] = b"070702";

const INO: std::ops::Range<usize> = 6..14;
const MODE: std::ops::Range<usize> = 14..22;
const UID: std::ops::Range<usize> = 22..30;
const GID: std::ops::Range<usize> = 30..38;
const NLINK: std::ops::Range<usize> = 38..46;
const MTIME: std::ops::Range<usize> = 46..54;
const FILESIZE: std::ops::Range<usize> = 54..62;
const DEVMAJOR: std::ops::Range<usize> = 62..70;
const DEVMINOR: std::ops::Range<usize> = 70..78;
const RDEVMAJOR: std::ops::Range<usize> = 78..86;
const RDEVMINOR: std::ops::Range<usize> = 86..94;
const NAMESIZE: std::ops::Range<usize> = 94..102;
const CHECK: std::ops::Range<usize> = 102..110;

const MAX_32: u64 = u64::MAX >> 32;

/// 32-bit sum of the payload bytes, as stored in the `check` field of
/// the checksummed variant.
pub(crate) fn payload_sum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
}

pub struct VcpioCodec {
    /// Whether this instance speaks the checksummed dialect.
    pub crc: bool,
}

impl VcpioCodec {
    fn magic(&self) -> &'static [u8; 6] {
        if self.crc {
            MAGIC_CRC
        } else {
            MAGIC_PLAIN
        }
    }

    fn write_raw(
        &self,
        sink: &mut ArchiveSink<'_>,
        name: &str,
        fields: &[(std::ops::Range<usize>, u64)],
    ) -> Result<()> {
        let mut hdr = [b'0'; HEADER_SIZE];
        hdr[..6].copy_from_slice(self.magic());
        for (range, val) in fields {
            hex_field(&mut hdr[range.clone()], *val);
        }
        hex_field(&mut hdr[NAMESIZE], name.len() as u64 + 1);
        sink.write_exactly(&hdr)?;
        sink.write_exactly(name.as_bytes())?;
        sink.write_exactly(&[0])?;
        let pad = pad_for((HEADER_SIZE + name.len() + 1) as u64, 4);
        sink.write_zeros(pad)?;
        Ok(())
    }
}

impl FormatCodec for VcpioCodec {
    fn name(&self) -> &'static str {
        if self.crc {
            "sv4crc"
        } else {
            "sv4cpio"
        }
    }

    fn identify(&self, block: &[u8]) -> bool {
        &block[..6] == self.magic()
    }

    fn read_header(
        &self,
        src: &mut ArchiveSource<'_>,
        _diag: &mut Diagnostics,
    ) -> Result<ReadOutcome> {
        let mut hdr = [0u8; HEADER_SIZE];
        if !src.read_block_or_eof(&mut hdr)? {
            return Ok(ReadOutcome::EndOfArchive);
        }
        // either dialect is accepted on read
        if &hdr[..6] != MAGIC_PLAIN && &hdr[..6] != MAGIC_CRC {
            return Err(PaxError::InvalidHeader);
        }

        let namesize = hex_decode(&hdr[NAMESIZE]) as usize;
        if namesize == 0 || namesize > PAX_PATH_MAX {
            return Err(PaxError::NameTooLong {
                len: namesize,
                max: PAX_PATH_MAX,
            });
        }
        let hdr_pad = pad_for((HEADER_SIZE + namesize) as u64, 4) as usize;
        let mut name_buf = vec![0u8; namesize + hdr_pad];
        src.read_exactly(&mut name_buf)?;
        name_buf.truncate(namesize);
        if name_buf.last() == Some(&0) {
            name_buf.pop();
        }
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        let filesize = hex_decode(&hdr[FILESIZE]);
        if name == TRAILER && filesize == 0 {
            return Ok(ReadOutcome::EndOfArchive);
        }

        let mode = hex_decode(&hdr[MODE]) as u32;
        let mut entry = ArchiveEntry::new(name, EntryType::from_mode_bits(mode));
        entry.stat.mode = mode & 0o7777;
        entry.stat.ino = hex_decode(&hdr[INO]);
        entry.stat.uid = hex_decode(&hdr[UID]) as u32;
        entry.stat.gid = hex_decode(&hdr[GID]) as u32;
        entry.stat.nlink = hex_decode(&hdr[NLINK]) as u32;
        let mtime = hex_decode(&hdr[MTIME]);
        entry.stat.mtime = mtime;
        entry.stat.atime = mtime;
        entry.stat.ctime = mtime;
        entry.stat.dev = dev_combine(hex_decode(&hdr[DEVMAJOR]), hex_decode(&hdr[DEVMINOR]));
        entry.stat.rdev = dev_combine(hex_decode(&hdr[RDEVMAJOR]), hex_decode(&hdr[RDEVMINOR]));
        entry.crc = hex_decode(&hdr[CHECK]) as u32;

        if entry.kind == EntryType::SymLink {
            let data_pad = pad_for(filesize, 4) as usize;
            let mut target = vec![0u8; filesize as usize + data_pad];
            src.read_exactly(&mut target)?;
            target.truncate(filesize as usize);
            entry.link_name = String::from_utf8_lossy(&target).into_owned();
        } else {
            entry.stat.size = filesize;
            entry.skip = filesize;
            entry.pad = pad_for(filesize, 4);
        }
        Ok(ReadOutcome::Entry(entry))
    }

    fn write_header(
        &self,
        entry: &mut ArchiveEntry,
        sink: &mut ArchiveSink<'_>,
        anon: Anonymize,
        diag: &mut Diagnostics,
    ) -> Result<WriteOutcome> {
        let mut name = entry.trimmed_name().to_string();
        if entry.kind == EntryType::Directory && anon.contains(Anonymize::DIRSLASH) {
            name.push('/');
        }
        if name.len() + 1 > PAX_PATH_MAX {
            diag.warn(format!("name too long for {} {}", self.name(), entry.name));
            return Ok(WriteOutcome::Skip);
        }

        let filesize = if entry.kind == EntryType::SymLink {
            entry.link_name.len() as u64
        } else if entry.has_data() {
            entry.stat.size
        } else {
            0
        };
        if filesize > MAX_32 {
            diag.warn(format!("size overflow for {}", entry.name));
            return Ok(WriteOutcome::Skip);
        }

        let member = entry.name.clone();
        let mode = u64::from(entry.kind.mode_bits() | (entry.stat.mode & 0o7777));
        let (dev_major, dev_minor) = dev_split(entry.stat.dev);
        let (rdev_major, rdev_minor) = dev_split(entry.stat.rdev);
        let check = if self.crc && entry.kind == EntryType::Regular {
            u64::from(entry.crc)
        } else {
            0
        };
        let fields = [
            (INO, clamp_field(diag, &member, "inode", entry.stat.ino, MAX_32)),
            (MODE, mode),
            (UID, clamp_field(diag, &member, "uid", u64::from(entry.stat.uid), MAX_32)),
            (GID, clamp_field(diag, &member, "gid", u64::from(entry.stat.gid), MAX_32)),
            (NLINK, u64::from(entry.stat.nlink)),
            (MTIME, clamp_field(diag, &member, "mtime", entry.stat.mtime, MAX_32)),
            (FILESIZE, filesize),
            (DEVMAJOR, dev_major),
            (DEVMINOR, dev_minor),
            (RDEVMAJOR, rdev_major),
            (RDEVMINOR, rdev_minor),
            (CHECK, check),
        ];
        self.write_raw(sink, &name, &fields)?;
        entry.pad = pad_for(filesize, 4);
        Ok(WriteOutcome::Proceed)
    }

    fn write_trailer(&self, sink: &mut ArchiveSink<'_>) -> Result<()> {
        self.write_raw(sink, TRAILER, &[(NLINK, 1)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(crc: bool) -> VcpioCodec {
        VcpioCodec { crc }
    }

    fn write_one(
        codec: &VcpioCodec,
        entry: &mut ArchiveEntry,
    ) -> (Vec<u8>, Diagnostics, WriteOutcome) {
        let mut out = Vec::new();
        let mut diag = Diagnostics::new("pax");
        let outcome = {
            let mut sink = ArchiveSink::new(&mut out);
            codec
                .write_header(entry, &mut sink, Anonymize::empty(), &mut diag)
                .unwrap()
        };
        (out, diag, outcome)
    }

    fn read_one(codec: &VcpioCodec, bytes: &[u8]) -> ReadOutcome {
        let mut src = ArchiveSource::new(bytes);
        let mut diag = Diagnostics::new("pax");
        codec.read_header(&mut src, &mut diag).unwrap()
    }

    #[test]
    fn test_header_and_name_padded_to_four() {
        // 110 + "ab" + NUL = 113, padded to 116
        let mut entry = ArchiveEntry::regular("ab", 0);
        let (out, _, _) = write_one(&codec(false), &mut entry);
        assert_eq!(out.len(), 116);
        assert_eq!(&out[..6], b"070701");
        assert_eq!(&out[110..], b"ab\0\0\0\0");
    }

    #[test]
    fn test_round_trip_with_devices() {
        let mut entry = ArchiveEntry::new("dev/null", EntryType::CharDevice);
        entry.stat.mode = 0o666;
        entry.stat.rdev = dev_combine(2, 2);
        entry.stat.dev = dev_combine(8, 1);
        entry.stat.ino = 4242;
        entry.stat.mtime = 2_000_000_000;
        let (out, diag, _) = write_one(&codec(false), &mut entry);
        assert_eq!(diag.warnings(), 0);
        match read_one(&codec(false), &out) {
            ReadOutcome::Entry(back) => {
                assert_eq!(back.name, "dev/null");
                assert_eq!(back.kind, EntryType::CharDevice);
                assert_eq!(back.stat.rdev, dev_combine(2, 2));
                assert_eq!(back.stat.dev, dev_combine(8, 1));
                assert_eq!(back.stat.ino, 4242);
                assert_eq!(back.stat.mtime, 2_000_000_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_crc_variant_stores_payload_sum() {
        let data = b"checksummed payload";
        let mut entry = ArchiveEntry::regular("f", data.len() as u64);
        entry.crc = payload_sum(data);
        let (out, _, _) = write_one(&codec(true), &mut entry);
        assert_eq!(&out[..6], b"070702");
        assert_eq!(hex_decode(&out[CHECK]) as u32, payload_sum(data));
        match read_one(&codec(true), &out) {
            ReadOutcome::Entry(back) => assert_eq!(back.crc, payload_sum(data)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plain_variant_stores_zero_check() {
        let mut entry = ArchiveEntry::regular("f", 10);
        entry.crc = 777;
        let (out, _, _) = write_one(&codec(false), &mut entry);
        assert_eq!(hex_decode(&out[CHECK]), 0);
    }

    #[test]
    fn test_data_pad_to_four() {
        let mut entry = ArchiveEntry::regular("f", 6);
        let (_, _, outcome) = write_one(&codec(false), &mut entry);
        assert_eq!(outcome, WriteOutcome::Proceed);
        assert_eq!(entry.pad, 2);
    }

    #[test]
    fn test_symlink_target_in_data() {
        let mut entry = ArchiveEntry::new("l", EntryType::SymLink);
        entry.link_name = "usr/bin".into();
        let (mut out, _, _) = write_one(&codec(false), &mut entry);
        assert_eq!(entry.pad, 1);
        out.extend_from_slice(b"usr/bin\0");
        match read_one(&codec(false), &out) {
            ReadOutcome::Entry(back) => {
                assert_eq!(back.link_name, "usr/bin");
                assert_eq!(back.skip, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_either_magic_accepted_on_read() {
        let mut entry = ArchiveEntry::regular("x", 0);
        let (out, _, _) = write_one(&codec(true), &mut entry);
        // the plain reader still accepts the checksummed magic
        match read_one(&codec(false), &out) {
            ReadOutcome::Entry(back) => assert_eq!(back.name, "x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_identify_is_dialect_exact() {
        let mut block = [b'0'; HEADER_SIZE];
        block[..6].copy_from_slice(MAGIC_PLAIN);
        assert!(codec(false).identify(&block));
        assert!(!codec(true).identify(&block));
        block[..6].copy_from_slice(MAGIC_CRC);
        assert!(codec(true).identify(&block));
    }

    #[test]
    fn test_trailer_round_trip() {
        let mut out = Vec::new();
        {
            let mut sink = ArchiveSink::new(&mut out);
            codec(true).write_trailer(&mut sink).unwrap();
        }
        assert_eq!(out.len() % 4, 0);
        assert!(matches!(read_one(&codec(true), &out), ReadOutcome::EndOfArchive));
    }

    #[test]
    fn test_payload_sum() {
        assert_eq!(payload_sum(b""), 0);
        assert_eq!(payload_sum(b"\x01\x02\x03"), 6);
        assert_eq!(payload_sum(&[0xff; 4]), 0x3fc);
    }
}
