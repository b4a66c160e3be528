//! Old binary cpio format.
//!
//! 26-byte header of thirteen 16-bit words:
//!
//! ```text
//! +0  magic = 0o070707     +2  dev          +4  ino
//! +6  mode                 +8  uid          +10 gid
//! +12 nlink                +14 rdev         +16 mtime (hi, lo)
//! +20 namesize             +22 filesize (hi, lo)
//! ```
//!
//! Writing always uses little-endian words. Reading inspects the magic
//! of every header to decide the byte sex, so archives produced on
//! either kind of machine (and even mixed streams) decode. Name and
//! data regions are padded to even offsets.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{ArchiveEntry, EntryType, PAX_PATH_MAX};
use crate::error::{PaxError, Result};
use crate::formats::cpio::TRAILER;
use crate::formats::{clamp_field, FormatCodec, ReadOutcome, WriteOutcome};
use crate::stream::{ArchiveSink, ArchiveSource};

pub const HEADER_SIZE: usize = 26;

const MAGIC: u16 = 0o070707;
const MAGIC_SWAPPED: u16 = MAGIC.swap_bytes();

const MAX_16: u64 = u64::MAX >> 48;
const MAX_32: u64 = u64::MAX >> 32;

fn get16(hdr: &[u8], word: usize, le: bool) -> u16 {
    let raw = [hdr[word * 2], hdr[word * 2 + 1]];
    if le {
        u16::from_le_bytes(raw)
    } else {
        u16::from_be_bytes(raw)
    }
}

fn put16(hdr: &mut [u8], word: usize, val: u16) {
    hdr[word * 2..word * 2 + 2].copy_from_slice(&val.to_le_bytes());
}

/// Split a 32-bit quantity into the hi/lo word pair the header uses.
fn put32(hdr: &mut [u8], word: usize, val: u64) {
    put16(hdr, word, (val >> 16) as u16);
    put16(hdr, word + 1, (val & 0xffff) as u16);
}

fn get32(hdr: &[u8], word: usize, le: bool) -> u64 {
    (u64::from(get16(hdr, word, le)) << 16) | u64::from(get16(hdr, word + 1, le))
}

pub struct BcpioCodec;

impl FormatCodec for BcpioCodec {
    fn name(&self) -> &'static str {
        "bcpio"
    }

    fn identify(&self, block: &[u8]) -> bool {
        let magic = u16::from_le_bytes([block[0], block[1]]);
        magic == MAGIC || magic == MAGIC_SWAPPED
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
        let le = match u16::from_le_bytes([hdr[0], hdr[1]]) {
            MAGIC => true,
            MAGIC_SWAPPED => false,
            _ => return Err(PaxError::InvalidHeader),
        };

        let namesize = usize::from(get16(&hdr, 10, le));
        if namesize == 0 || namesize > PAX_PATH_MAX {
            return Err(PaxError::NameTooLong {
                len: namesize,
                max: PAX_PATH_MAX,
            });
        }
        // namesize counts the NUL; the stored name is padded to even
        let mut name_buf = vec![0u8; namesize + (namesize & 1)];
        src.read_exactly(&mut name_buf)?;
        name_buf.truncate(namesize);
        if name_buf.last() == Some(&0) {
            name_buf.pop();
        }
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        let filesize = get32(&hdr, 11, le);
        if name == TRAILER && filesize == 0 {
            return Ok(ReadOutcome::EndOfArchive);
        }

        let mode = u32::from(get16(&hdr, 3, le));
        let mut entry = ArchiveEntry::new(name, EntryType::from_mode_bits(mode));
        entry.stat.mode = mode & 0o7777;
        entry.stat.dev = u64::from(get16(&hdr, 1, le));
        entry.stat.ino = u64::from(get16(&hdr, 2, le));
        entry.stat.uid = u32::from(get16(&hdr, 4, le));
        entry.stat.gid = u32::from(get16(&hdr, 5, le));
        entry.stat.nlink = u32::from(get16(&hdr, 6, le));
        entry.stat.rdev = u64::from(get16(&hdr, 7, le));
        let mtime = get32(&hdr, 8, le);
        entry.stat.mtime = mtime;
        entry.stat.atime = mtime;
        entry.stat.ctime = mtime;

        if entry.kind == EntryType::SymLink {
            let mut target = vec![0u8; filesize as usize + (filesize as usize & 1)];
            src.read_exactly(&mut target)?;
            target.truncate(filesize as usize);
            entry.link_name = String::from_utf8_lossy(&target).into_owned();
        } else {
            entry.stat.size = filesize;
            entry.skip = filesize;
            entry.pad = filesize & 1;
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
            diag.warn(format!("name too long for bcpio {}", entry.name));
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
        let mut hdr = [0u8; HEADER_SIZE];
        put16(&mut hdr, 0, MAGIC);
        put16(
            &mut hdr,
            1,
            clamp_field(diag, &member, "dev", entry.stat.dev, MAX_16) as u16,
        );
        put16(
            &mut hdr,
            2,
            clamp_field(diag, &member, "inode", entry.stat.ino, MAX_16) as u16,
        );
        let mode = u64::from(entry.kind.mode_bits() | (entry.stat.mode & 0o7777));
        put16(&mut hdr, 3, mode as u16);
        put16(
            &mut hdr,
            4,
            clamp_field(diag, &member, "uid", u64::from(entry.stat.uid), MAX_16) as u16,
        );
        put16(
            &mut hdr,
            5,
            clamp_field(diag, &member, "gid", u64::from(entry.stat.gid), MAX_16) as u16,
        );
        put16(
            &mut hdr,
            6,
            clamp_field(diag, &member, "link count", u64::from(entry.stat.nlink), MAX_16) as u16,
        );
        put16(
            &mut hdr,
            7,
            clamp_field(diag, &member, "rdev", entry.stat.rdev, MAX_16) as u16,
        );
        put32(
            &mut hdr,
            8,
            clamp_field(diag, &member, "mtime", entry.stat.mtime, MAX_32),
        );
        put16(&mut hdr, 10, name.len() as u16 + 1);
        put32(&mut hdr, 11, filesize);

        sink.write_exactly(&hdr)?;
        sink.write_exactly(name.as_bytes())?;
        sink.write_exactly(&[0])?;
        // pad the name region to even; namesize counts the NUL
        if (name.len() + 1) & 1 == 1 {
            sink.write_exactly(&[0])?;
        }
        entry.pad = filesize & 1;
        Ok(WriteOutcome::Proceed)
    }

    fn write_trailer(&self, sink: &mut ArchiveSink<'_>) -> Result<()> {
        let mut hdr = [0u8; HEADER_SIZE];
        put16(&mut hdr, 0, MAGIC);
        put16(&mut hdr, 6, 1);
        put16(&mut hdr, 10, TRAILER.len() as u16 + 1);
        sink.write_exactly(&hdr)?;
        sink.write_exactly(TRAILER.as_bytes())?;
        sink.write_exactly(&[0])?;
        // "TRAILER!!!\0" is 11 bytes, pad to even
        sink.write_exactly(&[0])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_one(entry: &mut ArchiveEntry) -> (Vec<u8>, Diagnostics, WriteOutcome) {
        let mut out = Vec::new();
        let mut diag = Diagnostics::new("bcpio");
        let outcome = {
            let mut sink = ArchiveSink::new(&mut out);
            BcpioCodec
                .write_header(entry, &mut sink, Anonymize::empty(), &mut diag)
                .unwrap()
        };
        (out, diag, outcome)
    }

    fn read_one(bytes: &[u8]) -> ReadOutcome {
        let mut src = ArchiveSource::new(bytes);
        let mut diag = Diagnostics::new("bcpio");
        BcpioCodec.read_header(&mut src, &mut diag).unwrap()
    }

    #[test]
    fn test_name_region_padded_to_even() {
        // "abc" + NUL is even: no pad byte
        let mut entry = ArchiveEntry::regular("abc", 0);
        let (out, _, _) = write_one(&mut entry);
        assert_eq!(out.len(), HEADER_SIZE + 4);

        // "abcd" + NUL is odd: one pad byte
        let mut entry = ArchiveEntry::regular("abcd", 0);
        let (out, _, _) = write_one(&mut entry);
        assert_eq!(out.len(), HEADER_SIZE + 6);
        assert_eq!(&out[HEADER_SIZE..], b"abcd\0\0");
    }

    #[test]
    fn test_round_trip_little_endian() {
        let mut entry = ArchiveEntry::regular("kernel", 70_000);
        entry.stat.mode = 0o600;
        entry.stat.uid = 0;
        entry.stat.gid = 5;
        entry.stat.ino = 99;
        entry.stat.mtime = 1_000_000_000;
        let (out, diag, _) = write_one(&mut entry);
        assert_eq!(diag.warnings(), 0);
        match read_one(&out) {
            ReadOutcome::Entry(back) => {
                assert_eq!(back.name, "kernel");
                assert_eq!(back.stat.size, 70_000);
                assert_eq!(back.stat.mode, 0o600);
                assert_eq!(back.stat.gid, 5);
                assert_eq!(back.stat.ino, 99);
                assert_eq!(back.stat.mtime, 1_000_000_000);
                assert_eq!(back.pad, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reads_big_endian_headers() {
        let mut entry = ArchiveEntry::regular("be", 3);
        entry.stat.uid = 0x0102;
        entry.stat.mtime = 0x0304_0506;
        let (mut out, _, _) = write_one(&mut entry);
        // swap every header word to simulate an opposite-sex producer
        for word in out[..HEADER_SIZE].chunks_exact_mut(2) {
            word.swap(0, 1);
        }
        match read_one(&out) {
            ReadOutcome::Entry(back) => {
                assert_eq!(back.name, "be");
                assert_eq!(back.stat.uid, 0x0102);
                assert_eq!(back.stat.mtime, 0x0304_0506);
                assert_eq!(back.stat.size, 3);
                assert_eq!(back.pad, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_symlink_target_in_data_with_pad() {
        let mut entry = ArchiveEntry::new("lnk", EntryType::SymLink);
        entry.link_name = "pax".into();
        let (mut out, _, _) = write_one(&mut entry);
        // data region padded to even by the writer
        out.extend_from_slice(b"pax\0");
        match read_one(&out) {
            ReadOutcome::Entry(back) => {
                assert_eq!(back.kind, EntryType::SymLink);
                assert_eq!(back.link_name, "pax");
                assert_eq!(back.skip, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trailer_round_trip() {
        let mut out = Vec::new();
        {
            let mut sink = ArchiveSink::new(&mut out);
            BcpioCodec.write_trailer(&mut sink).unwrap();
        }
        assert_eq!(out.len() & 1, 0);
        assert!(matches!(read_one(&out), ReadOutcome::EndOfArchive));
    }

    #[test]
    fn test_identify_either_byte_sex() {
        assert!(BcpioCodec.identify(&MAGIC.to_le_bytes()));
        assert!(BcpioCodec.identify(&MAGIC.to_be_bytes()));
        assert!(!BcpioCodec.identify(&[0x12, 0x34]));
    }

    #[test]
    fn test_inode_overflow_clamps() {
        let mut entry = ArchiveEntry::regular("f", 0);
        entry.stat.ino = MAX_16 + 7;
        let (out, diag, _) = write_one(&mut entry);
        assert_eq!(diag.warnings(), 1);
        assert_eq!(u16::from_le_bytes([out[4], out[5]]), 0xffff);
    }
}
