//! Old (pre-POSIX) tar format.
//!
//! 512-byte header blocks with zero-padded octal ASCII fields:
//!
//! ```text
//! +0    name[100]     +100  mode[8]      +108  uid[8]
//! +116  gid[8]        +124  size[12]     +136  mtime[12]
//! +148  chksum[8]     +156  linkflag     +157  linkname[100]
//! ```
//!
//! Directories are marked by a trailing '/' in the name with zero size;
//! link flag '1' is a hardlink, '2' a symlink, NUL (or '0') a regular
//! file. The checksum is the unsigned byte sum of the header with the
//! checksum field treated as spaces. Member data is padded to a 512
//! byte boundary; the trailer is two zero-filled blocks, and the whole
//! stream is blocked to 10240 bytes.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{ArchiveEntry, EntryType};
use crate::error::{PaxError, Result};
use crate::formats::{clamp_field, str_field, FormatCodec, ReadOutcome, WriteOutcome};
use crate::numeric::{max_octal, oct_decode, oct_field};
use crate::stream::{pad_for, ArchiveSink, ArchiveSource};

pub const HEADER_SIZE: usize = 512;

pub(crate) const NAME: std::ops::Range<usize> = 0..100;
pub(crate) const MODE: std::ops::Range<usize> = 100..108;
pub(crate) const UID: std::ops::Range<usize> = 108..116;
pub(crate) const GID: std::ops::Range<usize> = 116..124;
pub(crate) const SIZE: std::ops::Range<usize> = 124..136;
pub(crate) const MTIME: std::ops::Range<usize> = 136..148;
pub(crate) const CHKSUM: std::ops::Range<usize> = 148..156;
pub(crate) const TYPEFLAG: usize = 156;
pub(crate) const LINKNAME: std::ops::Range<usize> = 157..257;

pub(crate) const MAX_ID: u64 = max_octal(7);
pub(crate) const MAX_TIME: u64 = max_octal(11);
pub(crate) const MAX_SIZE: u64 = max_octal(11);

pub(crate) const REG: u8 = 0;
pub(crate) const HARDLINK: u8 = b'1';
pub(crate) const SYMLINK: u8 = b'2';

/// Unsigned byte sum of a header block with the checksum field treated
/// as spaces.
pub(crate) fn checksum(hdr: &[u8]) -> u64 {
    let mut sum: u64 = 0;
    for (i, &b) in hdr.iter().enumerate() {
        if CHKSUM.contains(&i) {
            sum += u64::from(b' ');
        } else {
            sum += u64::from(b);
        }
    }
    sum
}

/// Store the checksum in its historic "%06o\0 " form.
pub(crate) fn store_checksum(hdr: &mut [u8]) {
    let sum = checksum(hdr);
    let field = &mut hdr[CHKSUM];
    let mut v = sum;
    for i in (0..6).rev() {
        field[i] = b'0' | (v & 7) as u8;
        v >>= 3;
    }
    field[6] = 0;
    field[7] = b' ';
}

/// Whether a header block passes its own checksum.
pub(crate) fn checksum_ok(hdr: &[u8]) -> bool {
    oct_decode(&hdr[CHKSUM]) == checksum(hdr)
}

pub struct TarCodec;

impl FormatCodec for TarCodec {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn identify(&self, block: &[u8]) -> bool {
        // a ustar stream also passes the checksum; the magic keeps the
        // probe order honest even if ustar was somehow skipped
        if &block[257..262] == b"ustar" {
            return false;
        }
        checksum_ok(&block[..HEADER_SIZE])
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
        if hdr.iter().all(|&b| b == 0) {
            return Ok(ReadOutcome::EndOfArchive);
        }
        if !checksum_ok(&hdr) {
            return Err(PaxError::InvalidHeader);
        }

        let mut name = str_field(&hdr[NAME]);
        let size = oct_decode(&hdr[SIZE]);
        let kind = match hdr[TYPEFLAG] {
            HARDLINK => EntryType::HardLink,
            SYMLINK => EntryType::SymLink,
            _ if name.ends_with('/') => EntryType::Directory,
            _ => EntryType::Regular,
        };
        if kind == EntryType::Directory {
            name.pop();
        }

        let mut entry = ArchiveEntry::new(name, kind);
        entry.stat.mode = (oct_decode(&hdr[MODE]) & 0o7777) as u32;
        entry.stat.uid = oct_decode(&hdr[UID]) as u32;
        entry.stat.gid = oct_decode(&hdr[GID]) as u32;
        let mtime = oct_decode(&hdr[MTIME]);
        entry.stat.mtime = mtime;
        entry.stat.atime = mtime;
        entry.stat.ctime = mtime;
        entry.link_name = str_field(&hdr[LINKNAME]);
        if entry.kind == EntryType::HardLink {
            entry.stat.nlink = 2;
        }

        // only regular members carry payload; link and directory sizes
        // are historic noise
        if entry.has_data() && entry.kind != EntryType::HardLink {
            entry.stat.size = size;
            entry.skip = size;
            entry.pad = pad_for(size, 512);
        }
        Ok(ReadOutcome::Entry(entry))
    }

    fn write_header(
        &self,
        entry: &mut ArchiveEntry,
        sink: &mut ArchiveSink<'_>,
        _anon: Anonymize,
        diag: &mut Diagnostics,
    ) -> Result<WriteOutcome> {
        let mut hdr = [0u8; HEADER_SIZE];

        let is_dir = entry.kind == EntryType::Directory;
        let name = entry.trimmed_name();
        let stored_len = name.len() + usize::from(is_dir);
        if stored_len > NAME.len() {
            diag.warn(format!("file name too long for tar {}", entry.name));
            return Ok(WriteOutcome::Skip);
        }

        match entry.kind {
            EntryType::Regular | EntryType::Contiguous => {
                if entry.stat.size > MAX_SIZE {
                    diag.warn(format!("size overflow for {}", entry.name));
                    return Ok(WriteOutcome::Skip);
                }
                hdr[TYPEFLAG] = REG;
                oct_field(&mut hdr[SIZE], entry.stat.size);
            }
            EntryType::Directory => {
                hdr[TYPEFLAG] = REG;
                oct_field(&mut hdr[SIZE], 0);
            }
            EntryType::HardLink | EntryType::SymLink => {
                if entry.link_name.len() > LINKNAME.len() {
                    diag.warn(format!("link name too long for tar {}", entry.name));
                    return Ok(WriteOutcome::Skip);
                }
                hdr[TYPEFLAG] = if entry.kind == EntryType::HardLink {
                    HARDLINK
                } else {
                    SYMLINK
                };
                hdr[LINKNAME][..entry.link_name.len()]
                    .copy_from_slice(entry.link_name.as_bytes());
                oct_field(&mut hdr[SIZE], 0);
            }
            _ => {
                diag.warn(format!(
                    "tar cannot archive special file {}",
                    entry.name
                ));
                return Ok(WriteOutcome::Skip);
            }
        }

        hdr[NAME.start..NAME.start + name.len()].copy_from_slice(name.as_bytes());
        if is_dir {
            hdr[NAME.start + name.len()] = b'/';
        }

        let uid = clamp_field(diag, &entry.name, "uid", u64::from(entry.stat.uid), MAX_ID);
        let gid = clamp_field(diag, &entry.name, "gid", u64::from(entry.stat.gid), MAX_ID);
        let mtime = clamp_field(diag, &entry.name, "mtime", entry.stat.mtime, MAX_TIME);
        oct_field(&mut hdr[MODE], u64::from(entry.stat.mode & 0o7777));
        oct_field(&mut hdr[UID], uid);
        oct_field(&mut hdr[GID], gid);
        oct_field(&mut hdr[MTIME], mtime);
        store_checksum(&mut hdr);

        entry.pad = if entry.has_data() && entry.kind != EntryType::HardLink {
            pad_for(entry.stat.size, 512)
        } else {
            0
        };
        sink.write_exactly(&hdr)?;
        Ok(WriteOutcome::Proceed)
    }

    /// Two zero-filled blocks end the archive.
    fn write_trailer(&self, sink: &mut ArchiveSink<'_>) -> Result<()> {
        sink.write_zeros(2 * HEADER_SIZE as u64)
    }
}
