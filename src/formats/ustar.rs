//! POSIX ustar format.
//!
//! Shares the old tar block layout for the first 257 bytes, then adds:
//!
//! ```text
//! +257  magic[6] = "ustar\0"   +263  version[2] = "00"
//! +265  uname[32]              +297  gname[32]
//! +329  devmajor[8]            +337  devminor[8]
//! +345  prefix[155]
//! ```
//!
//! Long paths split at a '/' boundary into prefix + name; device nodes
//! and fifos become representable through typeflags '3'/'4'/'6'.
//! Symbolic user/group names are left to the caller's id cache and are
//! written empty here, making the numeric ids authoritative.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{dev_combine, dev_split, ArchiveEntry, EntryType};
use crate::error::{PaxError, Result};
use crate::formats::{clamp_field, str_field, FormatCodec, ReadOutcome, WriteOutcome};
use crate::numeric::{max_octal, oct_decode, oct_field};
use crate::stream::{pad_for, ArchiveSink, ArchiveSource};

use super::tar::{
    checksum_ok, store_checksum, GID, LINKNAME, MODE, MTIME, NAME, SIZE, TYPEFLAG, UID,
};

pub const HEADER_SIZE: usize = 512;

const MAGIC: std::ops::Range<usize> = 257..263;
const VERSION: std::ops::Range<usize> = 263..265;
const UNAME: std::ops::Range<usize> = 265..297;
const GNAME: std::ops::Range<usize> = 297..329;
const DEVMAJOR: std::ops::Range<usize> = 329..337;
const DEVMINOR: std::ops::Range<usize> = 337..345;
const PREFIX: std::ops::Range<usize> = 345..500;

const MAX_ID: u64 = max_octal(7);
const MAX_TIME: u64 = max_octal(11);
const MAX_SIZE: u64 = max_octal(11);
const MAX_DEV: u64 = max_octal(7);

fn typeflag_for(kind: EntryType) -> u8 {
    match kind {
        EntryType::Regular => b'0',
        EntryType::HardLink => b'1',
        EntryType::SymLink => b'2',
        EntryType::CharDevice => b'3',
        EntryType::BlockDevice => b'4',
        EntryType::Directory => b'5',
        EntryType::Fifo => b'6',
        EntryType::Contiguous => b'7',
    }
}

fn kind_for(typeflag: u8, name: &str) -> EntryType {
    match typeflag {
        b'1' => EntryType::HardLink,
        b'2' => EntryType::SymLink,
        b'3' => EntryType::CharDevice,
        b'4' => EntryType::BlockDevice,
        b'5' => EntryType::Directory,
        b'6' => EntryType::Fifo,
        b'7' => EntryType::Contiguous,
        _ if name.ends_with('/') => EntryType::Directory,
        _ => EntryType::Regular,
    }
}

/// Split a path into (prefix, name) parts that fit their fields, at a
/// '/' that is dropped on the wire. `None` when no split point works.
fn split_path(path: &str) -> Option<(&str, &str)> {
    if path.len() <= NAME.len() {
        return Some(("", path));
    }
    let bytes = path.as_bytes();
    // rightmost candidate keeps the name part shortest
    for i in (0..bytes.len().min(PREFIX.len() + 1)).rev() {
        if bytes[i] == b'/' {
            let rest = &path[i + 1..];
            if !rest.is_empty() && rest.len() <= NAME.len() && i <= PREFIX.len() {
                return Some((&path[..i], rest));
            }
        }
    }
    None
}

pub struct UstarCodec;

impl FormatCodec for UstarCodec {
    fn name(&self) -> &'static str {
        "ustar"
    }

    fn identify(&self, block: &[u8]) -> bool {
        &block[MAGIC][..5] == b"ustar" && checksum_ok(&block[..HEADER_SIZE])
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
        if &hdr[MAGIC][..5] != b"ustar" || !checksum_ok(&hdr) {
            return Err(PaxError::InvalidHeader);
        }

        let prefix = str_field(&hdr[PREFIX]);
        let mut name = str_field(&hdr[NAME]);
        if !prefix.is_empty() {
            name = format!("{prefix}/{name}");
        }
        let kind = kind_for(hdr[TYPEFLAG], &name);
        if kind == EntryType::Directory && name.ends_with('/') {
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
        if matches!(kind, EntryType::CharDevice | EntryType::BlockDevice) {
            entry.stat.rdev =
                dev_combine(oct_decode(&hdr[DEVMAJOR]), oct_decode(&hdr[DEVMINOR]));
        }
        if entry.kind == EntryType::HardLink {
            entry.stat.nlink = 2;
        }

        if matches!(kind, EntryType::Regular | EntryType::Contiguous) {
            let size = oct_decode(&hdr[SIZE]);
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

        let path = entry.trimmed_name().to_string();
        let Some((prefix, name)) = split_path(&path) else {
            diag.warn(format!("file name too long for ustar {}", entry.name));
            return Ok(WriteOutcome::Skip);
        };

        match entry.kind {
            EntryType::Regular | EntryType::Contiguous => {
                if entry.stat.size > MAX_SIZE {
                    diag.warn(format!("size overflow for {}", entry.name));
                    return Ok(WriteOutcome::Skip);
                }
                oct_field(&mut hdr[SIZE], entry.stat.size);
            }
            EntryType::HardLink | EntryType::SymLink => {
                if entry.link_name.len() > LINKNAME.len() {
                    diag.warn(format!("link name too long for ustar {}", entry.name));
                    return Ok(WriteOutcome::Skip);
                }
                hdr[LINKNAME][..entry.link_name.len()]
                    .copy_from_slice(entry.link_name.as_bytes());
                oct_field(&mut hdr[SIZE], 0);
            }
            EntryType::CharDevice | EntryType::BlockDevice => {
                let (major, minor) = dev_split(entry.stat.rdev);
                let major = clamp_field(diag, &entry.name, "device major", major, MAX_DEV);
                let minor = clamp_field(diag, &entry.name, "device minor", minor, MAX_DEV);
                oct_field(&mut hdr[DEVMAJOR], major);
                oct_field(&mut hdr[DEVMINOR], minor);
                oct_field(&mut hdr[SIZE], 0);
            }
            EntryType::Directory | EntryType::Fifo => {
                oct_field(&mut hdr[SIZE], 0);
            }
        }
        hdr[TYPEFLAG] = typeflag_for(entry.kind);
        if !matches!(entry.kind, EntryType::CharDevice | EntryType::BlockDevice) {
            oct_field(&mut hdr[DEVMAJOR], 0);
            oct_field(&mut hdr[DEVMINOR], 0);
        }

        hdr[NAME.start..NAME.start + name.len()].copy_from_slice(name.as_bytes());
        hdr[PREFIX.start..PREFIX.start + prefix.len()].copy_from_slice(prefix.as_bytes());
        hdr[MAGIC].copy_from_slice(b"ustar\0");
        hdr[VERSION].copy_from_slice(b"00");

        let uid = clamp_field(diag, &entry.name, "uid", u64::from(entry.stat.uid), MAX_ID);
        let gid = clamp_field(diag, &entry.name, "gid", u64::from(entry.stat.gid), MAX_ID);
        let mtime = clamp_field(diag, &entry.name, "mtime", entry.stat.mtime, MAX_TIME);
        oct_field(&mut hdr[MODE], u64::from(entry.stat.mode & 0o7777));
        oct_field(&mut hdr[UID], uid);
        oct_field(&mut hdr[GID], gid);
        oct_field(&mut hdr[MTIME], mtime);
        store_checksum(&mut hdr);

        entry.pad = if matches!(entry.kind, EntryType::Regular | EntryType::Contiguous) {
            pad_for(entry.stat.size, 512)
        } else {
            0
        };
        sink.write_exactly(&hdr)?;
        Ok(WriteOutcome::Proceed)
    }

    fn write_trailer(&self, sink: &mut ArchiveSink<'_>) -> Result<()> {
        sink.write_zeros(2 * HEADER_SIZE as u64)
    }
}
