//! Unix Archiver ("ar") library format.
//!
//! An archive is the 8-byte magic `!<arch>\n` followed by member
//! sections, each a 60-byte textual header and the data part, aligned
//! to two bytes:
//!
//! ```text
//! +0   name[16]    +16  mtime[12]   +28  uid[6]
//! +34  gid[6]      +40  mode[8]     +48  size[10]
//! +58  magic[2] = 60h 0Ah
//! ```
//!
//! All fields are left-justified and space-padded; mtime/uid/gid/size
//! are decimal, mode is octal. Member names are basenames. A name that
//! does not fit the 16-byte field (or contains a space, which the field
//! cannot embed unambiguously) is stored as `#1/<len>` with the name
//! bytes prepended to the data part and folded into the size field.
//! There is no trailer; the archive ends after the last member.
//!
//! Only regular files are representable. Detection works on the
//! archive-level magic rather than a member header, so the probe path
//! consults [`is_magic`] up front and never calls the per-member
//! identify hook.

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::{ArchiveEntry, EntryType, PAX_PATH_MAX};
use crate::error::{PaxError, Result};
use crate::formats::{clamp_field, FormatCodec, ReadOutcome, WriteOutcome};
use crate::numeric::{dec_decode, dec_encode, oct_decode, oct_encode};
use crate::stream::{ArchiveSink, ArchiveSource};

/// Archive-level magic, written once at stream start.
pub const MAGIC: [u8; 8] = [0x21, 0x3C, 0x61, 0x72, 0x63, 0x68, 0x3E, 0x0A];

/// Per-member header size.
pub const HEADER_SIZE: usize = 60;

/// Whether a stream prefix carries the archive-level magic.
pub fn is_magic(block: &[u8]) -> bool {
    block.len() >= MAGIC.len() && block[..MAGIC.len()] == MAGIC
}

/// Extended-name marker at the start of the name field.
const EXT_NAME: [u8; 3] = [0x23, 0x31, 0x2F]; // "#1/"

const NAME: std::ops::Range<usize> = 0..16;
const MTIME: std::ops::Range<usize> = 16..28;
const UID: std::ops::Range<usize> = 28..34;
const GID: std::ops::Range<usize> = 34..40;
const MODE: std::ops::Range<usize> = 40..48;
const SIZE: std::ops::Range<usize> = 48..58;
const MEMBER_MAGIC: std::ops::Range<usize> = 58..60;

const MAX_UID: u64 = 999_999;
const MAX_MTIME: u64 = 999_999_999_999;
const MAX_MODE: u64 = 0o77777777;
const MAX_SIZE: u64 = 9_999_999_999;

pub struct ArCodec;

impl FormatCodec for ArCodec {
    fn name(&self) -> &'static str {
        "ar"
    }

    /// ar detection goes through [`is_magic`] on the archive preamble;
    /// the probe path must never offer this codec a member buffer.
    fn identify(&self, _block: &[u8]) -> bool {
        unreachable!("internal error: ar identify should never have been called")
    }

    fn start_read(&self, src: &mut ArchiveSource<'_>) -> Result<()> {
        let mut magic = [0u8; 8];
        src.read_exactly(&mut magic)?;
        if magic != MAGIC {
            return Err(PaxError::InvalidHeader);
        }
        Ok(())
    }

    fn read_header(
        &self,
        src: &mut ArchiveSource<'_>,
        _diag: &mut Diagnostics,
    ) -> Result<ReadOutcome> {
        let mut hdr = [0u8; HEADER_SIZE];
        // no end-of-archive marker: EOF between members ends the
        // stream, as does NUL block padding after the last member
        if !src.read_block_or_eof(&mut hdr)? || hdr[0] == 0 {
            return Ok(ReadOutcome::EndOfArchive);
        }
        if hdr[MEMBER_MAGIC] != [0x60, 0x0A] {
            return Err(PaxError::InvalidHeader);
        }

        let mut entry = ArchiveEntry::new("", EntryType::Regular);
        let mtime = dec_decode(&hdr[MTIME]);
        entry.stat.mtime = mtime;
        entry.stat.atime = mtime;
        entry.stat.ctime = mtime;
        entry.stat.uid = dec_decode(&hdr[UID]) as u32;
        entry.stat.gid = dec_decode(&hdr[GID]) as u32;
        entry.stat.mode = (oct_decode(&hdr[MODE]) & 0o7777) as u32;

        // pad derives from the stored size, which still includes any
        // extended-name bytes
        let mut size = dec_decode(&hdr[SIZE]);
        entry.pad = size & 1;

        if hdr[NAME][..3] == EXT_NAME {
            let name_len = dec_decode(&hdr[NAME.start + 3..NAME.end]) as usize;
            if name_len > PAX_PATH_MAX {
                return Err(PaxError::NameTooLong {
                    len: name_len,
                    max: PAX_PATH_MAX,
                });
            }
            let mut name = vec![0u8; name_len];
            src.read_exactly(&mut name)?;
            entry.name = String::from_utf8_lossy(&name).into_owned();
            size -= (name_len as u64).min(size);
        } else {
            // short name: stop at space, slash (SYSV terminator), or NUL
            let field = &hdr[NAME];
            let end = field
                .iter()
                .position(|&c| c == b' ' || c == b'/' || c == 0)
                .unwrap_or(field.len());
            entry.name = String::from_utf8_lossy(&field[..end]).into_owned();
        }

        entry.stat.size = size;
        entry.skip = size;
        Ok(ReadOutcome::Entry(entry))
    }

    fn start_write(&self, sink: &mut ArchiveSink<'_>, append: bool) -> Result<()> {
        if append {
            return Ok(());
        }
        sink.write_exactly(&MAGIC)
    }

    fn write_header(
        &self,
        entry: &mut ArchiveEntry,
        sink: &mut ArchiveSink<'_>,
        anon: Anonymize,
        diag: &mut Diagnostics,
    ) -> Result<WriteOutcome> {
        match entry.kind {
            EntryType::Regular | EntryType::Contiguous | EntryType::HardLink => {}
            EntryType::Directory => return Ok(WriteOutcome::Skip),
            _ => {
                diag.warn(format!(
                    "ar can only archive regular files, which {} is not",
                    entry.name
                ));
                return Ok(WriteOutcome::Skip);
            }
        }

        // ar never stores directory components
        let basename = entry.basename().to_string();

        let mtime = clamp_field(diag, &entry.name, "mtime", entry.stat.mtime, MAX_MTIME);
        let uid = clamp_field(diag, &entry.name, "uid", u64::from(entry.stat.uid), MAX_UID);
        let gid = clamp_field(diag, &entry.name, "gid", u64::from(entry.stat.gid), MAX_UID);
        let mode = clamp_field(
            diag,
            &entry.name,
            "mode",
            u64::from(entry.kind.mode_bits() | (entry.stat.mode & 0o7777)),
            MAX_MODE,
        );
        if entry.stat.size > MAX_SIZE {
            diag.warn(format!("size overflow for {}", entry.name));
            return Ok(WriteOutcome::Skip);
        }

        if anon.contains(Anonymize::DEBUG) {
            diag.debug(format!(
                "writing mode {mode:8o} user {uid}:{gid} mtime {mtime:08X} name '{basename}'"
            ));
        }

        let mut hdr = [b' '; HEADER_SIZE];

        // a space-bearing name cannot be embedded unambiguously, so it
        // always goes through the extended encoding even when short
        let fits = basename.len() <= NAME.len() && !basename.contains(' ');
        let ext_name: Option<&str> = if fits {
            hdr[..basename.len()].copy_from_slice(basename.as_bytes());
            None
        } else {
            hdr[NAME][..3].copy_from_slice(&EXT_NAME);
            dec_encode(&mut hdr[NAME.start + 3..NAME.end], basename.len() as u64);
            Some(&basename)
        };

        let ext_len = ext_name.map_or(0, str::len) as u64;
        dec_encode(&mut hdr[MTIME], mtime);
        dec_encode(&mut hdr[UID], uid);
        dec_encode(&mut hdr[GID], gid);
        oct_encode(&mut hdr[MODE], mode);
        dec_encode(&mut hdr[SIZE], entry.stat.size + ext_len);
        hdr[MEMBER_MAGIC].copy_from_slice(&[0x60, 0x0A]);

        // pad derives from the total data length, extended name included
        entry.pad = (entry.stat.size + ext_len) & 1;

        sink.write_exactly(&hdr)?;
        if let Some(name) = ext_name {
            sink.write_exactly(name.as_bytes())?;
        }
        Ok(WriteOutcome::Proceed)
    }
}
