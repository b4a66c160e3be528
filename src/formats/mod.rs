//! Format codec set and registry.
//!
//! One codec per supported container format, each implementing the same
//! five-operation contract: identify, read-header, write-header,
//! trailer, and a format-option hook. The registry is a statically
//! sorted table for explicit format selection by name, plus a fixed
//! probe order (distinct from the sort order) for auto-detecting the
//! format of an unknown stream. Formats that are strict supersets of
//! others are probed before the looser relatives (ustar before old tar,
//! the CRC cpio before plain SVR4 cpio).
//!
//! The probe order also contains trap entries for known compression
//! magics so a gzipped archive yields an actionable error instead of a
//! generic parse failure.

pub mod ar;
pub mod bcpio;
pub mod cpio;
pub mod tar;
pub mod ustar;
pub mod vcpio;

use crate::anonymize::Anonymize;
use crate::diag::Diagnostics;
use crate::entry::ArchiveEntry;
use crate::error::{PaxError, Result};
use crate::stream::{ArchiveSink, ArchiveSource};

/// Result of reading one member header.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A member follows; `skip`/`pad` describe its data region.
    Entry(ArchiveEntry),
    /// Trailer or end of stream; no further members.
    EndOfArchive,
}

/// Result of writing one member header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Header written; the payload follows.
    Proceed,
    /// Member not representable in this format; the caller moves on to
    /// the next entry.
    Skip,
}

/// The per-format operation set.
///
/// A closed, fixed set of implementations known at compile time,
/// selected through the static registry. Codecs hold no state; all
/// per-stream state lives in the source/sink and the entry.
pub trait FormatCodec: Sync {
    /// Registry name, also used in diagnostics.
    fn name(&self) -> &'static str;

    /// Probe a lookahead buffer. The buffer is at least the format's
    /// header size (shorter streams are never offered).
    fn identify(&self, block: &[u8]) -> bool;

    /// Consume any archive-level preamble before the first member.
    fn start_read(&self, _src: &mut ArchiveSource<'_>) -> Result<()> {
        Ok(())
    }

    /// Read and decode one member header, including any extended name
    /// bytes. Never reads the member payload.
    fn read_header(
        &self,
        src: &mut ArchiveSource<'_>,
        diag: &mut Diagnostics,
    ) -> Result<ReadOutcome>;

    /// Emit any archive-level preamble. Suppressed when appending to an
    /// existing archive, where the preamble is already present.
    fn start_write(&self, _sink: &mut ArchiveSink<'_>, _append: bool) -> Result<()> {
        Ok(())
    }

    /// Encode and emit one member header (and any extended name bytes
    /// folded into the data region). The entry's metadata has already
    /// been scrubbed per `anon`; the codec applies field clamping and
    /// sets `pad` for the caller.
    fn write_header(
        &self,
        entry: &mut ArchiveEntry,
        sink: &mut ArchiveSink<'_>,
        anon: Anonymize,
        diag: &mut Diagnostics,
    ) -> Result<WriteOutcome>;

    /// Emit the end-of-archive marker, if the format has one.
    fn write_trailer(&self, _sink: &mut ArchiveSink<'_>) -> Result<()> {
        Ok(())
    }

    /// Format-specific `-o name[=value]` hook. Every current format
    /// rejects unknown options.
    fn parse_option(&self, option: &str, _value: Option<&str>) -> Result<()> {
        Err(PaxError::UnsupportedOption {
            format: self.name(),
            option: option.to_string(),
        })
    }
}

/// Immutable registry entry describing one format; statically
/// allocated, never mutated after program start.
pub struct FormatDescriptor {
    /// Symbolic name (`-x`/`-H` argument).
    pub name: &'static str,
    /// Default device blocking for the whole archive stream.
    pub block_size: u64,
    /// Fixed header size in bytes.
    pub header_size: usize,
    /// Whether device/inode numbers are transmitted in headers.
    pub uses_dev: bool,
    /// Whether hardlinks are representable as link records.
    pub hardlink_capable: bool,
    /// Per-member data alignment (1 = byte oriented).
    pub align: u64,
    /// Anonymization bits this variant forces at start-of-write.
    pub preset: Anonymize,
    /// Whether a payload checksum is computed and verified.
    pub computes_crc: bool,
    /// Whether symlink targets travel in the data region (cpio family)
    /// rather than in a header field.
    pub link_in_data: bool,
    /// Operation bindings.
    pub codec: &'static dyn FormatCodec,
}

// not derivable over the codec binding
impl std::fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("name", &self.name)
            .field("block_size", &self.block_size)
            .field("header_size", &self.header_size)
            .finish_non_exhaustive()
    }
}

static AR_CODEC: ar::ArCodec = ar::ArCodec;
static BCPIO_CODEC: bcpio::BcpioCodec = bcpio::BcpioCodec;
static CPIO_CODEC: cpio::CpioCodec = cpio::CpioCodec;
static SV4CPIO_CODEC: vcpio::VcpioCodec = vcpio::VcpioCodec { crc: false };
static SV4CRC_CODEC: vcpio::VcpioCodec = vcpio::VcpioCodec { crc: true };
static TAR_CODEC: tar::TarCodec = tar::TarCodec;
static USTAR_CODEC: ustar::UstarCodec = ustar::UstarCodec;

pub static AR: FormatDescriptor = FormatDescriptor {
    name: "ar",
    block_size: 512,
    header_size: ar::HEADER_SIZE,
    uses_dev: false,
    hardlink_capable: false,
    align: 2,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: false,
    codec: &AR_CODEC,
};

pub static BCPIO: FormatDescriptor = FormatDescriptor {
    name: "bcpio",
    block_size: 5120,
    header_size: bcpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 2,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: true,
    codec: &BCPIO_CODEC,
};

pub static CPIO: FormatDescriptor = FormatDescriptor {
    name: "cpio",
    block_size: 5120,
    header_size: cpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 1,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: true,
    codec: &CPIO_CODEC,
};

/// Old octal cpio with distribution anonymization forced on.
pub static DIST: FormatDescriptor = FormatDescriptor {
    name: "dist",
    block_size: 512,
    header_size: cpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 1,
    preset: Anonymize::DIST,
    computes_crc: false,
    link_in_data: true,
    codec: &CPIO_CODEC,
};

pub static SV4CPIO: FormatDescriptor = FormatDescriptor {
    name: "sv4cpio",
    block_size: 5120,
    header_size: vcpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 4,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: true,
    codec: &SV4CPIO_CODEC,
};

pub static SV4CRC: FormatDescriptor = FormatDescriptor {
    name: "sv4crc",
    block_size: 5120,
    header_size: vcpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 4,
    preset: Anonymize::empty(),
    computes_crc: true,
    link_in_data: true,
    codec: &SV4CRC_CODEC,
};

pub static TAR: FormatDescriptor = FormatDescriptor {
    name: "tar",
    block_size: 10240,
    header_size: tar::HEADER_SIZE,
    uses_dev: false,
    hardlink_capable: true,
    align: 512,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: false,
    codec: &TAR_CODEC,
};

pub static USTAR: FormatDescriptor = FormatDescriptor {
    name: "ustar",
    block_size: 10240,
    header_size: ustar::HEADER_SIZE,
    uses_dev: false,
    hardlink_capable: true,
    align: 512,
    preset: Anonymize::empty(),
    computes_crc: false,
    link_in_data: false,
    codec: &USTAR_CODEC,
};

/// SVR4 CRC cpio with full normalisation forced on.
pub static V4NORM: FormatDescriptor = FormatDescriptor {
    name: "v4norm",
    block_size: 512,
    header_size: vcpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 4,
    preset: Anonymize::NORM,
    computes_crc: true,
    link_in_data: true,
    codec: &SV4CRC_CODEC,
};

/// SVR4 CRC cpio with root-ownership anonymization forced on.
pub static V4ROOT: FormatDescriptor = FormatDescriptor {
    name: "v4root",
    block_size: 512,
    header_size: vcpio::HEADER_SIZE,
    uses_dev: true,
    hardlink_capable: false,
    align: 4,
    preset: Anonymize::ROOT,
    computes_crc: true,
    link_in_data: true,
    codec: &SV4CRC_CODEC,
};

/// The full format roster, sorted by name for binary search.
pub static FORMATS: &[&FormatDescriptor] = &[
    &AR, &BCPIO, &CPIO, &DIST, &SV4CPIO, &SV4CRC, &TAR, &USTAR, &V4NORM, &V4ROOT,
];

/// Look up a format by its registry name.
pub fn format_by_name(name: &str) -> Result<&'static FormatDescriptor> {
    FORMATS
        .binary_search_by(|desc| desc.name.cmp(name))
        .map(|idx| FORMATS[idx])
        .map_err(|_| PaxError::UnknownFormatName(name.to_string()))
}

enum Candidate {
    Format(&'static FormatDescriptor),
    Trap {
        magic: &'static [u8],
        program: &'static str,
        flag: char,
    },
}

/// Probe priority for auto-detection. Distinct from the registry sort
/// order; the ar archive magic is matched ahead of this list (it marks
/// the whole stream, not a member), the anonymized write variants are
/// never probed, and the compression traps sit between the tar and
/// cpio families exactly where a compressed stream would otherwise
/// start misparsing.
static SEARCH_ORDER: &[Candidate] = &[
    Candidate::Format(&USTAR),
    Candidate::Format(&TAR),
    Candidate::Trap {
        magic: &[0x1f, 0x8b],
        program: "gzip",
        flag: 'z',
    },
    Candidate::Trap {
        magic: b"BZh",
        program: "bzip2",
        flag: 'j',
    },
    Candidate::Trap {
        magic: &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        program: "xz",
        flag: 'J',
    },
    Candidate::Trap {
        magic: &[0x1f, 0x9d],
        program: "compress",
        flag: 'Z',
    },
    Candidate::Format(&SV4CRC),
    Candidate::Format(&SV4CPIO),
    Candidate::Format(&CPIO),
    Candidate::Format(&BCPIO),
];

/// Auto-detect the format of a lookahead buffer, in fixed priority
/// order, stopping at the first match.
pub fn detect(block: &[u8]) -> Result<&'static FormatDescriptor> {
    // the ar preamble magic decides before any member probe runs
    if ar::is_magic(block) {
        return Ok(&AR);
    }
    for candidate in SEARCH_ORDER {
        match candidate {
            Candidate::Format(desc) => {
                if block.len() >= desc.header_size && desc.codec.identify(block) {
                    return Ok(desc);
                }
            }
            Candidate::Trap {
                magic,
                program,
                flag,
            } => {
                if block.len() >= magic.len() && block.starts_with(magic) {
                    return Err(PaxError::CompressedInput {
                        program,
                        flag: *flag,
                    });
                }
            }
        }
    }
    Err(PaxError::UnknownFormat)
}

/// Range clamp at the entry-to-header boundary: values exceeding a
/// field's maximum are clamped with a warning. Size is never clamped;
/// that case is skip-the-member (see the codecs' write paths).
pub(crate) fn clamp_field(
    diag: &mut Diagnostics,
    member: &str,
    what: &str,
    val: u64,
    max: u64,
) -> u64 {
    if val > max {
        diag.warn(format!("{what} overflow for {member}"));
        max
    } else {
        val
    }
}

/// Extract a NUL- or end-terminated string field, lossily for
/// non-UTF-8 bytes.
pub(crate) fn str_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
