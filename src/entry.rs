//! The in-memory archive member representation shared by all codecs.
//!
//! One [`ArchiveEntry`] is built fresh per member read from, or about to
//! be written to, the stream; longer-lived state (hardlink tables, name
//! caches) belongs to the surrounding tree-walk or extraction layer.

/// Format-independent upper bound on member path length, in bytes.
///
/// Every codec that cannot represent a name of this length within its
/// native field width must fall back to an extended-name encoding or
/// reject the entry.
pub const PAX_PATH_MAX: usize = 3072;

/// Member type, driving each codec's accept/reject policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file.
    Regular,
    /// Contiguous file; treated as regular by every current format.
    Contiguous,
    /// Hard link to a previously archived regular file.
    HardLink,
    /// Symbolic link.
    SymLink,
    /// Character device node.
    CharDevice,
    /// Block device node.
    BlockDevice,
    /// Directory.
    Directory,
    /// Named pipe.
    Fifo,
}

impl EntryType {
    /// File-type bits as transmitted in mode fields by the cpio family
    /// (classic `S_IFMT` values).
    pub fn mode_bits(self) -> u32 {
        match self {
            Self::Regular | Self::Contiguous | Self::HardLink => 0o100000,
            Self::SymLink => 0o120000,
            Self::CharDevice => 0o020000,
            Self::BlockDevice => 0o060000,
            Self::Directory => 0o040000,
            Self::Fifo => 0o010000,
        }
    }

    /// Recover the member type from `S_IFMT` bits; unknown combinations
    /// fall back to a regular file, matching lenient legacy readers.
    pub fn from_mode_bits(mode: u32) -> Self {
        match mode & 0o170000 {
            0o120000 => Self::SymLink,
            0o020000 => Self::CharDevice,
            0o060000 => Self::BlockDevice,
            0o040000 => Self::Directory,
            0o010000 => Self::Fifo,
            _ => Self::Regular,
        }
    }
}

/// The stat-like metadata block of one member.
///
/// `mode` carries permission bits only (including setuid/setgid/sticky);
/// file-type bits are synthesized from [`EntryType`] by the codecs that
/// transmit them. `dev`/`ino` exist for hardlink detection and are not
/// transmitted by every format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryStat {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: u64,
    pub atime: u64,
    pub ctime: u64,
    pub nlink: u32,
    pub dev: u64,
    pub ino: u64,
    pub rdev: u64,
}

/// One archive member, the canonical descriptor used uniformly across
/// all codecs.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Member path. Non-UTF-8 names are replaced lossily on read.
    pub name: String,
    /// Hardlink target or symlink target, empty otherwise.
    pub link_name: String,
    /// Member type.
    pub kind: EntryType,
    /// Metadata block.
    pub stat: EntryStat,
    /// Remaining unread payload bytes after the header (derived).
    pub skip: u64,
    /// End-of-member padding in bytes (derived; 0 or 1 for byte-oriented
    /// formats, up to one block for block-aligned ones).
    pub pad: u64,
    /// Payload checksum for CRC-capable formats, zero otherwise.
    pub crc: u32,
}

impl ArchiveEntry {
    /// Fresh entry of the given type with zeroed metadata.
    pub fn new(name: impl Into<String>, kind: EntryType) -> Self {
        Self {
            name: name.into(),
            link_name: String::new(),
            kind,
            stat: EntryStat {
                nlink: 1,
                ..EntryStat::default()
            },
            skip: 0,
            pad: 0,
            crc: 0,
        }
    }

    /// Convenience constructor for a regular file of the given size.
    pub fn regular(name: impl Into<String>, size: u64) -> Self {
        let mut entry = Self::new(name, EntryType::Regular);
        entry.stat.size = size;
        entry
    }

    /// Name with trailing slashes trimmed (never trims the whole name
    /// away: "///" keeps its first slash).
    pub fn trimmed_name(&self) -> &str {
        let bytes = self.name.as_bytes();
        let mut end = bytes.len();
        while end > 1 && bytes[end - 1] == b'/' {
            end -= 1;
        }
        &self.name[..end]
    }

    /// Basename of the trimmed name: the substring after the last slash.
    pub fn basename(&self) -> &str {
        let trimmed = self.trimmed_name();
        match trimmed.rfind('/') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        }
    }

    /// Whether this member carries payload bytes in the data region.
    pub fn has_data(&self) -> bool {
        matches!(
            self.kind,
            EntryType::Regular | EntryType::Contiguous | EntryType::HardLink
        )
    }
}

/// Split a device number into (major, minor) halves for formats that
/// transmit them separately. Uses the classic 8/8 encoding; values that
/// do not fit a format's field width follow the clamp-and-warn policy.
pub fn dev_split(rdev: u64) -> (u64, u64) {
    (rdev >> 8, rdev & 0xff)
}

/// Inverse of [`dev_split`].
pub fn dev_combine(major: u64, minor: u64) -> u64 {
    (major << 8) | (minor & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits_round_trip() {
        for kind in [
            EntryType::Regular,
            EntryType::SymLink,
            EntryType::CharDevice,
            EntryType::BlockDevice,
            EntryType::Directory,
            EntryType::Fifo,
        ] {
            assert_eq!(EntryType::from_mode_bits(kind.mode_bits()), kind);
        }
    }

    #[test]
    fn test_basename_after_trailing_slash_trim() {
        let entry = ArchiveEntry::new("usr/lib/libc.a///", EntryType::Regular);
        assert_eq!(entry.trimmed_name(), "usr/lib/libc.a");
        assert_eq!(entry.basename(), "libc.a");
    }

    #[test]
    fn test_basename_of_bare_name() {
        let entry = ArchiveEntry::new("libc.a", EntryType::Regular);
        assert_eq!(entry.basename(), "libc.a");
    }

    #[test]
    fn test_dev_split_round_trip() {
        let (major, minor) = dev_split(0x0103);
        assert_eq!((major, minor), (1, 3));
        assert_eq!(dev_combine(major, minor), 0x0103);
    }
}
