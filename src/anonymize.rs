//! Anonymization policy: write-time metadata scrubbing.
//!
//! A single bitmask of independent transforms applied uniformly by every
//! write-capable codec, producing reproducible or privacy-preserving
//! archives. The named presets mirror the masks the anonymized format
//! variants (`dist`, `v4norm`, `v4root`) force at start-of-write.

use crate::entry::EntryStat;

bitflags::bitflags! {
    /// Write-time metadata scrubbing flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Anonymize: u32 {
        /// Write 0 as owner uid and gid.
        const UIDGID = 1 << 0;
        /// Clear device and inode numbers.
        const INODES = 1 << 1;
        /// Write 0 as modification (and access/change) time.
        const MTIME = 1 << 2;
        /// Drop hardlink information: every member claims one link.
        const HARDLINKS = 1 << 3;
        /// Numeric ids only: suppress symbolic user/group names in
        /// formats that carry them.
        const NUMID = 1 << 4;
        /// Store directory names with a trailing slash in formats that
        /// do not mark directories otherwise.
        const DIRSLASH = 1 << 5;
        /// Echo the effective mask once at start-of-write.
        const VERBOSE = 1 << 6;
        /// Echo every written member's scrubbed metadata to the debug
        /// channel.
        const DEBUG = 1 << 7;

        /// Fully normalised archive: uid/gid, inodes, mtime, hardlinks
        /// cleared, numeric ids only.
        const NORM = Self::UIDGID.bits()
            | Self::INODES.bits()
            | Self::NUMID.bits()
            | Self::MTIME.bits()
            | Self::HARDLINKS.bits();
        /// Root-owned archive: uid/gid and inodes cleared, numeric ids.
        const ROOT = Self::UIDGID.bits() | Self::INODES.bits() | Self::NUMID.bits();
        /// Distribution archive: [`Self::ROOT`] plus hardlinks dropped.
        const DIST = Self::ROOT.bits() | Self::HARDLINKS.bits();
        /// Deterministic set: inodes and hardlinks cleared only.
        const SET = Self::INODES.bits() | Self::HARDLINKS.bits();
    }
}

impl Anonymize {
    /// Parse one mnemonic word, optionally prefixed with `no-` to clear
    /// the bits instead of setting them, and fold it into `self`.
    ///
    /// Recognized words match the original option surface by prefix:
    /// `uid`/`gid`, `ino`, `mtime`, `link`, `norm`, `root`, `dist`,
    /// `set`, `numid`, `gslash`, `v`, `debug`. Returns `None` for an
    /// unknown word, leaving the mask untouched.
    pub fn parse_word(self, word: &str) -> Option<Self> {
        let (set, word) = match word.strip_prefix("no-") {
            Some(rest) => (false, rest),
            None => (true, word),
        };
        let bits = if word.starts_with("uid") || word.starts_with("gid") {
            Self::UIDGID
        } else if word.starts_with("ino") {
            Self::INODES
        } else if word.starts_with("mtim") {
            Self::MTIME
        } else if word.starts_with("link") {
            Self::HARDLINKS
        } else if word.starts_with("norm") {
            Self::NORM
        } else if word.starts_with("root") {
            Self::ROOT
        } else if word.starts_with("dist") {
            Self::DIST
        } else if word.starts_with("numid") {
            Self::NUMID
        } else if word.starts_with("gslash") {
            Self::DIRSLASH
        } else if word.starts_with("set") {
            Self::SET
        } else if word.starts_with("debug") {
            Self::DEBUG
        } else if word.starts_with('v') {
            Self::VERBOSE
        } else {
            return None;
        };
        Some(if set { self | bits } else { self - bits })
    }

    /// Scrub one member's metadata in place. Applied by the writer
    /// before range clamping, so cleared values never trigger overflow
    /// warnings.
    pub fn apply(self, stat: &mut EntryStat) {
        if self.contains(Self::UIDGID) {
            stat.uid = 0;
            stat.gid = 0;
        }
        if self.contains(Self::INODES) {
            stat.dev = 0;
            stat.ino = 0;
        }
        if self.contains(Self::MTIME) {
            stat.mtime = 0;
            stat.atime = 0;
            stat.ctime = 0;
        }
        if self.contains(Self::HARDLINKS) {
            stat.nlink = 1;
        }
    }
}
