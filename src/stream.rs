//! Byte-stream seams between the codecs and the caller's I/O layer.
//!
//! [`ArchiveSource`] wraps any [`Read`] with the three primitives the
//! codecs need: exact reads, payload skipping without buffering, and a
//! small push-back buffer so a failed format probe can un-consume its
//! lookahead for the next candidate. [`ArchiveSink`] wraps any [`Write`]
//! and counts bytes so block-aligned formats can pad the final record.
//!
//! Single-threaded, synchronous, blocking throughout; suspension only
//! happens inside the underlying read/write calls.

use std::io::{ErrorKind, Read, Write};

use crate::error::Result;

/// Readable archive stream with push-back lookahead.
pub struct ArchiveSource<'a> {
    inner: Box<dyn Read + 'a>,
    pushback: Vec<u8>,
    consumed: u64,
}

impl<'a> ArchiveSource<'a> {
    pub fn new(reader: impl Read + 'a) -> Self {
        Self {
            inner: Box::new(reader),
            pushback: Vec::new(),
            consumed: 0,
        }
    }

    /// Total bytes handed out so far (push-back restores the count).
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Un-consume bytes so the next read sees them again. Used when a
    /// format probe fails and another candidate must inspect the same
    /// prefix.
    pub fn push_back(&mut self, bytes: &[u8]) {
        let mut restored = bytes.to_vec();
        restored.append(&mut self.pushback);
        self.pushback = restored;
        self.consumed -= bytes.len() as u64;
    }

    fn take_pushback(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pushback.len());
        buf[..n].copy_from_slice(&self.pushback[..n]);
        self.pushback.drain(..n);
        n
    }

    /// Read up to `buf.len()` bytes; a short count means end of stream.
    /// This is the probe read: the caller pushes the bytes back after
    /// identification.
    pub fn read_lookahead(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = self.take_pushback(buf);
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.consumed += filled as u64;
        Ok(filled)
    }

    /// Fill `buf` completely or fail with the underlying short-read
    /// error.
    pub fn read_exactly(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read_lookahead(buf)?;
        if n < buf.len() {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("short read: wanted {} bytes, got {n}", buf.len()),
            )
            .into());
        }
        Ok(())
    }

    /// Fill `buf` completely, or report a clean end-of-stream when not
    /// even one byte is available. A partial header is still an error.
    ///
    /// Formats without an end-of-archive marker (ar) use this to turn
    /// EOF between members into end-of-archive.
    pub fn read_block_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let n = self.read_lookahead(buf)?;
        if n == 0 {
            return Ok(false);
        }
        if n < buf.len() {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("truncated header: wanted {} bytes, got {n}", buf.len()),
            )
            .into());
        }
        Ok(true)
    }

    /// Discard `n` payload bytes without buffering them.
    pub fn skip(&mut self, mut n: u64) -> Result<()> {
        let mut scratch = [0u8; 4096];
        while n > 0 {
            let want = scratch.len().min(n as usize);
            self.read_exactly(&mut scratch[..want])?;
            n -= want as u64;
        }
        Ok(())
    }
}

/// Writable archive stream with a byte counter for block alignment.
pub struct ArchiveSink<'a> {
    inner: Box<dyn Write + 'a>,
    written: u64,
}

impl<'a> ArchiveSink<'a> {
    pub fn new(writer: impl Write + 'a) -> Self {
        Self {
            inner: Box::new(writer),
            written: 0,
        }
    }

    /// Total bytes emitted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_exactly(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Emit `n` zero bytes (member padding, tar trailer blocks).
    pub fn write_zeros(&mut self, mut n: u64) -> Result<()> {
        const ZEROS: [u8; 1024] = [0u8; 1024];
        while n > 0 {
            let chunk = ZEROS.len().min(n as usize);
            self.write_exactly(&ZEROS[..chunk])?;
            n -= chunk as u64;
        }
        Ok(())
    }

    /// Zero-pad the stream up to a multiple of `align` bytes; returns
    /// the pad length. `align` of 0 or 1 is a no-op.
    pub fn pad_to(&mut self, align: u64) -> Result<u64> {
        if align <= 1 {
            return Ok(0);
        }
        let rem = self.written % align;
        let pad = if rem == 0 { 0 } else { align - rem };
        self.write_zeros(pad)?;
        Ok(pad)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Pad needed to round `len` up to a multiple of `align` (0 and 1 mean
/// byte alignment).
pub fn pad_for(len: u64, align: u64) -> u64 {
    if align <= 1 {
        return 0;
    }
    let rem = len % align;
    if rem == 0 {
        0
    } else {
        align - rem
    }
}
