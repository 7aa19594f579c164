// src/system/pty.rs

//! Pseudo-terminal pair used for merged, unbuffered output capture.
//!
//! The read end is the pty master; the write end is the slave that gets handed
//! to the child as stdout and stderr. Output post-processing is switched off
//! so the captured bytes are exactly what the child wrote (no `\n` -> `\r\n`).

use nix::pty::openpty;
use nix::sys::termios::{self, OutputFlags, SetArg};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::OwnedFd;

/// An open pty pair. Both ends are closed on drop, write end first.
#[derive(Debug)]
pub struct PtySession {
    r: Option<File>,
    w: Option<OwnedFd>,
}

impl PtySession {
    /// Allocates a pty pair and disables `OPOST`/`ONLCR` on it.
    pub fn open() -> io::Result<Self> {
        let pair = openpty(None, None).map_err(io::Error::from)?;
        let session = Self {
            r: Some(File::from(pair.master)),
            w: Some(pair.slave),
        };

        // tty flags normally change \n to \r\n
        if let Some(r) = &session.r {
            let mut attrs = termios::tcgetattr(r).map_err(io::Error::from)?;
            attrs
                .output_flags
                .remove(OutputFlags::ONLCR | OutputFlags::OPOST);
            termios::tcsetattr(r, SetArg::TCSANOW, &attrs).map_err(io::Error::from)?;
        }

        log::trace!("Allocated pty pair with output post-processing disabled.");
        Ok(session)
    }

    /// Returns a new handle to the write end, suitable for a child's stdio.
    pub fn write_stdio(&self) -> io::Result<OwnedFd> {
        match &self.w {
            Some(w) => w.try_clone(),
            None => Err(io::Error::other("pty write end is already closed")),
        }
    }

    /// Reads from the read end. Errors are returned untouched, including `EIO`.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.r {
            Some(r) => r.read(buf),
            None => Err(io::Error::other("pty read end is already closed")),
        }
    }

    /// Closes the write end. Safe to call any number of times.
    pub fn close_w(&mut self) {
        self.w.take();
    }

    /// Closes the read end. Closing it twice is a caller bug and is reported as an error.
    pub fn close_r(&mut self) -> io::Result<()> {
        match self.r.take() {
            Some(_) => Ok(()),
            None => Err(io::Error::other("pty read end closed twice")),
        }
    }

    /// Whether the child-side end is still held by this session.
    pub fn is_write_open(&self) -> bool {
        self.w.is_some()
    }

    /// Whether the parent-side end is still open.
    pub fn is_read_open(&self) -> bool {
        self.r.is_some()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.close_w();
        self.r.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_close_w_is_idempotent() {
        let mut pty = PtySession::open().unwrap();
        assert!(pty.is_write_open());
        pty.close_w();
        pty.close_w();
        assert!(!pty.is_write_open());
        assert!(pty.write_stdio().is_err());
    }

    #[test]
    fn test_close_r_twice_is_an_error() {
        let mut pty = PtySession::open().unwrap();
        pty.close_r().unwrap();
        assert!(!pty.is_read_open());
        assert!(pty.close_r().is_err());
        let mut buf = [0u8; 8];
        assert!(pty.read(&mut buf).is_err());
    }

    #[test]
    fn test_written_newlines_are_not_translated() {
        let mut pty = PtySession::open().unwrap();
        let mut writer = File::from(pty.write_stdio().unwrap());
        writer.write_all(b"a\nb\n").unwrap();
        drop(writer);

        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        while got.len() < 4 {
            let n = pty.read(&mut buf).unwrap();
            assert!(n > 0);
            got.extend_from_slice(buf.get(..n).unwrap());
        }
        assert_eq!(got, b"a\nb\n");
    }
}
