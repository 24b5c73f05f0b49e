//! Relative-path trail for diagnostics
//!
//! The walker descends through directory handles and never rebuilds
//! absolute paths for syscalls; the trail exists only so diagnostics can
//! name the entry being processed. Push appends `/name` and returns a
//! frame; pop truncates back to it.

use std::ffi::OsStr;
use std::fmt;

/// Saved trail position, returned by [`PathTrail::push`]
#[derive(Debug, Clone, Copy)]
pub struct Frame(usize);

/// Growable `/a/b/c` trail with push/pop stack discipline
#[derive(Debug, Default)]
pub struct PathTrail {
    buf: String,
}

impl PathTrail {
    /// Create an empty trail
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `/name` and return the frame to restore on pop
    pub fn push(&mut self, name: &OsStr) -> Frame {
        let frame = Frame(self.buf.len());
        self.buf.push('/');
        self.buf.push_str(&name.to_string_lossy());
        frame
    }

    /// Restore the trail to the position saved by the matching push
    pub fn pop(&mut self, frame: Frame) {
        self.buf.truncate(frame.0);
    }

    /// Current trail as a path-like string ("" at the root)
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

impl fmt::Display for PathTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}
