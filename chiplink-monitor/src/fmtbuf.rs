//! Bounded formatting buffer.
//!
//! Fault paths cannot allocate; event context is formatted into a stack
//! buffer sized to what a lifecycle message can carry. Overflow truncates
//! silently.

use core::fmt::Write;

use chiplink_msg::LIFECYCLE_INFO_SIZE;

/// Stack buffer for formatting event context before composing a message.
#[derive(Clone, Copy)]
pub struct InfoBuf {
    data: [u8; LIFECYCLE_INFO_SIZE],
    len: usize,
}

impl InfoBuf {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0u8; LIFECYCLE_INFO_SIZE],
            len: 0,
        }
    }

    /// Buffer pre-loaded with a string (truncated to capacity).
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        let mut buf = Self::new();
        let _ = buf.write_str(s);
        buf
    }

    /// Formatted bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("<invalid>")
    }
}

impl Default for InfoBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for InfoBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = LIFECYCLE_INFO_SIZE - self.len;
        let to_copy = bytes.len().min(remaining);
        self.data[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

impl core::fmt::Debug for InfoBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InfoBuf({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_truncate() {
        let mut buf = InfoBuf::new();
        write!(buf, "{}|{}", 42, "reason").unwrap();
        assert_eq!(buf.as_bytes(), b"42|reason");

        let mut long = InfoBuf::new();
        for _ in 0..20 {
            write!(long, "0123456789").unwrap();
        }
        assert_eq!(long.as_bytes().len(), LIFECYCLE_INFO_SIZE);
    }
}
