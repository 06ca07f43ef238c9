//! Bounded capture of everything a script prints.
//!
//! The buffer never grows past its cap. Bytes that do not fit are dropped and
//! the `truncated` flag latches until the next [`ConsoleBuffer::reset`].

use tracing::warn;

/// Initial backing capacity, clamped to the configured cap.
const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct ConsoleBuffer {
    bytes: Vec<u8>,
    max_size: usize,
    truncated: bool,
}

impl ConsoleBuffer {
    /// Create a buffer that holds at most `max_size` bytes.
    ///
    /// Returns `None` when the initial backing storage cannot be reserved.
    pub fn new(max_size: usize) -> Option<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(INITIAL_CAPACITY.min(max_size)).ok()?;
        Some(Self {
            bytes,
            max_size,
            truncated: false,
        })
    }

    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        if self.bytes.len() >= self.max_size {
            self.mark_truncated();
            return;
        }

        let available = self.max_size - self.bytes.len();
        let appendable = data.len().min(available);
        if appendable < data.len() {
            self.mark_truncated();
        }

        let required = self.bytes.len() + appendable;
        if required > self.bytes.capacity() {
            let target = (self.bytes.capacity() * 2).min(self.max_size).max(required);
            // Growth failure drops this append; capture is best-effort.
            if self
                .bytes
                .try_reserve_exact(target - self.bytes.len())
                .is_err()
            {
                return;
            }
        }

        self.bytes.extend_from_slice(&data[..appendable]);
    }

    /// Clear the captured output and the truncation flag, keeping the allocation.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.truncated = false;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Captured output as text; invalid UTF-8 sequences are replaced.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn mark_truncated(&mut self) {
        if !self.truncated {
            warn!(max_size = self.max_size, "Console output truncated");
        }
        self.truncated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_capacity_is_clamped() {
        assert!(ConsoleBuffer::new(10_000).unwrap().capacity() >= 1024);
        let small = ConsoleBuffer::new(16).unwrap();
        assert!(small.capacity() >= 16);
        assert!(small.is_empty());
    }

    #[test]
    fn test_append_within_cap() {
        let mut console = ConsoleBuffer::new(32).unwrap();
        console.append(b"hello ");
        console.append(b"world\n");
        assert_eq!(console.as_bytes(), b"hello world\n");
        assert!(!console.truncated());
    }

    #[test]
    fn test_overflowing_append_is_cut_at_cap() {
        let mut console = ConsoleBuffer::new(8).unwrap();
        console.append(b"abcde");
        console.append(b"fghij");
        assert_eq!(console.as_bytes(), b"abcdefgh");
        assert_eq!(console.len(), 8);
        assert!(console.truncated());
    }

    #[test]
    fn test_append_when_full_drops_everything() {
        let mut console = ConsoleBuffer::new(4).unwrap();
        console.append(b"abcd");
        assert!(!console.truncated());
        console.append(b"e");
        assert_eq!(console.as_bytes(), b"abcd");
        assert!(console.truncated());
    }

    #[test]
    fn test_cumulative_appends_stop_exactly_at_cap() {
        let mut console = ConsoleBuffer::new(3000).unwrap();
        for _ in 0..100 {
            console.append(&[b'x'; 97]);
        }
        assert_eq!(console.len(), 3000);
        assert!(console.truncated());
    }

    #[test]
    fn test_growth_doubles_then_clamps() {
        let mut console = ConsoleBuffer::new(3000).unwrap();
        console.append(&[b'a'; 1500]);
        assert!(console.capacity() >= 2048);
        console.append(&[b'b'; 1500]);
        assert_eq!(console.len(), 3000);
        assert!(!console.truncated());
    }

    #[test]
    fn test_embedded_nul_is_kept() {
        let mut console = ConsoleBuffer::new(16).unwrap();
        console.append(b"a\0b");
        assert_eq!(console.len(), 3);
        assert_eq!(console.to_text(), "a\u{0}b");
    }

    #[test]
    fn test_reset_clears_flag_and_content() {
        let mut console = ConsoleBuffer::new(2).unwrap();
        console.append(b"abc");
        assert!(console.truncated());
        console.reset();
        assert!(console.is_empty());
        assert!(!console.truncated());
        console.append(b"z");
        assert_eq!(console.as_bytes(), b"z");
    }

    #[test]
    fn test_zero_cap_captures_nothing() {
        let mut console = ConsoleBuffer::new(0).unwrap();
        console.append(b"x");
        assert!(console.is_empty());
        assert!(console.truncated());
    }
}
