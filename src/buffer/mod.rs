// Buffer management: the pushback-capable read window and the partial-value
// accumulator.

pub mod partial;

pub use partial::{PartialMode, PartialValue};

use log::debug;

/// Smallest supported window size. Deliberately tiny: a one-byte window is
/// legal and exercised by the buffer-size invariance tests.
pub const MIN_WINDOW: usize = 1;

/// A single backing allocation split in half: the front half is the active
/// read window, the back half stages pushback. After any pushback, the next
/// fill returns the staged bytes before touching the underlying source.
///
/// Invariant: staged length never exceeds half of the backing allocation;
/// the allocation doubles when an external pushback would overflow it.
#[derive(Debug)]
pub struct BufferWithPushback {
    buf: Vec<u8>,
    win_len: usize,
    staged_len: usize,
}

impl BufferWithPushback {
    /// `window` is the requested window size; the backing allocation is
    /// twice that (window + staging).
    pub fn with_capacity(window: usize) -> Self {
        let window = window.max(MIN_WINDOW);
        BufferWithPushback {
            buf: vec![0; window * 2],
            win_len: 0,
            staged_len: 0,
        }
    }

    #[inline]
    fn half(&self) -> usize {
        self.buf.len() / 2
    }

    /// The active read window.
    #[inline]
    pub fn window(&self) -> &[u8] {
        &self.buf[..self.win_len]
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.win_len
    }

    #[inline]
    pub fn staged_len(&self) -> usize {
        self.staged_len
    }

    /// Start a refill: drain staged pushback into the window, then expose
    /// the spare window region for a source read. Returns `None` when the
    /// staged bytes satisfy the fill on their own (the source must not be
    /// touched) — unless `force` requests source bytes regardless, as the
    /// multi-byte separator lookahead does.
    pub fn begin_fill(&mut self, force: bool) -> Option<&mut [u8]> {
        let staged = self.staged_len;
        if staged > 0 {
            let half = self.half();
            self.buf.copy_within(half..half + staged, 0);
        }
        self.win_len = staged;
        self.staged_len = 0;

        if staged > 0 && !force {
            return None;
        }
        if self.win_len == self.half() {
            // Forced refill with a full window: widen so the read can make
            // progress.
            self.grow();
        }
        let half = self.half();
        Some(&mut self.buf[self.win_len..half])
    }

    /// Complete a refill after the source read. A zero-length read is the
    /// caller's end-of-stream signal; the buffer itself stays usable.
    pub fn commit_fill(&mut self, read: usize) {
        debug_assert!(self.win_len + read <= self.half());
        self.win_len += read;
    }

    /// Stage the last `keep` bytes of the consumed window for replay.
    pub fn push_back_from_window(&mut self, consumed: usize, keep: usize) {
        debug_assert!(keep <= consumed && consumed <= self.win_len);
        debug_assert_eq!(self.staged_len, 0, "pushback over staged bytes");
        let half = self.half();
        self.buf.copy_within(consumed - keep..consumed, half);
        self.staged_len = keep;
    }

    /// Stage bytes not sourced from this window (detection or header-probe
    /// replay). Grows the allocation when the staging half is too small.
    pub fn push_back_external(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.staged_len, 0, "pushback over staged bytes");
        while bytes.len() > self.half() {
            self.grow();
        }
        let half = self.half();
        self.buf[half..half + bytes.len()].copy_from_slice(bytes);
        self.staged_len = bytes.len();
    }

    /// Double the backing allocation, preserving window and staged bytes.
    /// The old block is released only after the new one is populated.
    fn grow(&mut self) {
        let old_half = self.half();
        let new_len = self.buf.len() * 2;
        debug!("growing buffer to {} bytes", new_len);
        let mut next = vec![0u8; new_len];
        next[..self.win_len].copy_from_slice(&self.buf[..self.win_len]);
        let new_half = new_len / 2;
        next[new_half..new_half + self.staged_len]
            .copy_from_slice(&self.buf[old_half..old_half + self.staged_len]);
        self.buf = next;
    }

    /// Drop the backing memory. Used on disposal.
    pub fn release(&mut self) {
        self.buf = Vec::new();
        self.win_len = 0;
        self.staged_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_with(buffer: &mut BufferWithPushback, bytes: &[u8]) {
        let spare = buffer.begin_fill(false).expect("expected a source fill");
        spare[..bytes.len()].copy_from_slice(bytes);
        buffer.commit_fill(bytes.len());
    }

    #[test]
    fn test_fill_and_window() {
        let mut buffer = BufferWithPushback::with_capacity(64);
        fill_with(&mut buffer, b"abc");
        assert_eq!(buffer.window(), b"abc");
    }

    #[test]
    fn test_pushback_from_window_round_trip() {
        let mut buffer = BufferWithPushback::with_capacity(64);
        fill_with(&mut buffer, b"abcdef");
        // Consume all six, keep the last two for replay.
        buffer.push_back_from_window(6, 2);
        assert_eq!(buffer.staged_len(), 2);

        // Staged bytes come back before any source byte.
        assert!(buffer.begin_fill(false).is_none());
        assert_eq!(buffer.window(), b"ef");
    }

    #[test]
    fn test_forced_fill_appends_after_staged() {
        let mut buffer = BufferWithPushback::with_capacity(64);
        fill_with(&mut buffer, b"xy");
        buffer.push_back_from_window(2, 2);

        // Forced: staged bytes drain to the front and the source region
        // follows them.
        let spare = buffer.begin_fill(true).expect("forced fill");
        spare[..3].copy_from_slice(b"zzz");
        buffer.commit_fill(3);
        assert_eq!(buffer.window(), b"xyzzz");
    }

    #[test]
    fn test_external_pushback() {
        let mut buffer = BufferWithPushback::with_capacity(64);
        buffer.push_back_external(b"replayed");
        assert!(buffer.begin_fill(false).is_none());
        assert_eq!(buffer.window(), b"replayed");
    }

    #[test]
    fn test_external_pushback_grows_allocation() {
        let mut buffer = BufferWithPushback::with_capacity(4);
        let big = vec![b'q'; 100];
        buffer.push_back_external(&big);
        assert!(buffer.staged_len() <= buffer.half());
        assert!(buffer.begin_fill(false).is_none());
        assert_eq!(buffer.window(), &big[..]);
    }

    #[test]
    fn test_one_byte_window_fills() {
        let mut buffer = BufferWithPushback::with_capacity(1);
        assert_eq!(buffer.half(), 1);
        fill_with(&mut buffer, b"a");
        assert_eq!(buffer.window(), b"a");
    }

    #[test]
    fn test_release() {
        let mut buffer = BufferWithPushback::with_capacity(64);
        fill_with(&mut buffer, b"abc");
        buffer.release();
        assert_eq!(buffer.window_len(), 0);
        assert_eq!(buffer.staged_len(), 0);
    }
}
