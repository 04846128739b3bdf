// src/tail/lines.rs

use std::mem;

/// Reassembles raw reads into complete, newline-terminated lines.
///
/// Reads from a watched file land on arbitrary boundaries; the bytes after
/// the last newline of a read (the fringe) belong to a line that has not
/// finished arriving. The splitter holds that fringe and prepends it to the
/// next read, so a line split across reads is produced exactly once, intact,
/// in order.
#[derive(Debug, Default)]
pub struct LineSplitter {
    fringe: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of freshly read bytes.
    ///
    /// Returns every line completed by this chunk, newline included, in
    /// on-disk order. Trailing bytes without a newline are retained as the
    /// new fringe.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.fringe.extend_from_slice(chunk);

        let Some(last_nl) = self.fringe.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.fringe.split_off(last_nl + 1);
        let complete = mem::replace(&mut self.fringe, rest);

        complete
            .split_inclusive(|&b| b == b'\n')
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Take the buffered partial line, if any, leaving the splitter empty.
    ///
    /// Used to flush a descriptor's final unterminated output when the file
    /// is rotated away or the descriptor is closed for good.
    pub fn take_fringe(&mut self) -> Option<Vec<u8>> {
        if self.fringe.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.fringe))
        }
    }

    /// The buffered partial line.
    pub fn fringe(&self) -> &[u8] {
        &self.fringe
    }

    /// Drop any buffered partial line.
    pub fn clear(&mut self) {
        self.fringe.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_lines_pass_through() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"a\nbb\n");
        assert_eq!(lines, vec![b"a\n".to_vec(), b"bb\n".to_vec()]);
        assert!(s.fringe().is_empty());
    }

    #[test]
    fn partial_tail_is_held_back() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"a\npart");
        assert_eq!(lines, vec![b"a\n".to_vec()]);
        assert_eq!(s.fringe(), b"part");
    }

    #[test]
    fn fringe_is_prepended_to_next_read() {
        let mut s = LineSplitter::new();
        assert!(s.push(b"hel").is_empty());
        let lines = s.push(b"lo\nnext");
        assert_eq!(lines, vec![b"hello\n".to_vec()]);
        assert_eq!(s.fringe(), b"next");
    }

    #[test]
    fn chunk_with_no_newline_emits_nothing() {
        let mut s = LineSplitter::new();
        assert!(s.push(b"abc").is_empty());
        assert!(s.push(b"def").is_empty());
        assert_eq!(s.fringe(), b"abcdef");
    }

    #[test]
    fn every_split_point_yields_the_same_single_line() {
        // A line arriving in two reads must come out once and intact no
        // matter where the boundary fell, including right before the newline.
        let record = b"one delivered record\n";
        for cut in 0..record.len() {
            let mut s = LineSplitter::new();
            let mut out = s.push(&record[..cut]);
            out.extend(s.push(&record[cut..]));
            assert_eq!(out, vec![record.to_vec()], "split at {cut}");
            assert!(s.fringe().is_empty(), "split at {cut}");
        }
    }

    #[test]
    fn take_fringe_empties_the_splitter() {
        let mut s = LineSplitter::new();
        s.push(b"dangling");
        assert_eq!(s.take_fringe(), Some(b"dangling".to_vec()));
        assert_eq!(s.take_fringe(), None);
    }

    #[test]
    fn consecutive_newlines_produce_empty_lines() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"\n\nx\n");
        assert_eq!(
            lines,
            vec![b"\n".to_vec(), b"\n".to_vec(), b"x\n".to_vec()]
        );
    }
}
