// src/tail/seed.rs

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

/// Default number of trailing lines replayed per file at attach time.
///
/// Watched files are assumed to grow rapidly; a couple dozen lines is enough
/// context without flooding the sink on startup.
pub const DEFAULT_LINE_GUESS: usize = 20;

/// Block size for both seed scans.
const SEED_BLOCK: usize = 8192;

/// Compute the offset at which replaying the last `n_lines` lines starts.
///
/// Scans backward from end-of-file in fixed-size blocks counting newlines,
/// holding one block in memory at a time. An unterminated final line counts
/// as one line. Returns 0 when the file holds fewer than `n_lines` lines.
///
/// The first read covers the (possibly short) tail of the file so that every
/// following read lands on a block boundary.
pub fn seek_start_offset<R: Read + Seek>(reader: &mut R, n_lines: usize) -> io::Result<u64> {
    let end = reader.seek(SeekFrom::End(0))?;
    if end == 0 {
        return Ok(0);
    }
    if n_lines == 0 {
        return Ok(end);
    }

    let mut buf = vec![0u8; SEED_BLOCK];

    let mut len = (end % SEED_BLOCK as u64) as usize;
    if len == 0 {
        len = SEED_BLOCK;
    }
    let mut pos = end - len as u64;
    reader.seek(SeekFrom::Start(pos))?;
    reader.read_exact(&mut buf[..len])?;

    // A file that does not end in a newline still ends in a line.
    let mut needed = if buf[len - 1] == b'\n' {
        n_lines + 1
    } else {
        n_lines
    };

    loop {
        for i in (0..len).rev() {
            if buf[i] == b'\n' {
                needed -= 1;
                if needed == 0 {
                    return Ok(pos + i as u64 + 1);
                }
            }
        }

        if pos == 0 {
            // Fewer lines than asked for: replay the whole file.
            return Ok(0);
        }

        pos -= SEED_BLOCK as u64;
        len = SEED_BLOCK;
        reader.seek(SeekFrom::Start(pos))?;
        reader.read_exact(&mut buf[..len])?;
    }
}

/// Result of seeding an unseekable source.
#[derive(Debug)]
pub struct PipeTail {
    /// The bytes making up the last `n_lines` lines (possibly unterminated).
    pub tail: Vec<u8>,
    /// Total bytes consumed from the source during the scan.
    pub bytes_consumed: u64,
}

/// One link in the bounded buffer chain.
struct LineBuf {
    bytes: Vec<u8>,
    nlines: usize,
}

/// Seed a non-seekable source (pipe, FIFO) by reading it forward.
///
/// Bytes are read into a chain of fixed-size buffers with per-buffer newline
/// counts; the oldest buffer is retired as soon as the buffers behind it
/// still hold at least `n_lines` lines. Memory therefore stays bounded by
/// the requested line count, not by the stream length. Small reads are
/// coalesced into the newest buffer.
///
/// The scan ends at EOF or on a `WouldBlock` read (a non-blocking FIFO with
/// no writer). Any other read error aborts the scan.
pub fn pipe_tail<R: Read>(reader: &mut R, n_lines: usize) -> io::Result<PipeTail> {
    let mut chain: VecDeque<LineBuf> = VecDeque::new();
    chain.push_back(LineBuf {
        bytes: Vec::new(),
        nlines: 0,
    });

    let mut total_lines = 0usize;
    let mut consumed = 0u64;
    let mut scratch = [0u8; SEED_BLOCK];

    loop {
        let n = match reader.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        };
        consumed += n as u64;

        let fresh = &scratch[..n];
        let nlines = fresh.iter().filter(|&&b| b == b'\n').count();
        total_lines += nlines;

        let coalesce = chain
            .back()
            .is_some_and(|last| last.bytes.len() + n < SEED_BLOCK);
        if coalesce {
            if let Some(last) = chain.back_mut() {
                last.bytes.extend_from_slice(fresh);
                last.nlines += nlines;
            }
        } else {
            chain.push_back(LineBuf {
                bytes: fresh.to_vec(),
                nlines,
            });
            // Retire leading buffers no longer needed to cover n_lines.
            total_lines = retire_leading(&mut chain, total_lines, n_lines);
        }
    }

    if n_lines == 0 || chain.iter().all(|b| b.bytes.is_empty()) {
        return Ok(PipeTail {
            tail: Vec::new(),
            bytes_consumed: consumed,
        });
    }

    // Count the unterminated final line, if any.
    if let Some(last) = chain.back_mut() {
        if last.bytes.last().is_some_and(|&b| b != b'\n') {
            last.nlines += 1;
            total_lines += 1;
        }
    }

    // Skip whole buffers that only hold lines older than the window.
    total_lines = retire_leading(&mut chain, total_lines, n_lines);

    // Skip past surplus lines inside the first retained buffer.
    let Some(front) = chain.front() else {
        return Ok(PipeTail {
            tail: Vec::new(),
            bytes_consumed: consumed,
        });
    };
    let mut beg = 0usize;
    if total_lines > n_lines {
        let mut skip = total_lines - n_lines;
        while skip > 0 {
            match front.bytes[beg..].iter().position(|&b| b == b'\n') {
                Some(i) => beg += i + 1,
                None => break,
            }
            skip -= 1;
        }
    }

    let mut tail = front.bytes[beg..].to_vec();
    for buf in chain.iter().skip(1) {
        tail.extend_from_slice(&buf.bytes);
    }

    Ok(PipeTail {
        tail,
        bytes_consumed: consumed,
    })
}

/// Drop leading buffers while the ones behind them still cover `n_lines`.
/// Returns the line count over the remaining chain.
fn retire_leading(chain: &mut VecDeque<LineBuf>, mut total_lines: usize, n_lines: usize) -> usize {
    while chain.len() > 1 {
        let front_lines = chain.front().map_or(0, |b| b.nlines);
        if total_lines - front_lines <= n_lines {
            break;
        }
        chain.pop_front();
        total_lines -= front_lines;
    }
    total_lines
}
