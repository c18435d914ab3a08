//! Chunked byte streams for partial reads and incremental decryption.
//!
//! A stream is any iterator of `Result<Vec<u8>>` chunks. The adapters in
//! [`ChunkStreamExt`] compose into the read path of an entry:
//!
//! ```text
//! ReadChunks -> slice(aligned range) -> rechunk(unit) -> cipher(run) -> slice(sub-range)
//! ```
//!
//! Chunk boundaries carry no meaning: every adapter works on the logical
//! concatenation of the chunks it receives.

use std::io::{self, Read};
use std::mem;
use std::ops::Range;

use crate::error::Result;

/// Chunk size used when pulling from a reader.
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Chunks pulled from a [`Read`].
pub struct ReadChunks<R> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ReadChunks<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl<R: Read> Iterator for ReadChunks<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Some(Ok(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Emits the bytes of `[start, end)` and stops pulling once `end` is reached.
pub struct RangeSlicer<I> {
    inner: I,
    start: u64,
    end: u64,
    offset: u64,
    finished: bool,
}

impl<I> RangeSlicer<I> {
    pub fn new(inner: I, range: Range<u64>) -> Self {
        Self {
            inner,
            finished: range.start >= range.end,
            start: range.start,
            end: range.end,
            offset: 0,
        }
    }
}

impl<I: Iterator<Item = Result<Vec<u8>>>> Iterator for RangeSlicer<I> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.offset >= self.end {
                self.finished = true;
                break;
            }
            let mut chunk = match self.inner.next()? {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let chunk_start = self.offset;
            let chunk_end = chunk_start + chunk.len() as u64;
            self.offset = chunk_end;
            if chunk_end <= self.start {
                continue;
            }

            let lo = self.start.saturating_sub(chunk_start) as usize;
            let hi = (self.end.min(chunk_end) - chunk_start) as usize;
            if lo >= hi {
                continue;
            }
            chunk.truncate(hi);
            chunk.drain(..lo);
            return Some(Ok(chunk));
        }
        None
    }
}

/// Regroups chunks into units of exactly `size` bytes; the last may be short.
pub struct Rechunk<I> {
    inner: I,
    size: usize,
    pending: Vec<u8>,
    exhausted: bool,
}

impl<I> Rechunk<I> {
    pub fn new(inner: I, size: usize) -> Self {
        Self {
            inner,
            size: size.max(1),
            pending: Vec::new(),
            exhausted: false,
        }
    }
}

impl<I: Iterator<Item = Result<Vec<u8>>>> Iterator for Rechunk<I> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.len() < self.size && !self.exhausted {
            match self.inner.next() {
                Some(Ok(chunk)) => self.pending.extend_from_slice(&chunk),
                Some(Err(e)) => return Some(Err(e)),
                None => self.exhausted = true,
            }
        }

        if self.pending.is_empty() {
            return None;
        }
        if self.pending.len() > self.size {
            let rest = self.pending.split_off(self.size);
            return Some(Ok(mem::replace(&mut self.pending, rest)));
        }
        Some(Ok(mem::take(&mut self.pending)))
    }
}

/// Applies a fallible transform to every unit.
pub struct CipherStage<I, F> {
    inner: I,
    transform: F,
}

impl<I, F> Iterator for CipherStage<I, F>
where
    I: Iterator<Item = Result<Vec<u8>>>,
    F: FnMut(Vec<u8>) -> Result<Vec<u8>>,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = self.inner.next()?;
        Some(unit.and_then(&mut self.transform))
    }
}

/// Adapter methods for chunk streams.
pub trait ChunkStreamExt: Iterator<Item = Result<Vec<u8>>> + Sized {
    fn slice(self, range: Range<u64>) -> RangeSlicer<Self> {
        RangeSlicer::new(self, range)
    }

    fn rechunk(self, size: usize) -> Rechunk<Self> {
        Rechunk::new(self, size)
    }

    fn cipher<F>(self, transform: F) -> CipherStage<Self, F>
    where
        F: FnMut(Vec<u8>) -> Result<Vec<u8>>,
    {
        CipherStage {
            inner: self,
            transform,
        }
    }

    /// Concatenate the stream, failing on the first error.
    fn concat(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in self {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl<I: Iterator<Item = Result<Vec<u8>>>> ChunkStreamExt for I {}

/// Widen `range` outwards to multiples of `unit`.
pub fn align_range(range: &Range<u64>, unit: u64) -> Range<u64> {
    let unit = unit.max(1);
    let start = range.start / unit * unit;
    let end = range.end.div_ceil(unit).saturating_mul(unit);
    start..end.max(start)
}

/// Slice an in-memory buffer with the same clamping rules as [`RangeSlicer`].
pub fn slice_buffer(mut data: Vec<u8>, range: &Range<u64>) -> Vec<u8> {
    let len = data.len() as u64;
    let end = range.end.min(len) as usize;
    let start = range.start.min(end as u64) as usize;
    data.truncate(end);
    data.drain(..start);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn chunks(data: &[u8], size: usize) -> impl Iterator<Item = Result<Vec<u8>>> + '_ {
        data.chunks(size).map(|c| Ok(c.to_vec()))
    }

    #[test]
    fn test_slicer_splits_straddling_chunks() {
        let data = b"abcdefghij";
        let out = chunks(data, 3).slice(2..8).concat().unwrap();
        assert_eq!(out, b"cdefgh");
    }

    #[test]
    fn test_slicer_clamps_end_to_length() {
        let out = chunks(b"abc", 2).slice(1..100).concat().unwrap();
        assert_eq!(out, b"bc");
        assert!(chunks(b"abc", 2).slice(5..9).concat().unwrap().is_empty());
        assert!(chunks(b"abc", 2).slice(2..2).concat().unwrap().is_empty());
    }

    #[test]
    fn test_slicer_stops_pulling_after_end() {
        let pulls = Cell::new(0usize);
        let endless = std::iter::repeat_with(|| {
            pulls.set(pulls.get() + 1);
            Ok(vec![7u8; 4])
        });
        let out = endless.slice(3..9).concat().unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn test_rechunk_produces_fixed_units() {
        let units: Vec<_> = chunks(b"abcdefghij", 3)
            .rechunk(4)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(units, vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
    }

    #[test]
    fn test_cipher_stage_applies_per_unit() {
        let out = chunks(b"abcdef", 1)
            .rechunk(2)
            .cipher(|mut unit| {
                unit.reverse();
                Ok(unit)
            })
            .concat()
            .unwrap();
        assert_eq!(out, b"badcfe");
    }

    #[test]
    fn test_errors_propagate_and_stop() {
        let failing = vec![
            Ok(b"ab".to_vec()),
            Err(crate::Error::NoSuchFile("x".into())),
            Ok(b"cd".to_vec()),
        ];
        assert!(failing.into_iter().slice(0..10).concat().is_err());
    }

    #[test]
    fn test_read_chunks_reads_everything() {
        let data = vec![5u8; 10_000];
        let out = ReadChunks::new(&data[..], 4096).concat().unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_align_range() {
        assert_eq!(align_range(&(5..20), 16), 0..32);
        assert_eq!(align_range(&(16..32), 16), 16..32);
        assert_eq!(align_range(&(0..0), 16), 0..0);
    }

    #[test]
    fn test_slice_buffer() {
        assert_eq!(slice_buffer(b"abcdef".to_vec(), &(1..4)), b"bcd");
        assert_eq!(slice_buffer(b"abc".to_vec(), &(2..10)), b"c");
        assert!(slice_buffer(b"abc".to_vec(), &(7..10)).is_empty());
    }
}
