//! Splits an input byte stream into offset-identified segments.
//!
//! A [`Segment`]'s sequence id is the byte offset of its first payload byte
//! within the original stream, never a packet index.  Both sender variants
//! rely on this so that a cumulative ack offset can be compared directly
//! against segment ids.

use crate::error::{Result, TransferError};
use crate::packet::FrameCodec;

/// One chunk of the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Byte offset of `payload[0]` in the source stream.
    pub seq: i32,
    pub payload: &'a [u8],
}

impl Segment<'_> {
    /// Offset of the first byte *after* this segment.
    pub fn end(&self) -> i32 {
        // Segmenter::new guarantees the whole stream fits in i32.
        self.seq + self.payload.len() as i32
    }
}

/// Borrowed view of a stream plus the chunk size to cut it into.
///
/// Iteration is lazy and can be restarted any number of times via
/// [`Segmenter::segments`].
#[derive(Debug, Clone, Copy)]
pub struct Segmenter<'a> {
    data: &'a [u8],
    max_payload: usize,
}

impl<'a> Segmenter<'a> {
    /// Rejects a zero `max_payload` and streams whose length cannot be
    /// expressed as an `i32` offset.
    pub fn new(data: &'a [u8], max_payload: usize) -> Result<Self> {
        if max_payload == 0 {
            return Err(TransferError::InvalidConfig(
                "max_payload must be at least 1".into(),
            ));
        }
        if i32::try_from(data.len()).is_err() {
            return Err(TransferError::StreamTooLarge(data.len()));
        }
        Ok(Self { data, max_payload })
    }

    /// Segment `data` for `codec`'s layout.
    ///
    /// Every offset up to and including the final sequence id must fit the
    /// codec's header, otherwise the stream is rejected before anything is
    /// sent.
    pub fn for_codec(data: &'a [u8], codec: &FrameCodec) -> Result<Self> {
        let segmenter = Self::new(data, codec.max_payload())?;
        if segmenter.final_seq() > codec.max_seq() {
            return Err(TransferError::StreamTooLarge(data.len()));
        }
        Ok(segmenter)
    }

    /// Fresh iterator starting at offset 0.
    pub fn segments(&self) -> Segments<'a> {
        Segments {
            data: self.data,
            max_payload: self.max_payload,
            offset: 0,
        }
    }

    /// Total stream length; the sequence id carried by termination frames.
    pub fn final_seq(&self) -> i32 {
        self.data.len() as i32
    }

    /// Number of segments the stream splits into.
    pub fn count(&self) -> usize {
        self.data.len().div_ceil(self.max_payload)
    }

    pub fn total_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Iterator over the segments of one stream, in increasing offset order.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    data: &'a [u8],
    max_payload: usize,
    offset: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.max_payload).min(self.data.len());
        let segment = Segment {
            seq: self.offset as i32,
            payload: &self.data[self.offset..end],
        };
        self.offset = end;
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.data.len() - self.offset).div_ceil(self.max_payload);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Segments<'_> {}
