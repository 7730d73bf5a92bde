use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Size of the reads issued against the underlying stream.
const READ_CHUNK_SIZE: usize = 512;

/// Recovers JSON object boundaries from `intel_gpu_top` output.
///
/// The normalizer only tracks string and brace balance, so it does not need
/// to understand the records themselves. At root level the array framing
/// (`[`, `]` and `,`) is dropped, which turns all three output layouts into
/// a sequence of bare objects. Everything else at root level, such as the
/// newlines between records, is passed through as its own frame.
#[derive(Debug, Default)]
pub struct FrameNormalizer {
    buffer: BytesMut,
    depth: usize,
    in_string: bool,
    escape_next: bool,
}

impl FrameNormalizer {
    /// Creates a normalizer with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one byte, returning a frame once it is complete.
    pub fn process(&mut self, byte: u8) -> Option<Bytes> {
        if self.at_root_level() && matches!(byte, b'[' | b']' | b',') {
            return None;
        }

        self.buffer.put_u8(byte);

        if self.in_string {
            if self.escape_next {
                self.escape_next = false;
            } else if byte == b'\\' {
                self.escape_next = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
        } else {
            match byte {
                b'{' => self.depth += 1,
                // A stray closing brace stays in the frame for the decoder to reject.
                b'}' => self.depth = self.depth.saturating_sub(1),
                b'"' => self.in_string = true,
                _ => {}
            }
        }

        self.complete_frame()
    }

    /// Processes a chunk of bytes, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        chunk.iter().filter_map(|&byte| self.process(byte)).collect()
    }

    /// Returns the number of bytes buffered for the frame being assembled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    const fn at_root_level(&self) -> bool {
        self.depth == 0 && !self.in_string
    }

    fn complete_frame(&mut self) -> Option<Bytes> {
        if self.at_root_level() && !self.buffer.is_empty() {
            Some(self.buffer.split().freeze())
        } else {
            None
        }
    }
}

/// Reads frames from a stream through a [`FrameNormalizer`].
pub struct FrameReader<R> {
    source: R,
    normalizer: FrameNormalizer,
    frames: VecDeque<Bytes>,
    chunk: [u8; READ_CHUNK_SIZE],
    eof: bool,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a reader over `source`.
    pub fn new(source: R) -> Self {
        Self {
            source,
            normalizer: FrameNormalizer::new(),
            frames: VecDeque::new(),
            chunk: [0; READ_CHUNK_SIZE],
            eof: false,
        }
    }

    /// Returns the next complete frame, or `None` once the stream has ended.
    ///
    /// An object that is still incomplete when the stream ends is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the underlying stream fails.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return Ok(Some(frame));
            }

            if self.eof {
                return Ok(None);
            }

            let read = self
                .source
                .read(&mut self.chunk)
                .await
                .map_err(|e| Error::Io("failed to read gpu top output", e))?;

            if read == 0 {
                self.eof = true;

                if self.normalizer.pending() > 0 {
                    debug!(
                        "dropping {} bytes of incomplete output at end of stream",
                        self.normalizer.pending()
                    );
                }

                continue;
            }

            let frames = self.normalizer.feed(&self.chunk[..read]);
            self.frames.extend(frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Dialect, SINGLE_PAYLOAD, render};

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn non_blank(frames: Vec<Bytes>) -> Vec<Bytes> {
        frames
            .into_iter()
            .filter(|frame| !frame.iter().all(u8::is_ascii_whitespace))
            .collect()
    }

    #[test]
    fn test_tracker_sequence() {
        // (input, expected frame) fed into one normalizer in order
        let steps: &[(&str, Option<&str>)] = &[
            (r#"{ "foo": "bar" "#, None),
            ("}", Some(r#"{ "foo": "bar" }"#)),
            (r#"{ "foo": "bar" }"#, Some(r#"{ "foo": "bar" }"#)),
            (r#"{ "foo": "bar"#, None),
            (r#"" }"#, Some(r#"{ "foo": "bar" }"#)),
            (r#"{ "foo": "\"bar\"" }"#, Some(r#"{ "foo": "\"bar\"" }"#)),
        ];

        let mut normalizer = FrameNormalizer::new();
        for (input, want) in steps {
            let frames = normalizer.feed(input.as_bytes());
            match want {
                Some(want) => {
                    assert_eq!(frames.len(), 1, "input {input:?}");
                    assert_eq!(&frames[0][..], want.as_bytes());
                }
                None => assert!(frames.is_empty(), "input {input:?}"),
            }
        }
        assert_eq!(normalizer.pending(), 0);
    }

    #[test]
    fn test_framing_inside_strings_is_kept() {
        let mut normalizer = FrameNormalizer::new();
        let frames = normalizer.feed(br#"[{"name": "a,[b]{c}"},{"name": "\\"}]"#);

        assert_eq!(
            frames,
            vec![
                Bytes::from_static(br#"{"name": "a,[b]{c}"}"#),
                Bytes::from_static(br#"{"name": "\\"}"#),
            ]
        );
    }

    #[test]
    fn test_nested_objects() {
        let mut normalizer = FrameNormalizer::new();
        let frames = normalizer.feed(br#"{"a": {"b": {"c": [1, 2]}}}"#);

        assert_eq!(frames, vec![Bytes::from_static(br#"{"a": {"b": {"c": [1, 2]}}}"#)]);
    }

    #[test]
    fn test_root_whitespace_is_its_own_frame() {
        let mut normalizer = FrameNormalizer::new();
        let frames = normalizer.feed(b"\n{}\n");

        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"\n"),
                Bytes::from_static(b"{}"),
                Bytes::from_static(b"\n"),
            ]
        );
    }

    #[test]
    fn test_stray_closing_brace_does_not_underflow() {
        let mut normalizer = FrameNormalizer::new();

        assert_eq!(normalizer.feed(b"}"), vec![Bytes::from_static(b"}")]);
        assert_eq!(normalizer.feed(b"{}"), vec![Bytes::from_static(b"{}")]);
    }

    #[test]
    fn test_incomplete_object_stays_pending() {
        let mut normalizer = FrameNormalizer::new();

        assert!(normalizer.feed(br#"{"a": {"b": 1}"#).is_empty());
        assert_eq!(normalizer.pending(), 14);
    }

    #[test]
    fn test_dialects_produce_identical_frames() {
        let want = non_blank(FrameNormalizer::new().feed(&render(SINGLE_PAYLOAD, 3, Dialect::Bare)));
        assert_eq!(want.len(), 3);

        for dialect in Dialect::ALL {
            let got = non_blank(FrameNormalizer::new().feed(&render(SINGLE_PAYLOAD, 3, dialect)));
            assert_eq!(got, want, "dialect {dialect:?}");
        }
    }

    #[tokio::test]
    async fn test_frame_reader_across_chunk_boundaries() {
        let mock = tokio_test::io::Builder::new()
            .read(b"[\n{\"a\"")
            .read(b": \"}\"")
            .read(b"},\n{\"b\": 1")
            .read(b"}\n]\n")
            .build();

        let mut reader = FrameReader::new(mock);
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().await.unwrap() {
            frames.push(frame);
        }

        assert_eq!(
            non_blank(frames),
            vec![
                Bytes::from_static(br#"{"a": "}"}"#),
                Bytes::from_static(br#"{"b": 1}"#),
            ]
        );
    }

    #[tokio::test]
    async fn test_frame_reader_drops_partial_object_at_eof() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"a\": 1}{\"b\": ")
            .build();

        let mut reader = FrameReader::new(mock);

        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(Bytes::from_static(br#"{"a": 1}"#))
        );
        assert_eq!(reader.next_frame().await.unwrap(), None);
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_frame_reader_surfaces_io_errors() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::other("pipe broke"))
            .build();

        let mut reader = FrameReader::new(mock);

        assert!(matches!(reader.next_frame().await, Err(Error::Io(_, _))));
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_frames(
            dialect in prop::sample::select(Dialect::ALL.to_vec()),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..32),
        ) {
            let input = render(SINGLE_PAYLOAD, 3, dialect);
            let want = FrameNormalizer::new().feed(&input);

            let mut offsets: Vec<usize> = cuts.iter().map(|cut| cut.index(input.len())).collect();
            offsets.push(input.len());
            offsets.sort_unstable();

            let mut normalizer = FrameNormalizer::new();
            let mut got = Vec::new();
            let mut start = 0;
            for end in offsets {
                got.extend(normalizer.feed(&input[start..end]));
                start = end;
            }

            prop_assert_eq!(got, want);
        }
    }
}
