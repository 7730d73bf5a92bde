use futures::Stream;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::tracker::FrameReader;

/// Decodes the samples written by `intel_gpu_top -J` to `source`.
///
/// Records are decoded as they arrive, whatever framing layout the tool
/// uses. The stream ends when `source` does. The first record that fails to
/// decode is reported as an error, after which the stream ends as well:
/// there is no attempt to resynchronize.
pub fn read_samples<R>(source: R) -> impl Stream<Item = Result<Sample>>
where
    R: AsyncRead + Unpin,
{
    async_stream::stream! {
        let mut frames = FrameReader::new(source);

        loop {
            match frames.next_frame().await {
                Ok(Some(frame)) => {
                    if frame.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }

                    match serde_json::from_slice::<Sample>(&frame) {
                        Ok(sample) => yield Ok(sample),
                        Err(e) => {
                            yield Err(Error::Decode(e));
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Dialect, SINGLE_PAYLOAD, fake_server, render};

    use std::time::Duration;

    use futures::{StreamExt, pin_mut};
    use pretty_assertions::assert_eq;

    async fn collect<R>(source: R) -> (Vec<Sample>, Option<Error>)
    where
        R: AsyncRead + Unpin,
    {
        let stream = read_samples(source);
        pin_mut!(stream);

        let mut samples = Vec::new();
        while let Some(result) = stream.next().await {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    assert!(stream.next().await.is_none(), "stream continued after error");
                    return (samples, Some(e));
                }
            }
        }

        (samples, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_samples_for_each_dialect() {
        let want: Sample = serde_json::from_str(SINGLE_PAYLOAD).unwrap();

        for dialect in Dialect::ALL {
            let source = fake_server(SINGLE_PAYLOAD, 5, dialect, Duration::from_millis(50));
            let (samples, error) = collect(source).await;

            assert!(error.is_none(), "dialect {dialect:?}: {error:?}");
            assert_eq!(samples.len(), 5, "dialect {dialect:?}");
            assert!(samples.iter().all(|sample| *sample == want));
        }
    }

    #[tokio::test]
    async fn test_read_samples_byte_at_a_time() {
        for dialect in Dialect::ALL {
            let input = render(SINGLE_PAYLOAD, 2, dialect);

            let mut builder = tokio_test::io::Builder::new();
            for byte in &input {
                builder.read(std::slice::from_ref(byte));
            }

            let (byte_samples, error) = collect(builder.build()).await;
            assert!(error.is_none());

            let (whole_samples, error) = collect(&input[..]).await;
            assert!(error.is_none());

            assert_eq!(byte_samples.len(), 2);
            assert_eq!(byte_samples, whole_samples);
        }
    }

    #[tokio::test]
    async fn test_decode_failure_ends_stream() {
        let input = format!("{SINGLE_PAYLOAD}\n{{\"power\": \"lots\"}}\n{SINGLE_PAYLOAD}");
        let (samples, error) = collect(input.as_bytes()).await;

        assert_eq!(samples.len(), 1);
        assert!(matches!(error, Some(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_root_level_garbage_is_a_decode_failure() {
        let (samples, error) = collect(&b"{}\nnot json"[..]).await;

        assert_eq!(samples, vec![Sample::default()]);
        assert!(matches!(error, Some(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_truncated_output_is_not_an_error() {
        let input = format!("[\n{SINGLE_PAYLOAD},\n{{\"engines\": {{");
        let (samples, error) = collect(input.as_bytes()).await;

        assert_eq!(samples.len(), 1);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (samples, error) = collect(&b""[..]).await;

        assert!(samples.is_empty());
        assert!(error.is_none());
    }
}
