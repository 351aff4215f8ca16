use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_stream::StreamExt;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};

/// Decodes a byte stream into UTF-8 chunks without splitting a character
/// across two frames.
struct Utf8Codec;

impl Decoder for Utf8Codec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match std::str::from_utf8(&src[..]) {
            Ok(s) => {
                let out = s.to_owned();
                src.clear();
                Ok(Some(out))
            }
            Err(e) if e.error_len().is_none() => {
                // incomplete trailing sequence, wait for more bytes
                let valid = e.valid_up_to();

                if valid == 0 {
                    return Ok(None);
                }

                let out = String::from_utf8_lossy(&src[..valid]).into_owned();
                src.advance(valid);
                Ok(Some(out))
            }
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        }
    }
}

/// Drain `io` to end-of-stream as UTF-8 text.
///
/// Fails with `InvalidData` on malformed input, including a truncated
/// character at end-of-stream.
pub async fn read_stream_to_string<R: AsyncRead + Unpin>(io: &mut R) -> std::io::Result<String> {
    let mut frames = FramedRead::with_capacity(io, Utf8Codec, 1024);
    let mut out = String::new();
    while let Some(frame) = frames.next().await {
        out.push_str(&frame?);
    }
    Ok(out)
}

/// Drain `io` to end-of-stream, keeping the exact bytes
pub async fn read_stream_to_end<R: AsyncRead + Unpin>(io: &mut R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    io.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// `read_stream_to_end` on an optional pipe; an absent pipe reads as empty
pub async fn drain_optional<R: AsyncRead + Unpin>(io: Option<R>) -> std::io::Result<Vec<u8>> {
    match io {
        Some(mut reader) => read_stream_to_end(&mut reader).await,
        None => Ok(Vec::new()),
    }
}
