//! Native messaging framing: a 4-byte native-endian length, then UTF-8 JSON.
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame the browser may send us.
pub const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;
/// Largest frame the browser accepts from a host.
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `value` into a frame payload that fits the outbound limit.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(value)?;
    if payload.len() > MAX_OUTBOUND_FRAME {
        return Err(WireError::TooLarge {
            len: payload.len(),
            limit: MAX_OUTBOUND_FRAME,
        });
    }
    Ok(payload)
}

/// Read one frame. `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(input: &mut R) -> Result<Option<Vec<u8>>, WireError> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = input.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended inside a frame header",
            )
            .into());
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INBOUND_FRAME {
        return Err(WireError::TooLarge {
            len,
            limit: MAX_INBOUND_FRAME,
        });
    }
    let mut body = vec![0u8; len];
    input.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    output: &mut W,
    payload: &[u8],
) -> Result<(), WireError> {
    if payload.len() > MAX_OUTBOUND_FRAME {
        return Err(WireError::TooLarge {
            len: payload.len(),
            limit: MAX_OUTBOUND_FRAME,
        });
    }
    let len = payload.len() as u32;
    output.write_all(&len.to_ne_bytes()).await?;
    output.write_all(payload).await?;
    output.flush().await?;
    Ok(())
}
