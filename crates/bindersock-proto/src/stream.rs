//! Framing over tokio async streams.
//!
//! Same wire format as [`crate::framer`]; use these when the control channel
//! is a tokio socket or pipe rather than a blocking descriptor.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    errors::{ProtocolError, Result},
    framer::{LENGTH_PREFIX_SIZE, check_length, payload_length},
    records::{decode_record, encode_record},
};

/// Write one frame and flush the stream.
pub async fn write_bytes_async<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let len = payload_length(payload)?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a string as one frame.
pub async fn write_string_async<W>(writer: &mut W, value: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_bytes_async(writer, value.as_bytes()).await
}

/// Serialize `record` with CBOR and write it as one frame.
pub async fn write_record_async<W, T>(writer: &mut W, record: &T) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let bytes = encode_record(record)?;
    write_bytes_async(writer, &bytes).await
}

/// Read one frame.
pub async fn read_bytes_async<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    read_full(reader, &mut prefix).await?;

    let len = check_length(u64::from_le_bytes(prefix))?;
    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload).await?;

    Ok(payload)
}

/// Read one frame and interpret it as UTF-8.
pub async fn read_string_async<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    Ok(String::from_utf8(read_bytes_async(reader).await?)?)
}

/// Read one frame and decode it as a CBOR record.
pub async fn read_record_async<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    let bytes = read_bytes_async(reader).await?;
    decode_record(&bytes)
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::FrameTruncated { expected: buf.len(), actual: filled });
        }
        filled += n;
    }
    Ok(())
}
