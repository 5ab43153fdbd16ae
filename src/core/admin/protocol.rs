// src/core/admin/protocol.rs

//! Wire encoding for the admin protocol: an opcode byte, an opcode-specific
//! request payload, a response prelude, then an opcode-specific response
//! payload. Unlike the client-facing protocol this crate's storage engines
//! speak, the admin channel embeds variable-length streams (opcodes 0x07 and
//! 0x08), so it is read and written directly against `AsyncRead`/`AsyncWrite`
//! rather than buffered through a `tokio_util::codec::Decoder`.

use super::opcodes::Opcode;
use crate::core::clock::VectorClock;
use crate::core::errors::RingError;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Sentinel length marking the end of a streamed sequence.
pub const STREAM_END: i32 = -1;

async fn write_utf8<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> Result<(), RingError> {
    let bytes = s.as_bytes();
    w.write_u16(bytes.len() as u16).await?;
    w.write_all(bytes).await?;
    Ok(())
}

async fn read_utf8<R: AsyncRead + Unpin>(r: &mut R) -> Result<String, RingError> {
    let len = r.read_u16().await? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(String::from_utf8(buf)?)
}

async fn write_blob<W: AsyncWrite + Unpin>(w: &mut W, data: &[u8]) -> Result<(), RingError> {
    w.write_i32(data.len() as i32).await?;
    w.write_all(data).await?;
    Ok(())
}

/// Reads an `(i32 len, bytes)` blob. A negative length is the stream-end
/// sentinel and yields `None`.
async fn read_blob<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<Bytes>, RingError> {
    let len = r.read_i32().await?;
    if len < 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).await?;
    Ok(Some(Bytes::from(buf)))
}

/// Packs a vector clock and the raw value it versions into the
/// `vectorClockSerialized ‖ value` wire representation used by
/// REDIRECT_GET and the partition stream opcodes.
pub fn pack_value_with_clock(clock: &VectorClock, value: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(clock.byte_len() + value.len());
    buf.extend_from_slice(&clock.to_bytes());
    buf.extend_from_slice(value);
    buf.freeze()
}

/// Splits a `vectorClockSerialized ‖ value` blob back into its clock and
/// raw value parts.
pub fn unpack_value_with_clock(mut data: Bytes) -> Result<(VectorClock, Bytes), RingError> {
    let clock = VectorClock::from_bytes(&mut data)?;
    Ok((clock, data))
}

/// A parsed admin request, opcode payload decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminRequest {
    UpdateClusterMetadata {
        metadata_key: String,
        cluster_xml: String,
    },
    UpdateStoresMetadata {
        stores_xml: String,
    },
    RebalancingServerMode,
    NormalServerMode,
    RestartServices,
    RedirectGet {
        store_name: String,
        key: Bytes,
    },
    /// The partition list follows; the caller reads the subsequent entry
    /// stream with [`read_stream_entry`].
    GetPartitionAsStream {
        store_name: String,
        partition_ids: Vec<u16>,
    },
    /// The entry stream follows in the same request; the caller reads it
    /// with [`read_stream_entry`] until the sentinel.
    PutPartitionAsStream {
        store_name: String,
    },
}

impl AdminRequest {
    pub fn opcode(&self) -> Opcode {
        match self {
            AdminRequest::UpdateClusterMetadata { .. } => Opcode::UpdateClusterMetadata,
            AdminRequest::UpdateStoresMetadata { .. } => Opcode::UpdateStoresMetadata,
            AdminRequest::RebalancingServerMode => Opcode::RebalancingServerMode,
            AdminRequest::NormalServerMode => Opcode::NormalServerMode,
            AdminRequest::RestartServices => Opcode::RestartServices,
            AdminRequest::RedirectGet { .. } => Opcode::RedirectGet,
            AdminRequest::GetPartitionAsStream { .. } => Opcode::GetPartitionAsStream,
            AdminRequest::PutPartitionAsStream { .. } => Opcode::PutPartitionAsStream,
        }
    }
}

/// Writes the opcode byte and request payload (not the streamed body, if any).
pub async fn write_request<W: AsyncWrite + Unpin>(
    w: &mut W,
    req: &AdminRequest,
) -> Result<(), RingError> {
    w.write_u8(req.opcode().as_u8()).await?;
    match req {
        AdminRequest::UpdateClusterMetadata {
            metadata_key,
            cluster_xml,
        } => {
            write_utf8(w, metadata_key).await?;
            write_utf8(w, cluster_xml).await?;
        }
        AdminRequest::UpdateStoresMetadata { stores_xml } => {
            write_utf8(w, stores_xml).await?;
        }
        AdminRequest::RebalancingServerMode
        | AdminRequest::NormalServerMode
        | AdminRequest::RestartServices => {}
        AdminRequest::RedirectGet { store_name, key } => {
            write_utf8(w, store_name).await?;
            write_blob(w, key).await?;
        }
        AdminRequest::GetPartitionAsStream {
            store_name,
            partition_ids,
        } => {
            write_utf8(w, store_name).await?;
            w.write_i32(partition_ids.len() as i32).await?;
            for id in partition_ids {
                w.write_i32(*id as i32).await?;
            }
        }
        AdminRequest::PutPartitionAsStream { store_name } => {
            write_utf8(w, store_name).await?;
        }
    }
    Ok(())
}

/// Reads the opcode byte and request payload. For the streaming opcodes,
/// the entry stream itself is read separately via [`read_stream_entry`].
pub async fn read_request<R: AsyncRead + Unpin>(r: &mut R) -> Result<AdminRequest, RingError> {
    let opcode = Opcode::try_from(r.read_u8().await?)?;
    Ok(match opcode {
        Opcode::UpdateClusterMetadata => AdminRequest::UpdateClusterMetadata {
            metadata_key: read_utf8(r).await?,
            cluster_xml: read_utf8(r).await?,
        },
        Opcode::UpdateStoresMetadata => AdminRequest::UpdateStoresMetadata {
            stores_xml: read_utf8(r).await?,
        },
        Opcode::RebalancingServerMode => AdminRequest::RebalancingServerMode,
        Opcode::NormalServerMode => AdminRequest::NormalServerMode,
        Opcode::RestartServices => AdminRequest::RestartServices,
        Opcode::RedirectGet => {
            let store_name = read_utf8(r).await?;
            let key = read_blob(r)
                .await?
                .ok_or_else(|| RingError::InvalidRequest("REDIRECT_GET: missing key".into()))?;
            AdminRequest::RedirectGet { store_name, key }
        }
        Opcode::GetPartitionAsStream => {
            let store_name = read_utf8(r).await?;
            let n = r.read_i32().await?;
            if n < 0 {
                return Err(RingError::InvalidRequest(
                    "GET_PARTITION_AS_STREAM: negative partition count".into(),
                ));
            }
            let mut partition_ids = Vec::with_capacity(n as usize);
            for _ in 0..n {
                partition_ids.push(r.read_i32().await? as u16);
            }
            AdminRequest::GetPartitionAsStream {
                store_name,
                partition_ids,
            }
        }
        Opcode::PutPartitionAsStream => AdminRequest::PutPartitionAsStream {
            store_name: read_utf8(r).await?,
        },
    })
}

/// The `{ retCode, errorMessage? }` prelude every response starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePrelude {
    pub ret_code: i16,
    pub error_message: Option<String>,
}

impl ResponsePrelude {
    pub fn ok() -> Self {
        Self {
            ret_code: 0,
            error_message: None,
        }
    }

    pub fn from_error(err: &RingError) -> Self {
        Self {
            ret_code: err.short_code(),
            error_message: Some(err.to_string()),
        }
    }

    pub fn into_result(self) -> Result<(), RingError> {
        if self.ret_code == 0 {
            Ok(())
        } else {
            Err(RingError::from_wire(
                self.ret_code,
                self.error_message.as_deref().unwrap_or(""),
            ))
        }
    }
}

pub async fn write_prelude<W: AsyncWrite + Unpin>(
    w: &mut W,
    prelude: &ResponsePrelude,
) -> Result<(), RingError> {
    w.write_i16(prelude.ret_code).await?;
    if prelude.ret_code != 0 {
        write_utf8(w, prelude.error_message.as_deref().unwrap_or("")).await?;
    }
    Ok(())
}

pub async fn read_prelude<R: AsyncRead + Unpin>(r: &mut R) -> Result<ResponsePrelude, RingError> {
    let ret_code = r.read_i16().await?;
    let error_message = if ret_code != 0 {
        Some(read_utf8(r).await?)
    } else {
        None
    };
    Ok(ResponsePrelude {
        ret_code,
        error_message,
    })
}

/// One `(key, valueWithClock)` entry in a REDIRECT_GET response or a
/// partition stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub key: Bytes,
    pub value_with_clock: Bytes,
}

/// Writes one stream entry. Callers must finish a stream with
/// [`write_stream_end`].
pub async fn write_stream_entry<W: AsyncWrite + Unpin>(
    w: &mut W,
    entry: &StreamEntry,
) -> Result<(), RingError> {
    write_blob(w, &entry.key).await?;
    write_blob(w, &entry.value_with_clock).await?;
    Ok(())
}

pub async fn write_stream_end<W: AsyncWrite + Unpin>(w: &mut W) -> Result<(), RingError> {
    w.write_i32(STREAM_END).await?;
    Ok(())
}

/// Reads one stream entry, or `None` at the sentinel.
pub async fn read_stream_entry<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<Option<StreamEntry>, RingError> {
    let Some(key) = read_blob(r).await? else {
        return Ok(None);
    };
    let value_with_clock = read_blob(r)
        .await?
        .ok_or_else(|| RingError::InvalidRequest("stream entry missing value".into()))?;
    Ok(Some(StreamEntry {
        key,
        value_with_clock,
    }))
}

/// Reads the `i32 n` count plus `n` redirect-get entries (no sentinel).
pub async fn read_redirect_get_response<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<Vec<Bytes>, RingError> {
    let n = r.read_i32().await?;
    if n < 0 {
        return Err(RingError::InvalidRequest(
            "REDIRECT_GET: negative entry count".into(),
        ));
    }
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let data = read_blob(r)
            .await?
            .ok_or_else(|| RingError::InvalidRequest("REDIRECT_GET: truncated entry".into()))?;
        out.push(data);
    }
    Ok(out)
}

pub async fn write_redirect_get_response<W: AsyncWrite + Unpin>(
    w: &mut W,
    entries: &[Bytes],
) -> Result<(), RingError> {
    w.write_i32(entries.len() as i32).await?;
    for entry in entries {
        write_blob(w, entry).await?;
    }
    Ok(())
}
