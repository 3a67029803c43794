//! # Time Sync Packets
//!
//! The only packets exchanged by clock reconciliation.
//!
//! ```text
//! CLIENT                                   AUTHORITY
//!   │ t0 ── TimeSyncRequest { t0 } ──────────►│ t1 (receive)
//!   │                                         │ t2 (send)
//!   │ t3 ◄── TimeSyncResponse { t0, t1, t2 } ─│
//! ```
//!
//! Both are fixed-size, `Copy`, and travel as little-endian `f64`s.

use bytemuck::{Pod, Zeroable};

use super::ProtocolError;

/// Client → authority. Size: 8 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TimeSyncRequest {
    /// Client clock when the request left.
    pub client_send_time: f64,
}

impl TimeSyncRequest {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Request stamped `client_send_time`.
    #[inline]
    #[must_use]
    pub const fn new(client_send_time: f64) -> Self {
        Self { client_send_time }
    }

    /// Little-endian wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.client_send_time.to_le_bytes()
    }

    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Wrong length or a non-finite timestamp.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let [t0] = read_f64s::<1>(bytes)?;
        require_finite("client_send_time", t0)?;
        Ok(Self::new(t0))
    }
}

/// Authority → client. Size: 24 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TimeSyncResponse {
    /// `client_send_time` of the request being answered.
    pub echoed_client_send_time: f64,
    /// Authority clock when the request arrived.
    pub server_receive_time: f64,
    /// Authority clock when the response left.
    pub server_send_time: f64,
}

impl TimeSyncResponse {
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;

    /// Little-endian wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.echoed_client_send_time.to_le_bytes());
        out[8..16].copy_from_slice(&self.server_receive_time.to_le_bytes());
        out[16..24].copy_from_slice(&self.server_send_time.to_le_bytes());
        out
    }

    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Wrong length or a non-finite timestamp.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let [echoed, receive, send] = read_f64s::<3>(bytes)?;
        require_finite("echoed_client_send_time", echoed)?;
        require_finite("server_receive_time", receive)?;
        require_finite("server_send_time", send)?;
        Ok(Self { echoed_client_send_time: echoed, server_receive_time: receive, server_send_time: send })
    }
}

const _: () = assert!(std::mem::size_of::<TimeSyncRequest>() == TimeSyncRequest::SIZE);
const _: () = assert!(std::mem::size_of::<TimeSyncResponse>() == TimeSyncResponse::SIZE);

fn read_f64s<const N: usize>(bytes: &[u8]) -> Result<[f64; N], ProtocolError> {
    if bytes.len() != N * 8 {
        return Err(ProtocolError::BadLength { expected: N * 8, actual: bytes.len() });
    }
    let mut out = [0.0; N];
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *value = f64::from_le_bytes(raw);
    }
    Ok(out)
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let request = TimeSyncRequest::new(1.5);
        let bytes = request.to_bytes();
        assert_eq!(bytes, 1.5f64.to_le_bytes());
        assert_eq!(TimeSyncRequest::from_bytes(&bytes), Ok(request));
    }

    #[test]
    fn test_response_field_order() {
        let response = TimeSyncResponse {
            echoed_client_send_time: 1.0,
            server_receive_time: 2.0,
            server_send_time: 3.0,
        };
        let bytes = response.to_bytes();
        assert_eq!(&bytes[8..16], &2.0f64.to_le_bytes());
        assert_eq!(TimeSyncResponse::from_bytes(&bytes), Ok(response));
    }

    #[test]
    fn test_rejects_bad_length() {
        assert_eq!(
            TimeSyncResponse::from_bytes(&[0u8; 16]),
            Err(ProtocolError::BadLength { expected: 24, actual: 16 })
        );
        assert!(TimeSyncRequest::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_rejects_nan() {
        let bytes = f64::NAN.to_le_bytes();
        assert_eq!(TimeSyncRequest::from_bytes(&bytes), Err(ProtocolError::NonFinite("client_send_time")));
    }

    #[test]
    fn test_pod_matches_wire_on_little_endian() {
        let response = TimeSyncResponse { echoed_client_send_time: 4.0, server_receive_time: 5.0, server_send_time: 6.0 };
        if cfg!(target_endian = "little") {
            assert_eq!(bytemuck::bytes_of(&response), &response.to_bytes()[..]);
        }
    }
}
