use core::fmt;
use core::ops::Deref;

use crate::MAX_PAYLOAD_WIDTH;

/// Bytes clocked out of the transceiver by a single command
///
/// Holds up to 32 bytes, already restored to their natural (MSB first) order.
#[derive(Clone, Copy)]
pub struct Payload {
    data: [u8; MAX_PAYLOAD_WIDTH],
    len: usize,
}

impl Payload {
    /// Copy `source` into a new payload, truncating at 32 bytes
    pub fn new(source: &[u8]) -> Self {
        let mut payload = Payload::default();
        payload.len = source.len().min(MAX_PAYLOAD_WIDTH);
        payload.data[..payload.len].copy_from_slice(&source[..payload.len]);
        payload
    }

    /// Copy the reversed wire bytes of `source`
    pub(crate) fn from_wire(source: &[u8]) -> Self {
        let mut payload = Payload::new(source);
        payload.data[..payload.len].reverse();
        payload
    }

    /// Number of bytes in the payload
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when no byte has been read
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload {
            data: [0; MAX_PAYLOAD_WIDTH],
            len: 0,
        }
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[0..self.len]
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Payload({:02X?})", &**self)
    }
}
