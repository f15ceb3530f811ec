//! Broadcast buffer and channel tag types
//!
//! A `Buffer` is one sample or frame as pushed by a producer. It is shared by
//! every consumer queue that still holds it.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// Process-unique identity of one consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerKey(pub(crate) u64);

impl ConsumerKey {
    /// Raw numeric value of the key
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Acquisition channels of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    /// Doppler ultrasound (fetal heart rate)
    Ultrasound,
    /// Uterine activity
    Tocography,
    /// Pulse oximetry
    Oximetry,
}

impl DataType {
    /// All channel tags, in declaration order
    pub const ALL: [DataType; 3] = [DataType::Ultrasound, DataType::Tocography, DataType::Oximetry];

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Ultrasound => "us",
            DataType::Tocography => "toco",
            DataType::Oximetry => "spo2",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable payload shared between consumer queues
///
/// Cloning is cheap: the inner `Bytes` is reference counted, so every queue
/// that holds the buffer points at the same allocation. The allocation is
/// released once the last queue has popped or discarded it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// Wrap bytes into a buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Copy a slice into a new buffer
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Take the payload out of the buffer without copying
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Copy the payload for downstream mutation
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for Buffer {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&'static [u8]> for Buffer {
    fn from(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("len", &self.data.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_allocation() {
        let buf = Buffer::new(vec![1u8, 2, 3, 4]);
        let other = buf.clone();

        assert_eq!(buf.as_bytes().as_ptr(), other.as_bytes().as_ptr());
        assert_eq!(&*other, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_to_vec_is_a_copy() {
        let buf = Buffer::from(&b"abc"[..]);
        let mut copy = buf.to_vec();
        copy[0] = b'z';

        assert_eq!(&*buf, b"abc");
        assert_eq!(copy, b"zbc");
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::Ultrasound.to_string(), "us");
        assert_eq!(DataType::Tocography.to_string(), "toco");
        assert_eq!(DataType::Oximetry.to_string(), "spo2");
        assert_eq!(DataType::ALL.len(), 3);
    }

    #[test]
    fn test_consumer_key_ordering() {
        assert!(ConsumerKey(1) < ConsumerKey(2));
        assert_eq!(ConsumerKey(7).to_string(), "#7");
        assert_eq!(ConsumerKey(7).get(), 7);
    }
}
