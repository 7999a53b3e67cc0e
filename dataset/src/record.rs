use crate::error::RecordError;
use byteorder::{ByteOrder, NativeEndian};

/// `[i32 index][i32 eval centipawns]`
pub const HEADER_LEN: usize = 8;

/// One dataset entry: `[i32 index][i32 eval_cp][N packed bytes]`, native byte order.
/// N is fixed by the encoding scheme of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRecord {
    pub index: i32,
    /// Centipawns from white's point of view
    pub eval_cp: i32,
    pub packed: Vec<u8>,
}

impl PackedRecord {
    /// Total bytes of a record carrying `packed_len` packed bytes
    pub fn encoded_len(packed_len: usize) -> usize {
        HEADER_LEN + packed_len
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::encoded_len(self.packed.len())];

        NativeEndian::write_i32(&mut bytes[0..4], self.index);
        NativeEndian::write_i32(&mut bytes[4..8], self.eval_cp);
        bytes[HEADER_LEN..].copy_from_slice(&self.packed);

        bytes
    }

    /// Any length other than `HEADER_LEN + packed_len` is corruption, never truncated or padded
    pub fn from_bytes(bytes: &[u8], packed_len: usize) -> Result<Self, RecordError> {
        let expected = Self::encoded_len(packed_len);
        if bytes.len() != expected {
            return Err(RecordError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            index: NativeEndian::read_i32(&bytes[0..4]),
            eval_cp: NativeEndian::read_i32(&bytes[4..8]),
            packed: bytes[HEADER_LEN..].to_vec(),
        })
    }
}
