//! Lossless packing of 0/1 tensors into bytes.
//!
//! Elements are taken in row-major order and grouped eight at a time, most
//! significant bit first. The last byte is zero padded. The shape is not part
//! of the packed bytes, the caller carries it (records have a fixed length per
//! scheme).

use crate::error::CodecError;
use crate::tensor::Tensor;

/// Number of bytes needed to pack `elements` bits
pub fn packed_len(elements: usize) -> usize {
    elements.div_ceil(8)
}

pub fn pack(tensor: &Tensor) -> Result<Vec<u8>, CodecError> {
    let elements = tensor.as_slice();
    let mut packed = vec![0u8; packed_len(elements.len())];

    for (position, &value) in elements.iter().enumerate() {
        match value {
            0 => {}
            1 => packed[position / 8] |= 0x80 >> (position % 8),
            _ => return Err(CodecError::NonBinary { position, value }),
        }
    }

    Ok(packed)
}

pub fn unpack(packed: &[u8], shape: &[usize]) -> Result<Tensor, CodecError> {
    let elements = shape.iter().product::<usize>();
    let expected = packed_len(elements);

    if packed.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: packed.len(),
        });
    }

    // padding bits past `elements` are dropped
    let data = (0..elements)
        .map(|position| (packed[position / 8] >> (7 - position % 8)) & 1)
        .collect();

    Ok(Tensor::from_vec(shape, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first() {
        let tensor = Tensor::from_vec(&[10], vec![1, 0, 0, 0, 0, 0, 0, 1, 1, 1]);
        let packed = pack(&tensor).unwrap();

        assert_eq!(packed, vec![0b1000_0001, 0b1100_0000]);
        assert_eq!(unpack(&packed, &[10]).unwrap(), tensor);
    }

    #[test]
    fn test_packed_lengths() {
        assert_eq!(packed_len(0), 0);
        assert_eq!(packed_len(8), 1);
        assert_eq!(packed_len(9), 2);
        assert_eq!(packed_len(774), 97);
        assert_eq!(packed_len(15 * 8 * 8), 120);
    }

    #[test]
    fn test_roundtrip_keeps_shape() {
        let data = (0..3 * 5 * 7).map(|i| ((i * 7) % 3 == 0) as u8).collect();
        let tensor = Tensor::from_vec(&[3, 5, 7], data);
        let packed = pack(&tensor).unwrap();

        assert_eq!(packed.len(), 14);
        assert_eq!(unpack(&packed, &[3, 5, 7]).unwrap(), tensor);
    }

    #[test]
    fn test_padding_is_ignored() {
        // garbage in the padding bits must not leak into the tensor
        let tensor = unpack(&[0xff, 0xff], &[9]).unwrap();
        assert_eq!(tensor.as_slice(), &[1; 9]);
    }

    #[test]
    fn test_rejects_non_binary() {
        let tensor = Tensor::from_vec(&[3], vec![0, 2, 1]);
        assert_eq!(
            pack(&tensor),
            Err(CodecError::NonBinary {
                position: 1,
                value: 2
            })
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(
            unpack(&[0; 96], &[774]),
            Err(CodecError::LengthMismatch {
                expected: 97,
                actual: 96
            })
        );
        assert!(unpack(&[0; 121], &[15, 8, 8]).is_err());
    }
}
