use std::fmt::{Debug, Formatter};

/// Dense row-major tensor of small integers.
///
/// Encoders only ever produce 0/1 elements, which is what the bit-packing
/// codec accepts.
#[derive(Clone, PartialEq, Eq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0; shape.iter().product()],
        }
    }

    /// Panics if the number of elements does not match the shape
    pub fn from_vec(shape: &[usize], data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "tensor data does not match shape {:?}",
            shape
        );
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Flat offset of a multi-dimensional index (row-major)
    fn offset(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.shape.len());

        index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (&i, &dim)| {
                debug_assert!(i < dim, "index {:?} out of shape {:?}", index, self.shape);
                acc * dim + i
            })
    }

    pub fn get(&self, index: &[usize]) -> u8 {
        self.data[self.offset(index)]
    }

    pub fn set(&mut self, index: &[usize], value: u8) {
        let offset = self.offset(index);
        self.data[offset] = value;
    }

    /// Sub-tensor at `outer` along the first axis, e.g. one plane of a CxHxW tensor
    pub fn outer(&self, outer: usize) -> &[u8] {
        let stride = self.shape[1..].iter().product::<usize>();
        &self.data[outer * stride..(outer + 1) * stride]
    }

    pub fn outer_mut(&mut self, outer: usize) -> &mut [u8] {
        let stride = self.shape[1..].iter().product::<usize>();
        &mut self.data[outer * stride..(outer + 1) * stride]
    }

    pub fn count_ones(&self) -> usize {
        self.data.iter().filter(|&&x| x != 0).count()
    }

    /// Elements as f32, the layout handed to the trainer
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&x| x as f32).collect()
    }
}

impl Debug for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tensor({:?}, {:?})", self.shape, self.data)
    }
}
