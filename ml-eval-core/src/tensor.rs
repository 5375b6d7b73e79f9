//! Dense tensor used to carry gathered batches into a model

use std::fmt;

use bytemuck::Pod;

use crate::error::{Error, Result};

/// Trait for types that can be used in tensors
pub trait TensorType: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> TensorType for T {}

/// A dense, row-major, multidimensional tensor
#[derive(Clone, PartialEq)]
pub struct DenseTensor<T: TensorType> {
    /// Elements in row-major order
    data: Vec<T>,

    /// Shape of the tensor (dimensions)
    shape: Vec<usize>,

    /// Strides of the tensor (elements to skip per dimension)
    strides: Vec<usize>,
}

impl<T: TensorType> DenseTensor<T> {
    /// Create a zero-filled tensor with the given shape
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size = shape.iter().product();
        let strides = Self::compute_strides(&shape);

        Self {
            data: vec![<T as bytemuck::Zeroable>::zeroed(); size],
            shape,
            strides,
        }
    }

    /// Create a tensor from a vector
    pub fn from_vec(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let expected_size: usize = shape.iter().product();
        if data.len() != expected_size {
            return Err(Error::InvalidArgument(format!(
                "Data length {} does not match shape product {}",
                data.len(),
                expected_size
            )));
        }

        let strides = Self::compute_strides(&shape);

        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    /// Compute strides for a given shape
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![0; shape.len()];

        let mut stride = 1;
        for i in (0..shape.len()).rev() {
            strides[i] = stride;
            stride *= shape[i];
        }

        strides
    }

    /// Get the shape of this tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements in this tensor
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this tensor is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Leading dimension, i.e. the number of batch rows
    ///
    /// `None` for a rank-0 tensor.
    pub fn rows(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    /// Number of elements per batch row
    pub fn row_width(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Elements in row-major order
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn offset(&self, indices: &[usize]) -> Result<usize> {
        if indices.len() != self.shape.len() {
            return Err(Error::InvalidArgument(
                "Number of indices must match number of dimensions".into(),
            ));
        }

        let mut offset = 0;
        for ((&idx, &dim), &stride) in indices.iter().zip(&self.shape).zip(&self.strides) {
            if idx >= dim {
                return Err(Error::IndexOutOfBounds);
            }
            offset += idx * stride;
        }

        Ok(offset)
    }

    /// Get the value at the specified indices
    pub fn get(&self, indices: &[usize]) -> Result<T> {
        let offset = self.offset(indices)?;
        Ok(self.data[offset])
    }

    /// Set the value at the specified indices
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<()> {
        let offset = self.offset(indices)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Elements of one batch row
    pub fn row(&self, row: usize) -> Result<&[T]> {
        let rows = self.rows().ok_or(Error::IndexOutOfBounds)?;
        if row >= rows {
            return Err(Error::IndexOutOfBounds);
        }
        let width = self.row_width();
        Ok(&self.data[row * width..(row + 1) * width])
    }

    /// Mutable elements of one batch row
    pub fn row_mut(&mut self, row: usize) -> Result<&mut [T]> {
        let rows = self.rows().ok_or(Error::IndexOutOfBounds)?;
        if row >= rows {
            return Err(Error::IndexOutOfBounds);
        }
        let width = self.row_width();
        Ok(&mut self.data[row * width..(row + 1) * width])
    }

    /// Apply `f` to every element, producing a tensor of the same shape
    pub fn map<U: TensorType>(&self, f: impl Fn(T) -> U) -> DenseTensor<U> {
        DenseTensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

}

impl<T: TensorType + fmt::Debug> fmt::Debug for DenseTensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DenseTensor<{}>{{ shape: {:?}, size: {} }}",
            std::any::type_name::<T>(),
            self.shape,
            self.data.len()
        )
    }
}
