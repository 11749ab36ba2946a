use crate::tensor::dtype::DType;
use anyhow::{ensure, Result};
use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn};

/// A generic, typed tensor for CPU computation.
/// This enum holds an owned ndarray of a specific element type.
#[derive(Debug, Clone)]
pub enum TypedTensor {
    F32(ArrayD<f32>),
    F16(ArrayD<f16>),
    BF16(ArrayD<bf16>),
}

impl TypedTensor {
    pub fn dtype(&self) -> DType {
        match self {
            TypedTensor::F32(_) => DType::F32,
            TypedTensor::F16(_) => DType::F16,
            TypedTensor::BF16(_) => DType::BF16,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TypedTensor::F32(arr) => arr.shape(),
            TypedTensor::F16(arr) => arr.shape(),
            TypedTensor::BF16(arr) => arr.shape(),
        }
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a zero-filled tensor of the given dtype and shape.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            DType::F32 => TypedTensor::F32(ArrayD::zeros(dim)),
            DType::F16 => TypedTensor::F16(ArrayD::from_elem(dim, f16::ZERO)),
            DType::BF16 => TypedTensor::BF16(ArrayD::from_elem(dim, bf16::ZERO)),
        }
    }

    /// Upcast to an F32 array, cloning the data.
    pub fn to_f32(&self) -> ArrayD<f32> {
        match self {
            TypedTensor::F32(arr) => arr.clone(),
            TypedTensor::F16(arr) => arr.mapv(|v| v.to_f32()),
            TypedTensor::BF16(arr) => arr.mapv(|v| v.to_f32()),
        }
    }

    /// Cast an F32 array into a tensor of the given dtype.
    pub fn from_f32(dtype: DType, arr: ArrayD<f32>) -> Self {
        match dtype {
            DType::F32 => TypedTensor::F32(arr),
            DType::F16 => TypedTensor::F16(arr.mapv(f16::from_f32)),
            DType::BF16 => TypedTensor::BF16(arr.mapv(bf16::from_f32)),
        }
    }

    /// Return an owned copy with the same elements in a new shape.
    pub fn reshaped(&self, shape: &[usize]) -> Result<TypedTensor> {
        ensure!(
            self.len() == shape.iter().product::<usize>(),
            "cannot reshape tensor of shape {:?} into {:?}",
            self.shape(),
            shape
        );
        let dim = IxDyn(shape);
        Ok(match self {
            TypedTensor::F32(arr) => {
                TypedTensor::F32(arr.view().into_shape_with_order(dim)?.to_owned())
            }
            TypedTensor::F16(arr) => {
                TypedTensor::F16(arr.view().into_shape_with_order(dim)?.to_owned())
            }
            TypedTensor::BF16(arr) => {
                TypedTensor::BF16(arr.view().into_shape_with_order(dim)?.to_owned())
            }
        })
    }
}
