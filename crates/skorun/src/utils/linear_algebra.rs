//! Linear algebra for the dense GEMM path.

use anyhow::{ensure, Result};
use faer::Parallelism;
use ndarray::{Array1, Array2, ArrayView2, Ix2};

use crate::tensor::TypedTensor;

/// Performs `a @ b^T` for weights stored in `[Out, In]` layout.
#[inline]
pub fn matmul_2d_transposed(a: &ArrayView2<f32>, b_transposed: &ArrayView2<f32>) -> Array2<f32> {
    let (m, k) = a.dim();
    let (n, k2) = b_transposed.dim();
    assert_eq!(k, k2, "Dim mismatch");

    let mut c = Array2::<f32>::zeros((m, n));
    let a_s = a.as_standard_layout();
    let a_sl = a_s.as_slice().unwrap();
    let b_s = b_transposed.as_standard_layout();
    let b_sl = b_s.as_slice().unwrap();
    let c_sl = c.as_slice_mut().unwrap();

    faer::linalg::matmul::matmul(
        faer::mat::from_row_major_slice_mut(c_sl, m, n),
        faer::mat::from_row_major_slice(a_sl, m, k),
        faer::mat::from_row_major_slice(b_sl, n, k).transpose(),
        None,
        1.0,
        Parallelism::Rayon(0),
    );
    c
}

/// `y = x W^T + b` for a 2-D activation batch and `[Out, In]` weights.
#[inline]
pub fn linear_2d(
    x: &ArrayView2<f32>,
    weight: &ArrayView2<f32>,
    bias: Option<&Array1<f32>>,
) -> Array2<f32> {
    let mut y = matmul_2d_transposed(x, weight);
    if let Some(b) = bias {
        y += &b.view();
    }
    y
}

/// Dense `x W^T + b` over arbitrary leading dimensions, accumulating in f32.
///
/// The universal fallback: every dispatch path that fails an eligibility
/// check lands here. Output has shape `x.shape[:-1] + [out_features]` and
/// the same dtype as `x`.
pub fn dense_linear(
    x: &TypedTensor,
    weight: &TypedTensor,
    bias: Option<&Array1<f32>>,
) -> Result<TypedTensor> {
    let x_shape = x.shape().to_vec();
    ensure!(
        !x_shape.is_empty(),
        "activations must have at least one dimension"
    );
    let w_shape = weight.shape();
    ensure!(
        w_shape.len() == 2,
        "weight must be 2-D [out_features, in_features], got {:?}",
        w_shape
    );
    let (out_features, in_features) = (w_shape[0], w_shape[1]);
    let k = x_shape[x_shape.len() - 1];
    ensure!(
        k == in_features,
        "inner dimensions do not match: activations {:?} vs weight {:?}",
        x_shape,
        w_shape
    );
    if let Some(b) = bias {
        ensure!(
            b.len() == out_features,
            "bias has length {}, expected {}",
            b.len(),
            out_features
        );
    }

    let n: usize = x_shape[..x_shape.len() - 1].iter().product();
    let x_2d = x.to_f32().into_shape_with_order((n, k))?;
    let w_2d = weight.to_f32().into_dimensionality::<Ix2>()?;
    let y = linear_2d(&x_2d.view(), &w_2d.view(), bias);

    let mut out_shape = x_shape[..x_shape.len() - 1].to_vec();
    out_shape.push(out_features);
    let y = y.into_shape_with_order(ndarray::IxDyn(&out_shape))?;
    Ok(TypedTensor::from_f32(x.dtype(), y))
}
