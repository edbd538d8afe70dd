//! Array helpers shared by the structural operators.

use ndarray::{concatenate, ArrayD, ArrayView, Axis, Dimension, ErrorKind, IxDyn, ShapeError, Zip};

use crate::error::{LogicError, Result};

/// Broadcasts a length-1 axis of `array` to `size`, materializing the copies.
pub fn broadcast(
    array: ArrayView<'_, f32, IxDyn>,
    axis: usize,
    size: usize,
) -> Result<ArrayD<f32>> {
    if array.shape().get(axis) != Some(&1) {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }
    let mut shape = array.shape().to_vec();
    shape[axis] = size;
    let view = array
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleShape))?;
    Ok(view.to_owned())
}

/// Mask over `shape` that is 1 where the `count` axes starting at `start`
/// hold pairwise distinct indices, and 0 everywhere else.
///
/// For `count = 2` over `a[i, j]` this is 1 exactly when `i != j`.
pub fn exclude_mask(shape: &[usize], count: usize, start: usize) -> Result<ArrayD<f32>> {
    if count == 0 || start + count > shape.len() {
        return Err(ShapeError::from_kind(ErrorKind::OutOfBounds).into());
    }
    let n = shape[start];
    if let Some(&found) = shape[start..start + count].iter().find(|&&axis| axis != n) {
        return Err(LogicError::ObjectCountMismatch {
            order: count,
            expected: n,
            found,
        });
    }

    Ok(ArrayD::from_shape_fn(IxDyn(shape), |index| {
        let axes = &index.slice()[start..start + count];
        let distinct = axes
            .iter()
            .enumerate()
            .all(|(i, a)| axes[i + 1..].iter().all(|b| a != b));
        if distinct {
            1.0
        } else {
            0.0
        }
    }))
}

/// Keeps `inputs` where `mask` is 1 and substitutes `value` where it is 0.
pub fn mask_value(inputs: &ArrayD<f32>, mask: &ArrayD<f32>, value: f32) -> Result<ArrayD<f32>> {
    if inputs.shape() != mask.shape() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }
    Ok(Zip::from(inputs)
        .and(mask)
        .map_collect(|&x, &m| x * m + value * (1.0 - m)))
}

/// Concatenates arrays along their last (feature) axis.
pub fn concat_features(mut arrays: Vec<ArrayD<f32>>) -> Result<ArrayD<f32>> {
    match arrays.len() {
        0 => Err(ShapeError::from_kind(ErrorKind::Unsupported).into()),
        1 => Ok(arrays.remove(0)),
        _ => {
            let axis = Axis(arrays[0].ndim().saturating_sub(1));
            let views: Vec<_> = arrays.iter().map(|array| array.view()).collect();
            Ok(concatenate(axis, &views)?)
        }
    }
}
