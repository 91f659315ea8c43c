//! Boundary-aware padding used by the frequency-domain engine.

use ndarray::{Array, ArrayBase, Axis, Data, Dim, IntoDimension, Ix, RemoveAxis, Slice};
use num::traits::NumAssign;

use crate::{BoundaryMode, ConvError};

/// `[front, back]` padding for each axis.
pub type ExplicitPadding<const N: usize> = [[usize; 2]; N];

pub trait PaddingExt<T: NumAssign + Copy, const N: usize> {
    /// Pads every axis, filling the new cells as the boundary mode resolves
    /// them: position `j` of the front padding holds logical index
    /// `j - front`, and so on past the back edge.
    ///
    /// Fails with [`ConvError::BoundaryIndex`] when a mirrored or wrapped
    /// index still falls outside the array.
    fn padding(
        &self,
        mode: BoundaryMode,
        explicit_padding: ExplicitPadding<N>,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError>;
}

impl<T, S, const N: usize> PaddingExt<T, N> for ArrayBase<S, Dim<[Ix; N]>>
where
    T: NumAssign + Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    fn padding(
        &self,
        mode: BoundaryMode,
        explicit_padding: ExplicitPadding<N>,
    ) -> Result<Array<T, Dim<[Ix; N]>>, ConvError> {
        let mut output = padding_const(self, explicit_padding, T::zero());

        if !mode.skips_edges() {
            for (dim, &padding) in explicit_padding.iter().enumerate() {
                fill_dim(&mut output, self.len_of(Axis(dim)), dim, padding, mode)?;
            }
        }

        Ok(output)
    }
}

pub(crate) fn padding_const<T, S, const N: usize>(
    input: &ArrayBase<S, Dim<[Ix; N]>>,
    explicit_padding: ExplicitPadding<N>,
    const_value: T,
) -> Array<T, Dim<[Ix; N]>>
where
    T: Copy,
    S: Data<Elem = T>,
    Dim<[Ix; N]>: RemoveAxis,
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    let output_dim: [usize; N] = std::array::from_fn(|i| {
        explicit_padding[i][0] + input.len_of(Axis(i)) + explicit_padding[i][1]
    });

    let mut output = Array::from_elem(output_dim, const_value);

    output
        .slice_each_axis_mut(|ax| {
            let front = explicit_padding[ax.axis.index()][0];
            Slice::from(front..front + input.len_of(ax.axis))
        })
        .assign(input);

    output
}

/// Fills the front and back padding of `dim` from already padded slabs.
///
/// Axes are filled in order, so the corners of later axes pick up the padding
/// of earlier ones.
fn fill_dim<T, const N: usize>(
    buffer: &mut Array<T, Dim<[Ix; N]>>,
    extent: usize,
    dim: usize,
    padding: [usize; 2],
    mode: BoundaryMode,
) -> Result<(), ConvError>
where
    T: Copy,
    Dim<[Ix; N]>: RemoveAxis,
{
    let [front, back] = padding;
    let targets = (0..front).chain(front + extent..front + extent + back);

    for target in targets {
        let logical = target as isize - front as isize;
        if let Some(source) = mode.resolve(logical, extent)? {
            let slab = buffer.index_axis(Axis(dim), source + front).to_owned();
            buffer.index_axis_mut(Axis(dim), target).assign(&slab);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn padding_zero() {
        let arr = array![[1, 2], [3, 4]];
        let res = arr.padding(BoundaryMode::Zero, [[1, 0], [0, 2]]).unwrap();
        assert_eq!(res, array![[0, 0, 0, 0], [1, 2, 0, 0], [3, 4, 0, 0]]);
    }

    #[test]
    fn padding_mirror() {
        let arr = array![1, 2, 3, 4];
        let res = arr.padding(BoundaryMode::Mirror, [[2, 2]]).unwrap();
        // -2 -> 2, -1 -> 1, 4 -> 3, 5 -> 2
        assert_eq!(res, array![3, 2, 1, 2, 3, 4, 4, 3]);
    }

    #[test]
    fn padding_periodic_2d() {
        let arr = array![[1, 2, 3], [4, 5, 6]];
        let res = arr.padding(BoundaryMode::Periodic, [[1, 1], [1, 1]]).unwrap();
        assert_eq!(
            res,
            array![
                [6, 4, 5, 6, 4],
                [3, 1, 2, 3, 1],
                [6, 4, 5, 6, 4],
                [3, 1, 2, 3, 1]
            ]
        );
    }

    #[test]
    fn padding_matches_resolve() {
        let arr = ndarray::Array3::from_shape_fn((3, 4, 5), |(i, j, k)| i * 100 + j * 10 + k);
        let pad = [[1, 2], [2, 1], [0, 2]];

        for mode in [BoundaryMode::Mirror, BoundaryMode::Periodic] {
            let res = arr.padding(mode, pad).unwrap();
            for ((i, j, k), &v) in res.indexed_iter() {
                let r = |x: usize, front: usize, n: usize| {
                    mode.resolve(x as isize - front as isize, n).unwrap().unwrap()
                };
                assert_eq!(v, arr[[r(i, 1, 3), r(j, 2, 4), r(k, 0, 5)]]);
            }
        }
    }

    #[test]
    fn padding_too_wide() {
        let arr = array![1., 2.];
        assert!(matches!(
            arr.padding(BoundaryMode::Mirror, [[3, 3]]),
            Err(ConvError::BoundaryIndex { .. })
        ));
        assert!(arr.padding(BoundaryMode::Zero, [[3, 3]]).is_ok());
    }
}
