/* ************************************************************************ **
** This file is part of rsp2, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of rsp2 is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Six-component virials and the primitives that accumulate them.
//!
//! Components are in Voigt order: `xx, yy, zz, xy, xz, yz`.

/// A cartesian vector.
pub type V3 = [f64; 3];

/// A symmetric 3x3 tensor in Voigt order `[xx, yy, zz, xy, xz, yz]`.
pub type Voigt = [f64; 6];

pub const ZERO: Voigt = [0.0; 6];

/// `dst += src`
#[inline(always)]
pub fn accumulate6(dst: &mut Voigt, src: &Voigt) {
    dst[0] += src[0];
    dst[1] += src[1];
    dst[2] += src[2];
    dst[3] += src[3];
    dst[4] += src[4];
    dst[5] += src[5];
}

/// `dst += scale * src`
#[inline(always)]
pub fn accumulate6_scaled(dst: &mut Voigt, scale: f64, src: &Voigt) {
    dst[0] += scale * src[0];
    dst[1] += scale * src[1];
    dst[2] += scale * src[2];
    dst[3] += scale * src[3];
    dst[4] += scale * src[4];
    dst[5] += scale * src[5];
}

/// `scale * (d ⊗ d)`, for central forces of magnitude `scale / |d|` along `d`.
#[inline(always)]
pub fn outer_sym(d: V3, scale: f64) -> Voigt {
    [
        d[0] * d[0] * scale,
        d[1] * d[1] * scale,
        d[2] * d[2] * scale,
        d[0] * d[1] * scale,
        d[0] * d[2] * scale,
        d[1] * d[2] * scale,
    ]
}

/// The upper triangle of `r ⊗ f`.
///
/// Only meaningful when the sum it appears in is symmetric.
#[inline(always)]
pub fn outer(r: V3, f: V3) -> Voigt {
    [
        r[0] * f[0],
        r[1] * f[1],
        r[2] * f[2],
        r[0] * f[1],
        r[0] * f[2],
        r[1] * f[2],
    ]
}

#[inline(always)]
pub fn scaled(scale: f64, v: &Voigt) -> Voigt {
    let mut out = ZERO;
    accumulate6_scaled(&mut out, scale, v);
    out
}

#[inline(always)]
pub(crate) fn add3(a: V3, b: V3) -> V3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate() {
        let mut v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        accumulate6(&mut v, &[1.0; 6]);
        assert_eq!(v, [2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        accumulate6_scaled(&mut v, -0.5, &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        assert_eq!(v, [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn outer_of_parallel_vectors() {
        // a force parallel to the separation gives the same tensor either way
        let d = [1.0, -2.0, 0.5];
        let fpair = 3.0;
        let f = [d[0] * fpair, d[1] * fpair, d[2] * fpair];
        assert_close!(outer(d, f), outer_sym(d, fpair));
        assert_eq!(outer_sym(d, 1.0), [1.0, 4.0, 0.25, -2.0, 0.5, -1.0]);
    }
}
