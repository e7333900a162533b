//! Transform math
//!
//! Re-exports glam with the affine helpers the transform hierarchy needs.

pub use glam::*;

/// Lengths below this are treated as a collapsed axis.
const AXIS_EPSILON: f32 = 1.0e-8;

/// Build a local-to-parent matrix from translation, rotation and scale
/// (applied scale first, translation last).
#[inline]
pub fn compose(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Split an affine matrix into translation, rotation and scale.
///
/// The basis is orthonormalized with Gram-Schmidt in x, y, z order; the
/// length of each axis after projection is its scale. A left-handed basis
/// (negative determinant) is folded into a negative x scale so the rotation
/// stays proper.
pub fn decompose(matrix: &Mat4) -> (Vec3, Quat, Vec3) {
    let translation = matrix.w_axis.truncate();

    let (x, sx) = unit_or(matrix.x_axis.truncate(), Vec3::X);

    let y = matrix.y_axis.truncate();
    let z = matrix.z_axis.truncate();

    let (y, sy) = unit_or(y - x * x.dot(y), {
        // Collapsed y: rebuild it from z so the basis stays right-handed.
        let z_dir = z - x * x.dot(z);
        if z_dir.length() > AXIS_EPSILON {
            z_dir.normalize().cross(x)
        } else {
            x.any_orthonormal_vector()
        }
    });

    let z = z - x * x.dot(z);
    let z = z - y * y.dot(z);
    let (z, sz) = unit_or(z, x.cross(y));

    let mut x = x;
    let mut scale = Vec3::new(sx, sy, sz);
    if x.cross(y).dot(z) < 0.0 {
        x = -x;
        scale.x = -scale.x;
    }

    let rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize();
    (translation, rotation, scale)
}

fn unit_or(axis: Vec3, fallback: Vec3) -> (Vec3, f32) {
    let length = axis.length();
    if length > AXIS_EPSILON {
        (axis / length, length)
    } else {
        (fallback, 0.0)
    }
}

/// Component-wise comparison of two matrices.
pub fn mat4_approx_eq(a: &Mat4, b: &Mat4, epsilon: f32) -> bool {
    a.abs_diff_eq(*b, epsilon)
}
