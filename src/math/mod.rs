use binrw::binrw;
use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3};
use half::f16;
use serde::Serialize;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct DsVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl DsVector3 {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }

    pub fn from_slice(s: [f32; 3]) -> Self {
        DsVector3(Vector3::new(s[0], s[1], s[2]))
    }
}

/// Quaternion stored on disk as (x, y, z, w).
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct DsQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

impl DsQuaternion {
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }

    pub fn from_slice(s: [f32; 4]) -> Self {
        DsQuaternion(Quaternion::new(s[3], s[0], s[1], s[2]))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct DsMatrix44(
    #[br(map = |raw: [f32; 16]| Matrix4::new(
        raw[0], raw[1], raw[2], raw[3],
        raw[4], raw[5], raw[6], raw[7],
        raw[8], raw[9], raw[10], raw[11],
        raw[12], raw[13], raw[14], raw[15]
    ))]
    #[bw(map = |m: &Matrix4<f32>| [
        m.x.x, m.x.y, m.x.z, m.x.w,
        m.y.x, m.y.y, m.y.z, m.y.w,
        m.z.x, m.z.y, m.z.z, m.z.w,
        m.w.x, m.w.y, m.w.z, m.w.w
    ])]
    pub Matrix4<f32>,
);

impl DsMatrix44 {
    pub fn identity() -> Self {
        DsMatrix44(Matrix4::identity())
    }

    pub fn to_slice(&self) -> [f32; 16] {
        let m = &self.0;
        [
            m.x.x, m.x.y, m.x.z, m.x.w, m.y.x, m.y.y, m.y.z, m.y.w, m.z.x, m.z.y, m.z.z, m.z.w,
            m.w.x, m.w.y, m.w.z, m.w.w,
        ]
    }

    pub fn invert(&self) -> Option<Self> {
        self.0.invert().map(DsMatrix44)
    }
}

/// Build the inverse bind matrix for one bone from the geometry file's raw
/// transform: the three axis vectors become the rotation rows and the raw
/// position becomes the translation column.
pub fn inverse_bind_matrix(
    position: [f32; 3],
    x_axis: [f32; 3],
    y_axis: [f32; 3],
    z_axis: [f32; 3],
) -> DsMatrix44 {
    // cgmath's constructor takes columns, so the axis rows are transposed here
    DsMatrix44(Matrix4::new(
        x_axis[0], y_axis[0], z_axis[0], 0.0,
        x_axis[1], y_axis[1], z_axis[1], 0.0,
        x_axis[2], y_axis[2], z_axis[2], 0.0,
        position[0], position[1], position[2], 1.0,
    ))
}

/// The bone head position in the consuming convention: negate the raw
/// position, then project it through the transpose of the axis matrix.
/// The source engine stores positions pre-rotation with right-multiplied
/// transforms; the collated model is left-multiplied.
pub fn corrected_bone_position(
    position: [f32; 3],
    x_axis: [f32; 3],
    y_axis: [f32; 3],
    z_axis: [f32; 3],
) -> [f32; 3] {
    let p = Vector3::new(-position[0], -position[1], -position[2]);
    // rows of A are the axes; A^T has the axes as columns
    let at = cgmath::Matrix3::from_cols(
        Vector3::new(x_axis[0], x_axis[1], x_axis[2]),
        Vector3::new(y_axis[0], y_axis[1], y_axis[2]),
        Vector3::new(z_axis[0], z_axis[1], z_axis[2]),
    );
    let out = at * p;
    [out.x, out.y, out.z]
}

pub fn f16_bits_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

pub fn f32_to_f16_bits(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_bind_identity_axes() {
        let m = inverse_bind_matrix([1.0, 2.0, 3.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
        let s = m.to_slice();
        // rotation block is the identity, translation column carries the position
        assert_eq!(s[0], 1.0);
        assert_eq!(s[5], 1.0);
        assert_eq!(s[10], 1.0);
        assert_eq!(&s[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_corrected_position_identity_axes() {
        let p = corrected_bone_position(
            [1.0, 2.0, 3.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        );
        assert_eq!(p, [-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_corrected_position_swapped_axes() {
        // axes swap x and y; A^T * (-p) moves -p.y into x and -p.x into y
        let p = corrected_bone_position(
            [1.0, 2.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        );
        assert_eq!(p, [-2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_half_float_round_trip_is_exact() {
        for bits in [0u16, 0x3C00, 0xBC00, 0x7BFF, 0x0001, 0x8000] {
            assert_eq!(f32_to_f16_bits(f16_bits_to_f32(bits)), bits);
        }
    }
}
