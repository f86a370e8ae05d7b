use binrw::binrw;
use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};
use serde::Serialize;

use crate::reader::fixed_record;

/// Values that a keyframe run can blend between.
pub trait Interpolate: Copy {
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct M2Vector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl M2Vector3 {
    pub const ZERO: M2Vector3 = M2Vector3(Vector3 { x: 0.0, y: 0.0, z: 0.0 });
    pub const ONE: M2Vector3 = M2Vector3(Vector3 { x: 1.0, y: 1.0, z: 1.0 });

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        M2Vector3(Vector3::new(x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        self.0.into()
    }

    pub fn is_finite(&self) -> bool {
        self.0.x.is_finite() && self.0.y.is_finite() && self.0.z.is_finite()
    }

    pub fn lerp(&self, other: &M2Vector3, t: f32) -> M2Vector3 {
        M2Vector3(self.0.lerp(other.0, t))
    }
}

impl Default for M2Vector3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Serialize for M2Vector3 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_slice().serialize(serializer)
    }
}

impl Interpolate for M2Vector3 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.lerp(other, t)
    }
}

/// Full precision quaternion, stored on disk as x, y, z, w.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct M2Quaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

impl M2Quaternion {
    pub const IDENTITY: M2Quaternion = M2Quaternion(Quaternion {
        s: 1.0,
        v: Vector3 { x: 0.0, y: 0.0, z: 0.0 },
    });

    pub fn from_xyzw(x: f32, y: f32, z: f32, w: f32) -> Self {
        M2Quaternion(Quaternion::new(w, x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 4] {
        let Quaternion { s, v } = self.0;
        [v.x, v.y, v.z, s]
    }

    pub fn dot(&self, other: &M2Quaternion) -> f32 {
        self.0.dot(other.0)
    }

    /// Shortest-arc slerp: `other` is flipped onto this quaternion's
    /// hemisphere first, so `q` and `-q` give the same result.
    pub fn slerp(&self, other: &M2Quaternion, t: f32) -> M2Quaternion {
        let target = if self.dot(other) < 0.0 { -other.0 } else { other.0 };
        M2Quaternion(self.0.slerp(target, t).normalize())
    }
}

impl Default for M2Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Serialize for M2Quaternion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_slice().serialize(serializer)
    }
}

impl Interpolate for M2Quaternion {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.slerp(other, t)
    }
}

/// Quaternion packed into four signed 16-bit components (x, y, z, w), used by the
/// extended model layout for rotation tracks.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct M2PackedQuaternion(pub [i16; 4]);

impl M2PackedQuaternion {
    fn unpack_component(v: i16) -> f32 {
        let v = v as i32;
        if v < 0 {
            (v + 32768) as f32 / 32767.0
        } else {
            (v - 32767) as f32 / 32767.0
        }
    }

    fn pack_component(f: f32) -> i16 {
        let f = f.clamp(-1.0, 1.0);
        if f > 0.0 {
            (f * 32767.0 - 32768.0).round().clamp(-32768.0, -1.0) as i16
        } else {
            (f * 32767.0 + 32767.0).round().clamp(0.0, 32767.0) as i16
        }
    }

    pub fn unpack(&self) -> M2Quaternion {
        let [x, y, z, w] = self.0.map(Self::unpack_component);
        M2Quaternion::from_xyzw(x, y, z, w)
    }

    pub fn pack(q: &M2Quaternion) -> Self {
        M2PackedQuaternion(q.to_slice().map(Self::pack_component))
    }
}

fixed_record! {
    M2Vector3 => 12,
    M2Quaternion => 16,
    M2PackedQuaternion => 8,
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    #[test]
    fn vector_lerp_hits_endpoints_and_midpoint() {
        let a = M2Vector3::new(-2.0, 0.0, 4.0);
        let b = M2Vector3::new(2.0, 8.0, 4.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), M2Vector3::new(0.0, 4.0, 4.0));
    }

    #[test]
    fn vector_serializes_as_array() {
        let json = serde_json::to_string(&M2Vector3::new(1.0, 2.5, -3.0)).unwrap();
        assert_eq!(json, "[1.0,2.5,-3.0]");
    }

    #[test]
    fn slerp_halves_the_angle() {
        let quarter = M2Quaternion(Quaternion::from_angle_z(Deg(90.0)));
        let eighth = M2Quaternion::IDENTITY.slerp(&quarter, 0.5);
        let expected = Quaternion::from_angle_z(Deg(45.0));
        assert!((eighth.0.dot(expected) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn slerp_takes_the_short_arc() {
        let quarter = Quaternion::from_angle_x(Deg(90.0));
        let flipped = M2Quaternion(-quarter);
        let halfway = M2Quaternion::IDENTITY.slerp(&flipped, 0.5);
        assert!(halfway.0.dot(Quaternion::from_angle_x(Deg(45.0))) > 0.999, "{:?}", halfway);
    }

    #[test]
    fn packed_components_cover_the_unit_range() {
        let q = M2PackedQuaternion([0, 32767, -1, 32767]).unpack();
        assert_eq!(q.to_slice(), [-1.0, 0.0, 1.0, 0.0]);
        assert_eq!(M2PackedQuaternion::pack(&M2Quaternion::IDENTITY).0, [32767, 32767, 32767, -1]);
    }

    #[test]
    fn packing_keeps_four_decimal_places() {
        let q = M2Quaternion(Quaternion::from_angle_y(Deg(33.0)));
        let unpacked = M2PackedQuaternion::pack(&q).unpack();
        for (a, b) in q.to_slice().iter().zip(unpacked.to_slice()) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
