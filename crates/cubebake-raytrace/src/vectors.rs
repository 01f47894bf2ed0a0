// vectors.rs — four-wide SoA vectors and ray packets

use cubebake_common::q_shared::Vec3;

/// Four 3-vectors stored component-major.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FourVectors {
    pub x: [f32; 4],
    pub y: [f32; 4],
    pub z: [f32; 4],
}

impl FourVectors {
    /// The same vector in every lane.
    pub fn replicate(v: Vec3) -> Self {
        Self {
            x: [v[0]; 4],
            y: [v[1]; 4],
            z: [v[2]; 4],
        }
    }

    pub fn from_lanes(v: [Vec3; 4]) -> Self {
        Self {
            x: [v[0][0], v[1][0], v[2][0], v[3][0]],
            y: [v[0][1], v[1][1], v[2][1], v[3][1]],
            z: [v[0][2], v[1][2], v[2][2], v[3][2]],
        }
    }

    #[inline]
    pub fn lane(&self, i: usize) -> Vec3 {
        [self.x[i], self.y[i], self.z[i]]
    }

    #[inline]
    pub fn set_lane(&mut self, i: usize, v: Vec3) {
        self.x[i] = v[0];
        self.y[i] = v[1];
        self.z[i] = v[2];
    }

    /// Component `axis` (0..3) of every lane.
    #[inline]
    pub fn axis(&self, axis: usize) -> &[f32; 4] {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }

    pub fn dot(&self, other: &FourVectors) -> [f32; 4] {
        std::array::from_fn(|i| self.x[i] * other.x[i] + self.y[i] * other.y[i] + self.z[i] * other.z[i])
    }

    pub fn normalize(&mut self) {
        for i in 0..4 {
            let len = (self.x[i] * self.x[i] + self.y[i] * self.y[i] + self.z[i] * self.z[i]).sqrt();
            if len > 0.0 {
                let inv = 1.0 / len;
                self.x[i] *= inv;
                self.y[i] *= inv;
                self.z[i] *= inv;
            }
        }
    }
}

/// Four rays traced together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FourRays {
    pub origin: FourVectors,
    pub direction: FourVectors,
}

impl FourRays {
    /// Bit `a` is set when every lane's direction along axis `a` is negative,
    /// clear when every lane's is non-negative. Returns None when the lanes
    /// disagree on any axis, i.e. the packet is incoherent.
    pub fn calculate_direction_sign_mask(&self) -> Option<u32> {
        let mut mask = 0u32;
        for axis in 0..3 {
            let d = self.direction.axis(axis);
            let negative = d.iter().filter(|&&v| v < 0.0).count();
            match negative {
                0 => {}
                4 => mask |= 1 << axis,
                _ => return None,
            }
        }
        Some(mask)
    }
}

/// A single ray for the scalar entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Hits closer than this are ignored.
    pub tmin: f32,
    /// Hits beyond this are ignored.
    pub tmax: f32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, tmax: f32) -> Self {
        Self { origin, direction, tmin: 0.0, tmax }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes() {
        let mut v = FourVectors::replicate([1.0, 2.0, 3.0]);
        v.set_lane(2, [4.0, 5.0, 6.0]);
        assert_eq!(v.lane(0), [1.0, 2.0, 3.0]);
        assert_eq!(v.lane(2), [4.0, 5.0, 6.0]);
        assert_eq!(v.axis(1), &[2.0, 2.0, 5.0, 2.0]);
    }

    #[test]
    fn test_dot_and_normalize() {
        let mut v = FourVectors::from_lanes([[3.0, 0.0, 4.0], [0.0, 2.0, 0.0], [0.0; 3], [1.0, 0.0, 0.0]]);
        assert_eq!(v.dot(&v), [25.0, 4.0, 0.0, 1.0]);
        v.normalize();
        let n = v.lane(0);
        assert!((n[0] - 0.6).abs() < 1e-6 && n[1] == 0.0 && (n[2] - 0.8).abs() < 1e-6);
        assert_eq!(v.lane(2), [0.0; 3]);
    }

    #[test]
    fn test_direction_sign_mask() {
        let mut rays = FourRays {
            origin: FourVectors::default(),
            direction: FourVectors::replicate([1.0, -1.0, 0.0]),
        };
        assert_eq!(rays.calculate_direction_sign_mask(), Some(0b010));
        rays.direction.set_lane(3, [-1.0, -1.0, 0.0]);
        assert_eq!(rays.calculate_direction_sign_mask(), None);
    }
}
