// light.rs — light descriptions for visibility and direct lighting

use cubebake_common::q_shared::{dot_product, vector_normalize, vector_scale, vector_subtract, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDesc {
    pub light_type: LightType,
    /// Linear intensity.
    pub color: Vec3,
    pub position: Vec3,
    /// Unit direction the light travels in (spot and directional).
    pub direction: Vec3,
    /// Zero means unlimited.
    pub range: f32,
    /// Spot cone: cosine of the inner (full) and outer (cut-off) half angles.
    pub theta_dot: f32,
    pub phi_dot: f32,
    pub falloff: f32,
    pub attenuation0: f32,
    pub attenuation1: f32,
    pub attenuation2: f32,
}

impl LightDesc {
    /// Point light with inverse-square falloff.
    pub fn point(position: Vec3, color: Vec3) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            position,
            direction: [0.0, 0.0, -1.0],
            range: 0.0,
            theta_dot: 1.0,
            phi_dot: 1.0,
            falloff: 1.0,
            attenuation0: 0.0,
            attenuation1: 0.0,
            attenuation2: 1.0,
        }
    }

    /// Spot light; cone angles are full-cone degrees.
    pub fn spot(position: Vec3, mut direction: Vec3, color: Vec3, inner_degrees: f32, outer_degrees: f32) -> Self {
        vector_normalize(&mut direction);
        Self {
            light_type: LightType::Spot,
            direction,
            theta_dot: (inner_degrees * 0.5).to_radians().cos(),
            phi_dot: (outer_degrees * 0.5).to_radians().cos(),
            ..Self::point(position, color)
        }
    }

    /// Infinitely distant light travelling along `direction`.
    pub fn directional(mut direction: Vec3, color: Vec3) -> Self {
        vector_normalize(&mut direction);
        Self {
            light_type: LightType::Directional,
            direction,
            attenuation2: 0.0,
            attenuation0: 1.0,
            ..Self::point([0.0; 3], color)
        }
    }

    pub fn distance_attenuation(&self, dist: f32) -> f32 {
        if self.range > 0.0 && dist > self.range {
            return 0.0;
        }
        let denom = self.attenuation0 + self.attenuation1 * dist + self.attenuation2 * dist * dist;
        if denom <= 0.0 {
            1.0
        } else {
            1.0 / denom
        }
    }

    /// Unit vector from `point` towards the light, and the distance to it.
    pub fn direction_from(&self, point: &Vec3) -> (Vec3, f32) {
        match self.light_type {
            LightType::Directional => (vector_scale(&self.direction, -1.0), f32::INFINITY),
            _ => {
                let mut to_light = vector_subtract(&self.position, point);
                let dist = vector_normalize(&mut to_light);
                (to_light, dist)
            }
        }
    }

    /// Unoccluded light arriving at `point`, cosine-weighted against
    /// `normal` when one is given.
    pub fn intensity_at(&self, point: &Vec3, normal: Option<&Vec3>) -> Vec3 {
        let (to_light, dist) = self.direction_from(point);
        let mut scale = match self.light_type {
            LightType::Directional => 1.0,
            _ => self.distance_attenuation(dist.max(1.0)),
        };

        if self.light_type == LightType::Spot {
            let cos_angle = -dot_product(&to_light, &self.direction);
            scale *= if cos_angle >= self.theta_dot {
                1.0
            } else if cos_angle <= self.phi_dot {
                0.0
            } else {
                ((cos_angle - self.phi_dot) / (self.theta_dot - self.phi_dot)).powf(self.falloff)
            };
        }

        if let Some(n) = normal {
            scale *= dot_product(n, &to_light).max(0.0);
        }
        vector_scale(&self.color, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_inverse_square() {
        let l = LightDesc::point([0.0, 0.0, 10.0], [100.0, 100.0, 100.0]);
        let i = l.intensity_at(&[0.0, 0.0, 0.0], Some(&[0.0, 0.0, 1.0]));
        assert!((i[0] - 1.0).abs() < 1e-5);
        // facing away
        let i = l.intensity_at(&[0.0, 0.0, 0.0], Some(&[0.0, 0.0, -1.0]));
        assert_eq!(i, [0.0; 3]);
    }

    #[test]
    fn test_range_cutoff() {
        let mut l = LightDesc::point([0.0; 3], [1.0; 3]);
        l.range = 5.0;
        assert_eq!(l.distance_attenuation(6.0), 0.0);
        assert!(l.distance_attenuation(2.0) > 0.0);
    }

    #[test]
    fn test_spot_cone() {
        let l = LightDesc::spot([0.0, 0.0, 10.0], [0.0, 0.0, -1.0], [100.0; 3], 30.0, 60.0);
        assert!(l.intensity_at(&[0.0, 0.0, 0.0], None)[0] > 0.0);
        // 45 degrees off-axis lies outside the 30-degree outer half angle
        assert_eq!(l.intensity_at(&[10.0, 0.0, 0.0], None)[0], 0.0);
    }

    #[test]
    fn test_directional() {
        let l = LightDesc::directional([0.0, 0.0, -2.0], [2.0, 1.0, 0.5]);
        let (dir, dist) = l.direction_from(&[5.0, 5.0, 5.0]);
        assert_eq!(dir, [0.0, 0.0, 1.0]);
        assert!(dist.is_infinite());
        assert_eq!(l.intensity_at(&[0.0; 3], Some(&[0.0, 0.0, 1.0])), [2.0, 1.0, 0.5]);
    }
}
