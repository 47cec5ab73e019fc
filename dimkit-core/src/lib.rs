pub mod curve;
pub mod document;
pub mod intersect;
pub mod nurbs;

pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 图纸中的二维点。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 图纸中的二维方向或缩放量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 轴对齐范围，初始为空。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Bounds2D {
        min: DVec2,
        max: DVec2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: DVec2::splat(f64::INFINITY),
                max: DVec2::splat(f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x > self.max.x || self.min.y > self.max.y
        }

        pub fn include_point(&mut self, point: DVec2) {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if !other.is_empty() {
                self.include_point(other.min);
                self.include_point(other.max);
            }
        }

        /// 空范围返回 None。
        pub fn center(&self) -> Option<DVec2> {
            (!self.is_empty()).then(|| (self.min + self.max) * 0.5)
        }

        /// 对角线长度，空范围返回 0。
        pub fn diagonal(&self) -> f64 {
            if self.is_empty() { 0.0 } else { (self.max - self.min).length() }
        }
    }

    /// 任意轴算法：根据法向量构造 OCS 的 X/Y 轴。
    pub fn ocs_axes(normal: DVec3) -> (DVec3, DVec3, DVec3) {
        const ARBITRARY_AXIS_LIMIT: f64 = 1.0 / 64.0;
        let n = normal.normalize_or(DVec3::Z);
        let x = if n.x.abs() < ARBITRARY_AXIS_LIMIT && n.y.abs() < ARBITRARY_AXIS_LIMIT {
            DVec3::Y.cross(n)
        } else {
            DVec3::Z.cross(n)
        }
        .normalize();
        let y = n.cross(x);
        (x, y, n)
    }

    #[inline]
    pub fn ocs_to_world(point: DVec2, elevation: f64, normal: DVec3) -> DVec3 {
        let (ax, ay, az) = ocs_axes(normal);
        ax * point.x + ay * point.y + az * elevation
    }

    /// 世界坐标投影回 OCS，z 分量为到 OCS 平面的高度。
    #[inline]
    pub fn world_to_ocs(point: DVec3, normal: DVec3) -> DVec3 {
        let (ax, ay, az) = ocs_axes(normal);
        DVec3::new(point.dot(ax), point.dot(ay), point.dot(az))
    }
}

pub mod tolerance {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 几何容差：点重合与向量方向分别使用独立阈值。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Tolerance {
        pub equal_point: f64,
        pub equal_vector: f64,
    }

    impl Tolerance {
        pub const DEFAULT: Tolerance = Tolerance {
            equal_point: 1e-10,
            equal_vector: 1e-10,
        };

        #[inline]
        pub const fn new(equal_point: f64, equal_vector: f64) -> Self {
            Self {
                equal_point,
                equal_vector,
            }
        }

        #[inline]
        pub fn is_zero(self, value: f64) -> bool {
            value.abs() <= self.equal_point
        }

        #[inline]
        pub fn points_equal(self, a: DVec3, b: DVec3) -> bool {
            a.distance(b) <= self.equal_point
        }

        #[inline]
        pub fn points_equal2(self, a: DVec2, b: DVec2) -> bool {
            a.distance(b) <= self.equal_point
        }

        /// 单值比较，排序与二分查找时按坐标分量逐个调用。
        #[inline]
        pub fn values_equal(self, a: f64, b: f64) -> bool {
            (a - b).abs() <= self.equal_point
        }

        pub fn is_parallel(self, a: DVec3, b: DVec3) -> bool {
            let (Some(a), Some(b)) = (a.try_normalize(), b.try_normalize()) else {
                return false;
            };
            a.cross(b).length() <= self.equal_vector
        }

        pub fn is_codirectional(self, a: DVec3, b: DVec3) -> bool {
            self.is_parallel(a, b) && a.dot(b) > 0.0
        }

        pub fn is_perpendicular(self, a: DVec3, b: DVec3) -> bool {
            let (Some(a), Some(b)) = (a.try_normalize(), b.try_normalize()) else {
                return false;
            };
            a.dot(b).abs() <= self.equal_vector
        }
    }

    impl Default for Tolerance {
        fn default() -> Self {
            Self::DEFAULT
        }
    }

}

#[cfg(test)]
mod tests {
    use glam::{DVec2, DVec3};

    use crate::geometry::{Bounds2D, ocs_axes, ocs_to_world, world_to_ocs};

    #[test]
    fn ocs_axes_follow_arbitrary_axis_rule() {
        let (x, y, z) = ocs_axes(DVec3::Z);
        assert!((x - DVec3::X).length() < 1e-12);
        assert!((y - DVec3::Y).length() < 1e-12);
        assert!((z - DVec3::Z).length() < 1e-12);

        let (x, y, _) = ocs_axes(-DVec3::Z);
        assert!((x - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-12);
        assert!((y - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn ocs_round_trip_keeps_elevation() {
        let normal = DVec3::new(1.0, 1.0, 1.0);
        let world = ocs_to_world(DVec2::new(3.0, -2.0), 4.0, normal);
        let back = world_to_ocs(world, normal);
        assert!((back.x - 3.0).abs() < 1e-9);
        assert!((back.y + 2.0).abs() < 1e-9);
        assert!((back.z - 4.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_track_center_and_diagonal() {
        let mut bounds = Bounds2D::empty();
        assert!(bounds.is_empty());
        assert_eq!(bounds.diagonal(), 0.0);
        assert_eq!(bounds.center(), None);
        bounds.include_point(DVec2::new(-1.0, -1.0));
        bounds.include_point(DVec2::new(3.0, 2.0));
        let center = bounds.center().expect("非空范围应有中心");
        assert!((center - DVec2::new(1.0, 0.5)).length() < 1e-12);
        assert!((bounds.diagonal() - 5.0).abs() < 1e-12);
    }
}
