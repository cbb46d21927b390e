//! Geometric primitives and ray intersection.
//!
//! All intersection routines take a ray origin and a unit direction and
//! report distances along the ray. A distance is only reported as a hit when
//! it exceeds [`RAYCAST_MINIMUM_DISTANCE`], so a ray that starts on a surface
//! reports the next surface ahead of it (for example the exit face of a box
//! it has just entered).

use nalgebra::{Point3, Vector3};

use crate::config::RAYCAST_MINIMUM_DISTANCE;


/// Returns the first boundary of a `(t_enter, t_exit)` interval that lies ahead of the ray.
fn nearest_ahead(interval: Option<(f64, f64)>) -> Option<f64> {
    let (t0, t1) = interval?;
    if t0 > RAYCAST_MINIMUM_DISTANCE {
        Some(t0)
    } else if t1 > RAYCAST_MINIMUM_DISTANCE {
        Some(t1)
    } else {
        None
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Builds a box from `[xmin, ymin, zmin, xmax, ymax, zmax]`.
    pub fn from_array(a: [f64; 6]) -> Self {
        Self::new(Point3::new(a[0], a[1], a[2]), Point3::new(a[3], a[4], a[5]))
    }

    /// An empty box that acts as the identity for [`Aabb::union`].
    pub fn empty() -> Self {
        Self::new(
            Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        )
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    /// True for boxes with zero or negative extent along any axis or with
    /// non-finite corners.
    pub fn is_degenerate(&self) -> bool {
        let e = self.extent();
        !(e.iter().all(|v| v.is_finite() && *v > 0.0))
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Box grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Aabb {
        let m = Vector3::repeat(margin);
        Aabb::new(self.min - m, self.max + m)
    }

    /// Parametric interval `(t_enter, t_exit)` over which the ray lies inside
    /// the box. `t_enter` may be negative when the origin is inside. Returns
    /// `None` when the ray misses or the box lies entirely behind it.
    pub fn ray_interval(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<(f64, f64)> {
        let mut t0 = f64::NEG_INFINITY;
        let mut t1 = f64::INFINITY;
        for i in 0..3 {
            if dir[i] == 0.0 {
                if pos[i] < self.min[i] || pos[i] > self.max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[i];
            let (near, far) = {
                let a = (self.min[i] - pos[i]) * inv;
                let b = (self.max[i] - pos[i]) * inv;
                if a < b {
                    (a, b)
                } else {
                    (b, a)
                }
            };
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        if t1 < 0.0 {
            return None;
        }
        Some((t0, t1))
    }

    /// Distance to the next box face ahead of the ray.
    pub fn ray_boundary(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        nearest_ahead(self.ray_interval(pos, dir))
    }
}

/// Finite cylinder with its axis parallel to z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    pub center: Point3<f64>,
    pub radius: f64,
    pub half_length: f64,
}

impl Cylinder {
    pub fn new(center: Point3<f64>, radius: f64, half_length: f64) -> Self {
        Self {
            center,
            radius,
            half_length,
        }
    }

    pub fn aabb(&self) -> Aabb {
        let e = Vector3::new(self.radius, self.radius, self.half_length);
        Aabb::new(self.center - e, self.center + e)
    }

    pub fn volume(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius * 2.0 * self.half_length
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let d = p - self.center;
        d.x * d.x + d.y * d.y <= self.radius * self.radius && d.z.abs() <= self.half_length
    }

    /// Parametric interval over which the ray lies inside the cylinder.
    pub fn ray_interval(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<(f64, f64)> {
        let o = pos - self.center;

        // lateral surface
        let a = dir.x * dir.x + dir.y * dir.y;
        let c = o.x * o.x + o.y * o.y - self.radius * self.radius;
        let (mut t0, mut t1) = if a < 1e-15 {
            if c > 0.0 {
                return None;
            }
            (f64::NEG_INFINITY, f64::INFINITY)
        } else {
            let b = o.x * dir.x + o.y * dir.y;
            let disc = b * b - a * c;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            ((-b - sq) / a, (-b + sq) / a)
        };

        // end caps
        if dir.z == 0.0 {
            if o.z.abs() > self.half_length {
                return None;
            }
        } else {
            let a = (-self.half_length - o.z) / dir.z;
            let b = (self.half_length - o.z) / dir.z;
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }

        if t0 > t1 || t1 < 0.0 {
            return None;
        }
        Some((t0, t1))
    }

    /// Distance to the next cylinder surface ahead of the ray.
    pub fn ray_boundary(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        nearest_ahead(self.ray_interval(pos, dir))
    }
}

/// Flat circular disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disk {
    pub center: Point3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
    pub radius: f64,
}

impl Disk {
    pub fn new(center: Point3<f64>, normal: Vector3<f64>, radius: f64) -> Self {
        Self {
            center,
            normal: normal.normalize(),
            radius,
        }
    }

    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }

    /// Bounding box of the disk.
    pub fn aabb(&self) -> Aabb {
        // extent of a circle along each axis is r * sqrt(1 - n_i^2)
        let e = self
            .normal
            .map(|n| self.radius * (1.0 - n * n).max(0.0).sqrt());
        Aabb::new(self.center - e, self.center + e)
    }

    /// Distance along the ray to the disk, if it is hit ahead of the origin.
    pub fn ray_intersect(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        let denom = dir.dot(&self.normal);
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = (self.center - pos).dot(&self.normal) / denom;
        if t <= RAYCAST_MINIMUM_DISTANCE {
            return None;
        }
        let hit = pos + dir * t;
        if (hit - self.center).norm_squared() <= self.radius * self.radius {
            Some(t)
        } else {
            None
        }
    }
}
