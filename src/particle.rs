use nalgebra::{Point3, Vector3};

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn translate_moves_along_direction() {
        let mut p = Particle::new(Point3::origin(), Vector3::new(0.0, 3.0, 4.0), 60.0, 1.0);
        assert!((p.dir.norm() - 1.0).abs() < 1e-12);
        p.translate(5.0);
        assert!((p.pos - Point3::new(0.0, 3.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn non_finite_state_is_detected() {
        let mut p = Particle::new(Point3::origin(), Vector3::z(), 60.0, 1.0);
        assert!(p.is_finite());
        p.energy = f64::NAN;
        assert!(!p.is_finite());
    }
}

/// A photon history in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub pos: Point3<f64>,
    /// Unit direction of travel.
    pub dir: Vector3<f64>,
    /// Photon energy (keV).
    pub energy: f64,
    /// Statistical weight.
    pub weight: f64,
}

impl Particle {
    /// Creates a new particle. The direction is normalised.
    pub fn new(pos: Point3<f64>, dir: Vector3<f64>, energy: f64, weight: f64) -> Self {
        Self {
            pos,
            dir: dir.normalize(),
            energy,
            weight,
        }
    }

    /// Moves the particle `distance` along its direction.
    pub fn translate(&mut self, distance: f64) {
        self.pos += self.dir * distance;
    }

    /// Energy carried by the particle, `energy * weight`.
    pub fn carried_energy(&self) -> f64 {
        self.energy * self.weight
    }

    /// True when every component of the state is a finite number.
    pub fn is_finite(&self) -> bool {
        self.energy.is_finite()
            && self.weight.is_finite()
            && self.pos.coords.iter().all(|v| v.is_finite())
            && self.dir.iter().all(|v| v.is_finite())
    }
}

/// Terminal state of a photon history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Left the world bounds.
    Escaped,
    /// Photoelectric absorption.
    Absorbed,
    /// Energy or weight fell below the transport cutoff; remaining energy deposited locally.
    BelowCutoff,
    /// Reached an inconsistent numerical state and was dropped.
    Discarded,
}
