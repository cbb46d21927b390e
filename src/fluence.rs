//! Planar fluence scorer.
//!
//! A transparent disk that records the energy spectrum of photons crossing
//! it. Each crossing adds `weight / area` to the bin `floor(energy / step)`.
//! The histogram has a fixed number of bins set by the energy step and the
//! maximum energy; crossings at or above the maximum energy are not binned
//! and are accumulated in a separate overflow tally instead.

use nalgebra::{Point3, Vector3};
use std::ops::AddAssign;

use crate::config::GEOMETRIC_EPSILON;
use crate::error::{Error, Result};
use crate::geom::{Aabb, Disk};
use crate::particle::Particle;

#[cfg(test)]
mod tests {

    use super::*;

    fn scorer() -> FluenceScore {
        let mut score = FluenceScore::default();
        score.set_center([0.0, 0.0, -10.0]);
        score.set_plane_normal([0.0, 0.0, 1.0]);
        score.set_radius(1.0);
        score.set_energy_step(1.0);
        score.set_max_energy(10.0);
        score.prepare(0).unwrap();
        score
    }

    #[test]
    fn crossings_land_in_floor_bins() {
        let mut score = scorer();
        let mut tally = score.tally();
        let area = std::f64::consts::PI;
        for energy in [0.2, 3.7, 3.1, 9.99] {
            let p = Particle::new(Point3::origin(), -Vector3::z(), energy, 2.0);
            score.score_crossing(&mut tally, &p);
        }
        score.merge(&tally);
        let spectrum = score.get_fluence_spectrum();
        assert_eq!(spectrum.len(), 10);
        assert!((spectrum[0].0 - 0.5).abs() < 1e-12);
        assert!((spectrum[3].1 - 4.0 / area).abs() < 1e-12);
        assert!((spectrum[0].1 - 2.0 / area).abs() < 1e-12);
        assert!((spectrum[9].1 - 2.0 / area).abs() < 1e-12);
        assert_eq!(score.overflow(), 0.0);
        assert!(spectrum.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn energies_beyond_maximum_are_dropped_into_overflow() {
        let mut score = scorer();
        let mut tally = score.tally();
        for energy in [10.0, 25.0, f64::NAN] {
            let p = Particle::new(Point3::origin(), -Vector3::z(), energy, 1.0);
            score.score_crossing(&mut tally, &p);
        }
        score.merge(&tally);
        assert!(score.get_fluence_spectrum().iter().all(|(_, f)| *f == 0.0));
        assert!((score.overflow() - 3.0 / std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(score.crossings(), 3);
    }

    #[test]
    fn clear_returns_to_zero() {
        let mut score = scorer();
        let mut tally = score.tally();
        let p = Particle::new(Point3::origin(), -Vector3::z(), 5.0, 1.0);
        score.score_crossing(&mut tally, &p);
        score.merge(&tally);
        score.clear_scored();
        assert!(score.get_fluence_spectrum().iter().all(|(_, f)| *f == 0.0));
        assert_eq!(score.overflow(), 0.0);
        assert_eq!(score.crossings(), 0);
    }

    #[test]
    fn bounds_are_thin_but_not_flat() {
        let score = scorer();
        assert!(!score.aabb().is_degenerate());
        let t = score
            .intersect(&Point3::new(0.5, 0.0, 0.0), &-Vector3::z())
            .unwrap();
        assert!((t - 10.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_binning_is_rejected() {
        let mut score = FluenceScore::default();
        score.set_energy_step(0.0);
        assert!(score.prepare(2).is_err());
        let mut score = FluenceScore::default();
        score.set_radius(-1.0);
        assert!(matches!(
            score.prepare(2),
            Err(Error::InvalidGeometry { item: 2, .. })
        ));
    }
}

/// Scored state of a [`FluenceScore`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FluenceTally {
    /// Fluence per bin (1/cm²).
    pub fluence: Vec<f64>,
    /// Fluence carried by crossings outside the binned energy range.
    pub overflow: f64,
    pub crossings: u64,
}

impl FluenceTally {
    pub fn new(bins: usize) -> Self {
        Self {
            fluence: vec![0.0; bins],
            overflow: 0.0,
            crossings: 0,
        }
    }
}

impl AddAssign<&FluenceTally> for FluenceTally {
    fn add_assign(&mut self, other: &FluenceTally) {
        for (a, b) in self.fluence.iter_mut().zip(other.fluence.iter()) {
            *a += b;
        }
        self.overflow += other.overflow;
        self.crossings += other.crossings;
    }
}

/// Disk shaped fluence scorer. It has no medium of its own.
#[derive(Debug, Clone)]
pub struct FluenceScore {
    center: Point3<f64>,
    normal: Vector3<f64>,
    radius: f64,
    energy_step: f64,
    max_energy: f64,
    scored: FluenceTally,
}

impl Default for FluenceScore {
    fn default() -> Self {
        let mut score = Self {
            center: Point3::origin(),
            normal: Vector3::z(),
            radius: 16.0,
            energy_step: 1.0,
            max_energy: 150.0,
            scored: FluenceTally::default(),
        };
        score.scored = score.tally();
        score
    }
}

impl FluenceScore {
    pub fn set_center(&mut self, center: [f64; 3]) {
        self.center = Point3::from(center);
    }

    /// Sets the disk normal. It is normalised when the scorer is prepared.
    pub fn set_plane_normal(&mut self, normal: [f64; 3]) {
        self.normal = Vector3::from(normal);
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    /// Histogram bin width (keV). Resets the scored spectrum.
    pub fn set_energy_step(&mut self, step: f64) {
        self.energy_step = step;
        self.scored = self.tally();
    }

    /// Upper end of the binned range (keV). Resets the scored spectrum.
    pub fn set_max_energy(&mut self, max_energy: f64) {
        self.max_energy = max_energy;
        self.scored = self.tally();
    }

    pub fn energy_step(&self) -> f64 {
        self.energy_step
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    fn disk(&self) -> Disk {
        Disk::new(self.center, self.normal, self.radius)
    }

    fn bins(&self) -> usize {
        if self.energy_step > 0.0 && self.max_energy > 0.0 {
            (self.max_energy / self.energy_step).ceil() as usize
        } else {
            0
        }
    }

    /// Bounding box of the disk, padded so it keeps a non-zero thickness.
    pub fn aabb(&self) -> Aabb {
        self.disk().aabb().expanded(GEOMETRIC_EPSILON)
    }

    /// Fluence spectrum as `(bin centre energy, fluence)` pairs in ascending energy.
    pub fn get_fluence_spectrum(&self) -> Vec<(f64, f64)> {
        self.scored
            .fluence
            .iter()
            .enumerate()
            .map(|(i, f)| ((i as f64 + 0.5) * self.energy_step, *f))
            .collect()
    }

    /// Fluence of crossings that fell outside the binned range.
    pub fn overflow(&self) -> f64 {
        self.scored.overflow
    }

    /// Number of scored crossings, binned or not.
    pub fn crossings(&self) -> u64 {
        self.scored.crossings
    }

    pub(crate) fn prepare(&mut self, index: usize) -> Result<()> {
        let invalid = |reason: String| Error::InvalidGeometry {
            item: index,
            kind: "FluenceScore",
            reason,
        };
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(invalid(format!("radius must be positive, got {}", self.radius)));
        }
        if !(self.normal.norm() > 0.0) {
            return Err(invalid("plane normal must be non-zero".into()));
        }
        if !(self.energy_step > 0.0 && self.max_energy >= self.energy_step) {
            return Err(invalid(format!(
                "energy step {} keV does not fit maximum energy {} keV",
                self.energy_step, self.max_energy
            )));
        }
        self.normal = self.normal.normalize();
        if self.scored.fluence.len() != self.bins() {
            self.scored = self.tally();
        }
        Ok(())
    }

    pub(crate) fn intersect(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        self.disk().ray_intersect(pos, dir)
    }

    pub(crate) fn tally(&self) -> FluenceTally {
        FluenceTally::new(self.bins())
    }

    pub(crate) fn score_crossing(&self, tally: &mut FluenceTally, particle: &Particle) {
        let fluence = particle.weight / self.disk().area();
        tally.crossings += 1;
        let energy = particle.energy;
        if !(energy >= 0.0 && energy < self.max_energy) {
            tally.overflow += fluence;
            return;
        }
        match tally.fluence.get_mut((energy / self.energy_step) as usize) {
            Some(bin) => *bin += fluence,
            None => tally.overflow += fluence,
        }
    }

    pub(crate) fn merge(&mut self, tally: &FluenceTally) {
        self.scored += tally;
    }

    pub(crate) fn clear_scored(&mut self) {
        self.scored = self.tally();
    }
}
