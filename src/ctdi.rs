//! Cylindrical CTDI dose phantom.
//!
//! A PMMA cylinder with its axis along z and five air-filled measurement
//! holes running its full length: one on the axis and four at a fixed depth
//! below the surface at 0°, 90°, 180° and 270°. Energy imparted is scored by
//! analog deposition in the bulk and in each hole. Air kerma in each hole is
//! additionally scored with a track-length estimator, which is what the
//! weighted CTDI is computed from.

use nalgebra::{Point3, Vector3};
use std::ops::AddAssign;

use crate::dose::DoseScore;
use crate::error::{Error, Result};
use crate::geom::{Aabb, Cylinder};
use crate::item::Medium;
use crate::material::Material;
use crate::particle::Particle;

/// Number of measurement holes.
pub const HOLES: usize = 5;

const PMMA: &str = "Polymethyl Methacralate (Lucite, Perspex)";
const AIR: &str = "Air, Dry (near sea level)";


/// Scored state of a [`CtdiPhantom`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CtdiTally {
    /// Energy imparted in the PMMA bulk.
    pub bulk: DoseScore,
    /// Energy imparted in each hole.
    pub holes: [DoseScore; HOLES],
    /// Track-length air kerma estimate per hole, scored in keV/g.
    pub kerma: [DoseScore; HOLES],
}

impl AddAssign<&CtdiTally> for CtdiTally {
    fn add_assign(&mut self, other: &CtdiTally) {
        self.bulk += other.bulk;
        for (a, b) in self.holes.iter_mut().zip(other.holes.iter()) {
            *a += *b;
        }
        for (a, b) in self.kerma.iter_mut().zip(other.kerma.iter()) {
            *a += *b;
        }
    }
}

/// PMMA CTDI phantom. Defaults to the 32 cm body phantom, 15 cm long,
/// centred at the origin.
#[derive(Debug, Clone)]
pub struct CtdiPhantom {
    center: Point3<f64>,
    radius: f64,
    length: f64,
    hole_radius: f64,
    hole_depth: f64,
    pmma: Option<Material>,
    air: Option<Material>,
    scored: CtdiTally,
}

impl Default for CtdiPhantom {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            radius: 16.0,
            length: 15.0,
            hole_radius: 0.5,
            hole_depth: 1.0,
            pmma: None,
            air: None,
            scored: CtdiTally::default(),
        }
    }
}

impl CtdiPhantom {
    pub fn set_center(&mut self, center: [f64; 3]) {
        self.center = Point3::from(center);
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }

    pub fn set_hole_radius(&mut self, radius: f64) {
        self.hole_radius = radius;
    }

    /// Depth of the peripheral hole axes below the phantom surface (cm).
    pub fn set_hole_depth(&mut self, depth: f64) {
        self.hole_depth = depth;
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    fn body(&self) -> Cylinder {
        Cylinder::new(self.center, self.radius, 0.5 * self.length)
    }

    /// Measurement holes: centre first, then the periphery counter-clockwise from +y.
    pub fn holes(&self) -> [Cylinder; HOLES] {
        let d = self.radius - self.hole_depth;
        let offsets = [
            Vector3::zeros(),
            Vector3::new(0.0, d, 0.0),
            Vector3::new(-d, 0.0, 0.0),
            Vector3::new(0.0, -d, 0.0),
            Vector3::new(d, 0.0, 0.0),
        ];
        offsets.map(|o| Cylinder::new(self.center + o, self.hole_radius, 0.5 * self.length))
    }

    pub fn aabb(&self) -> Aabb {
        self.body().aabb()
    }

    /// Mass of the air in one hole (g), zero before the phantom is prepared.
    pub fn hole_mass(&self) -> f64 {
        let density = self.air.as_ref().map_or(0.0, |a| a.standard_density());
        self.holes()[0].volume() * density
    }

    /// Mass of the PMMA bulk (g), zero before the phantom is prepared.
    pub fn bulk_mass(&self) -> f64 {
        let density = self.pmma.as_ref().map_or(0.0, |m| m.standard_density());
        let air_volume: f64 = self.holes().iter().map(|h| h.volume()).sum();
        (self.body().volume() - air_volume) * density
    }

    /// Scored state.
    pub fn scored(&self) -> &CtdiTally {
        &self.scored
    }

    /// Track-length air kerma in hole `index` (mGy).
    pub fn hole_kerma_mgy(&self, index: usize) -> f64 {
        self.scored.kerma[index].dose_mgy(1.0)
    }

    /// Analog absorbed dose in hole `index` (mGy).
    pub fn hole_dose_mgy(&self, index: usize) -> f64 {
        self.scored.holes[index].dose_mgy(self.hole_mass())
    }

    /// Mean absorbed dose in the PMMA bulk (mGy).
    pub fn bulk_dose_mgy(&self) -> f64 {
        self.scored.bulk.dose_mgy(self.bulk_mass())
    }

    /// Weighted CTDI (mGy): one third of the centre hole plus two thirds of
    /// the mean of the peripheral holes.
    pub fn ctdiw(&self) -> f64 {
        let center = self.hole_kerma_mgy(0);
        let periphery = (1..HOLES).map(|i| self.hole_kerma_mgy(i)).sum::<f64>() / 4.0;
        center / 3.0 + 2.0 * periphery / 3.0
    }

    pub(crate) fn prepare(&mut self, index: usize) -> Result<()> {
        let invalid = |reason: String| Error::InvalidGeometry {
            item: index,
            kind: "CtdiPhantom",
            reason,
        };
        if !(self.radius > 0.0 && self.length > 0.0) {
            return Err(invalid(format!(
                "radius {} and length {} must be positive",
                self.radius, self.length
            )));
        }
        if !(self.hole_radius > 0.0
            && self.hole_depth >= self.hole_radius
            && self.hole_depth + self.hole_radius <= self.radius)
        {
            return Err(invalid(format!(
                "holes of radius {} at depth {} do not fit a phantom of radius {}",
                self.hole_radius, self.hole_depth, self.radius
            )));
        }
        if self.pmma.is_none() {
            self.pmma = Some(Material::by_nist_name(PMMA)?);
        }
        if self.air.is_none() {
            self.air = Some(Material::by_nist_name(AIR)?);
        }
        Ok(())
    }

    pub(crate) fn intersect(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        std::iter::once(self.body())
            .chain(self.holes())
            .filter_map(|c| c.ray_boundary(pos, dir))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub(crate) fn medium_at(&self, pos: &Point3<f64>) -> Option<(usize, Medium<'_>)> {
        if !self.body().contains(pos) {
            return None;
        }
        if let Some(hole) = self.holes().iter().position(|h| h.contains(pos)) {
            let material = self.air.as_ref()?;
            return Some((
                hole + 1,
                Medium {
                    material,
                    density: material.standard_density(),
                },
            ));
        }
        let material = self.pmma.as_ref()?;
        Some((
            0,
            Medium {
                material,
                density: material.standard_density(),
            },
        ))
    }

    pub(crate) fn tally(&self) -> CtdiTally {
        CtdiTally::default()
    }

    pub(crate) fn deposit(&self, tally: &mut CtdiTally, zone: usize, energy: f64) {
        match zone {
            0 => tally.bulk.record(energy),
            z if z <= HOLES => tally.holes[z - 1].record(energy),
            _ => {}
        }
    }

    /// Track-length kerma: `w E l (mu_tr/rho)` over the hole volume.
    pub(crate) fn score_track(
        &self,
        tally: &mut CtdiTally,
        zone: usize,
        particle: &Particle,
        length: f64,
    ) {
        if zone == 0 || zone > HOLES {
            return;
        }
        let Some(air) = self.air.as_ref() else {
            return;
        };
        let volume = self.holes()[zone - 1].volume();
        let kerma = particle.carried_energy() * length * air.mass_energy_transfer(particle.energy)
            / volume;
        tally.kerma[zone - 1].record(kerma);
    }

    pub(crate) fn merge(&mut self, tally: &CtdiTally) {
        self.scored += tally;
    }

    pub(crate) fn clear_scored(&mut self) {
        self.scored = CtdiTally::default();
    }
}
