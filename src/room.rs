use nalgebra::{Point3, Vector3};

use crate::dose::DoseScore;
use crate::error::{Error, Result};
use crate::geom::Aabb;
use crate::item::Medium;
use crate::material::Material;


/// Box-shaped room with walls of finite thickness.
///
/// The inner box is empty space filled by the world medium; only the wall
/// shell between the inner and outer boxes belongs to the room. Energy
/// imparted in the walls is scored.
#[derive(Debug, Clone)]
pub struct EnclosedRoom {
    inner: Aabb,
    wall_thickness: f64,
    wall_material: Option<Material>,
    wall_density: Option<f64>,
    scored: DoseScore,
}

impl Default for EnclosedRoom {
    fn default() -> Self {
        Self {
            inner: Aabb::from_array([-300.0, -300.0, -300.0, 300.0, 300.0, 300.0]),
            wall_thickness: 2.0,
            wall_material: None,
            wall_density: None,
            scored: DoseScore::new(),
        }
    }
}

impl EnclosedRoom {
    /// Sets the inner box as `[xmin, ymin, zmin, xmax, ymax, zmax]` in cm.
    pub fn set_inner_room_aabb(&mut self, aabb: [f64; 6]) {
        self.inner = Aabb::from_array(aabb);
    }

    /// Wall thickness in cm.
    pub fn set_wall_thickness(&mut self, thickness: f64) {
        self.wall_thickness = thickness;
    }

    /// Sets the wall material and density (g/cm³). Lead at standard density is
    /// used when nothing is set.
    pub fn set_material(&mut self, material: Material, density: f64) {
        self.wall_material = Some(material);
        self.wall_density = Some(density);
    }

    pub fn inner_aabb(&self) -> Aabb {
        self.inner
    }

    pub fn outer_aabb(&self) -> Aabb {
        self.inner.expanded(self.wall_thickness)
    }

    pub fn aabb(&self) -> Aabb {
        self.outer_aabb()
    }

    pub fn wall_thickness(&self) -> f64 {
        self.wall_thickness
    }

    /// Wall mass in grams, zero before the room is prepared.
    pub fn wall_mass(&self) -> f64 {
        let volume = self.outer_aabb().volume() - self.inner.volume();
        volume * self.wall_density.unwrap_or(0.0)
    }

    /// Energy imparted in the walls.
    pub fn energy_imparted(&self) -> DoseScore {
        self.scored
    }

    /// Mean absorbed dose in the walls (mGy).
    pub fn wall_dose_mgy(&self) -> f64 {
        self.scored.dose_mgy(self.wall_mass())
    }

    pub(crate) fn prepare(&mut self, index: usize) -> Result<()> {
        if self.inner.is_degenerate() {
            return Err(Error::InvalidGeometry {
                item: index,
                kind: "EnclosedRoom",
                reason: format!("inner box {:?} has zero volume", self.inner),
            });
        }
        if !(self.wall_thickness.is_finite() && self.wall_thickness > 0.0) {
            return Err(Error::InvalidGeometry {
                item: index,
                kind: "EnclosedRoom",
                reason: format!("wall thickness must be positive, got {}", self.wall_thickness),
            });
        }
        if self.wall_material.is_none() {
            let lead = Material::by_z(82)?;
            self.wall_density = Some(lead.standard_density());
            self.wall_material = Some(lead);
        }
        if self.wall_density.is_none() {
            self.wall_density = self.wall_material.as_ref().map(|m| m.standard_density());
        }
        Ok(())
    }

    pub(crate) fn intersect(&self, pos: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        let inner = self.inner.ray_boundary(pos, dir);
        let outer = self.outer_aabb().ray_boundary(pos, dir);
        match (inner, outer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn medium_at(&self, pos: &Point3<f64>) -> Option<(usize, Medium<'_>)> {
        if self.inner.contains(pos) || !self.outer_aabb().contains(pos) {
            return None;
        }
        let material = self.wall_material.as_ref()?;
        let density = self.wall_density?;
        Some((0, Medium { material, density }))
    }

    pub(crate) fn merge(&mut self, tally: &DoseScore) {
        self.scored += *tally;
    }

    pub(crate) fn clear_scored(&mut self) {
        self.scored.clear();
    }
}
