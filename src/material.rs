//! Photon interaction data for elements and compounds.
//!
//! A [`Material`] holds mass attenuation coefficients for the three photon
//! interaction channels (photoelectric absorption, incoherent/Compton and
//! coherent/Rayleigh scattering) and the mass energy-transfer coefficient,
//! tabulated on a logarithmic energy grid at construction time.
//!
//! Elemental cross sections come from a semi-empirical model:
//! - photoelectric: `C Z^4 / E^3` with a jump at every modelled shell edge
//! - incoherent: Klein-Nishina per electron with a binding suppression at low energy
//! - coherent: Thomson scattering on the whole atom, falling as `E^-2` above a
//!   Z-dependent knee
//!
//! Compounds combine elemental values by mass fraction. Lookups between grid
//! points are log-log linear. Energies below the first or above the last grid
//! point are clamped to the edge value; this is the documented policy for
//! out-of-range energies and never panics.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

use crate::atoms::{Atom, Shell};
use crate::compounds;
use crate::config::{AVOGADRO, BARN, MIN_TABULATED_ENERGY};
use crate::error::{Error, Result};
use crate::helpers::{interpolate_loglog, logspace};
use crate::interactions;

#[cfg(test)]
mod tests {

    use super::*;

    fn rel_diff(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs()
    }

    #[test]
    fn lead_by_atomic_number() {
        let lead = Material::by_z(82).unwrap();
        assert_eq!(lead.name(), "Pb");
        assert!((lead.standard_density() - 11.34).abs() < 0.02);
        // photoelectric dominates lead at 100 keV, total is ~5.5 cm2/g
        let att = lead.attenuation_values(100.0);
        assert!(att.photoelectric > att.incoherent + att.coherent);
        assert!(rel_diff(att.sum(), 5.55) < 0.15, "lead: {:?}", att);
    }

    #[test]
    fn water_close_to_reference_at_60_kev() {
        let water = Material::by_nist_name("Water, Liquid").unwrap();
        let mu = water.total_attenuation(60.0);
        assert!(rel_diff(mu, 0.2059) < 0.15, "mu: {}", mu);
        // Compton dominates water at 60 keV
        let att = water.attenuation_values(60.0);
        assert!(att.incoherent > att.photoelectric);
    }

    #[test]
    fn unknown_identifiers_fail_distinctly() {
        assert_eq!(Material::by_z(0).unwrap_err(), Error::UnknownElement(0));
        assert_eq!(Material::by_z(140).unwrap_err(), Error::UnknownElement(140));
        assert_eq!(
            Material::by_nist_name("Unobtainium").unwrap_err(),
            Error::UnknownCompound("Unobtainium".to_string())
        );
    }

    #[test]
    fn k_edge_raises_attenuation() {
        let lead = Material::by_z(82).unwrap();
        let edge = Atom::by_z(82).unwrap().shells(12)[0].binding_energy;
        let below = lead.total_attenuation(edge * 0.999);
        let above = lead.total_attenuation(edge * 1.001);
        assert!(above > 3.0 * below, "below: {}, above: {}", below, above);
    }

    #[test]
    fn out_of_range_energies_clamp_to_edges() {
        let air = Material::by_nist_name("Air, Dry (near sea level)").unwrap();
        let (min, max) = air.energy_range();
        assert_eq!(air.total_attenuation(min * 0.01), air.total_attenuation(min));
        assert_eq!(air.total_attenuation(max * 100.0), air.total_attenuation(max));
        assert_eq!(
            air.mass_energy_transfer(max * 100.0),
            air.mass_energy_transfer(max)
        );
        assert!(air.total_attenuation(-5.0).is_finite());
    }

    #[test]
    fn energy_transfer_below_total_attenuation() {
        let air = Material::by_nist_name("Air, Dry (near sea level)").unwrap();
        for energy in [10.0, 30.0, 60.0, 100.0, 140.0] {
            let mu_tr = air.mass_energy_transfer(energy);
            assert!(mu_tr > 0.0);
            assert!(mu_tr < air.total_attenuation(energy));
        }
        let mu_tr = air.mass_energy_transfer(60.0);
        assert!(mu_tr > 0.02 && mu_tr < 0.05, "mu_tr: {}", mu_tr);
    }

    #[test]
    fn composition_is_normalised() {
        let config = MaterialConfig::default();
        let water =
            Material::from_composition("water", &[(1, 2.0), (8, 16.0)], 1.0, &config).unwrap();
        let total: f64 = water.composition().iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(Material::from_composition("empty", &[], 1.0, &config).is_err());
        assert!(Material::from_composition("neg", &[(1, -1.0)], 1.0, &config).is_err());
    }

    #[test]
    fn shell_count_is_runtime_configurable() {
        let config = MaterialConfig {
            shell_count: 1,
            ..MaterialConfig::default()
        };
        let lead = Material::by_z_with(82, &config).unwrap();
        let full = Material::by_z(82).unwrap();
        // with only the K shell modelled there is no L edge jump
        assert!(lead.energy_grid().len() < full.energy_grid().len());
    }
}

/// Runtime parameters of the cross section tables.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MaterialConfig {
    /// Number of atomic shells modelled per element.
    pub shell_count: usize,
    /// Lowest tabulated energy (keV).
    pub min_energy: f64,
    /// Highest tabulated energy (keV).
    pub max_energy: f64,
    /// Number of logarithmically spaced grid points, edges are added on top.
    pub grid_points: usize,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            shell_count: 12,
            min_energy: MIN_TABULATED_ENERGY,
            max_energy: 300.0,
            grid_points: 160,
        }
    }
}

impl MaterialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shell_count == 0 {
            return Err(Error::Configuration("shell count must be at least 1".into()));
        }
        if !(self.min_energy > 0.0 && self.max_energy > self.min_energy) {
            return Err(Error::Configuration(format!(
                "invalid material energy range [{}, {}] keV",
                self.min_energy, self.max_energy
            )));
        }
        if self.grid_points < 2 {
            return Err(Error::Configuration(
                "material energy grid needs at least 2 points".into(),
            ));
        }
        Ok(())
    }
}

/// Mass attenuation coefficients (cm²/g) per interaction channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttenuationValues {
    pub photoelectric: f64,
    pub incoherent: f64,
    pub coherent: f64,
}

impl AttenuationValues {
    pub fn sum(&self) -> f64 {
        self.photoelectric + self.incoherent + self.coherent
    }
}

impl Add for AttenuationValues {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            photoelectric: self.photoelectric + other.photoelectric,
            incoherent: self.incoherent + other.incoherent,
            coherent: self.coherent + other.coherent,
        }
    }
}

impl Mul<f64> for AttenuationValues {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            photoelectric: self.photoelectric * rhs,
            incoherent: self.incoherent * rhs,
            coherent: self.coherent * rhs,
        }
    }
}

/// Tabulated photon interaction data for one substance. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    name: String,
    composition: Vec<(u32, f64)>,
    standard_density: f64,
    effective_z: f64,
    ln_energy: Vec<f64>,
    ln_photoelectric: Vec<f64>,
    ln_incoherent: Vec<f64>,
    ln_coherent: Vec<f64>,
    ln_energy_transfer: Vec<f64>,
}

impl Material {
    /// Pure element with default table parameters.
    pub fn by_z(z: u32) -> Result<Self> {
        Self::by_z_with(z, &MaterialConfig::default())
    }

    /// Pure element with explicit table parameters.
    pub fn by_z_with(z: u32, config: &MaterialConfig) -> Result<Self> {
        let atom = Atom::by_z(z)?;
        Self::from_composition(atom.symbol, &[(z, 1.0)], atom.standard_density, config)
    }

    /// Compound from the reference table with default table parameters.
    pub fn by_nist_name(name: &str) -> Result<Self> {
        Self::by_nist_name_with(name, &MaterialConfig::default())
    }

    /// Compound from the reference table with explicit table parameters.
    pub fn by_nist_name_with(name: &str, config: &MaterialConfig) -> Result<Self> {
        let compound =
            compounds::by_name(name).ok_or_else(|| Error::UnknownCompound(name.to_string()))?;
        Self::from_composition(
            compound.name,
            compound.composition,
            compound.density,
            config,
        )
    }

    /// Builds a material from (Z, mass fraction) pairs. Fractions are normalised.
    pub fn from_composition(
        name: &str,
        composition: &[(u32, f64)],
        standard_density: f64,
        config: &MaterialConfig,
    ) -> Result<Self> {
        config.validate()?;
        if composition.is_empty() {
            return Err(Error::Configuration(format!(
                "material '{}' has an empty composition",
                name
            )));
        }
        if composition.iter().any(|(_, w)| !(w.is_finite() && *w > 0.0)) {
            return Err(Error::Configuration(format!(
                "material '{}' has non-positive mass fractions",
                name
            )));
        }
        if !(standard_density.is_finite() && standard_density > 0.0) {
            return Err(Error::Configuration(format!(
                "material '{}' has invalid density {}",
                name, standard_density
            )));
        }

        let total: f64 = composition.iter().map(|(_, w)| w).sum();
        let elements = composition
            .iter()
            .map(|&(z, w)| {
                let atom = Atom::by_z(z)?;
                let shells = atom.shells(config.shell_count);
                Ok((atom, shells, w / total))
            })
            .collect::<Result<Vec<(Atom, Vec<Shell>, f64)>>>()?;

        let energy = energy_grid(&elements, config);

        let mut photoelectric = vec![0.0; energy.len()];
        let mut incoherent = vec![0.0; energy.len()];
        let mut coherent = vec![0.0; energy.len()];
        let mut energy_transfer = vec![0.0; energy.len()];
        for (atom, shells, fraction) in elements.iter() {
            // barn/atom -> cm2/g, weighted by mass fraction
            let to_mass = BARN * AVOGADRO / atom.atomic_mass * fraction;
            for (i, &e) in energy.iter().enumerate() {
                let pe = photoelectric_per_atom(atom, shells, e);
                let inc = incoherent_per_atom(atom, e);
                photoelectric[i] += pe * to_mass;
                incoherent[i] += inc * to_mass;
                coherent[i] += coherent_per_atom(atom, e) * to_mass;
                energy_transfer[i] +=
                    (pe + inc * interactions::compton_energy_transfer_fraction(e)) * to_mass;
            }
        }

        // electron weighted mean atomic number
        let (zn, n) = elements
            .iter()
            .fold((0.0, 0.0), |(zn, n), (atom, _, fraction)| {
                let electrons = fraction * atom.z as f64 / atom.atomic_mass;
                (zn + electrons * atom.z as f64, n + electrons)
            });

        let ln = |v: Vec<f64>| v.into_iter().map(|x| x.ln()).collect::<Vec<f64>>();

        Ok(Self {
            name: name.to_string(),
            composition: elements
                .iter()
                .map(|(atom, _, fraction)| (atom.z, *fraction))
                .collect(),
            standard_density,
            effective_z: zn / n,
            ln_energy: ln(energy),
            ln_photoelectric: ln(photoelectric),
            ln_incoherent: ln(incoherent),
            ln_coherent: ln(coherent),
            ln_energy_transfer: ln(energy_transfer),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalised (Z, mass fraction) pairs.
    pub fn composition(&self) -> &[(u32, f64)] {
        &self.composition
    }

    /// Reference density (g/cm³) used when no other density is given.
    pub fn standard_density(&self) -> f64 {
        self.standard_density
    }

    /// Electron weighted mean atomic number.
    pub fn effective_z(&self) -> f64 {
        self.effective_z
    }

    /// Tabulated energies (keV).
    pub fn energy_grid(&self) -> Vec<f64> {
        self.ln_energy.iter().map(|e| e.exp()).collect()
    }

    /// First and last tabulated energy (keV).
    pub fn energy_range(&self) -> (f64, f64) {
        (
            self.ln_energy[0].exp(),
            self.ln_energy[self.ln_energy.len() - 1].exp(),
        )
    }

    /// Mass attenuation coefficients (cm²/g) per channel at `energy` keV.
    pub fn attenuation_values(&self, energy: f64) -> AttenuationValues {
        let energy = sanitize_energy(energy);
        AttenuationValues {
            photoelectric: interpolate_loglog(&self.ln_energy, &self.ln_photoelectric, energy),
            incoherent: interpolate_loglog(&self.ln_energy, &self.ln_incoherent, energy),
            coherent: interpolate_loglog(&self.ln_energy, &self.ln_coherent, energy),
        }
    }

    /// Total mass attenuation coefficient (cm²/g).
    pub fn total_attenuation(&self, energy: f64) -> f64 {
        self.attenuation_values(energy).sum()
    }

    /// Linear attenuation coefficient (1/cm) at the given density (g/cm³).
    pub fn linear_attenuation(&self, energy: f64, density: f64) -> f64 {
        self.total_attenuation(energy) * density
    }

    /// Mass energy-transfer coefficient (cm²/g).
    pub fn mass_energy_transfer(&self, energy: f64) -> f64 {
        interpolate_loglog(
            &self.ln_energy,
            &self.ln_energy_transfer,
            sanitize_energy(energy),
        )
    }
}

/// Non-positive or NaN energies are mapped below the table so they clamp to
/// the first grid value instead of producing NaN from the logarithm.
fn sanitize_energy(energy: f64) -> f64 {
    if energy > 0.0 {
        energy
    } else {
        f64::MIN_POSITIVE
    }
}

/// Logarithmic grid with a point just below and at every shell edge in range.
fn energy_grid(elements: &[(Atom, Vec<Shell>, f64)], config: &MaterialConfig) -> Vec<f64> {
    let mut energy = logspace(config.min_energy, config.max_energy, config.grid_points).to_vec();
    for (_, shells, _) in elements {
        for shell in shells {
            let edge = shell.binding_energy;
            if edge > config.min_energy && edge < config.max_energy {
                energy.push(edge * (1.0 - 1.0e-6));
                energy.push(edge);
            }
        }
    }
    energy.sort_by(|a, b| a.total_cmp(b));
    energy.dedup_by(|a, b| (*a - *b).abs() <= 1.0e-9 * b.abs());
    energy
}

/// Photoelectric cross section (barn/atom).
fn photoelectric_per_atom(atom: &Atom, shells: &[Shell], energy: f64) -> f64 {
    const C: f64 = 39.6;
    let z = atom.z as f64;
    let unbound = C * z.powi(4) / energy.powi(3);
    let suppression: f64 = shells
        .iter()
        .filter(|s| s.binding_energy > energy)
        .map(|s| s.jump_ratio)
        .product();
    unbound / suppression
}

/// Incoherent cross section (barn/atom).
fn incoherent_per_atom(atom: &Atom, energy: f64) -> f64 {
    let z = atom.z as f64;
    let binding = energy / (energy + 1.95 * z.cbrt());
    z * interactions::klein_nishina_cross_section(energy) / BARN * binding
}

/// Coherent cross section (barn/atom).
fn coherent_per_atom(atom: &Atom, energy: f64) -> f64 {
    let z = atom.z as f64;
    let thomson = interactions::THOMSON_CROSS_SECTION / BARN;
    let knee = 2.6 * z.powf(0.25);
    z * z * thomson / (1.0 + (energy / knee).powi(2))
}
