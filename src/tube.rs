//! X-ray tube emission spectrum.
//!
//! The spectrum of a tungsten anode tube is modelled as:
//! - Kramers bremsstrahlung, `N(E) ~ (kVp - E) / E`
//! - anode self-filtration through the mean electron penetration depth seen
//!   at the anode angle
//! - tungsten K lines once the tube voltage exceeds the K edge
//! - added filtration, each filter given as element and thickness in mm
//!
//! Spectra are discretised on a fixed energy resolution and normalised to a
//! unit sum.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TUNGSTEN_K_EDGE;
use crate::error::{Error, Result};
use crate::material::Material;

/// Thomson-Whiddington constant for tungsten (keV² cm²/g).
const THOMSON_WHIDDINGTON: f64 = 2.2e5;

/// Tungsten K lines as (energy keV, relative intensity).
const TUNGSTEN_K_LINES: [(f64, f64); 4] = [
    (57.982, 0.58),
    (59.318, 1.0),
    (67.244, 0.33),
    (69.067, 0.08),
];

#[cfg(test)]
mod tests {

    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn tube(kvp: f64) -> Tube {
        let mut tube = Tube::new(kvp);
        tube.add_filtration_material(13, 7.0);
        tube
    }

    #[test]
    fn spectrum_is_normalised_and_bounded() {
        let spectrum = tube(120.0).spectrum().unwrap();
        let total: f64 = spectrum.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(spectrum.iter().all(|(e, w)| *e > 0.0 && *e < 120.0 && *w >= 0.0));
        assert!(spectrum.windows(2).all(|p| p[0].0 < p[1].0));
    }

    #[test]
    fn k_lines_appear_above_the_edge_only() {
        let weight_at = |spectrum: &[(f64, f64)], energy: f64| {
            spectrum
                .iter()
                .find(|(e, _)| (e - energy).abs() < 0.26)
                .map(|(_, w)| *w)
                .unwrap()
        };
        let high = tube(120.0).spectrum().unwrap();
        assert!(weight_at(&high, 59.5) > 2.0 * weight_at(&high, 62.0));
        let low = tube(65.0).spectrum().unwrap();
        assert!(weight_at(&low, 59.5) < 1.5 * weight_at(&low, 58.5));
    }

    #[test]
    fn filtration_hardens_the_beam() {
        let soft = tube(100.0);
        let mut hard = tube(100.0);
        hard.add_filtration_material(29, 0.5);
        assert!(hard.mean_energy().unwrap() > soft.mean_energy().unwrap());
        let hvl_soft = soft.half_value_layer_mm(13).unwrap();
        let hvl_hard = hard.half_value_layer_mm(13).unwrap();
        assert!(hvl_soft > 1.0 && hvl_hard > hvl_soft, "{} {}", hvl_soft, hvl_hard);
    }

    #[test]
    fn higher_voltage_raises_mean_energy() {
        let e80 = tube(80.0).mean_energy().unwrap();
        let e140 = tube(140.0).mean_energy().unwrap();
        assert!(e80 > 30.0 && e80 < 80.0);
        assert!(e140 > e80);
    }

    #[test]
    fn bad_tubes_fail() {
        assert_eq!(
            Tube::new(0.2).spectrum().unwrap_err(),
            Error::EmptySpectrum { kvp: 0.2 }
        );
        let mut tube = Tube::new(100.0);
        tube.add_filtration_material(150, 1.0);
        assert_eq!(tube.spectrum().unwrap_err(), Error::UnknownElement(150));
    }

    #[test]
    fn sampler_stays_inside_spectrum() {
        let sampler = tube(80.0).sampler().unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let e = sampler.sample(&mut rng);
            assert!(e > 0.0 && e < 80.0);
        }
    }
}

/// A filter in the beam path.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Filter {
    /// Atomic number of the filter element.
    pub z: u32,
    /// Thickness (mm).
    pub thickness: f64,
}

/// Tungsten anode X-ray tube.
#[derive(Debug, Clone, PartialEq)]
pub struct Tube {
    voltage: f64,
    anode_angle_deg: f64,
    energy_resolution: f64,
    filtration: Vec<Filter>,
}

impl Default for Tube {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl Tube {
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            anode_angle_deg: 12.0,
            energy_resolution: 0.5,
            filtration: Vec::new(),
        }
    }

    /// Tube voltage (kVp).
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn set_voltage(&mut self, kvp: f64) {
        self.voltage = kvp;
    }

    pub fn anode_angle_deg(&self) -> f64 {
        self.anode_angle_deg
    }

    pub fn set_anode_angle_deg(&mut self, angle: f64) {
        self.anode_angle_deg = angle;
    }

    pub fn energy_resolution(&self) -> f64 {
        self.energy_resolution
    }

    pub fn set_energy_resolution(&mut self, resolution: f64) {
        self.energy_resolution = resolution;
    }

    pub fn filtration(&self) -> &[Filter] {
        &self.filtration
    }

    /// Adds `thickness` mm of element `z` to the beam path.
    pub fn add_filtration_material(&mut self, z: u32, thickness: f64) {
        self.filtration.push(Filter { z, thickness });
    }

    pub fn clear_filtration(&mut self) {
        self.filtration.clear();
    }

    /// Discretised spectrum as `(energy keV, relative photon count)` with unit sum.
    pub fn spectrum(&self) -> Result<Vec<(f64, f64)>> {
        let kvp = self.voltage;
        let res = self.energy_resolution;
        if !(res > 0.0 && kvp.is_finite() && kvp > res) {
            return Err(Error::EmptySpectrum { kvp });
        }

        let energies: Vec<f64> = (1..)
            .map(|i| i as f64 * res)
            .take_while(|e| *e < kvp)
            .collect();
        let mut weights: Vec<f64> = energies.iter().map(|e| (kvp - e) / e).collect();

        if kvp > TUNGSTEN_K_EDGE {
            // line yield relative to the bremsstrahlung above half the K edge
            let bremsstrahlung: f64 = energies
                .iter()
                .zip(weights.iter())
                .filter(|(e, _)| **e >= 0.5 * TUNGSTEN_K_EDGE)
                .map(|(_, w)| w)
                .sum();
            let overvoltage = kvp / TUNGSTEN_K_EDGE - 1.0;
            let line_total = 0.17 * overvoltage.powf(1.63) * bremsstrahlung;
            let norm: f64 = TUNGSTEN_K_LINES.iter().map(|(_, i)| i).sum();
            for (energy, intensity) in TUNGSTEN_K_LINES {
                let index = ((energy / res).round() as usize).saturating_sub(1);
                if let Some(w) = weights.get_mut(index) {
                    *w += line_total * intensity / norm;
                }
            }
        }

        let tungsten = Material::by_z(74)?;
        let self_filtration = self.self_filtration();
        let filters = self
            .filtration
            .iter()
            .map(|f| {
                let material = Material::by_z(f.z)?;
                let density = material.standard_density();
                Ok((material, density, f.thickness / 10.0))
            })
            .collect::<Result<Vec<(Material, f64, f64)>>>()?;

        for (w, &e) in weights.iter_mut().zip(energies.iter()) {
            let mut optical_depth = tungsten.total_attenuation(e) * self_filtration;
            for (material, density, cm) in filters.iter() {
                optical_depth += material.linear_attenuation(e, *density) * cm;
            }
            *w *= (-optical_depth).exp();
        }

        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::EmptySpectrum { kvp });
        }
        Ok(energies
            .into_iter()
            .zip(weights)
            .map(|(e, w)| (e, w / total))
            .collect())
    }

    /// Mass thickness of tungsten (g/cm²) between the mean production depth
    /// and the anode surface along the central ray.
    fn self_filtration(&self) -> f64 {
        let range = self.voltage * self.voltage / THOMSON_WHIDDINGTON;
        let angle = self.anode_angle_deg.to_radians().sin().max(1.0e-3);
        range / 3.0 / angle
    }

    /// Photon-count weighted mean energy (keV).
    pub fn mean_energy(&self) -> Result<f64> {
        Ok(self.spectrum()?.iter().map(|(e, w)| e * w).sum())
    }

    /// Thickness (mm) of element `z` that halves the air kerma of the beam.
    pub fn half_value_layer_mm(&self, z: u32) -> Result<f64> {
        let spectrum = self.spectrum()?;
        let absorber = Material::by_z(z)?;
        let air = Material::by_nist_name("Air, Dry (near sea level)")?;
        let density = absorber.standard_density();
        let kerma = |mm: f64| -> f64 {
            spectrum
                .iter()
                .map(|&(e, w)| {
                    let mu = absorber.linear_attenuation(e, density);
                    w * e * air.mass_energy_transfer(e) * (-mu * mm / 10.0).exp()
                })
                .sum()
        };
        let half = 0.5 * kerma(0.0);
        let (mut lo, mut hi) = (0.0, 1.0);
        while kerma(hi) > half && hi < 1.0e4 {
            hi *= 2.0;
        }
        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            if kerma(mid) > half {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(0.5 * (lo + hi))
    }

    /// Sampler drawing photon energies from this spectrum.
    pub fn sampler(&self) -> Result<SpectrumSampler> {
        SpectrumSampler::new(self.voltage, self.spectrum()?)
    }
}

/// Draws energies from a discretised spectrum.
#[derive(Debug, Clone)]
pub struct SpectrumSampler {
    energies: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl SpectrumSampler {
    pub fn new(kvp: f64, spectrum: Vec<(f64, f64)>) -> Result<Self> {
        let (energies, weights): (Vec<f64>, Vec<f64>) = spectrum.into_iter().unzip();
        let index = WeightedIndex::new(&weights).map_err(|_| Error::EmptySpectrum { kvp })?;
        Ok(Self { energies, index })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.energies[self.index.sample(rng)]
    }
}
