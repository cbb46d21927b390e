//! Sequential (axial) CT beam.
//!
//! The source rotates around the isocenter in steps of a fixed angle. At
//! each angle of each slice one exposure is made: photons are emitted from
//! the focal spot towards a point drawn uniformly on a rectangle at the
//! isocenter spanned by the scan field of view (in-plane) and the collimation
//! (along z). Energies are drawn from the tube spectrum.
//!
//! Absolute dose units come from a CTDIw calibration: the beam is simulated
//! on a CTDI body phantom in air and the particle weight is scaled so that
//! the phantom reads the configured CTDIw.

use log::info;
use nalgebra::{Point3, Vector3};
use rand::Rng;

use crate::ctdi::CtdiPhantom;
use crate::error::{Error, Result};
use crate::particle::Particle;
use crate::transport::Transport;
use crate::tube::{SpectrumSampler, Tube};
use crate::world::World;

#[cfg(test)]
mod tests {

    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn exposures_cover_every_slice_and_angle() {
        let mut beam = CtSequentialBeam::default();
        beam.set_step_angle_deg(90.0);
        beam.set_number_of_slices(3);
        beam.set_slice_spacing(2.0);
        let exposures = beam.exposures();
        assert_eq!(exposures.len(), 12);
        assert!(exposures.iter().enumerate().all(|(i, e)| e.index == i));
        let zs: Vec<f64> = exposures.iter().map(|e| e.slice_center.z).collect();
        assert_eq!(zs[0], -2.0);
        assert_eq!(zs[11], 2.0);
        // first exposure sits on +x at the source distance
        let d = (exposures[0].source - exposures[0].slice_center).norm();
        assert!((d - beam.source_isocenter_distance()).abs() < 1e-9);
    }

    #[test]
    fn particles_aim_inside_the_field() {
        let mut beam = CtSequentialBeam::default();
        beam.set_collimation(2.0);
        beam.set_scan_field_of_view(50.0);
        let sampler = beam.tube().sampler().unwrap();
        let exposure = &beam.exposures()[0];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let p = exposure.sample(&sampler, 1.0, &mut rng);
            // distance along the ray to the isocenter plane through the source axis
            let axis = (exposure.slice_center - exposure.source).normalize();
            let t = (exposure.slice_center - p.pos).dot(&axis) / p.dir.dot(&axis);
            let hit = p.pos + p.dir * t - exposure.slice_center;
            assert!(hit.z.abs() <= 1.0 + 1e-9);
            assert!(hit.dot(&exposure.lateral).abs() <= 25.0 + 1e-9);
            assert!(p.energy > 0.0 && p.energy < beam.tube().voltage());
        }
    }

    #[test]
    fn ctdi_polynomial_matches_reference_values() {
        let coefficients = [0.000050861, 0.001103392, -0.153563729];
        for kvp in [140.0, 120.0, 100.0, 80.0] {
            let expected = 0.000050861 * kvp * kvp + 0.001103392 * kvp - 0.153563729;
            let mut beam = CtSequentialBeam::default();
            beam.set_tube_voltage(kvp);
            beam.set_ctdiw(ctdi_polynomial(kvp, &coefficients));
            assert!((beam.ctdiw().unwrap() - expected).abs() < 1e-12);
        }
        assert!((ctdi_polynomial(140.0, &coefficients) - 0.9978).abs() < 1e-4);
    }

    #[test]
    fn zero_particles_is_a_configuration_error() {
        let mut beam = CtSequentialBeam::default();
        beam.set_particles_per_exposure(0);
        assert!(matches!(beam.validate(), Err(Error::Configuration(_))));
        let mut beam = CtSequentialBeam::default();
        beam.set_step_angle_deg(0.0);
        assert!(beam.validate().is_err());
    }

    #[test]
    fn uncalibrated_beam_has_unit_factor() {
        let beam = CtSequentialBeam::default();
        let transport = Transport::default();
        assert_eq!(beam.calibration_factor(&transport).unwrap(), 1.0);
    }
}

/// CTDIw (mGy) from a quadratic in tube voltage, `a kVp² + b kVp + c`.
pub fn ctdi_polynomial(kvp: f64, coefficients: &[f64; 3]) -> f64 {
    let [a, b, c] = *coefficients;
    a * kvp * kvp + b * kvp + c
}

/// One gantry position of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    /// Position in the scan sequence, used to derive random streams.
    pub index: usize,
    /// Gantry angle (radians).
    pub angle: f64,
    /// Focal spot position.
    pub source: Point3<f64>,
    /// Isocenter of this slice.
    pub slice_center: Point3<f64>,
    /// In-plane unit vector perpendicular to the central ray.
    pub lateral: Vector3<f64>,
    pub collimation: f64,
    pub field_of_view: f64,
    pub particles: usize,
}

impl Exposure {
    /// Draws one photon with initial weight `weight`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        sampler: &SpectrumSampler,
        weight: f64,
        rng: &mut R,
    ) -> Particle {
        let energy = sampler.sample(rng);
        let u = self.field_of_view * (rng.random::<f64>() - 0.5);
        let v = self.collimation * (rng.random::<f64>() - 0.5);
        let target = self.slice_center + self.lateral * u + Vector3::z() * v;
        Particle::new(self.source, target - self.source, energy, weight)
    }
}

/// Axial CT scan with CTDIw normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct CtSequentialBeam {
    isocenter: Point3<f64>,
    start_angle_deg: f64,
    step_angle_deg: f64,
    number_of_slices: usize,
    slice_spacing: f64,
    collimation: f64,
    scan_fov: f64,
    source_isocenter_distance: f64,
    particles_per_exposure: usize,
    calibration_particles: Option<usize>,
    ctdiw: Option<f64>,
    tube: Tube,
}

impl Default for CtSequentialBeam {
    fn default() -> Self {
        Self {
            isocenter: Point3::origin(),
            start_angle_deg: 0.0,
            step_angle_deg: 1.0,
            number_of_slices: 1,
            slice_spacing: 1.0,
            collimation: 1.0,
            scan_fov: 50.0,
            source_isocenter_distance: 60.0,
            particles_per_exposure: 100_000,
            calibration_particles: None,
            ctdiw: None,
            tube: Tube::default(),
        }
    }
}

impl CtSequentialBeam {
    pub fn set_isocenter(&mut self, isocenter: [f64; 3]) {
        self.isocenter = Point3::from(isocenter);
    }

    pub fn set_start_angle_deg(&mut self, angle: f64) {
        self.start_angle_deg = angle;
    }

    pub fn set_step_angle_deg(&mut self, angle: f64) {
        self.step_angle_deg = angle;
    }

    pub fn set_number_of_slices(&mut self, slices: usize) {
        self.number_of_slices = slices;
    }

    /// Distance between slice centres along z (cm).
    pub fn set_slice_spacing(&mut self, spacing: f64) {
        self.slice_spacing = spacing;
    }

    /// Beam width along z at the isocenter (cm).
    pub fn set_collimation(&mut self, collimation: f64) {
        self.collimation = collimation;
    }

    /// Scan field of view diameter (cm).
    pub fn set_scan_field_of_view(&mut self, fov: f64) {
        self.scan_fov = fov;
    }

    pub fn set_source_isocenter_distance(&mut self, distance: f64) {
        self.source_isocenter_distance = distance;
    }

    pub fn set_particles_per_exposure(&mut self, particles: usize) {
        self.particles_per_exposure = particles;
    }

    /// Particles per exposure used for the CTDIw calibration run. Defaults to
    /// the particles per exposure of the scan.
    ///
    /// Calibration runs one full rotation before every calibrated scan, so
    /// with `None` each run costs an extra `particles_per_exposure` times
    /// the number of angles histories. Only the ratio of the measured to the
    /// target CTDIw is needed, which converges with far fewer particles.
    pub fn set_calibration_particles(&mut self, particles: Option<usize>) {
        self.calibration_particles = particles;
    }

    pub fn set_tube_voltage(&mut self, kvp: f64) {
        self.tube.set_voltage(kvp);
    }

    pub fn add_tube_filtration_material(&mut self, z: u32, thickness_mm: f64) {
        self.tube.add_filtration_material(z, thickness_mm);
    }

    /// Target CTDIw (mGy) the scan is normalised to.
    pub fn set_ctdiw(&mut self, ctdiw: f64) {
        self.ctdiw = Some(ctdiw);
    }

    /// Removes the CTDIw target; particles then carry unit weight.
    pub fn clear_ctdiw(&mut self) {
        self.ctdiw = None;
    }

    pub fn ctdiw(&self) -> Option<f64> {
        self.ctdiw
    }

    pub fn tube(&self) -> &Tube {
        &self.tube
    }

    pub fn tube_mut(&mut self) -> &mut Tube {
        &mut self.tube
    }

    pub fn isocenter(&self) -> Point3<f64> {
        self.isocenter
    }

    pub fn particles_per_exposure(&self) -> usize {
        self.particles_per_exposure
    }

    pub fn source_isocenter_distance(&self) -> f64 {
        self.source_isocenter_distance
    }

    pub fn number_of_slices(&self) -> usize {
        self.number_of_slices
    }

    /// Gantry positions per slice.
    pub fn number_of_angles(&self) -> usize {
        if self.step_angle_deg > 0.0 {
            ((360.0 / self.step_angle_deg).round() as usize).max(1)
        } else {
            0
        }
    }

    pub fn number_of_exposures(&self) -> usize {
        self.number_of_slices * self.number_of_angles()
    }

    /// Fails with [`Error::Configuration`] for a beam that cannot be simulated.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Configuration(msg));
        if self.particles_per_exposure == 0 {
            return fail("beam emits zero particles per exposure".into());
        }
        if self.calibration_particles == Some(0) {
            return fail("calibration emits zero particles per exposure".into());
        }
        if self.number_of_slices == 0 {
            return fail("beam has zero slices".into());
        }
        if !(self.step_angle_deg > 0.0 && self.step_angle_deg <= 360.0) {
            return fail(format!(
                "step angle must be in (0, 360] degrees, got {}",
                self.step_angle_deg
            ));
        }
        if !(self.collimation > 0.0 && self.scan_fov > 0.0) {
            return fail(format!(
                "collimation {} and field of view {} must be positive",
                self.collimation, self.scan_fov
            ));
        }
        if !(self.source_isocenter_distance > 0.5 * self.scan_fov) {
            return fail(format!(
                "source distance {} lies inside the field of view",
                self.source_isocenter_distance
            ));
        }
        if let Some(ctdiw) = self.ctdiw {
            if !(ctdiw.is_finite() && ctdiw > 0.0) {
                return fail(format!("CTDIw must be positive, got {}", ctdiw));
            }
        }
        Ok(())
    }

    /// All exposures of the scan, slice by slice.
    pub fn exposures(&self) -> Vec<Exposure> {
        let angles = self.number_of_angles();
        let step = self.step_angle_deg.to_radians();
        let start = self.start_angle_deg.to_radians();
        let half = (self.number_of_slices as f64 - 1.0) / 2.0;
        (0..self.number_of_slices)
            .flat_map(|slice| (0..angles).map(move |a| (slice, a)))
            .enumerate()
            .map(|(index, (slice, a))| {
                let slice_center =
                    self.isocenter + Vector3::z() * ((slice as f64 - half) * self.slice_spacing);
                let angle = start + step * a as f64;
                let (sin, cos) = angle.sin_cos();
                Exposure {
                    index,
                    angle,
                    source: slice_center
                        + Vector3::new(cos, sin, 0.0) * self.source_isocenter_distance,
                    slice_center,
                    lateral: Vector3::new(-sin, cos, 0.0),
                    collimation: self.collimation,
                    field_of_view: self.scan_fov,
                    particles: self.particles_per_exposure,
                }
            })
            .collect()
    }

    /// Particle weight that makes the scan deliver the target CTDIw.
    ///
    /// Runs a single rotation of this beam on a CTDI body phantom centred on
    /// the isocenter and compares the weighted CTDI scored per unit weight with
    /// the target. Returns 1 when no target is set.
    pub fn calibration_factor(&self, transport: &Transport) -> Result<f64> {
        let Some(target) = self.ctdiw else {
            return Ok(1.0);
        };
        self.validate()?;

        let mut world = World::new();
        let iso = self.isocenter;
        world
            .add_item::<CtdiPhantom>()
            .set_center([iso.x, iso.y, iso.z]);
        world.build()?;

        let particles = self
            .calibration_particles
            .unwrap_or(self.particles_per_exposure);
        let mut calibration = self.clone();
        calibration.ctdiw = None;
        calibration.number_of_slices = 1;
        calibration.particles_per_exposure = particles;
        transport.run_exposures(&mut world, &calibration, 1.0, false)?;

        let measured = world
            .items_of::<CtdiPhantom>()
            .next()
            .map_or(0.0, |p| p.ctdiw());
        if !(measured.is_finite() && measured > 0.0) {
            return Err(Error::Configuration(
                "calibration phantom scored no dose".into(),
            ));
        }
        let factor =
            target / measured * particles as f64 / self.particles_per_exposure as f64;
        info!(
            "CTDIw calibration at {} kVp: {:.4e} mGy per unit weight, factor {:.4e}",
            self.tube.voltage(),
            measured,
            factor
        );
        Ok(factor)
    }
}
