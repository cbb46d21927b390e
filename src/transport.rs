//! Monte Carlo photon transport.
//!
//! Every history is followed step by step through the world:
//! - find the medium at the current position and the nearest surface ahead
//! - sample a free path from the total attenuation of the medium
//! - if the path reaches the surface, cross it (scoring the crossing) and continue
//! - otherwise interact: photoelectric absorption ends the history, incoherent
//!   scattering deposits the recoil energy locally, coherent scattering only
//!   changes direction
//!
//! Histories end when they leave the world bounds, are absorbed, or fall below
//! the energy or weight cutoff (the remaining energy is then deposited
//! locally). With survival biasing, absorption is replaced by a weight
//! reduction at every interaction.
//!
//! Exposures are processed one after another. Within an exposure the
//! particles are split into fixed chunks that run in parallel on rayon. Each
//! chunk owns a random stream seeded from (seed, exposure, chunk) and its own
//! [`WorldTally`]; tallies are folded in chunk order and merged into the world
//! after the exposure, so results do not depend on the thread count.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use std::{fmt, ops::*};

use crate::beam::{CtSequentialBeam, Exposure};
use crate::config::{GEOMETRIC_EPSILON, MAX_STEPS_PER_HISTORY};
use crate::error::{Error, Result};
use crate::helpers::rotate_direction;
use crate::interactions::{self, Interaction};
use crate::material::AttenuationValues;
use crate::particle::{Fate, Particle};
use crate::tube::SpectrumSampler;
use crate::world::{Location, World, WorldTally};

#[cfg(test)]
mod tests {

    use super::*;
    use crate::ctdi::CtdiPhantom;
    use crate::fluence::FluenceScore;
    use crate::room::EnclosedRoom;

    fn world() -> World {
        let mut world = World::new();
        world
            .add_item::<EnclosedRoom>()
            .set_inner_room_aabb([-80.0, -80.0, -80.0, 80.0, 80.0, 80.0]);
        world.add_item::<CtdiPhantom>();
        let score = world.add_item::<FluenceScore>();
        score.set_center([0.0, 0.0, -70.0]);
        score.set_radius(50.0);
        world.build().unwrap();
        world
    }

    /// Phantom and scorer in air, without shielding walls.
    fn open_world() -> World {
        let mut world = World::new();
        world.add_item::<CtdiPhantom>();
        let score = world.add_item::<FluenceScore>();
        score.set_center([0.0, 0.0, -30.0]);
        score.set_radius(50.0);
        world.build().unwrap();
        world
    }

    fn beam(particles: usize) -> CtSequentialBeam {
        let mut beam = CtSequentialBeam::default();
        beam.set_particles_per_exposure(particles);
        beam.set_step_angle_deg(90.0);
        beam.set_collimation(4.0);
        beam.add_tube_filtration_material(13, 7.0);
        beam
    }

    fn transport(threads: usize) -> Transport {
        let mut transport = Transport::new(TransportConfig {
            threads: Some(threads),
            chunk_size: 256,
            ..TransportConfig::default()
        });
        transport.set_show_progress(false);
        transport
    }

    #[test]
    fn energy_is_conserved() {
        let mut world = open_world();
        let stats = transport(2).run(&mut world, &beam(1000)).unwrap();
        assert_eq!(stats.histories, 4000);
        assert_eq!(stats.discarded, 0);
        assert!(stats.absorbed > 0 && stats.escaped_count > 0, "{}", stats);
        assert!(stats.escaped > 0.0);
        assert!(
            stats.energy_balance().abs() < 1e-9 * stats.emitted,
            "{}",
            stats
        );
    }

    #[test]
    fn lead_room_stops_every_photon() {
        let mut world = world();
        let stats = transport(2).run(&mut world, &beam(500)).unwrap();
        assert_eq!(stats.escaped_count, 0);
        assert!(stats.energy_balance().abs() < 1e-9 * stats.emitted);
    }

    #[test]
    fn energy_is_conserved_with_survival_biasing() {
        let mut world = world();
        let mut transport = Transport::new(TransportConfig {
            survival_biasing: true,
            ..TransportConfig::default()
        });
        transport.set_show_progress(false);
        let stats = transport.run(&mut world, &beam(500)).unwrap();
        assert!(stats.energy_balance().abs() < 1e-9 * stats.emitted);
        assert_eq!(stats.absorbed, 0);
    }

    #[test]
    fn results_do_not_depend_on_thread_count() {
        let mut a = world();
        let mut b = world();
        let sa = transport(1).run(&mut a, &beam(600)).unwrap();
        let sb = transport(3).run(&mut b, &beam(600)).unwrap();
        assert_eq!(sa, sb);
        let fa = a.items_of::<FluenceScore>().next().unwrap().get_fluence_spectrum();
        let fb = b.items_of::<FluenceScore>().next().unwrap().get_fluence_spectrum();
        assert_eq!(fa, fb);
    }

    #[test]
    fn unbuilt_world_and_empty_beam_fail_fast() {
        let mut world = World::new();
        world.add_item::<CtdiPhantom>();
        assert_eq!(
            transport(1).run(&mut world, &beam(10)).unwrap_err(),
            Error::WorldNotBuilt
        );
        let mut world = self::world();
        assert!(matches!(
            transport(1).run(&mut world, &beam(0)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn cancelled_runs_stop_between_exposures() {
        let mut world = world();
        let transport = transport(1);
        transport.cancel_handle().store(true, Ordering::Relaxed);
        let stats = transport.run(&mut world, &beam(100)).unwrap();
        assert_eq!(stats.histories, 0);
        assert_eq!(stats.exposures, 0);
    }

    #[test]
    fn cancelled_calibrated_runs_are_not_errors() {
        let mut world = world();
        let transport = transport(1);
        let mut beam = beam(100);
        beam.set_ctdiw(10.0);
        transport.cancel_handle().store(true, Ordering::Relaxed);
        let stats = transport.run(&mut world, &beam).unwrap();
        assert_eq!(stats.histories, 0);
        let stats = transport.run_console(&mut world, &beam).unwrap();
        assert_eq!(stats.exposures, 0);
    }

    #[test]
    fn non_finite_histories_are_discarded() {
        let world = world();
        let transport = transport(1);
        let mut tally = world.tally();
        let mut stats = TransportStats::default();
        let mut rng = StdRng::seed_from_u64(3);
        let good = Particle::new(
            nalgebra::Point3::new(0.0, 0.0, 0.0),
            nalgebra::Vector3::x(),
            60.0,
            1.0,
        );
        transport.transport_history(&world, good, &mut tally, &mut stats, &mut rng);
        let bad = Particle::new(
            nalgebra::Point3::new(0.0, 0.0, 0.0),
            nalgebra::Vector3::x(),
            f64::NAN,
            1.0,
        );
        let fate = transport.transport_history(&world, bad, &mut tally, &mut stats, &mut rng);
        assert_eq!(fate, Fate::Discarded);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.histories, 2);
        assert_eq!(stats.emitted, 60.0);
        assert!(stats.energy_balance().abs() < 1e-9);
    }

    #[test]
    fn chunk_seeds_differ() {
        let a = chunk_seed(1, 0, 0);
        assert_ne!(a, chunk_seed(1, 0, 1));
        assert_ne!(a, chunk_seed(1, 1, 0));
        assert_ne!(a, chunk_seed(2, 0, 0));
    }

    #[test]
    fn history_outside_world_escapes() {
        let world = world();
        let transport = transport(1);
        let mut tally = world.tally();
        let mut stats = TransportStats::default();
        let mut rng = StdRng::seed_from_u64(0);
        let p = Particle::new(
            nalgebra::Point3::new(1000.0, 0.0, 0.0),
            nalgebra::Vector3::x(),
            60.0,
            1.0,
        );
        let fate = transport.transport_history(&world, p, &mut tally, &mut stats, &mut rng);
        assert_eq!(fate, Fate::Escaped);
        assert_eq!(stats.escaped, 60.0);
    }
}

/// Numerical settings of the transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base seed of all random streams.
    pub seed: u64,
    /// Worker threads. `None` uses the rayon default.
    pub threads: Option<usize>,
    /// Photons below this energy (keV) are absorbed locally.
    pub energy_cutoff: f64,
    /// With survival biasing, histories whose weight drops below this fraction
    /// of their initial weight are absorbed locally.
    pub weight_cutoff: f64,
    pub survival_biasing: bool,
    /// Particles per parallel work unit.
    pub chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            threads: None,
            energy_cutoff: 1.0,
            weight_cutoff: 1.0e-3,
            survival_biasing: false,
            chunk_size: 4096,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::Configuration("thread count must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk size must be at least 1".into()));
        }
        if !(self.energy_cutoff.is_finite() && self.energy_cutoff >= 0.0) {
            return Err(Error::Configuration(format!(
                "invalid energy cutoff {} keV",
                self.energy_cutoff
            )));
        }
        if !(self.weight_cutoff >= 0.0 && self.weight_cutoff < 1.0) {
            return Err(Error::Configuration(format!(
                "weight cutoff must be in [0, 1), got {}",
                self.weight_cutoff
            )));
        }
        Ok(())
    }
}

/// Bookkeeping of a transport run.
///
/// **Context**: Every unit of emitted energy ends up either deposited in some
/// region, carried out of the world, or dropped with a discarded history.
/// Tracking all three makes energy conservation directly checkable.
///
/// **How it Works**: Energies are weighted (keV times statistical weight).
/// Counters record how histories ended and how often each interaction
/// channel was sampled. Partial statistics from workers are summed with `+=`.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct TransportStats {
    pub exposures: u64,
    pub histories: u64,
    pub emitted: f64,     // energy started
    pub deposited: f64,   // energy imparted anywhere in the world
    pub escaped: f64,     // energy carried out of the world bounds
    pub discarded_energy: f64,
    pub escaped_count: u64,
    pub absorbed: u64,
    pub below_cutoff: u64,
    pub discarded: u64,
    pub photoelectric: u64,
    pub incoherent: u64,
    pub coherent: u64,
    /// Initial particle weight of the run, the CTDIw calibration factor when
    /// a target is set. Kept from the left operand when adding.
    pub weight: f64,
}

impl AddAssign for TransportStats {
    fn add_assign(&mut self, other: Self) {
        self.exposures += other.exposures;
        self.histories += other.histories;
        self.emitted += other.emitted;
        self.deposited += other.deposited;
        self.escaped += other.escaped;
        self.discarded_energy += other.discarded_energy;
        self.escaped_count += other.escaped_count;
        self.absorbed += other.absorbed;
        self.below_cutoff += other.below_cutoff;
        self.discarded += other.discarded;
        self.photoelectric += other.photoelectric;
        self.incoherent += other.incoherent;
        self.coherent += other.coherent;
    }
}

impl Add for TransportStats {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl TransportStats {
    /// Emitted energy not accounted for by deposits, escapes or discards.
    /// Zero up to rounding for a correct run.
    pub fn energy_balance(&self) -> f64 {
        self.emitted - (self.deposited + self.escaped + self.discarded_energy)
    }

    fn record(&mut self, fate: Fate) {
        match fate {
            Fate::Escaped => self.escaped_count += 1,
            Fate::Absorbed => self.absorbed += 1,
            Fate::BelowCutoff => self.below_cutoff += 1,
            Fate::Discarded => self.discarded += 1,
        }
    }
}

impl fmt::Display for TransportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transport:")?;
        writeln!(f, "  Exposures:        {}", self.exposures)?;
        writeln!(f, "  Histories:        {}", self.histories)?;
        writeln!(f, "  Weight:           {:.6e}", self.weight)?;
        writeln!(f, "  Emitted:          {:.6e} keV", self.emitted)?;
        writeln!(f, "  Deposited:        {:.6e} keV", self.deposited)?;
        writeln!(f, "  Escaped:          {:.6e} keV", self.escaped)?;
        writeln!(f, "  Discarded:        {:.6e} keV", self.discarded_energy)?;
        writeln!(f, "  Balance:          {:.6e} keV", self.energy_balance())?;
        writeln!(
            f,
            "  Fates:            {} escaped, {} absorbed, {} cutoff, {} discarded",
            self.escaped_count, self.absorbed, self.below_cutoff, self.discarded
        )?;
        writeln!(
            f,
            "  Interactions:     {} photo, {} incoherent, {} coherent",
            self.photoelectric, self.incoherent, self.coherent
        )
    }
}

/// Seed of the random stream for one chunk of one exposure (splitmix64 finaliser).
fn chunk_seed(seed: u64, exposure: usize, chunk: usize) -> u64 {
    let mut z = seed
        ^ (exposure as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (chunk as u64).wrapping_add(1).wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The Monte Carlo engine.
#[derive(Debug, Clone)]
pub struct Transport {
    config: TransportConfig,
    show_progress: bool,
    cancel: Arc<AtomicBool>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            show_progress: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Shows or hides the progress bar of [`Transport::run_console`].
    pub fn set_show_progress(&mut self, show: bool) {
        self.show_progress = show;
    }

    /// Flag that stops a run before its next exposure when set. It is not
    /// cleared by the engine.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Runs the full exposure sweep of `beam` through `world` and merges the
    /// scored results into the world's items.
    pub fn run(&self, world: &mut World, beam: &CtSequentialBeam) -> Result<TransportStats> {
        self.run_calibrated(world, beam, false)
    }

    /// As [`Transport::run`], reporting progress on the console.
    pub fn run_console(
        &self,
        world: &mut World,
        beam: &CtSequentialBeam,
    ) -> Result<TransportStats> {
        let start = Instant::now();
        let stats = self.run_calibrated(world, beam, self.show_progress)?;
        let duration = start.elapsed();
        info!(
            "{} kVp: {} histories in {:.2?} ({:.2?} per exposure)",
            beam.tube().voltage(),
            stats.histories,
            duration,
            duration / stats.exposures.max(1) as u32
        );
        debug!("{}", stats);
        Ok(stats)
    }

    fn run_calibrated(
        &self,
        world: &mut World,
        beam: &CtSequentialBeam,
        progress: bool,
    ) -> Result<TransportStats> {
        self.check(world, beam)?;
        if self.cancel.load(Ordering::Relaxed) {
            warn!("run cancelled before the first exposure");
            return Ok(TransportStats::default());
        }
        let weight = match beam.calibration_factor(self) {
            Ok(weight) => weight,
            Err(_) if self.cancel.load(Ordering::Relaxed) => {
                warn!("run cancelled during CTDIw calibration");
                return Ok(TransportStats::default());
            }
            Err(e) => return Err(e),
        };
        self.run_exposures(world, beam, weight, progress)
    }

    fn check(&self, world: &World, beam: &CtSequentialBeam) -> Result<()> {
        if !world.is_built() {
            return Err(Error::WorldNotBuilt);
        }
        self.config.validate()?;
        beam.validate()?;
        if beam.number_of_exposures() == 0 {
            return Err(Error::Configuration("beam has no exposures".into()));
        }
        Ok(())
    }

    /// Runs every exposure of `beam` with initial particle weight `weight`.
    pub(crate) fn run_exposures(
        &self,
        world: &mut World,
        beam: &CtSequentialBeam,
        weight: f64,
        progress: bool,
    ) -> Result<TransportStats> {
        self.check(world, beam)?;
        let sampler = beam.tube().sampler()?;
        let exposures = beam.exposures();
        let pool = match self.config.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::Configuration(e.to_string()))?,
            ),
            None => None,
        };

        let pb = if progress {
            let pb = ProgressBar::new(exposures.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            ) {
                pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
            }
            pb.set_message(format!("exposure ({} kVp)", beam.tube().voltage()));
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut stats = TransportStats::default();
        for exposure in exposures.iter() {
            if self.cancel.load(Ordering::Relaxed) {
                warn!(
                    "run cancelled after {} of {} exposures",
                    stats.exposures,
                    exposures.len()
                );
                break;
            }
            let shared: &World = world;
            let (tally, exposure_stats) = match &pool {
                Some(pool) => pool.install(|| self.run_exposure(shared, exposure, &sampler, weight)),
                None => self.run_exposure(shared, exposure, &sampler, weight),
            };
            world.merge_tally(&tally);
            stats += exposure_stats;
            stats.exposures += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();
        stats.weight = weight;

        if stats.discarded > 0 {
            warn!(
                "{} histories reached a non-finite state and were discarded",
                stats.discarded
            );
        }
        Ok(stats)
    }

    fn run_exposure(
        &self,
        world: &World,
        exposure: &Exposure,
        sampler: &SpectrumSampler,
        weight: f64,
    ) -> (WorldTally, TransportStats) {
        let chunk_size = self.config.chunk_size;
        let chunks = exposure.particles.div_ceil(chunk_size);
        let partials: Vec<(WorldTally, TransportStats)> = (0..chunks)
            .into_par_iter()
            .map(|chunk| {
                let mut rng =
                    StdRng::seed_from_u64(chunk_seed(self.config.seed, exposure.index, chunk));
                let mut tally = world.tally();
                let mut stats = TransportStats::default();
                let count = chunk_size.min(exposure.particles - chunk * chunk_size);
                for _ in 0..count {
                    let particle = exposure.sample(sampler, weight, &mut rng);
                    self.transport_history(world, particle, &mut tally, &mut stats, &mut rng);
                }
                (tally, stats)
            })
            .collect();

        // folded in chunk order so the sum is independent of scheduling
        let mut tally = world.tally();
        let mut stats = TransportStats::default();
        for (t, s) in partials.iter() {
            tally += t;
            stats += *s;
        }
        (tally, stats)
    }

    /// Follows one photon until it terminates. Returns how it ended.
    fn transport_history<R: Rng + ?Sized>(
        &self,
        world: &World,
        mut p: Particle,
        tally: &mut WorldTally,
        stats: &mut TransportStats,
        rng: &mut R,
    ) -> Fate {
        stats.histories += 1;
        if !p.is_finite() {
            return self.discard(&p, stats);
        }
        stats.emitted += p.carried_energy();
        let initial_weight = p.weight;

        // sources may sit outside the world; the space there is vacuum
        if world.locate(&p.pos).is_none() {
            match world.entry_distance(&p.pos, &p.dir) {
                Some(t) => p.translate(t + GEOMETRIC_EPSILON),
                None => return self.escape(&p, stats),
            }
        }

        for _ in 0..MAX_STEPS_PER_HISTORY {
            if !p.is_finite() {
                return self.discard(&p, stats);
            }
            let Some(location) = world.locate(&p.pos) else {
                return self.escape(&p, stats);
            };

            if p.energy < self.config.energy_cutoff
                || (self.config.survival_biasing
                    && p.weight < self.config.weight_cutoff * initial_weight)
            {
                self.deposit(world, &location, p.carried_energy(), tally, stats);
                stats.record(Fate::BelowCutoff);
                return Fate::BelowCutoff;
            }

            let exit = world.exit_distance(&p.pos, &p.dir).unwrap_or(0.0);
            let (boundary, crossed) = match world.intersect_nearest(&p.pos, &p.dir) {
                Some((item, t)) if t < exit => (t, Some(item)),
                _ => (exit, None),
            };

            let mu = location.medium.linear_attenuation(p.energy);
            let free_path = match Exp::new(mu) {
                Ok(exp) if mu > 0.0 => exp.sample(rng),
                _ => f64::INFINITY,
            };

            if free_path >= boundary {
                self.score_track(world, &location, &p, boundary, tally);
                p.translate(boundary + GEOMETRIC_EPSILON);
                if let Some(item) = crossed {
                    world
                        .item(item)
                        .score_crossing(&mut tally.items[item], &p);
                }
                continue;
            }

            self.score_track(world, &location, &p, free_path, tally);
            p.translate(free_path);
            if let Some(fate) = self.interact(world, &location, &mut p, tally, stats, rng) {
                return fate;
            }
        }

        debug!("history exceeded {} steps", MAX_STEPS_PER_HISTORY);
        self.discard(&p, stats)
    }

    /// Samples and applies one interaction. Returns the fate if the history ends.
    fn interact<R: Rng + ?Sized>(
        &self,
        world: &World,
        location: &Location,
        p: &mut Particle,
        tally: &mut WorldTally,
        stats: &mut TransportStats,
        rng: &mut R,
    ) -> Option<Fate> {
        let material = location.medium.material;
        let att = material.attenuation_values(p.energy);

        let channel = if self.config.survival_biasing {
            // implicit capture: deposit the absorbed share and scatter the rest
            let absorbed = p.weight * att.photoelectric / att.sum();
            self.deposit(world, location, absorbed * p.energy, tally, stats);
            p.weight -= absorbed;
            stats.photoelectric += 1;
            let scatter = AttenuationValues {
                photoelectric: 0.0,
                ..att
            };
            interactions::select_interaction(&scatter, rng)
        } else {
            interactions::select_interaction(&att, rng)
        };

        match channel {
            Interaction::Photoelectric => {
                stats.photoelectric += 1;
                self.deposit(world, location, p.carried_energy(), tally, stats);
                stats.record(Fate::Absorbed);
                return Some(Fate::Absorbed);
            }
            Interaction::Incoherent => {
                stats.incoherent += 1;
                let (scattered, cos_theta) = interactions::sample_compton(p.energy, rng);
                self.deposit(world, location, (p.energy - scattered) * p.weight, tally, stats);
                p.energy = scattered;
                let phi = interactions::sample_azimuth(rng);
                p.dir = rotate_direction(&p.dir, cos_theta, phi);
            }
            Interaction::Coherent => {
                stats.coherent += 1;
                let cos_theta =
                    interactions::sample_coherent(p.energy, material.effective_z(), rng);
                let phi = interactions::sample_azimuth(rng);
                p.dir = rotate_direction(&p.dir, cos_theta, phi);
            }
        }
        None
    }

    fn deposit(
        &self,
        world: &World,
        location: &Location,
        energy: f64,
        tally: &mut WorldTally,
        stats: &mut TransportStats,
    ) {
        tally.deposit(world, location, energy);
        stats.deposited += energy;
    }

    fn score_track(
        &self,
        world: &World,
        location: &Location,
        p: &Particle,
        length: f64,
        tally: &mut WorldTally,
    ) {
        if let Some(item) = location.item {
            world
                .item(item)
                .score_track(&mut tally.items[item], location.zone, p, length);
        }
    }

    fn escape(&self, p: &Particle, stats: &mut TransportStats) -> Fate {
        stats.escaped += p.carried_energy();
        stats.record(Fate::Escaped);
        Fate::Escaped
    }

    fn discard(&self, p: &Particle, stats: &mut TransportStats) -> Fate {
        let energy = p.carried_energy();
        if energy.is_finite() {
            stats.discarded_energy += energy;
        }
        stats.record(Fate::Discarded);
        Fate::Discarded
    }
}
