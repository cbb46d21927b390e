use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::beam::{ctdi_polynomial, CtSequentialBeam};
use crate::ctdi::CtdiPhantom;
use crate::fluence::FluenceScore;
use crate::material::{Material, MaterialConfig};
use crate::room::EnclosedRoom;
use crate::transport::TransportConfig;
use crate::tube::Filter;
use crate::world::World;


/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub room: RoomSettings,
    pub phantom: PhantomSettings,
    pub scorer: ScorerSettings,
    pub beam: BeamSettings,
    #[serde(default)]
    pub transport: TransportConfig,
    pub sweep: SweepSettings,
    pub output: OutputSettings,
    #[serde(default)]
    pub material: MaterialConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoomSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Inner box `[xmin, ymin, zmin, xmax, ymax, zmax]` (cm).
    pub inner_aabb: [f64; 6],
    pub wall_thickness: f64,
    /// Atomic number of the wall element, used at its standard density.
    pub wall_element: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PhantomSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub center: [f64; 3],
    pub radius: f64,
    pub length: f64,
    pub hole_radius: f64,
    pub hole_depth: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScorerSettings {
    pub center: [f64; 3],
    pub normal: [f64; 3],
    pub radius: f64,
    /// Histogram bin width (keV).
    pub energy_step: f64,
    /// Upper end of the histogram (keV).
    pub max_energy: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BeamSettings {
    pub collimation: f64,
    pub slices: usize,
    pub slice_spacing: f64,
    pub particles_per_exposure: usize,
    pub step_angle_deg: f64,
    #[serde(default)]
    pub start_angle_deg: f64,
    pub source_isocenter_distance: f64,
    pub scan_fov: f64,
    pub anode_angle_deg: f64,
    #[serde(default)]
    pub filtration: Vec<Filter>,
    #[serde(default)]
    pub calibration_particles: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SweepSettings {
    /// Tube voltages (kVp) run in order.
    pub tube_voltages: Vec<f64>,
    /// CTDIw polynomial `[a, b, c]` in `a kVp² + b kVp + c` (mGy).
    pub ctdiw_coefficients: [f64; 3],
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputSettings {
    pub directory: PathBuf,
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Builds the world described by the settings: room, CTDI phantom and the
    /// fluence scorer, in that order.
    pub fn world(&self) -> Result<World> {
        let mut world = World::new();
        world.reserve_number_of_items(3);

        if self.room.enabled {
            let lead = Material::by_z_with(self.room.wall_element, &self.material)
                .with_context(|| format!("room wall element {}", self.room.wall_element))?;
            let density = lead.standard_density();
            let room = world.add_item::<EnclosedRoom>();
            room.set_inner_room_aabb(self.room.inner_aabb);
            room.set_wall_thickness(self.room.wall_thickness);
            room.set_material(lead, density);
        }

        if self.phantom.enabled {
            let phantom = world.add_item::<CtdiPhantom>();
            phantom.set_center(self.phantom.center);
            phantom.set_radius(self.phantom.radius);
            phantom.set_length(self.phantom.length);
            phantom.set_hole_radius(self.phantom.hole_radius);
            phantom.set_hole_depth(self.phantom.hole_depth);
        }

        let score = world.add_item::<FluenceScore>();
        score.set_center(self.scorer.center);
        score.set_plane_normal(self.scorer.normal);
        score.set_radius(self.scorer.radius);
        score.set_energy_step(self.scorer.energy_step);
        score.set_max_energy(self.scorer.max_energy);

        world.build().context("failed to build world")?;
        Ok(world)
    }

    /// Beam at tube voltage `kvp`, normalised to the CTDIw polynomial.
    pub fn beam(&self, kvp: f64) -> CtSequentialBeam {
        let mut beam = CtSequentialBeam::default();
        beam.set_collimation(self.beam.collimation);
        beam.set_number_of_slices(self.beam.slices);
        beam.set_slice_spacing(self.beam.slice_spacing);
        beam.set_particles_per_exposure(self.beam.particles_per_exposure);
        beam.set_calibration_particles(self.beam.calibration_particles);
        beam.set_step_angle_deg(self.beam.step_angle_deg);
        beam.set_start_angle_deg(self.beam.start_angle_deg);
        beam.set_source_isocenter_distance(self.beam.source_isocenter_distance);
        beam.set_scan_field_of_view(self.beam.scan_fov);
        beam.tube_mut().set_anode_angle_deg(self.beam.anode_angle_deg);
        for filter in self.beam.filtration.iter() {
            beam.add_tube_filtration_material(filter.z, filter.thickness);
        }
        beam.set_tube_voltage(kvp);
        beam.set_ctdiw(ctdi_polynomial(kvp, &self.sweep.ctdiw_coefficients));
        beam
    }

    /// Checks the settings for values that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.sweep.tube_voltages.is_empty() {
            bail!("at least one tube voltage is required");
        }
        for &kvp in self.sweep.tube_voltages.iter() {
            if !(kvp > 0.0) {
                bail!("tube voltage must be positive, got {}", kvp);
            }
            if kvp > self.scorer.max_energy {
                bail!(
                    "scorer maximum energy {} keV is below the {} kVp tube voltage",
                    self.scorer.max_energy,
                    kvp
                );
            }
            if kvp > self.material.max_energy {
                bail!(
                    "material tables end at {} keV, below the {} kVp tube voltage",
                    self.material.max_energy,
                    kvp
                );
            }
            let ctdiw = ctdi_polynomial(kvp, &self.sweep.ctdiw_coefficients);
            if !(ctdiw > 0.0) {
                bail!("CTDIw polynomial gives {} mGy at {} kVp", ctdiw, kvp);
            }
        }
        if self.room.enabled {
            crate::atoms::Atom::by_z(self.room.wall_element)?;
        }
        self.material.validate()?;
        self.transport.validate()?;
        self.beam(self.sweep.tube_voltages[0]).validate()?;
        Ok(())
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("Error loading configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    config.validate()?;

    Ok(config)
}

/// Loads `config/default.toml`, layers `config/local.toml` and `CTDOSE_`
/// environment variables on top, then applies command-line overrides.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let mut builder =
        Config::builder().add_source(File::from(default_config_file).required(true));
    if local_config.exists() {
        info!("Using local configuration: {:?}", local_config);
        builder = builder.add_source(File::from(local_config).required(false));
    }

    let settings = builder
        .add_source(Environment::with_prefix("ctdose").separator("__"))
        .build()
        .context("Error loading configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    apply_cli_args(&mut config, CliArgs::parse());

    config.validate()?;

    Ok(config)
}

fn apply_cli_args(config: &mut Settings, args: CliArgs) {
    if let Some(particles) = args.particles {
        config.beam.particles_per_exposure = particles;
    }
    if let Some(seed) = args.seed {
        config.transport.seed = seed;
    }
    if let Some(threads) = args.threads {
        config.transport.threads = Some(threads);
    }
    if let Some(kvp) = args.kvp {
        config.sweep.tube_voltages = kvp;
    }
    if let Some(out) = args.out {
        config.output.directory = out;
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the CTDOSE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("CTDOSE_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }
    let exe_path = env::current_exe().context("Failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(PathBuf::from)
        .context("Could not find project root directory")
}

#[derive(Parser, Debug)]
#[command(version, about = "ctdose - Monte Carlo dose and fluence for CT scans")]
pub struct CliArgs {
    /// Particles emitted per exposure.
    #[arg(short, long)]
    particles: Option<usize>,

    /// Random seed for the simulation.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of worker threads.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Tube voltages to sweep (kVp), separated by spaces.
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    kvp: Option<Vec<f64>>,

    /// Output directory.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Tube Voltages: {:?} kVp
  - Particles per Exposure: {}
  - Step Angle: {} deg
  - Collimation: {} cm
  - Filtration: {:?}
  - Scorer: radius {} cm at {:?}
  - Seed: {}
  ",
            self.sweep.tube_voltages,
            self.beam.particles_per_exposure,
            self.beam.step_angle_deg,
            self.beam.collimation,
            self.beam.filtration,
            self.scorer.radius,
            self.scorer.center,
            self.transport.seed,
        )
    }
}
