//! Physical and numerical constants shared by the transport core.

/// Avogadro's number (1/mol).
pub const AVOGADRO: f64 = 6.022_140_76e23;
/// Classical electron radius (cm).
pub const ELECTRON_RADIUS: f64 = 2.817_940_326_2e-13;
/// Electron rest mass energy (keV).
pub const ELECTRON_REST_MASS: f64 = 510.998_95;
/// hc in keV Å, converts photon energy to inverse wavelength.
pub const HC_KEV_ANGSTROM: f64 = 12.398_419_84;
/// One barn in cm².
pub const BARN: f64 = 1.0e-24;
/// Energy deposited in keV per gram expressed in mGy.
pub const KEV_PER_GRAM_TO_MGY: f64 = 1.602_176_634e-10;
/// Nudge applied when a particle is moved onto a surface so that it ends up
/// strictly on the far side of it (cm).
pub const GEOMETRIC_EPSILON: f64 = 1.0e-6;
/// Minimum distance traversed by a ray to an intersection. Closer hits are ignored.
pub const RAYCAST_MINIMUM_DISTANCE: f64 = 1.0e-9;
/// Margin added around the union of item bounds to form the world bounds (cm).
pub const WORLD_MARGIN: f64 = 1.0;
/// Smallest photon energy carried by the tabulated cross sections (keV).
pub const MIN_TABULATED_ENERGY: f64 = 1.0;
/// Tungsten K-shell binding energy (keV).
pub const TUNGSTEN_K_EDGE: f64 = 69.525;
/// Maximum number of transport steps for a single history before it is
/// discarded as stuck.
pub const MAX_STEPS_PER_HISTORY: usize = 100_000;
