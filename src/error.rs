use thiserror::Error;

/// Errors raised by the transport core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown element with atomic number {0}, supported range is 1..=100")]
    UnknownElement(u32),

    #[error("Unknown compound: '{0}'")]
    UnknownCompound(String),

    #[error("Invalid geometry in item #{item} ({kind}): {reason}")]
    InvalidGeometry {
        item: usize,
        kind: &'static str,
        reason: String,
    },

    #[error("World must be built before it can be used for transport")]
    WorldNotBuilt,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tube spectrum at {kvp} kVp carries no photons")]
    EmptySpectrum { kvp: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
