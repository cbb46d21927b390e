//! Energy imparted accumulators.
//!
//! A [`DoseScore`] collects weighted energy deposits (keV) together with the
//! sum of squared deposits and an event count, so a dose and a rough relative
//! uncertainty can be reported for any scored region once its mass is known.

use std::{fmt, ops::*};

use crate::config::KEV_PER_GRAM_TO_MGY;


/// Energy imparted to a scoring region.
///
/// **Context**: Every scoring item keeps one of these per region (phantom
/// bulk, measurement hole, room wall). Deposits arrive from many worker
/// threads through thread-local copies that are later merged with `+=`.
///
/// **How it Works**: Stores the running sum of deposits, the sum of their
/// squares and the number of deposit events. The dose in mGy follows from
/// the region mass.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct DoseScore {
    pub energy_imparted: f64, // keV
    pub energy_squared: f64,  // keV^2
    pub events: u64,
}

impl AddAssign for DoseScore {
    fn add_assign(&mut self, other: Self) {
        self.energy_imparted += other.energy_imparted;
        self.energy_squared += other.energy_squared;
        self.events += other.events;
    }
}

impl Add for DoseScore {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl MulAssign<f64> for DoseScore {
    fn mul_assign(&mut self, rhs: f64) {
        self.energy_imparted *= rhs;
        self.energy_squared *= rhs * rhs;
    }
}

impl DoseScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one weighted deposit in keV.
    pub fn record(&mut self, energy: f64) {
        if !energy.is_finite() {
            return;
        }
        self.energy_imparted += energy;
        self.energy_squared += energy * energy;
        self.events += 1;
    }

    /// Resets the accumulator to zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Dose in mGy for a region of `mass` grams. Zero for massless regions.
    pub fn dose_mgy(&self, mass: f64) -> f64 {
        if mass > 0.0 {
            self.energy_imparted * KEV_PER_GRAM_TO_MGY / mass
        } else {
            0.0
        }
    }

    /// Relative standard error estimated from the per-event deposits,
    /// `sqrt(sum(e^2)) / sum(e)`. Zero when nothing has been scored.
    pub fn relative_uncertainty(&self) -> f64 {
        if self.energy_imparted > 0.0 {
            self.energy_squared.sqrt() / self.energy_imparted
        } else {
            0.0
        }
    }
}

impl fmt::Display for DoseScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6e} keV ({} events, {:.2}%)",
            self.energy_imparted,
            self.events,
            100.0 * self.relative_uncertainty()
        )
    }
}
