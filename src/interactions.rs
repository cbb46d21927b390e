//! Photon interaction kinematics.
//!
//! Selection of the interaction channel and sampling of the outgoing photon
//! for incoherent (Klein-Nishina) and coherent (Thomson times an atomic form
//! factor) scattering. All sampling takes an explicit random number generator.

use rand::Rng;
use std::f64::consts::PI;

use crate::config::{ELECTRON_RADIUS, ELECTRON_REST_MASS, HC_KEV_ANGSTROM};
use crate::helpers::integrate_simpson;
use crate::material::AttenuationValues;


/// Thomson cross section per electron (cm²).
pub const THOMSON_CROSS_SECTION: f64 = 8.0 / 3.0 * PI * ELECTRON_RADIUS * ELECTRON_RADIUS;

/// Interaction channels enumerated by the transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Photoelectric,
    Incoherent,
    Coherent,
}

/// Selects an interaction channel with probability proportional to its attenuation.
pub fn select_interaction<R: Rng + ?Sized>(att: &AttenuationValues, rng: &mut R) -> Interaction {
    let r = rng.random::<f64>() * att.sum();
    if r < att.photoelectric {
        Interaction::Photoelectric
    } else if r < att.photoelectric + att.incoherent {
        Interaction::Incoherent
    } else {
        Interaction::Coherent
    }
}

/// Total Klein-Nishina cross section per electron (cm²).
pub fn klein_nishina_cross_section(energy: f64) -> f64 {
    let k = energy / ELECTRON_REST_MASS;
    if k < 0.01 {
        // series expansion avoids cancellation at low energy
        return THOMSON_CROSS_SECTION * (1.0 - 2.0 * k + 5.2 * k * k - 13.3 * k * k * k);
    }
    let l = (1.0 + 2.0 * k).ln();
    let a = (1.0 + k) / (k * k) * (2.0 * (1.0 + k) / (1.0 + 2.0 * k) - l / k);
    let b = l / (2.0 * k);
    let c = (1.0 + 3.0 * k) / ((1.0 + 2.0 * k) * (1.0 + 2.0 * k));
    2.0 * PI * ELECTRON_RADIUS * ELECTRON_RADIUS * (a + b - c)
}

/// Klein-Nishina differential cross section per unit solid angle (cm²/sr).
fn klein_nishina_differential(energy: f64, cos_theta: f64) -> f64 {
    let k = energy / ELECTRON_REST_MASS;
    let ratio = 1.0 / (1.0 + k * (1.0 - cos_theta));
    let sin2 = 1.0 - cos_theta * cos_theta;
    0.5 * ELECTRON_RADIUS * ELECTRON_RADIUS * ratio * ratio * (ratio + 1.0 / ratio - sin2)
}

/// Mean fraction of the photon energy handed to the recoil electron in a
/// Compton event.
pub fn compton_energy_transfer_fraction(energy: f64) -> f64 {
    let k = energy / ELECTRON_REST_MASS;
    let transferred = integrate_simpson(
        |cos_theta| {
            let fraction = 1.0 - 1.0 / (1.0 + k * (1.0 - cos_theta));
            klein_nishina_differential(energy, cos_theta) * fraction
        },
        -1.0,
        1.0,
        256,
    );
    let total = integrate_simpson(
        |cos_theta| klein_nishina_differential(energy, cos_theta),
        -1.0,
        1.0,
        256,
    );
    transferred / total
}

/// Samples an incoherent scattering event. Returns the scattered photon energy
/// and the cosine of the scattering angle.
pub fn sample_compton<R: Rng + ?Sized>(energy: f64, rng: &mut R) -> (f64, f64) {
    let k = energy / ELECTRON_REST_MASS;
    let eps0 = 1.0 / (1.0 + 2.0 * k);
    let eps0_sq = eps0 * eps0;
    let alpha1 = -eps0.ln();
    let alpha2 = alpha1 + 0.5 * (1.0 - eps0_sq);

    loop {
        let (eps, eps_sq) = if alpha1 / alpha2 > rng.random::<f64>() {
            let eps = (-alpha1 * rng.random::<f64>()).exp();
            (eps, eps * eps)
        } else {
            let eps_sq = eps0_sq + (1.0 - eps0_sq) * rng.random::<f64>();
            (eps_sq.sqrt(), eps_sq)
        };
        let one_minus_cos = (1.0 - eps) / (eps * k);
        let sin_sq = one_minus_cos * (2.0 - one_minus_cos);
        let rejection = 1.0 - eps * sin_sq / (1.0 + eps_sq);
        if rejection >= rng.random::<f64>() {
            let cos_theta = (1.0 - one_minus_cos).clamp(-1.0, 1.0);
            // recompute from the angle so energy and angle stay exactly consistent
            return (energy / (1.0 + k * (1.0 - cos_theta)), cos_theta);
        }
    }
}

/// Samples the cosine of a coherent scattering angle for a medium of atomic
/// number `z`. The form factor is approximated by `F/Z = (1 + b x²)^-2` with
/// `x = sin(θ/2)/λ`, which allows direct inversion in `x²`; the Thomson term is
/// applied by rejection.
pub fn sample_coherent<R: Rng + ?Sized>(energy: f64, z: f64, rng: &mut R) -> f64 {
    let b = 3.0 / z.max(1.0).powf(2.0 / 3.0);
    let x_max_sq = (energy / HC_KEV_ANGSTROM).powi(2);
    let tail = (1.0 + b * x_max_sq).powi(-3);
    loop {
        let r = rng.random::<f64>();
        // inverse CDF of (1 + b u)^-4 on [0, x_max_sq]
        let u = ((1.0 - r * (1.0 - tail)).powf(-1.0 / 3.0) - 1.0) / b;
        let cos_theta = (1.0 - 2.0 * u / x_max_sq).clamp(-1.0, 1.0);
        if rng.random::<f64>() * 2.0 <= 1.0 + cos_theta * cos_theta {
            return cos_theta;
        }
    }
}

/// Samples a uniform azimuthal angle.
pub fn sample_azimuth<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    2.0 * PI * rng.random::<f64>()
}
