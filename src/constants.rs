//! Physical constants and relativistic helpers.
//!
//! Base units are SI; momenta are normalized by the electron rest
//! momentum (p = gamma*beta), so velocities come back as fractions of c.

/// Speed of light in m/s.
pub const LIGHT_VELOCITY: f64 = 299_792_458.0;
/// Electron charge in coulombs (negative).
pub const ELECTRON_CHARGE: f64 = -1.602_176_565e-19;
/// Electron rest mass in kilograms.
pub const ELECTRON_MASS: f64 = 9.109_382_91e-31;
/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_82e-12;

/// ELECTRON_CHARGE / (ELECTRON_MASS * LIGHT_VELOCITY^2).
///
/// Couples a field sample to a normalized momentum kick; negative, so the
/// force on an electron points against the field.
pub const ALFA: f64 = -1.956_951_269_331_419_6e-6;

/// Child-Langmuir space-charge-limited current density for a planar gap.
///
/// `length` is the cathode-anode distance in meters, `u_anode` the gap
/// voltage in volts. Returns A/m^2.
pub fn child_langmuir_current(length: f64, u_anode: f64) -> f64 {
    2.33e-6 * (1.0 / (length * length)) * u_anode.powf(1.5)
}

/// Velocity fraction of c from normalized momentum.
pub fn beta(p: f64) -> f64 {
    p / (1.0 + p * p).sqrt()
}

/// Normalized momentum from a velocity fraction of c.
pub fn momentum(beta: f64) -> f64 {
    beta / (1.0 - beta * beta).sqrt()
}

/// Lorentz factor of an electron accelerated through `w` volts.
pub fn kinetic_energy_to_lorentz_factor(w: f64) -> f64 {
    1.0 - ALFA * w
}

/// Velocity fraction of c for a given Lorentz factor.
pub fn lorentz_factor_to_beta(gamma: f64) -> f64 {
    (gamma * gamma - 1.0).sqrt() / gamma
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_momentum_round_trip() {
        for &b in &[0.0, 0.1, 0.5, 0.99] {
            let p = momentum(b);
            assert!((beta(p) - b).abs() < 1e-12, "round trip failed at beta={}", b);
        }
    }

    #[test]
    fn beta_stays_subluminal() {
        assert!(beta(1e6) < 1.0);
        assert!(beta(-1e6) > -1.0);
    }

    #[test]
    fn alfa_matches_defining_ratio() {
        let ratio = ELECTRON_CHARGE / (ELECTRON_MASS * LIGHT_VELOCITY * LIGHT_VELOCITY);
        assert!((ratio - ALFA).abs() / ALFA.abs() < 1e-9);
    }

    #[test]
    fn zero_energy_gives_zero_momentum() {
        let gamma = kinetic_energy_to_lorentz_factor(0.0);
        assert_eq!(lorentz_factor_to_beta(gamma), 0.0);
    }
}
