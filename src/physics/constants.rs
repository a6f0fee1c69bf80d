/// Electron rest-mass energy in keV.
pub const ELECTRON_REST_ENERGY_KEV: f64 = 510.998_950;

/// Speed of light in nm/fs.
pub const SPEED_OF_LIGHT_NM_PER_FS: f64 = 299.792_458;

/// Reduced Planck constant in eV·fs.
pub const HBAR_EV_FS: f64 = 0.658_211_957;

/// Joules per keV.
pub const JOULES_PER_KEV: f64 = 1.602_176_634e-16;

/// Cubic centimetres per cubic nanometre.
pub const CM3_PER_NM3: f64 = 1e-21;

/// Electron speed (nm/fs) for a kinetic energy in keV.
pub fn electron_speed(energy_kev: f64) -> f64 {
    let gamma = 1.0 + energy_kev.max(0.0) / ELECTRON_REST_ENERGY_KEV;
    SPEED_OF_LIGHT_NM_PER_FS * (1.0 - 1.0 / (gamma * gamma)).sqrt()
}
