pub mod beam;
pub mod config;
pub mod dose;
pub mod electron;
pub mod particle;
pub mod photon;
pub mod report;
pub mod simulation;
pub mod transport;
