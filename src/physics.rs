pub mod auger;
pub mod coefficients;
pub mod constants;
pub mod elastic;
pub mod tabulated;
