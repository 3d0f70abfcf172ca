mod brute_force;
mod odometer;

pub use brute_force::BruteForceResult;
pub use odometer::Odometer;
