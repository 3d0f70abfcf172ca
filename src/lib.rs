/// A module containing the factor graph model and sum-product message passing
pub mod core;
/// A module containing exact inference by enumeration of all configurations,
/// intended for validating message passing on small graphs
pub mod exact;

#[cfg(test)]
mod tests;
