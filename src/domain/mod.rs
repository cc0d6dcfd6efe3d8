// Market analysis domain
pub mod market;

// Repository traits
pub mod repositories;

// Risk management domain
pub mod risk;

// Core trading domain
pub mod trading;

// Domain-specific error types
pub mod errors;

// Outcome-analysis entities
pub mod learning;
