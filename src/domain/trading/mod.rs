// Core trading domain entities and value objects
pub mod order;
pub mod position;
pub mod signal;
pub mod strategy_rule;
pub mod trade;
pub mod types;
