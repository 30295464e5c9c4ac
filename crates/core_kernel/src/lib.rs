//! Core Kernel - Foundational types shared by the claims workflow crates
//!
//! This crate provides the building blocks used across the workspace:
//! - Currency amount parsing and display formatting on top of `rust_decimal`
//! - Strongly-typed identifiers for claim sessions and closures
//! - The port error taxonomy and health types used by every adapter

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{
    MoneyError, LABOR_RATE_PER_HOUR, format_amount, format_amount_input, labor_hours_for,
    parse_amount, parse_formatted_amount,
};
pub use identifiers::{ClaimSessionId, ClosureId};
pub use ports::{
    PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable,
};
