//! Testing utilities and mock implementations
//!
//! Mock transport and credential collaborators so the engine can be
//! exercised without a broker or real credentials.

pub mod mocks;

pub use mocks::*;
