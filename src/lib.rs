//! Steady-state data reconciliation and gross-error detection for mass-balance networks.

pub mod api;
pub mod balance;
pub mod config;
pub mod domain;
pub mod search;
pub mod service;
pub mod telemetry;
