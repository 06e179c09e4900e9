//! The Bench
//!
//! Parlay odds, per-user carts, parlay placement and settlement, and the
//! basketball statistics behind a fantasy sports app for Canadian
//! university basketball.

// Re-export modules for use in binaries
pub mod auth;
pub mod basketball;
pub mod cart;
pub mod cart_store;
pub mod config;
pub mod database;
pub mod db_adapter;
pub mod error;
pub mod extract;
pub mod odds;
pub mod parlay_api;
pub mod profiles;
pub mod routes;

#[cfg(test)]
mod integration_tests;
