//! Astex Brokerage Library
//!
//! Core components for the Astex retail brokerage back end: account and
//! funding management, trade settlement, margin loans and the admin
//! back-office.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod rate_limit;
pub mod router;
