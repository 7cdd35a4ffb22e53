//! API Hunter command-line front end: fetches a target, runs the discovery
//! engine, and renders reports.

pub mod auth;
pub mod config;
pub mod fetch;
pub mod report;
pub mod scan;
