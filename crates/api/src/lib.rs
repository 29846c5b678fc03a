//! HTTP API: session extraction, route gating and membership administration.

pub mod app;
pub mod config;
pub mod context;
pub mod jwt;
pub mod middleware;
