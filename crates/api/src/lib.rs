//! HTTP API for the cart service: configuration, routing and error mapping.

pub mod app;
pub mod config;
