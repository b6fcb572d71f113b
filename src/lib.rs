pub mod auth;
pub mod board;
pub mod config;
pub mod cycle;
pub mod error;
pub mod order;
pub mod orders;
pub mod registry;
pub mod request;
pub mod service;
pub mod utils;
mod watch;
