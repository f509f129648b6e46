pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod services;
pub mod state;
