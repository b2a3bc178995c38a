pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod output;
pub mod render;
pub mod state;
pub mod tui;
