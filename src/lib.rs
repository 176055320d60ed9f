pub mod app;
pub mod audio;
pub mod beat;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod hud;
pub mod logging;
pub mod media;
pub mod mirror;
pub mod particles;
pub mod render;
pub mod scheduler;
pub mod surface;
pub mod terminal;
