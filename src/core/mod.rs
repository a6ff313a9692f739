pub mod commands;
pub mod events;
pub mod platform;
pub mod service;
