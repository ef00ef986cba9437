pub mod admin;
pub mod public;
pub mod service;
