// src/config/mod.rs
pub mod publisher;

pub use publisher::PublisherSettings;
