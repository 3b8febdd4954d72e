//! Data sources for fits: toy samples generated from models.

pub mod sample;

pub use sample::{generate_extended, generate_sample};
