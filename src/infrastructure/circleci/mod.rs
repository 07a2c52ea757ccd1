pub mod client;

pub use client::{CircleCiClient, DEFAULT_API_URL};
