pub mod client;
pub mod types;

pub use client::{HttpNetwork, Network};
pub use types::{Destination, Request, Response};
