//! Core types shared by every layer of the link.

mod address;
pub mod constants;
mod error;

pub use address::{MacAddress, Role};
pub use constants::*;
pub use error::*;
