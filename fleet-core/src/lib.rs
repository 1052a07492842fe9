#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Domain types and ports shared by the vessel position synchronization engine.

mod domain;
mod error;
mod ports;

pub use domain::*;
pub use error::*;
pub use ports::*;
