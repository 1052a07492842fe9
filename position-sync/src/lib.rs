#![deny(warnings)]
#![deny(rust_2018_idioms)]

pub mod engine;
pub mod error;
pub mod marker;
pub mod models;
pub mod normalizer;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod snapshot;
pub mod startup;
pub mod store;
pub mod stream;
pub mod visibility;
pub mod websocket;

#[cfg(any(test, feature = "test"))]
pub mod test_helper;
