pub use config::*;
pub use context::*;
pub use engine::*;
pub use eval::*;

mod config;
mod context;
mod engine;
mod eval;

#[cfg(test)]
mod engine_test;
