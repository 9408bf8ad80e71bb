pub use deadline::*;
pub use memory_provider::*;
pub use search::*;

mod deadline;
mod memory_provider;
mod search;
