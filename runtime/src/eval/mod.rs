pub use evaluator::*;
pub use helper::*;
pub use populated::*;

mod aggregate;
mod binary;
mod evaluator;
mod helper;
mod populated;
