pub use aggregate::*;
pub use builder::*;
pub use expr::*;
pub use modifiers::*;
pub use operator::*;

mod aggregate;
mod builder;
mod expr;
mod modifiers;
mod operator;
