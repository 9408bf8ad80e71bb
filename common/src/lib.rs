extern crate regex;
extern crate xxhash_rust;

pub mod duration;
pub mod hash;
pub mod label;
pub mod regex_util;

pub mod prelude {
    pub use crate::duration::*;
    pub use crate::hash::*;
    pub use crate::label::*;
    pub use crate::regex_util::*;
}
