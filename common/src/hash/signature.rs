use std::hash::{Hash, Hasher};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::hash::FastHasher;
use crate::label::Label;

/// A 64 bit hash identifying a label set (or a projection of one).
#[derive(Debug, Default, Clone, PartialEq, Eq, Copy, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Signature(u64);

/// implement hash which returns the value of the inner u64
impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Deref for Signature {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

const EMPTY_LIST_SIGNATURE: u64 = 0x9e3779b97f4a7c15;

impl Signature {
    pub fn from_labels<'a>(iter: impl Iterator<Item = &'a Label>) -> Self {
        let mut hasher = FastHasher::default();
        let mut has_labels = false;
        for label in iter {
            label.hash(&mut hasher);
            has_labels = true;
        }
        if !has_labels {
            hasher.write_u64(EMPTY_LIST_SIGNATURE);
        }
        Signature(hasher.finish())
    }

    /// Combines two signatures, order sensitive.
    pub fn combine(&self, other: Signature) -> Signature {
        let mut hasher = FastHasher::default();
        hasher.write_u64(self.0);
        hasher.write_u64(other.0);
        Signature(hasher.finish())
    }
}

impl From<Signature> for u64 {
    fn from(sig: Signature) -> Self {
        sig.0
    }
}

impl From<u64> for Signature {
    fn from(sig: u64) -> Self {
        Signature(sig)
    }
}
