use std::fmt;

use serde::{Deserialize, Serialize};

use promql_common::hash::Signature;
use promql_common::label::{Labels, METRIC_NAME_LABEL};

/// A set of label names used either inclusively (`by`, `on`) or exclusively
/// (`without`, `ignoring`).
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSelector {
    pub include: bool,
    pub names: Vec<String>,
}

impl LabelSelector {
    pub fn including(names: Vec<String>) -> Self {
        Self {
            include: true,
            names,
        }
    }

    pub fn excluding(names: Vec<String>) -> Self {
        Self {
            include: false,
            names,
        }
    }

    /// Signature of the selected labels of `labels`. Exclusion always drops `__name__`.
    pub fn signature(&self, labels: &Labels) -> Signature {
        if self.include {
            labels.signature_including(&self.names)
        } else {
            labels.signature_excluding(&self.names)
        }
    }

    /// Copy of `labels` restricted to the selected names.
    pub fn project(&self, labels: &Labels) -> Labels {
        let mut res = labels.clone();
        if self.include {
            res.retain(|l| self.names.contains(&l.name));
        } else {
            res.retain(|l| l.name != METRIC_NAME_LABEL && !self.names.contains(&l.name));
        }
        res
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", self.names.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorMatchCardinality {
    OneToOne,
    /// group_left: many elements on the left pair with one on the right.
    ManyToOne,
    /// group_right
    OneToMany,
    /// set operators
    ManyToMany,
}

/// How elements of two instant vectors are paired by a binary operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorMatching {
    pub card: VectorMatchCardinality,
    /// `on(...)` when inclusive, `ignoring(...)` otherwise.
    pub matching: LabelSelector,
    /// Labels copied from the "one" side in group_left/group_right matches.
    pub include: Vec<String>,
}

impl VectorMatching {
    pub fn new(card: VectorMatchCardinality) -> Self {
        Self {
            card,
            matching: LabelSelector::default(),
            include: vec![],
        }
    }

    pub fn is_on(&self) -> bool {
        self.matching.include
    }
}

impl fmt::Display for VectorMatching {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let keyword = if self.matching.include { "on" } else { "ignoring" };
        write!(f, "{keyword}{}", self.matching)?;
        match self.card {
            VectorMatchCardinality::ManyToOne => write!(f, " group_left({})", self.include.join(", ")),
            VectorMatchCardinality::OneToMany => {
                write!(f, " group_right({})", self.include.join(", "))
            }
            _ => Ok(()),
        }
    }
}
