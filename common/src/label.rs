use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::hash::Signature;

/// The reserved label holding a series' metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        let cmp = self.name.cmp(&other.name);
        if cmp != Ordering::Equal {
            cmp
        } else {
            self.value.cmp(&other.value)
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={:?}", self.name, self.value)
    }
}

const SEP: u8 = 0xfe;

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.name.as_bytes());
        state.write_u8(SEP);
        state.write(self.value.as_bytes());
        state.write_u8(SEP);
    }
}

/// A metric identity: label pairs kept sorted by name, with unique names.
/// Labels with an empty value are never stored.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Labels(Vec<Label>);

impl Labels {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(Vec::with_capacity(cap))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Label] {
        &self.0
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.0.binary_search_by(|l| l.name.as_str().cmp(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .ok()
            .map(|i| self.0[i].value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_ok()
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// Sets `name` to `value`, replacing any existing value. An empty value removes the label.
    pub fn set<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Ok(i) => {
                if value.is_empty() {
                    self.0.remove(i);
                } else {
                    self.0[i].value = value;
                }
            }
            Err(i) => {
                if !value.is_empty() {
                    self.0.insert(i, Label { name, value });
                }
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        match self.position(name) {
            Ok(i) => Some(self.0.remove(i).value),
            Err(_) => None,
        }
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&Label) -> bool,
    {
        self.0.retain(f)
    }

    pub fn remove_metric_name(&mut self) {
        self.remove(METRIC_NAME_LABEL);
    }

    pub fn without_metric_name(&self) -> Labels {
        let mut result = self.clone();
        result.remove_metric_name();
        result
    }

    pub fn signature(&self) -> Signature {
        Signature::from_labels(self.0.iter())
    }

    /// Signature over only the labels whose names appear in `names`.
    pub fn signature_including(&self, names: &[String]) -> Signature {
        Signature::from_labels(self.0.iter().filter(|l| names.contains(&l.name)))
    }

    /// Signature over every label except `__name__` and those in `names`.
    pub fn signature_excluding(&self, names: &[String]) -> Signature {
        Signature::from_labels(
            self.0
                .iter()
                .filter(|l| l.name != METRIC_NAME_LABEL && !names.contains(&l.name)),
        )
    }
}

impl From<Vec<Label>> for Labels {
    fn from(mut labels: Vec<Label>) -> Self {
        labels.retain(|l| !l.value.is_empty());
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        // keep the last value given for a duplicated name
        labels.reverse();
        labels.dedup_by(|a, b| a.name == b.name);
        labels.reverse();
        Labels(labels)
    }
}

impl<S, V> FromIterator<(S, V)> for Labels
where
    S: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let labels = iter
            .into_iter()
            .map(|(name, value)| Label::new(name, value))
            .collect::<Vec<_>>();
        Labels::from(labels)
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Labels {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{label}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn labels_are_sorted_and_deduplicated() {
        let labels = Labels::from_iter([("job", "api"), ("__name__", "up"), ("job", "db")]);
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["__name__", "job"]);
        assert_eq!(labels.get("job"), Some("db"));
        assert_eq!(labels.to_string(), r#"{__name__="up", job="db"}"#);
    }

    #[test]
    fn set_with_empty_value_removes() {
        let mut labels = Labels::from_iter([("a", "1"), ("b", "2")]);
        labels.set("a", "");
        labels.set("c", "3");
        assert_eq!(labels, Labels::from_iter([("b", "2"), ("c", "3")]));
    }

    #[test]
    fn excluding_signature_ignores_metric_name() {
        let a = Labels::from_iter([("__name__", "x"), ("job", "a"), ("instance", "1")]);
        let b = Labels::from_iter([("__name__", "y"), ("job", "a"), ("instance", "2")]);
        let ignored = vec!["instance".to_string()];
        assert_eq!(a.signature_excluding(&ignored), b.signature_excluding(&ignored));
        assert_ne!(a.signature(), b.signature());

        let on = vec!["job".to_string()];
        assert_eq!(a.signature_including(&on), b.signature_including(&on));
    }
}
