use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use promql_common::label::Labels;
use promql_common::regex_util::PromRegex;

use crate::runtime_error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
pub enum MatchOp {
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "=~")]
    RegexMatch,
    #[strum(serialize = "!~")]
    RegexNotMatch,
}

impl MatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::RegexMatch => "=~",
            MatchOp::RegexNotMatch => "!~",
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, MatchOp::RegexMatch | MatchOp::RegexNotMatch)
    }
}

impl Display for MatchOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single `name op "value"` series filter. Regex matchers are anchored on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatcher {
    pub name: String,
    pub value: String,
    pub op: MatchOp,
    regex: Option<PromRegex>,
}

impl LabelMatcher {
    pub fn new<S: Into<String>, V: Into<String>>(
        op: MatchOp,
        name: S,
        value: V,
    ) -> RuntimeResult<Self> {
        let name = name.into();
        let value = value.into();
        let regex = if op.is_regex() {
            let re = PromRegex::new(&value).map_err(|e| {
                RuntimeError::illegal(format!("invalid regex: {e}"), format!("{name}{op}{value:?}"))
            })?;
            Some(re)
        } else {
            None
        };
        Ok(Self {
            name,
            value,
            op,
            regex,
        })
    }

    pub fn equal<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: MatchOp::Equal,
            regex: None,
        }
    }

    /// Tests a label value; a missing label is the empty string.
    pub fn matches(&self, value: &str) -> bool {
        match (self.op, &self.regex) {
            (MatchOp::Equal, _) => self.value == value,
            (MatchOp::NotEqual, _) => self.value != value,
            (MatchOp::RegexMatch, Some(re)) => re.is_match(value),
            (MatchOp::RegexNotMatch, Some(re)) => !re.is_match(value),
            // regex matchers always carry a compiled regex
            (_, None) => false,
        }
    }

    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.name).unwrap_or_default())
    }
}

impl Display for LabelMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op, self.value)
    }
}

/// Returns true if every matcher accepts `labels`.
pub fn matches_all(matchers: &[LabelMatcher], labels: &Labels) -> bool {
    matchers.iter().all(|m| m.matches_labels(labels))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(MatchOp::Equal, "api", "api", true)]
    #[test_case(MatchOp::Equal, "api", "", false)]
    #[test_case(MatchOp::NotEqual, "api", "db", true)]
    #[test_case(MatchOp::RegexMatch, "a.*", "api", true)]
    #[test_case(MatchOp::RegexMatch, "a", "api", false; "regex is anchored")]
    #[test_case(MatchOp::RegexNotMatch, "db|cache", "api", true)]
    #[test_case(MatchOp::RegexMatch, ".*", "", true; "empty value")]
    fn matches_value(op: MatchOp, pattern: &str, value: &str, expected: bool) {
        let m = LabelMatcher::new(op, "job", pattern).unwrap();
        assert_eq!(m.matches(value), expected);
    }

    #[test]
    fn missing_label_matches_empty() {
        let labels = Labels::from_iter([("job", "api")]);
        let m = LabelMatcher::new(MatchOp::Equal, "instance", "").unwrap();
        assert!(m.matches_labels(&labels));
    }

    #[test]
    fn parses_operator_tokens() {
        use std::str::FromStr;

        for op in [
            MatchOp::Equal,
            MatchOp::NotEqual,
            MatchOp::RegexMatch,
            MatchOp::RegexNotMatch,
        ] {
            assert_eq!(MatchOp::from_str(op.as_str()).unwrap(), op);
        }
        assert!(MatchOp::from_str("==").is_err());
    }

    #[test]
    fn invalid_regex_is_illegal() {
        let err = LabelMatcher::new(MatchOp::RegexMatch, "job", "(").unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalExpression { .. }));
    }
}
