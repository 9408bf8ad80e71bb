use regex::{Error as RegexError, Regex};

/// Compiles `expr` so that it must match the whole input, the way Prometheus label matchers do.
pub fn compile_regexp_anchored(expr: &str) -> Result<Regex, RegexError> {
    let anchored = format!("^(?:{expr})$");
    Regex::new(&anchored)
}

/// PromRegex is a fully anchored regex that remembers its source pattern.
#[derive(Clone, Debug)]
pub struct PromRegex {
    source: String,
    regex: Regex,
}

impl PromRegex {
    pub fn new(expr: &str) -> Result<PromRegex, RegexError> {
        let regex = compile_regexp_anchored(expr)?;
        Ok(PromRegex {
            source: expr.to_string(),
            regex,
        })
    }

    /// is_match returns true if the whole of `s` matches.
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for PromRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PromRegex {}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("foo", "foo", true)]
    #[test_case("foo", "foobar", false)]
    #[test_case("foo|bar", "bar", true)]
    #[test_case("fo.*", "foobar", true)]
    #[test_case(".*bar", "foobar", true)]
    #[test_case("b", "abc", false)]
    #[test_case("", "", true)]
    #[test_case(".+", "", false)]
    fn matches_whole_value(expr: &str, input: &str, expected: bool) {
        let re = PromRegex::new(expr).unwrap();
        assert_eq!(re.is_match(input), expected);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(PromRegex::new("a(b").is_err());
    }
}
