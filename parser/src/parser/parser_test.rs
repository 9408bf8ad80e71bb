#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use crate::parser::{extract_string_value, parse, ParseError};
    use crate::tree::RuleKind;

    fn tree(s: &str) -> String {
        match parse(s) {
            Ok(t) => t.to_string(),
            Err(e) => panic!("error parsing {s}: {e}"),
        }
    }

    #[test]
    fn number_precedence() {
        assert_eq!(
            tree("1 + 2 * 3"),
            "(expression (vectorOperation (vectorOperation (vector (literal 1))) (addOp +) \
             (vectorOperation (vectorOperation (vector (literal 2))) (multOp *) \
             (vectorOperation (vector (literal 3))))))"
        );
    }

    #[test]
    fn left_associative_subtraction() {
        assert_eq!(
            tree("1 - 2 - 3"),
            "(expression (vectorOperation (vectorOperation (vectorOperation (vector (literal 1))) \
             (addOp -) (vectorOperation (vector (literal 2)))) (addOp -) \
             (vectorOperation (vector (literal 3)))))"
        );
    }

    #[test]
    fn pow_is_right_associative() {
        assert_eq!(
            tree("2 ^ 3 ^ 2"),
            "(expression (vectorOperation (vectorOperation (vector (literal 2))) (powOp ^) \
             (vectorOperation (vectorOperation (vector (literal 3))) (powOp ^) \
             (vectorOperation (vector (literal 2))))))"
        );
    }

    #[test]
    fn unary_minus_binds_looser_than_pow() {
        assert_eq!(
            tree("-a ^ 2"),
            "(expression (vectorOperation (unaryOp -) (vectorOperation \
             (vectorOperation (vector (instantSelector a))) (powOp ^) \
             (vectorOperation (vector (literal 2))))))"
        );
    }

    #[test]
    fn comparison_with_bool_and_grouping() {
        assert_eq!(
            tree("a > bool on(x) group_left(y) b"),
            "(expression (vectorOperation (vectorOperation (vector (instantSelector a))) \
             (compareOp > bool (grouping (on on (labelNameList ( (labelName x) ))) \
             (groupLeft group_left (labelNameList ( (labelName y) ))))) \
             (vectorOperation (vector (instantSelector b)))))"
        );
    }

    #[test]
    fn selector_with_range_and_offset() {
        assert_eq!(
            tree(r#"foo{job="x"}[5m] offset 1m"#),
            "(expression (vectorOperation (vector (offset (matrixSelector (instantSelector foo { \
             (labelMatcherList (labelMatcher (labelName job) (labelMatcherOperator =) \"x\")) }) \
             [ 5m ]) offset 1m))))"
        );
    }

    #[test]
    fn aggregation_with_prefix_grouping() {
        assert_eq!(
            tree("sum by (job) (rate(x[5m]))"),
            "(expression (vectorOperation (vector (aggregation sum (by by (labelNameList ( \
             (labelName job) ))) (parameterList ( (parameter (vectorOperation (vector \
             (function rate ( (parameter (vectorOperation (vector (matrixSelector \
             (instantSelector x) [ 5m ])))) ))))) ))))))"
        );
    }

    #[test]
    fn aggregation_with_suffix_grouping() {
        let parsed = parse("topk(3, x) without (instance)").unwrap();
        let op = parsed.root.rule(RuleKind::VectorOperation).unwrap();
        let vector = op.rule(RuleKind::Vector).unwrap();
        let aggr = vector.rule(RuleKind::Aggregation).unwrap();
        assert!(aggr.rule(RuleKind::Without).is_some());
        let params = aggr.rule(RuleKind::ParameterList).unwrap();
        assert_eq!(params.rules_of(RuleKind::Parameter).count(), 2);
    }

    #[test_case("sum(x)")]
    #[test_case("SUM BY (job) (x)")]
    #[test_case("count_values(\"value\", x)")]
    #[test_case("sum by (on, bool) (x)"; "keywords as label names")]
    #[test_case(r#"x{a="b",}"#; "trailing comma")]
    #[test_case(r#"{__name__=~"x.*"}"#; "selector without name")]
    #[test_case("a and on(job) b or c unless ignoring(x) d")]
    #[test_case("histogram_quantile(0.9, rate(x_bucket[5m]))")]
    #[test_case("time()")]
    #[test_case("-(1)")]
    #[test_case("2 * -x")]
    #[test_case("x # trailing comment")]
    #[test_case("x == bool 1")]
    #[test_case("x offset 5m")]
    fn parses(s: &str) {
        assert!(parse(s).is_ok(), "failed to parse {s}");
    }

    #[test_case(""; "empty")]
    #[test_case("a + bool b"; "bool on arithmetic")]
    #[test_case("rate(x[5m])[1h]"; "subquery")]
    #[test_case("foo[5m:1m]"; "subquery step")]
    #[test_case("foo @ 100"; "at modifier")]
    #[test_case("sum(x) offset 5m"; "offset on aggregation")]
    #[test_case("sum by (a) (x) by (b)"; "double grouping")]
    #[test_case("x{a=1}"; "matcher value must be string")]
    #[test_case("x{"; "unterminated selector")]
    #[test_case("(1"; "unterminated parens")]
    #[test_case("x $ y"; "bad character")]
    #[test_case("1 +"; "missing operand")]
    fn rejects(s: &str) {
        assert!(parse(s).is_err(), "expected error parsing {s}");
    }

    #[test]
    fn empty_input_is_unexpected_eof() {
        assert_eq!(parse("   "), Err(ParseError::UnexpectedEOF));
    }

    #[test]
    fn spans_cover_source() {
        let src = "sum(rate(x[5m]))";
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.text(parsed.root.span), src);
    }

    #[test_case(r#""a\"b""#, "a\"b")]
    #[test_case(r#"'single'"#, "single")]
    #[test_case(r#"`raw\d`"#, "raw\\d")]
    fn string_values(token: &str, expected: &str) {
        assert_eq!(extract_string_value(token).unwrap(), expected);
    }
}
