#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use crate::execution::{Engine, EngineConfig, QueryContext};
    use crate::provider::{Deadline, MemorySeriesReader, NullSeriesReader};
    use crate::runtime_error::{MatchKind, RuntimeError};
    use crate::types::{now_ms, Labels, QueryValue, Sample, Timestamp};

    const MINUTE: i64 = 60 * 1000;
    const STEP: i64 = 5 * MINUTE;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        Labels::from_iter(pairs.iter().copied())
    }

    /// `0+N x10` every 5m for the classic http_requests fixture.
    fn load_http_requests(reader: &MemorySeriesReader) {
        let series = [
            ("api-server", "0", "production", 10.0),
            ("api-server", "1", "production", 20.0),
            ("api-server", "0", "canary", 30.0),
            ("api-server", "1", "canary", 40.0),
            ("app-server", "0", "production", 50.0),
            ("app-server", "1", "production", 60.0),
            ("app-server", "0", "canary", 70.0),
            ("app-server", "1", "canary", 80.0),
        ];
        for (job, instance, group, inc) in series {
            let metric = labels(&[
                ("__name__", "http_requests"),
                ("job", job),
                ("instance", instance),
                ("group", group),
            ]);
            let values: Vec<f64> = (0..=10).map(|i| i as f64 * inc).collect();
            reader.append_values(metric, 0, STEP, &values).unwrap();
        }
    }

    fn load_histogram(reader: &MemorySeriesReader) {
        for (le, count) in [("0.1", 5.0), ("0.2", 7.0), ("1", 11.0), ("+Inf", 12.0)] {
            let metric = labels(&[("__name__", "request_duration_bucket"), ("le", le)]);
            let values: Vec<f64> = (0..=10).map(|i| i as f64 * count).collect();
            reader.append_values(metric, 0, STEP, &values).unwrap();
        }
    }

    fn engine_with(config: EngineConfig) -> Engine {
        let reader = MemorySeriesReader::new();
        load_http_requests(&reader);
        load_histogram(&reader);
        Engine::new(Arc::new(reader), config).unwrap()
    }

    fn engine() -> Engine {
        engine_with(EngineConfig::default())
    }

    /// Single samples at t=0 for aggregation and matching edge cases.
    fn small_engine() -> Engine {
        let reader = MemorySeriesReader::new();
        let samples = [
            (labels(&[("__name__", "v"), ("job", "a")]), 1.0),
            (labels(&[("__name__", "v"), ("job", "b")]), 1.0),
            (labels(&[("__name__", "v"), ("job", "c")]), 2.0),
            (labels(&[("__name__", "nan_only"), ("job", "a")]), f64::NAN),
            (labels(&[("__name__", "m1"), ("job", "x")]), 1.0),
            (labels(&[("__name__", "m2"), ("job", "x")]), 2.0),
            (labels(&[("__name__", "one"), ("job", "x")]), 1.0),
            (labels(&[("__name__", "a_bucket"), ("job", "x"), ("le", "0.1")]), 5.0),
            (labels(&[("__name__", "a_bucket"), ("job", "x"), ("le", "+Inf")]), 10.0),
            (labels(&[("__name__", "b_bucket"), ("job", "x"), ("le", "1")]), 10.0),
            (labels(&[("__name__", "b_bucket"), ("job", "x"), ("le", "+Inf")]), 10.0),
        ];
        for (metric, v) in samples {
            reader.append(metric, 0, v).unwrap();
        }
        Engine::new(Arc::new(reader), EngineConfig::default()).unwrap()
    }

    async fn instant(engine: &Engine, query: &str, time: Timestamp) -> QueryValue {
        match engine.query_instant(query, time, 0).await {
            Ok(v) => v,
            Err(e) => panic!("error evaluating {query}: {e}"),
        }
    }

    async fn instant_vector(engine: &Engine, query: &str, time: Timestamp) -> Vec<Sample> {
        match instant(engine, query, time).await {
            QueryValue::Vector(v) => v,
            other => panic!("expected a vector from {query}, got {other:?}"),
        }
    }

    /// Sample values keyed by the given label of each sample.
    fn by_label(vector: &[Sample], name: &str) -> BTreeMap<String, f64> {
        vector
            .iter()
            .map(|s| (s.metric.get(name).unwrap_or_default().to_string(), s.point.v))
            .collect()
    }

    #[tokio::test]
    async fn sum_by_group() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"sum by (group) (http_requests{job="api-server"})"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 2);
        // sorted by labels
        assert_eq!(vector[0].metric.as_ref(), &labels(&[("group", "canary")]));
        assert_eq!(vector[0].point.v, 700.0);
        assert_eq!(vector[1].metric.as_ref(), &labels(&[("group", "production")]));
        assert_eq!(vector[1].point.v, 300.0);
        assert!(vector.iter().all(|s| s.point.t == 50 * MINUTE));
    }

    #[tokio::test]
    async fn rate_extrapolates_to_window() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"rate(http_requests{group="canary", instance="1", job="app-server"}[50m])"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 1);
        assert!((vector[0].point.v - 0.26666666666666666).abs() < 1e-12);
        assert_eq!(vector[0].metric.metric_name(), None);
    }

    #[tokio::test]
    async fn topk_keeps_order_and_labels() {
        let engine = engine();
        let vector = instant_vector(&engine, "topk(3, http_requests)", 50 * MINUTE).await;
        let values: Vec<f64> = vector.iter().map(|s| s.point.v).collect();
        assert_eq!(values, vec![800.0, 700.0, 600.0]);
        assert_eq!(vector[0].metric.metric_name(), Some("http_requests"));
        assert_eq!(vector[0].metric.get("job"), Some("app-server"));
        assert_eq!(vector[0].metric.get("instance"), Some("1"));
        assert_eq!(vector[0].metric.get("group"), Some("canary"));

        let vector = instant_vector(&engine, "bottomk(2, http_requests)", 50 * MINUTE).await;
        let values: Vec<f64> = vector.iter().map(|s| s.point.v).collect();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[tokio::test]
    async fn sort_desc_order_is_kept() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"sort_desc(http_requests{job="api-server"})"#,
            50 * MINUTE,
        )
        .await;
        let values: Vec<f64> = vector.iter().map(|s| s.point.v).collect();
        assert_eq!(values, vec![400.0, 300.0, 200.0, 100.0]);
    }

    #[tokio::test]
    async fn histogram_quantile_over_buckets() {
        let engine = engine();
        let vector =
            instant_vector(&engine, "histogram_quantile(0, request_duration_bucket)", 50 * MINUTE)
                .await;
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].point.v, 0.0);
        assert!(vector[0].metric.is_empty());

        // rank 60 of 120 falls halfway into the (0.1, 0.2] bucket
        let vector = instant_vector(
            &engine,
            "histogram_quantile(0.5, request_duration_bucket)",
            50 * MINUTE,
        )
        .await;
        assert!((vector[0].point.v - 0.15).abs() < 1e-9);

        // rank beyond the last finite bucket
        let vector =
            instant_vector(&engine, "histogram_quantile(1, request_duration_bucket)", 50 * MINUTE)
                .await;
        assert_eq!(vector[0].point.v, 1.0);
    }

    #[tokio::test]
    async fn absent_reports_missing_selectors() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"absent(nonexistent{job="api", instance=~"0|1"})"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].metric.as_ref(), &labels(&[("job", "api")]));
        assert_eq!(vector[0].point.v, 1.0);

        let vector = instant_vector(&engine, "absent(nonexistent)", 50 * MINUTE).await;
        assert_eq!(vector.len(), 1);
        assert!(vector[0].metric.is_empty());

        let vector = instant_vector(&engine, "absent(http_requests)", 50 * MINUTE).await;
        assert!(vector.is_empty());
    }

    #[tokio::test]
    async fn absent_over_time_reports_missing_windows() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"absent_over_time(nonexistent{job="api"}[5m])"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].metric.as_ref(), &labels(&[("job", "api")]));

        let vector =
            instant_vector(&engine, "absent_over_time(http_requests[5m])", 50 * MINUTE).await;
        assert!(vector.is_empty());
    }

    #[tokio::test]
    async fn max_samples_boundary() {
        let reader = MemorySeriesReader::new();
        reader.append(labels(&[("__name__", "x"), ("a", "1")]), 0, 1.0).unwrap();
        reader.append(labels(&[("__name__", "x"), ("a", "2")]), 0, 2.0).unwrap();
        let reader = Arc::new(reader);

        let config = EngineConfig::default().with_max_samples(5);
        let engine = Engine::new(reader.clone(), config).unwrap();
        let vector = match engine.query_instant("sum(x)", 0, 0).await {
            Ok(QueryValue::Vector(v)) => v,
            other => panic!("unexpected result {other:?}"),
        };
        assert_eq!(vector[0].point.v, 3.0);

        let config = EngineConfig::default().with_max_samples(4);
        let engine = Engine::new(reader, config).unwrap();
        assert_eq!(
            engine.query_instant("sum(x)", 0, 0).await,
            Err(RuntimeError::TooManySamples(4))
        );
    }

    #[tokio::test]
    async fn one_to_one_ambiguity() {
        let engine = engine();
        let err = engine
            .query_instant(
                r#"http_requests{job="api-server"} + on(group) http_requests{job="app-server"}"#,
                50 * MINUTE,
                0,
            )
            .await
            .unwrap_err();
        let RuntimeError::AmbiguousMatch(ref ambiguous) = err else {
            panic!("expected an ambiguous match, got {err:?}");
        };
        assert_eq!(ambiguous.kind, MatchKind::OneToOne);
        assert!(err.to_string().contains("one-to-one"), "{err}");
    }

    #[tokio::test]
    async fn many_to_one_needs_unique_results() {
        let engine = small_engine();
        let err = engine
            .query_instant(r#"{__name__=~"m1|m2"} + on(job) group_left one"#, 0, 0)
            .await
            .unwrap_err();
        let RuntimeError::AmbiguousMatch(ref ambiguous) = err else {
            panic!("expected an ambiguous match, got {err:?}");
        };
        assert_eq!(ambiguous.kind, MatchKind::ManyToOne);
        let msg = err.to_string();
        assert!(msg.contains("many-to-one"), "{msg}");
        assert!(msg.contains("grouping labels must ensure unique matches"), "{msg}");
    }

    #[tokio::test]
    async fn count_values_groups_by_value() {
        let engine = small_engine();
        let vector = instant_vector(&engine, r#"count_values("val", v)"#, 0).await;
        assert_eq!(
            by_label(&vector, "val"),
            BTreeMap::from([("1".to_string(), 2.0), ("2".to_string(), 1.0)])
        );
        assert!(vector.iter().all(|s| s.metric.len() == 1));

        let vector = instant_vector(&engine, r#"count_values by (job) ("val", v)"#, 0).await;
        assert_eq!(vector.len(), 3);
        assert_eq!(vector[2].metric.as_ref(), &labels(&[("job", "c"), ("val", "2")]));
        assert!(vector.iter().all(|s| s.point.v == 1.0));
    }

    #[tokio::test]
    async fn spread_aggregations() {
        let engine = small_engine();
        let cases = [
            ("avg(v)", 4.0 / 3.0),
            ("group(v)", 1.0),
            ("stdvar(v)", 2.0 / 9.0),
            ("stddev(v)", (2.0f64 / 9.0).sqrt()),
            ("quantile(0.5, v)", 1.0),
        ];
        for (q, expected) in cases {
            let vector = instant_vector(&engine, q, 0).await;
            assert_eq!(vector.len(), 1, "{q}");
            assert!(vector[0].metric.is_empty(), "{q}");
            assert!((vector[0].point.v - expected).abs() < 1e-12, "{q}: {}", vector[0].point.v);
        }
    }

    #[tokio::test]
    async fn min_max_of_only_nan_is_nan() {
        let engine = small_engine();
        for q in ["max(nan_only)", "min(nan_only)"] {
            let vector = instant_vector(&engine, q, 0).await;
            assert_eq!(vector.len(), 1, "{q}");
            assert!(vector[0].point.v.is_nan(), "{q}");
        }
        let vector = instant_vector(&engine, r#"max({__name__=~"v|nan_only"})"#, 0).await;
        assert_eq!(vector[0].point.v, 2.0);
    }

    #[tokio::test]
    async fn quantile_parameter_out_of_range() {
        let engine = small_engine();
        let err = engine.query_instant("quantile(2, v)", 0, 0).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentError(_)), "{err:?}");
        assert!(err.to_string().contains("between 0 and 1"), "{err}");
    }

    #[tokio::test]
    async fn histograms_with_same_labels_merge() {
        let engine = small_engine();
        let vector = instant_vector(
            &engine,
            r#"histogram_quantile(0.5, {__name__=~"a_bucket|b_bucket"})"#,
            0,
        )
        .await;
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].metric.as_ref(), &labels(&[("job", "x")]));
        // buckets 0.1:5, 1:10, +Inf:20 once merged
        assert_eq!(vector[0].point.v, 1.0);
    }

    #[tokio::test]
    async fn group_left_copies_labels() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"http_requests{job="api-server"} / on(instance, group) group_left sum by (instance, group) (http_requests)"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 4);
        for s in &vector {
            assert_eq!(s.metric.get("job"), Some("api-server"));
            assert_eq!(s.metric.metric_name(), None);
        }
        let production_0 = vector
            .iter()
            .find(|s| s.metric.get("instance") == Some("0") && s.metric.get("group") == Some("production"))
            .unwrap();
        assert_eq!(production_0.point.v, 100.0 / 600.0);
    }

    #[tokio::test]
    async fn repeated_queries_agree() {
        let engine = engine();
        let q = "sum by (job) (rate(http_requests[10m])) * 60";
        let first = instant(&engine, q, 50 * MINUTE).await;
        let second = instant(&engine, q, 50 * MINUTE).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn scalar_results() {
        let engine = engine();
        assert_eq!(
            instant(&engine, "1 + 2 * 3", 10 * MINUTE).await,
            QueryValue::Scalar(crate::types::Scalar {
                t: 10 * MINUTE,
                v: 7.0
            })
        );
        let v = instant(
            &engine,
            r#"scalar(http_requests{job="api-server", instance="0", group="production"})"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(v.as_scalar(), Some(100.0));

        // more than one series
        let v = instant(&engine, "scalar(http_requests)", 50 * MINUTE).await;
        assert!(v.as_scalar().unwrap().is_nan());

        let v = instant(&engine, "time()", 50 * MINUTE).await;
        assert_eq!(v.as_scalar(), Some(3000.0));
    }

    #[tokio::test]
    async fn comparisons_filter_or_return_bool() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"http_requests{job="api-server"} > 250"#,
            50 * MINUTE,
        )
        .await;
        let values = by_label(&vector, "group");
        assert_eq!(vector.len(), 2);
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["canary"]);
        // filtering keeps the metric name
        assert!(vector.iter().all(|s| s.metric.metric_name() == Some("http_requests")));

        let vector = instant_vector(
            &engine,
            r#"http_requests{job="api-server", instance="0"} > bool 250"#,
            50 * MINUTE,
        )
        .await;
        let values = by_label(&vector, "group");
        assert_eq!(values.get("canary"), Some(&1.0));
        assert_eq!(values.get("production"), Some(&0.0));
        assert!(vector.iter().all(|s| s.metric.metric_name().is_none()));
    }

    #[tokio::test]
    async fn set_operators() {
        let engine = engine();
        let vector = instant_vector(
            &engine,
            r#"http_requests{group="canary"} and http_requests{instance="0"}"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(by_label(&vector, "job").len(), 2);
        assert!(vector.iter().all(|s| s.metric.get("instance") == Some("0")));

        let vector = instant_vector(
            &engine,
            r#"http_requests{job="api-server"} unless on(group) http_requests{group="canary"}"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 2);
        assert!(vector.iter().all(|s| s.metric.get("group") == Some("production")));

        let vector = instant_vector(
            &engine,
            r#"http_requests{job="api-server", group="canary"} or http_requests{job="app-server", group="canary"}"#,
            50 * MINUTE,
        )
        .await;
        assert_eq!(vector.len(), 4);
    }

    #[tokio::test]
    async fn range_query_steps() {
        let engine = engine();
        let matrix = engine
            .query_range("sum(http_requests)", 0, 50 * MINUTE, STEP, 0)
            .await
            .unwrap();
        assert_eq!(matrix.len(), 1);
        let points = &matrix[0].points;
        assert_eq!(points.len(), 11);
        assert_eq!(points[0].v, 0.0);
        assert_eq!(points[10].v, 3600.0);
        assert_eq!(points[10].t, 50 * MINUTE);
    }

    #[tokio::test]
    async fn range_query_of_scalar() {
        let engine = engine();
        let matrix = engine
            .query_range("time()", 0, 2 * MINUTE, MINUTE, 0)
            .await
            .unwrap();
        assert_eq!(matrix.len(), 1);
        let values: Vec<f64> = matrix[0].points.iter().map(|p| p.v).collect();
        assert_eq!(values, vec![0.0, 60.0, 120.0]);
    }

    #[tokio::test]
    async fn range_query_default_step() {
        let engine = engine_with(EngineConfig::default().with_default_interval(Duration::minutes(1)));
        let matrix = engine
            .query_range(r#"http_requests{job="api-server", instance="0", group="production"}"#, 0, 10 * MINUTE, 0, 0)
            .await
            .unwrap();
        assert_eq!(matrix[0].points.len(), 11);
        // lookback carries the 5m samples forward
        assert_eq!(matrix[0].points[4].v, 0.0);
        assert_eq!(matrix[0].points[5].v, 10.0);
    }

    #[tokio::test]
    async fn range_query_rejects_matrix_root() {
        let engine = engine();
        let err = engine
            .query_range("http_requests[5m]", 0, 10 * MINUTE, MINUTE, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalExpression { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn instant_matrix_result() {
        let engine = engine();
        let value = instant(
            &engine,
            r#"http_requests{job="api-server", instance="0", group="production"}[10m]"#,
            50 * MINUTE,
        )
        .await;
        let matrix = value.as_matrix().unwrap();
        assert_eq!(matrix.len(), 1);
        let values: Vec<f64> = matrix[0].points.iter().map(|p| p.v).collect();
        assert_eq!(values, vec![90.0, 100.0]);
        assert_eq!(matrix[0].metric.metric_name(), Some("http_requests"));
    }

    #[tokio::test]
    async fn limit_truncates_sorted_result() {
        let engine = engine();
        let value = engine
            .query_instant("http_requests", 50 * MINUTE, 3)
            .await
            .unwrap();
        let vector = value.as_vector().unwrap();
        assert_eq!(vector.len(), 3);
        let mut sorted = vector.clone();
        sorted.sort_by(|a, b| a.metric.cmp(&b.metric));
        assert_eq!(vector, &sorted);

        let matrix = engine
            .query_range("http_requests", 0, 10 * MINUTE, STEP, 2)
            .await
            .unwrap();
        assert_eq!(matrix.len(), 2);
    }

    #[tokio::test]
    async fn string_root() {
        let engine = engine();
        let value = instant(&engine, r#"("hello")"#, 1000).await;
        let QueryValue::String(s) = value else {
            panic!("expected a string");
        };
        assert_eq!(s.v, "hello");
        assert_eq!(s.t, 1000);
    }

    #[tokio::test]
    async fn cancelled_query() {
        let engine = engine();
        let ctx = engine.new_context().unwrap();
        ctx.cancel();
        let res = engine
            .query_instant_with_context(&ctx, "http_requests", 0, 0)
            .await;
        assert_eq!(res, Err(RuntimeError::Cancelled));
    }

    #[tokio::test]
    async fn expired_deadline() {
        let engine = engine();
        let deadline = Deadline::with_start_time(now_ms() - 10_000, Duration::seconds(1)).unwrap();
        let ctx = QueryContext::new(deadline);
        let res = engine
            .query_range_with_context(&ctx, "http_requests", 0, MINUTE, MINUTE, 0)
            .await;
        assert!(matches!(res, Err(RuntimeError::DeadlineExceeded(_))), "{res:?}");
    }

    #[tokio::test]
    async fn bad_queries_are_bad_requests() {
        let engine = engine();
        for q in ["sum(", "rate(http_requests)", r#"count_values("a-b", http_requests)"#] {
            let err = engine.query_instant(q, 0, 0).await.unwrap_err();
            assert!(err.is_bad_request(), "{q}: {err:?}");
        }
    }

    #[tokio::test]
    async fn empty_reader() {
        let engine = Engine::new(Arc::new(NullSeriesReader), EngineConfig::default()).unwrap();
        let vector = instant_vector(&engine, r#"absent(up{job="db"})"#, 0).await;
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].metric.as_ref(), &labels(&[("job", "db")]));
        let vector = instant_vector(&engine, "sum(up)", 0).await;
        assert!(vector.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig::default().with_max_samples(0);
        assert!(Engine::new(Arc::new(MemorySeriesReader::new()), config).is_err());
    }
}
