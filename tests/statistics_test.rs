use datadash::statistics::{describe, numeric_values, SummaryStats};
use datadash::wrangle::{wrangle_frame, ColumnKind, WrangleOptions};
use polars::prelude::*;

#[test]
fn test_describe_numeric_columns() {
    let df = df!(
        "a" => &[1i64, 2, 3, 4],
        "b" => &[10.0f64, 20.0, 30.0, 40.0],
        "label" => &["w", "x", "y", "z"]
    )
    .unwrap();
    let data = wrangle_frame(df, &WrangleOptions::default()).unwrap().data;

    let summaries = describe(&data).unwrap();

    // text columns are left out while numeric columns exist
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(summaries[0].kind, ColumnKind::Integer);

    match &summaries[1].stats {
        SummaryStats::Numeric(n) => {
            assert_eq!(n.count, 4);
            assert_eq!(n.mean, 25.0);
            assert_eq!(n.min, 10.0);
            assert_eq!(n.q25, 17.5);
            assert_eq!(n.median, 25.0);
            assert_eq!(n.q75, 32.5);
            assert_eq!(n.max, 40.0);
            assert!((n.std - 12.909944487358056).abs() < 1e-9);
        }
        other => panic!("expected numeric stats, got {:?}", other),
    }
}

#[test]
fn test_describe_text_only_frame() {
    let df = df!(
        "id" => &["a1", "a2", "a3"],
        "fruit" => &["apple", "pear", "apple"]
    )
    .unwrap();
    let data = wrangle_frame(df, &WrangleOptions::default()).unwrap().data;

    let summaries = describe(&data).unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1].name, "fruit");
    match &summaries[1].stats {
        SummaryStats::Categorical(c) => {
            assert_eq!(c.count, 3);
            assert_eq!(c.unique, 2);
            assert_eq!(c.top.as_deref(), Some("apple"));
            assert_eq!(c.freq, 2);
        }
        other => panic!("expected categorical stats, got {:?}", other),
    }
}

#[test]
fn test_describe_excludes_date_index() {
    let df = df!(
        "date" => &["2024-01-01", "2024-01-02"],
        "v" => &[1.0f64, 3.0]
    )
    .unwrap();
    let data = wrangle_frame(df, &WrangleOptions::default()).unwrap().data;

    let summaries = describe(&data).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "v");
}

#[test]
fn test_numeric_values_skip_nulls() {
    let s = Series::new("x".into(), &[Some(1.5f64), None, Some(2.5)]);
    assert_eq!(numeric_values(&s).unwrap(), vec![1.5, 2.5]);
}

#[test]
fn test_summary_serializes_with_type_tag() {
    let df = df!("v" => &[1.0f64, 2.0]).unwrap();
    let data = wrangle_frame(df, &WrangleOptions::default()).unwrap().data;
    let json = serde_json::to_value(describe(&data).unwrap()).unwrap();
    assert_eq!(json[0]["stats"]["type"], "numeric");
    assert_eq!(json[0]["kind"], "float");
}
