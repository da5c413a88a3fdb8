//! Key-value compiler tests.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::{items, query};
use crate::ast::{Term, Value};
use crate::error::RqlError;
use crate::query::Query;
use crate::schema::{Backend, Collection, Index};
use crate::transpiler::nosql::dynamo::rewrite_nulls;
use crate::transpiler::{AccessMode, CompileOptions, Compiler, DynamoCompiler, DynamoQuery};

fn compile_for(input: &str, collection: &Collection) -> Result<DynamoQuery, RqlError> {
    DynamoCompiler::new(CompileOptions::default()).compile(&query(input, collection), collection)
}

fn compile(input: &str) -> DynamoQuery {
    compile_for(input, &items()).unwrap()
}

fn names(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn values(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

// ============================================================================
// Access path selection
// ============================================================================

#[test]
fn test_get_on_full_primary_key() {
    let plan = compile("eq(id,5)&eq(type,X)");
    assert_eq!(plan.mode, AccessMode::Get);
    assert_eq!(plan.index, None);
    assert_eq!(
        plan.key,
        values(vec![("id", Value::Int(5)), ("type", Value::String("X".into()))])
    );
    assert_eq!(plan.key_condition, None);
    assert_eq!(plan.filter, None);
    assert_eq!(plan.limit, None);
    assert_eq!(
        plan.to_request(),
        json!({
            "TableName": "items",
            "Key": { "id": { "N": "5" }, "type": { "S": "X" } }
        })
    );
}

#[test]
fn test_query_on_secondary_index() {
    let plan = compile("eq(type,X)&gt(date,2020-01-01)");
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.index.as_deref(), Some("gsi1"));
    assert_eq!(plan.key_condition.as_deref(), Some("#var1 = :val1 AND #var2 > :val2"));
    assert_eq!(plan.names, names(&[("#var1", "type"), ("#var2", "date")]));
    assert_eq!(
        plan.values,
        values(vec![
            (":val1", Value::String("X".into())),
            (":val2", Value::String("2020-01-01".into())),
        ])
    );
    assert_eq!(plan.filter, None);
}

#[test]
fn test_scan_without_usable_index() {
    let plan = compile("eq(color,red)");
    assert_eq!(plan.mode, AccessMode::Scan);
    assert_eq!(plan.index, None);
    assert_eq!(plan.key_condition, None);
    assert_eq!(plan.filter.as_deref(), Some("#var1 = :val1"));
    assert_eq!(plan.names, names(&[("#var1", "color")]));
}

#[test]
fn test_plan_is_deterministic() {
    for input in ["eq(id,5)&eq(type,X)", "eq(type,X)&gt(date,2020-01-01)", "eq(color,red)"] {
        assert_eq!(compile(input), compile(input));
    }
}

#[test]
fn test_partition_only_primary_key() {
    let orders = Collection::new("orders", Backend::KeyValue)
        .with_index(Index::primary(&["orderId"]));
    let plan = compile_for("eq(orderId,12345)", &orders).unwrap();
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.key_condition.as_deref(), Some("#var1 = :val1"));
    assert_eq!(plan.names, names(&[("#var1", "orderId")]));
    assert_eq!(plan.values, values(vec![(":val1", Value::Int(12345))]));
    assert_eq!(
        plan.to_request(),
        json!({
            "TableName": "orders",
            "KeyConditionExpression": "#var1 = :val1",
            "ExpressionAttributeNames": { "#var1": "orderId" },
            "ExpressionAttributeValues": { ":val1": { "N": "12345" } },
            "ScanIndexForward": true
        })
    );
}

#[test]
fn test_residual_filter_prevents_get() {
    let plan = compile("eq(id,5)&eq(type,X)&eq(color,red)");
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.index, None);
    assert_eq!(plan.key_condition.as_deref(), Some("#var1 = :val1 AND #var2 = :val2"));
    assert_eq!(plan.filter.as_deref(), Some("#var3 = :val3"));
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_descending_sort_on_index() {
    let plan = compile("eq(type,X)&sort(-date)&limit(10)");
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.index.as_deref(), Some("gsi1"));
    assert!(!plan.scan_forward);
    assert_eq!(plan.limit, Some(10));
}

#[test]
fn test_local_index_serves_sort() {
    let collection = Collection::new("items", Backend::KeyValue)
        .with_index(Index::primary(&["id", "type"]))
        .with_index(Index::local("lsi1", &["id", "date"]));
    let plan = compile_for("eq(id,5)&sort(-date)", &collection).unwrap();
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.index.as_deref(), Some("lsi1"));
    assert_eq!(plan.sort_key.as_deref(), Some("date"));
    assert!(!plan.scan_forward);
}

#[test]
fn test_sort_errors() {
    let err = compile_for("sort(-date)", &items()).unwrap_err();
    match err {
        RqlError::Compile { message, .. } => {
            assert_eq!(message, "descending order requires a partition key equality")
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = compile_for("eq(type,X)&sort(color)", &items()).unwrap_err();
    match err {
        RqlError::Compile { message, .. } => {
            assert_eq!(message, "no compatible index for requested sort")
        }
        other => panic!("unexpected error {:?}", other),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_null_checks_match_missing_attributes() {
    let plan = compile("n(color)");
    assert_eq!(
        plan.filter.as_deref(),
        Some("(attribute_not_exists(#var1) OR #var1 = :val1)")
    );
    assert_eq!(plan.values, values(vec![(":val1", Value::Null)]));

    let plan = compile("nn(color)");
    assert_eq!(
        plan.filter.as_deref(),
        Some("(attribute_exists(#var1) AND #var1 <> :val1)")
    );
}

#[test]
fn test_rewrite_nulls_several_columns() {
    let term = crate::parser::parse("emp(a,b)").unwrap();
    assert_eq!(
        rewrite_nulls(&term).to_string(),
        "and(or(attribute_not_exists(`a`),eq(`a`,null)),or(attribute_not_exists(`b`),eq(`b`,null)))"
    );
}

#[test]
fn test_patterns() {
    let plan = compile("sw(name,Jo)");
    assert_eq!(plan.filter.as_deref(), Some("begins_with(#var1, :val1)"));
    assert_eq!(plan.values, values(vec![(":val1", Value::String("Jo".into()))]));

    let plan = compile("w(name,oh)");
    assert_eq!(plan.filter.as_deref(), Some("contains(#var1, :val1)"));

    let plan = compile("eq(name,Jo*)");
    assert_eq!(plan.filter.as_deref(), Some("begins_with(#var1, :val1)"));
    assert_eq!(plan.values, values(vec![(":val1", Value::String("Jo".into()))]));
}

#[test]
fn test_unsupported_patterns() {
    for input in [
        "ew(name,son)",
        "like(name,'a*b')",
        "eq(name,*son)",
        "w(name,'a*b')",
        "sw(name,'a*b')",
    ] {
        let err = compile_for(input, &items()).unwrap_err();
        assert!(
            matches!(err, RqlError::Unsupported { .. }),
            "{} gave {:?}",
            input,
            err
        );
    }
}

#[test]
fn test_membership_and_placeholder_reuse() {
    let plan = compile("in(color,red,blue)");
    assert_eq!(plan.filter.as_deref(), Some("#var1 IN (:val1, :val2)"));

    let plan = compile("or(eq(color,red),eq(color,blue))");
    assert_eq!(plan.filter.as_deref(), Some("(#var1 = :val1 OR #var1 = :val2)"));
    assert_eq!(plan.names.len(), 1);

    let plan = compile("out(color,red)");
    assert_eq!(plan.filter.as_deref(), Some("NOT (#var1 IN (:val1))"));
}

#[test]
fn test_projection_adds_primary_key() {
    let plan = compile("eq(type,X)&includes(color)");
    assert_eq!(plan.projection.as_deref(), Some("#var2, #var3, #var1"));
    assert_eq!(plan.names["#var3"], "id");
}

#[test]
fn test_unsupported_clauses() {
    for input in ["offset(5)", "page(2)", "group(color)", "count(*)", "distinct(color)"] {
        let err = compile_for(input, &items()).unwrap_err();
        assert!(matches!(err, RqlError::Unsupported { .. }), "{}", input);
    }
}

#[test]
fn test_malformed_predicate_is_rejected() {
    let mut q = Query::new(Backend::KeyValue);
    q.filter.push(Term::func("eq", [Term::ident("id")]));
    let err = DynamoCompiler::new(CompileOptions::default())
        .compile(&q, &items())
        .unwrap_err();
    assert!(matches!(err, RqlError::Validation { .. }), "{:?}", err);
}

// ============================================================================
// Continuation
// ============================================================================

#[test]
fn test_continuation_from_last_key() {
    let plan = compile("eq(type,X)&gt(date,2020-01-01)");
    let last_key = json!({ "id": 5, "date": "2021-01-01", "type": "X" });
    let next = plan.continuation(last_key.as_object().unwrap()).unwrap();
    assert_eq!(next.to_string(), "after(type,'X',date,'2021-01-01',id,5)");

    assert_eq!(plan.continuation(&serde_json::Map::new()), None);
}

#[test]
fn test_after_pins_index() {
    let plan = compile("eq(type,X)&after(type,X,date,2021-01-01,id,5)");
    assert_eq!(plan.mode, AccessMode::Query);
    assert_eq!(plan.index.as_deref(), Some("gsi1"));
    assert_eq!(
        plan.exclusive_start_key,
        values(vec![
            ("date", Value::String("2021-01-01".into())),
            ("id", Value::Int(5)),
            ("type", Value::String("X".into())),
        ])
    );
}

#[test]
fn test_after_sort_mismatch() {
    let err = compile_for("eq(type,X)&sort(color)&after(type,X,date,1)", &items()).unwrap_err();
    match err {
        RqlError::Compile { message, .. } => {
            assert_eq!(message, "sort key does not match continuation token")
        }
        other => panic!("unexpected error {:?}", other),
    }
}
