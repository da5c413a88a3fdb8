//! Relational compiler tests (ANSI dialect).

use pretty_assertions::assert_eq;

use super::{orders, query};
use crate::ast::{Term, Value};
use crate::error::RqlError;
use crate::query::Query;
use crate::schema::Backend;
use crate::transpiler::{CompileOptions, Compiler, SqlCompiler, SqlQuery};

fn compile(input: &str) -> SqlQuery {
    let collection = orders();
    SqlCompiler::new(CompileOptions::default())
        .compile(&query(input, &collection), &collection)
        .unwrap()
}

#[test]
fn test_sort_and_limit_params() {
    let collection = orders();
    let q = Query::from_params([("sort", "-orderid"), ("limit", "2")], Backend::Relational).unwrap();
    let compiled = SqlCompiler::new(CompileOptions::default())
        .compile(&q, &collection)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"orders\" ORDER BY \"orderid\" DESC LIMIT 2"
    );
    assert!(compiled.params.is_empty());
}

#[test]
fn test_eq_binds_typed_value() {
    let compiled = compile("eq(orderid,10257)");
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"orders\" WHERE \"orderid\" = ? ORDER BY \"orderid\" ASC"
    );
    assert_eq!(compiled.params, vec![Value::Int(10257)]);

    let quoted = compile("eq(orderid,'10257')");
    assert_eq!(quoted.params, vec![Value::Int(10257)]);
}

#[test]
fn test_ne_wraps_negation() {
    let compiled = compile("ne(shipvia,5)");
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"orders\" WHERE NOT (\"shipvia\" = ?) ORDER BY \"orderid\" ASC"
    );
    assert_eq!(compiled.params, vec![Value::Int(5)]);
}

#[test]
fn test_multiple_values() {
    let compiled = compile("eq(shipcity,Paris,Lyon)");
    assert!(compiled
        .sql
        .contains("WHERE (\"shipcity\" = ? OR \"shipcity\" = ?)"));

    let compiled = compile("ne(shipcity,Paris,Lyon)");
    assert!(compiled
        .sql
        .contains("WHERE NOT (\"shipcity\" = ? OR \"shipcity\" = ?)"));
}

#[test]
fn test_wildcard_idempotence() {
    for (a, b) in [
        ("sw(shipcity,VI)", "sw(shipcity,VI*)"),
        ("ew(shipcity,VI)", "ew(shipcity,*VI)"),
        ("w(shipcity,VI)", "w(shipcity,*VI*)"),
    ] {
        let (a, b) = (compile(a), compile(b));
        assert_eq!(a.sql, b.sql);
        assert_eq!(a.params, b.params);
    }
    assert_eq!(compile("sw(shipcity,VI)").params, vec![Value::String("VI%".into())]);
    assert_eq!(compile("ew(shipcity,VI)").params, vec![Value::String("%VI".into())]);
    assert_eq!(compile("w(shipcity,VI)").params, vec![Value::String("%VI%".into())]);
}

#[test]
fn test_eq_wildcard_escapes_underscore() {
    let compiled = compile("eq(shipcity,*first_name*)");
    assert!(compiled.sql.contains("WHERE \"shipcity\" LIKE ?"));
    assert_eq!(
        compiled.params,
        vec![Value::String("%first\\_name%".into())]
    );
}

#[test]
fn test_without() {
    let compiled = compile("wo(shipcity,VI)");
    assert!(compiled.sql.contains("WHERE NOT (\"shipcity\" LIKE ?)"));
}

#[test]
fn test_membership() {
    let compiled = compile("in(orderid,1,2)");
    assert!(compiled.sql.contains("WHERE \"orderid\" IN (?, ?)"));
    assert_eq!(compiled.params, vec![Value::Int(1), Value::Int(2)]);

    let compiled = compile("out(orderid,3)");
    assert!(compiled.sql.contains("WHERE \"orderid\" NOT IN (?)"));
}

#[test]
fn test_null_and_empty_checks() {
    let compiled = compile("n(shipcity,shipregion)");
    assert!(compiled
        .sql
        .contains("WHERE (\"shipcity\" IS NULL AND \"shipregion\" IS NULL)"));

    let compiled = compile("nn(shipcity)");
    assert!(compiled.sql.contains("WHERE \"shipcity\" IS NOT NULL"));

    let compiled = compile("emp(shipcity)");
    assert!(compiled
        .sql
        .contains("WHERE (\"shipcity\" IS NULL OR \"shipcity\" = '')"));

    let compiled = compile("nemp(shipcity)");
    assert!(compiled
        .sql
        .contains("WHERE (\"shipcity\" IS NOT NULL AND \"shipcity\" <> '')"));

    let compiled = compile("eq(shipcity,null)");
    assert!(compiled.sql.contains("WHERE \"shipcity\" IS NULL"));
    assert!(compiled.params.is_empty());
}

#[test]
fn test_shorthand_or_and_range() {
    let compiled = compile("or(shipcity=Paris,shipcity=Lyon)&freight=gt=10");
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"orders\" WHERE (\"shipcity\" = ? OR \"shipcity\" = ?) AND \"freight\" > ? ORDER BY \"orderid\" ASC"
    );
    assert_eq!(
        compiled.params,
        vec![
            Value::String("Paris".into()),
            Value::String("Lyon".into()),
            Value::Float(10.0)
        ]
    );
}

#[test]
fn test_column_reference_is_not_bound() {
    let compiled = compile("eq(shipcity,`shipname`)");
    assert!(compiled.sql.contains("WHERE \"shipcity\" = \"shipname\""));
    assert!(compiled.params.is_empty());
}

#[test]
fn test_includes_force_primary_key() {
    let compiled = compile("includes(shipcity)");
    assert_eq!(
        compiled.sql,
        "SELECT \"shipcity\", \"orderid\" FROM \"orders\" ORDER BY \"orderid\" ASC"
    );
}

#[test]
fn test_default_sort_needs_all_primary_columns() {
    let compiled = compile("group(shipcity)&count(*)");
    assert_eq!(
        compiled.sql,
        "SELECT \"shipcity\", COUNT(*) AS \"count\" FROM \"orders\" GROUP BY \"shipcity\""
    );
}

#[test]
fn test_aggregate_aliases() {
    let compiled = compile("sum(freight)&as(max(freight),top)&count(distinct(shipcity))");
    assert_eq!(
        compiled.sql,
        "SELECT SUM(\"freight\") AS \"sum_freight\", MAX(\"freight\") AS \"top\", COUNT(DISTINCT \"shipcity\") AS \"count_distinct_shipcity\" FROM \"orders\""
    );
}

#[test]
fn test_conditional_aggregate_inlines_numbers() {
    let compiled = compile("group(shipcity)&sum(if(eq(status,shipped),1,0))");
    assert_eq!(
        compiled.sql,
        "SELECT \"shipcity\", SUM(CASE WHEN \"status\" = ? THEN 1 ELSE 0 END) AS \"sum_if\" FROM \"orders\" GROUP BY \"shipcity\""
    );
    assert_eq!(compiled.params, vec![Value::String("shipped".into())]);
}

#[test]
fn test_distinct_keeps_only_listed_columns() {
    let compiled = compile("distinct(shipcity)");
    assert_eq!(compiled.sql, "SELECT DISTINCT \"shipcity\" FROM \"orders\"");

    let compiled = compile("distinct(shipcity,orderid)&sort(-shipcity)");
    assert_eq!(
        compiled.sql,
        "SELECT DISTINCT \"shipcity\", \"orderid\" FROM \"orders\" ORDER BY \"shipcity\" DESC"
    );
}

#[test]
fn test_page_out_of_range() {
    let collection = orders();
    let err = SqlCompiler::new(CompileOptions::default())
        .compile(&query("page(18446744073709551615)", &collection), &collection)
        .unwrap_err();
    assert!(matches!(err, RqlError::Validation { .. }), "{:?}", err);
}

#[test]
fn test_join() {
    let compiled = compile("join(customers,c,customerid,customerid)&eq(c.country,France)");
    assert_eq!(
        compiled.sql,
        "SELECT \"orders\".* FROM \"orders\", \"customers\" \"c\" WHERE \"orders\".\"customerid\" = \"c\".\"customerid\" AND \"c\".\"country\" = ? ORDER BY \"orders\".\"orderid\" ASC"
    );
}

#[test]
fn test_count_query() {
    let compiled = compile("eq(orderid,10257)&limit(10)");
    assert_eq!(
        compiled.count_sql,
        "SELECT count(1) FROM (SELECT * FROM \"orders\" WHERE \"orderid\" = ?) AS q"
    );
    assert_eq!(compiled.count_params, compiled.params);
    assert_eq!(compiled.window.limit, Some(10));
}

#[test]
fn test_page_window() {
    let compiled = compile("page(3)&pagesize(20)");
    assert!(compiled.sql.ends_with("LIMIT 20 OFFSET 40"));
    assert_eq!(compiled.window.page, Some(3));
}

#[test]
fn test_base_select_merge() {
    let collection = orders().with_select_sql(
        "SELECT o.* FROM orders o WHERE o.deleted = 0 ORDER BY o.orderdate DESC LIMIT 500",
    );
    let compiler = SqlCompiler::new(CompileOptions::default());

    let compiled = compiler
        .compile(&query("eq(shipcity,Paris)", &collection), &collection)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT o.* FROM orders o WHERE (o.deleted = 0) AND \"shipcity\" = ? ORDER BY o.orderdate DESC LIMIT 500"
    );

    let compiled = compiler
        .compile(&query("sort(orderid)&limit(5)", &collection), &collection)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT o.* FROM orders o WHERE (o.deleted = 0) ORDER BY \"orderid\" ASC LIMIT 5"
    );
}

#[test]
fn test_physical_table_name() {
    let collection = orders().with_table("dbo_orders");
    let compiled = SqlCompiler::new(CompileOptions::default())
        .compile(&query("limit(1)", &collection), &collection)
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT * FROM \"dbo_orders\" ORDER BY \"orderid\" ASC LIMIT 1"
    );
}

#[test]
fn test_invalid_typed_literal() {
    let collection = orders();
    let err = SqlCompiler::new(CompileOptions::default())
        .compile(&query("eq(orderid,abc)", &collection), &collection)
        .unwrap_err();
    assert!(matches!(err, RqlError::Validation { .. }));
}

#[test]
fn test_after_is_unsupported() {
    let collection = orders();
    let err = SqlCompiler::new(CompileOptions::default())
        .compile(&query("after(orderid,5)", &collection), &collection)
        .unwrap_err();
    assert!(matches!(err, RqlError::Unsupported { .. }));
}

#[test]
fn test_hand_built_filter_is_revalidated() {
    let collection = orders();
    let compiler = SqlCompiler::new(CompileOptions::default());

    let mut q = Query::new(Backend::Relational);
    q.filter.push(Term::func(
        "between",
        [Term::ident("freight"), Term::leaf("1"), Term::leaf("2")],
    ));
    match compiler.compile(&q, &collection).unwrap_err() {
        RqlError::Syntax { clause, .. } => assert_eq!(clause, "between(`freight`,1,2)"),
        other => panic!("unexpected error {:?}", other),
    }

    let mut q = Query::new(Backend::Relational);
    q.filter.push(Term::func("eq", Vec::<Term>::new()));
    let err = compiler.compile(&q, &collection).unwrap_err();
    assert!(matches!(err, RqlError::Validation { .. }), "{:?}", err);
}
