//! Query results and paging continuations.
//!
//! Every backend answers with rows plus the terms a client appends to its
//! next request to continue paging: `offset(n)` / `page(n)` for relational
//! collections and `after(...)` for key-value and search collections.

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::ast::Term;
use crate::query::Select;
use crate::transpiler::{DynamoQuery, ElasticQuery};

/// One returned row, keyed by column or attribute name.
pub type Row = Map<String, Json>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Terms that fetch the next page; empty on the last page.
    pub next: Vec<Term>,
    /// Total matching rows ignoring the page window, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_rows: Option<u64>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// Build from a key-value response and its `LastEvaluatedKey`.
    pub fn from_key_value(plan: &DynamoQuery, items: Vec<Row>, last_key: Option<&Row>) -> Self {
        let next = last_key
            .and_then(|key| plan.continuation(key))
            .into_iter()
            .collect();
        Self {
            rows: items,
            next,
            found_rows: None,
        }
    }

    /// Build from a search response (`hits.hits[]._source` rows). A
    /// continuation is emitted only when a full page came back.
    pub fn from_search(plan: &ElasticQuery, response: &Json) -> Self {
        let hits = response["hits"]["hits"].as_array().map(Vec::as_slice).unwrap_or_default();
        let rows = hits
            .iter()
            .filter_map(|hit| hit["_source"].as_object().cloned())
            .collect();

        let full_page = plan.body["size"]
            .as_u64()
            .is_some_and(|size| size > 0 && hits.len() as u64 >= size);
        let next = match hits.last() {
            Some(last) if full_page => last["sort"]
                .as_array()
                .and_then(|values| plan.continuation(values))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };

        Self {
            rows,
            next,
            found_rows: response["hits"]["total"]["value"].as_u64(),
        }
    }

    /// Found rows, or -1 when the count was not computed.
    pub fn found_rows_or_unknown(&self) -> i64 {
        self.found_rows
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1)
    }

    pub fn has_more(&self) -> bool {
        !self.next.is_empty()
    }

    /// The continuation as an `&` separated query-string fragment.
    pub fn next_query_string(&self) -> Option<String> {
        if self.next.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.next.iter().map(Term::to_string).collect();
        Some(parts.join("&"))
    }

    /// Drop properties removed by `includes`/`excludes`.
    pub fn project(&mut self, select: &Select) {
        if select.includes.is_empty() && select.excludes.is_empty() {
            return;
        }
        for row in &mut self.rows {
            row.retain(|key, _| select.is_included(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::schema::{Backend, Collection, Index};
    use crate::transpiler::{CompileOptions, Compiler, DynamoCompiler, ElasticCompiler};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Json) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_found_rows() {
        let mut result = QueryResult::new(vec![]);
        assert_eq!(result.found_rows_or_unknown(), -1);
        result.found_rows = Some(0);
        assert_eq!(result.found_rows_or_unknown(), 0);
        assert!(!result.has_more());
        assert_eq!(result.next_query_string(), None);
    }

    #[test]
    fn test_project_keeps_href() {
        let query = Query::parse("includes(name)", Backend::Relational).unwrap();
        let mut result = QueryResult::new(vec![row(json!({
            "name": "a", "city": "b", "href": "/orders/1"
        }))]);
        result.project(&query.select);
        assert_eq!(result.rows[0], row(json!({ "name": "a", "href": "/orders/1" })));

        let query = Query::parse("excludes(href)", Backend::Relational).unwrap();
        result.project(&query.select);
        assert_eq!(result.rows[0], row(json!({ "name": "a" })));
    }

    #[test]
    fn test_key_value_continuation() {
        let collection = Collection::new("items", Backend::KeyValue)
            .with_index(Index::primary(&["id"]));
        let query = Query::parse("eq(id,5)&limit(1)", Backend::KeyValue).unwrap();
        let plan = DynamoCompiler::new(CompileOptions::default())
            .compile(&query, &collection)
            .unwrap();

        let last = row(json!({ "id": 5 }));
        let result = QueryResult::from_key_value(&plan, vec![row(json!({ "id": 5 }))], Some(&last));
        assert_eq!(result.next_query_string().as_deref(), Some("after(id,5)"));
        assert_eq!(result.found_rows_or_unknown(), -1);

        let result = QueryResult::from_key_value(&plan, vec![], None);
        assert!(!result.has_more());
    }

    #[test]
    fn test_search_continuation() {
        let collection = Collection::new("products", Backend::Search)
            .with_index(Index::primary(&["sku"]));
        let query = Query::parse("limit(2)", Backend::Search).unwrap();
        let plan = ElasticCompiler::new(CompileOptions::default())
            .compile(&query, &collection)
            .unwrap();

        let response = json!({
            "hits": {
                "total": { "value": 7 },
                "hits": [
                    { "_source": { "sku": "A" }, "sort": ["A"] },
                    { "_source": { "sku": "B" }, "sort": ["B"] }
                ]
            }
        });
        let result = QueryResult::from_search(&plan, &response);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.found_rows, Some(7));
        assert_eq!(result.next_query_string().as_deref(), Some("after('B')"));

        let short = json!({ "hits": { "hits": [{ "_source": { "sku": "C" }, "sort": ["C"] }] } });
        let result = QueryResult::from_search(&plan, &short);
        assert!(!result.has_more());
        assert_eq!(result.found_rows, None);
    }
}
