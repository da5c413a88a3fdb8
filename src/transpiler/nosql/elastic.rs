//! Search-engine compiler (Elasticsearch query DSL).

use serde::Serialize;
use serde_json::{json, Value as Json};

use crate::ast::{Term, Value};
use crate::error::{RqlError, RqlResult};
use crate::query::Query;
use crate::schema::{Backend, Collection};
use crate::transpiler::wildcard;
use crate::transpiler::{CompileOptions, Compiler};

const BACKEND: Backend = Backend::Search;

/// Tie-breaker used when the collection declares no primary key.
const DOC_ID: &str = "_id";

/// Compiled search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticQuery {
    pub index: String,
    pub body: Json,
    /// Sort fields in order, tie-breaker last. A continuation carries one
    /// value per field.
    pub sort_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_after: Option<Vec<Json>>,
}

impl ElasticQuery {
    pub fn to_request(&self) -> Json {
        json!({ "index": self.index, "body": self.body })
    }

    /// `after(...)` term from the sort values of the last returned hit.
    pub fn continuation(&self, last_hit_sort: &[Json]) -> Option<Term> {
        if last_hit_sort.is_empty() || last_hit_sort.len() != self.sort_fields.len() {
            return None;
        }
        Some(Term::func(
            "after",
            last_hit_sort.iter().map(|v| Value::from_json(v).to_term()),
        ))
    }
}

fn bool_query(occur: &str, clauses: Vec<Json>) -> Json {
    if occur == "should" {
        json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
    } else {
        json!({ "bool": { occur: clauses } })
    }
}

fn any_of(mut clauses: Vec<Json>) -> Json {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        bool_query("should", clauses)
    }
}

pub struct ElasticCompiler {
    options: CompileOptions,
}

struct DslWriter<'a> {
    collection: &'a Collection,
}

impl DslWriter<'_> {
    fn field<'t>(&'t self, term: &'t Term) -> &'t str {
        self.collection.column(term.token())
    }

    fn value(&self, property: &str, term: &Term) -> RqlResult<Json> {
        if term.is_identifier() {
            return Err(RqlError::unsupported(
                BACKEND,
                format!("column comparison with `{}`", term.token()),
            ));
        }
        Value::from_term(term, self.collection.property_type(property))
            .map(|v| v.to_json())
            .map_err(|message| RqlError::validation(term, message))
    }

    fn wildcard(&self, field: &str, term: &Term, pattern: String) -> RqlResult<Json> {
        if term.is_identifier() {
            return Err(RqlError::validation(term, "a pattern must be a literal"));
        }
        Ok(json!({ "wildcard": { field: { "value": pattern } } }))
    }

    fn equals(&self, term: &Term) -> RqlResult<Json> {
        let args = term.args();
        let property = args[0].token();
        let field = self.field(&args[0]);
        let mut clauses = Vec::new();
        for value in &args[1..] {
            clauses.push(if value.is_null() {
                bool_query("must_not", vec![json!({ "exists": { "field": field } })])
            } else if value.is_string() && wildcard::has_wildcard(value.token()) {
                self.wildcard(field, value, value.token().to_string())?
            } else {
                json!({ "term": { field: self.value(property, value)? } })
            });
        }
        Ok(any_of(clauses))
    }

    fn patterns(&self, term: &Term, prefix: &str, suffix: &str) -> RqlResult<Json> {
        let field = self.field(&term.args()[0]);
        let mut clauses = Vec::new();
        for value in &term.args()[1..] {
            let pattern = format!("{}{}{}", prefix, value.token(), suffix);
            clauses.push(self.wildcard(field, value, pattern)?);
        }
        Ok(any_of(clauses))
    }

    fn translate(&self, term: &Term) -> RqlResult<Json> {
        let args = term.args();
        match term.token() {
            "and" | "or" => {
                let mut clauses = Vec::new();
                for arg in args {
                    clauses.push(self.translate(arg)?);
                }
                let occur = if term.is_named("and") { "must" } else { "should" };
                Ok(bool_query(occur, clauses))
            }
            "not" => {
                let inner = term
                    .arg(0)
                    .ok_or_else(|| RqlError::compile(term, "not() needs a predicate"))?;
                Ok(bool_query("must_not", vec![self.translate(inner)?]))
            }
            "eq" => self.equals(term),
            "ne" => Ok(bool_query("must_not", vec![self.equals(term)?])),
            op @ ("lt" | "le" | "gt" | "ge") => {
                let bound = match op {
                    "le" => "lte",
                    "ge" => "gte",
                    other => other,
                };
                let field = self.field(&args[0]);
                let value = self.value(args[0].token(), &args[1])?;
                Ok(json!({ "range": { field: { bound: value } } }))
            }
            op @ ("in" | "out") => {
                let field = self.field(&args[0]);
                let mut values = Vec::new();
                for value in &args[1..] {
                    values.push(self.value(args[0].token(), value)?);
                }
                let terms = json!({ "terms": { field: values } });
                Ok(if op == "out" {
                    bool_query("must_not", vec![terms])
                } else {
                    terms
                })
            }
            "w" => self.patterns(term, "*", "*"),
            "sw" => self.patterns(term, "", "*"),
            "ew" => self.patterns(term, "*", ""),
            "like" => self.patterns(term, "", ""),
            name @ ("n" | "nn" | "emp" | "nemp") => {
                let mut clauses = Vec::new();
                for arg in args {
                    let field = self.field(arg);
                    let exists = json!({ "exists": { "field": field } });
                    let blank = json!({ "term": { field: "" } });
                    clauses.push(match name {
                        "n" => bool_query("must_not", vec![exists]),
                        "nn" => exists,
                        "emp" => bool_query(
                            "should",
                            vec![bool_query("must_not", vec![exists]), blank],
                        ),
                        _ => json!({ "bool": { "must": [exists], "must_not": [blank] } }),
                    });
                }
                Ok(if clauses.len() == 1 {
                    clauses.remove(0)
                } else {
                    bool_query("must", clauses)
                })
            }
            _ => Err(RqlError::compile(term, "unknown function")),
        }
    }
}

impl ElasticCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    fn check_supported(&self, query: &Query) -> RqlResult<()> {
        if !query.joins.is_empty() {
            return Err(RqlError::unsupported(BACKEND, "join"));
        }
        if !query.group.is_empty() {
            return Err(RqlError::unsupported(BACKEND, "group"));
        }
        if let Some(p) = query.select.projections.first() {
            return Err(RqlError::unsupported(BACKEND, p.expr.token()));
        }
        if query.select.distinct {
            return Err(RqlError::unsupported(BACKEND, "distinct"));
        }
        Ok(())
    }
}

impl Compiler for ElasticCompiler {
    type Output = ElasticQuery;

    fn backend(&self) -> Backend {
        BACKEND
    }

    fn compile(&self, query: &Query, collection: &Collection) -> RqlResult<ElasticQuery> {
        self.check_supported(query)?;
        query.filter.validate(BACKEND)?;
        let writer = DslWriter { collection };

        let dsl = match query.filter.to_term() {
            Some(term) => writer.translate(&term)?,
            None => json!({ "match_all": {} }),
        };
        let mut body = json!({ "query": dsl });

        let tie_breaker = collection
            .primary_columns()
            .first()
            .map(|pk| collection.column(pk).to_string())
            .unwrap_or_else(|| DOC_ID.to_string());
        let mut sort_fields = Vec::new();
        let mut sort = Vec::new();
        for s in &query.order.sorts {
            let field = collection.column(&s.column).to_string();
            sort.push(json!({ field.clone(): { "order": s.direction.to_string().to_lowercase() } }));
            sort_fields.push(field);
        }
        if !sort_fields.contains(&tie_breaker) {
            sort.push(json!({ tie_breaker.clone(): { "order": "asc" } }));
            sort_fields.push(tie_breaker);
        }
        body["sort"] = json!(sort);

        let window = query.page.window(&self.options)?;
        if let Some(size) = window.limit {
            body["size"] = json!(size);
        }

        let search_after = match &query.page.after {
            Some(after) => {
                if window.offset.is_some() {
                    return Err(RqlError::validation(after, "after() cannot be combined with an offset"));
                }
                if after.args().len() != sort_fields.len() {
                    return Err(RqlError::compile(
                        after,
                        format!("expected {} sort values", sort_fields.len()),
                    ));
                }
                let mut values = Vec::new();
                for arg in after.args() {
                    let value = Value::from_term(arg, None)
                        .map_err(|message| RqlError::validation(after, message))?;
                    values.push(value.to_json());
                }
                body["search_after"] = json!(values);
                Some(values)
            }
            None => {
                let offset = window.offset.unwrap_or(0);
                let end = offset.saturating_add(window.limit.unwrap_or(0));
                if end > self.options.deep_paging_threshold {
                    return Err(RqlError::compile(
                        format!("offset({})", offset),
                        format!(
                            "paging beyond {} rows requires an after() continuation",
                            self.options.deep_paging_threshold
                        ),
                    ));
                }
                if offset > 0 {
                    body["from"] = json!(offset);
                }
                None
            }
        };

        if !query.select.includes.is_empty() {
            let mut source: Vec<String> = query
                .select
                .includes
                .iter()
                .map(|c| collection.column(c).to_string())
                .collect();
            for pk in collection.primary_columns() {
                let pk = collection.column(pk).to_string();
                if !source.contains(&pk) {
                    source.push(pk);
                }
            }
            body["_source"] = json!(source);
        }

        tracing::debug!(collection = %collection.name, body = %body, "compiled search query");

        Ok(ElasticQuery {
            index: collection.table_name().to_string(),
            body,
            sort_fields,
            search_after,
        })
    }
}
