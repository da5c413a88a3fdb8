//! Key-value compiler (DynamoDB style partition/sort keys).
//!
//! Picks an access path for the query:
//!
//! - **Get**: full primary key given by equality, nothing else to filter
//! - **Query**: partition key equality (plus an optional sort key
//!   condition) on the best matching index
//! - **Scan**: no usable index
//!
//! Predicates not consumed as key conditions become a filter expression.
//! Attribute names are referenced as `#varN` and values as `:valN`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{json, Map};

use crate::ast::{Term, Value};
use crate::error::{RqlError, RqlResult};
use crate::query::{Direction, Query, Sort};
use crate::schema::{Backend, Collection, Index};
use crate::transpiler::wildcard::{self, WildcardShape};
use crate::transpiler::{CompileOptions, Compiler};

const BACKEND: Backend = Backend::KeyValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Get,
    Query,
    Scan,
}

/// Compiled key-value access plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamoQuery {
    pub table: String,
    pub mode: AccessMode,
    /// Secondary index name; `None` for the table's primary key.
    pub index: Option<String>,
    pub partition_key: Option<String>,
    pub sort_key: Option<String>,
    /// Full primary key for `Get`.
    pub key: BTreeMap<String, Value>,
    pub key_condition: Option<String>,
    pub filter: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
    pub projection: Option<String>,
    pub limit: Option<u64>,
    pub scan_forward: bool,
    pub exclusive_start_key: BTreeMap<String, Value>,
}

fn attribute_map(values: &BTreeMap<String, Value>) -> serde_json::Value {
    values
        .iter()
        .map(|(k, v)| (k.clone(), v.to_dynamo()))
        .collect::<Map<_, _>>()
        .into()
}

impl DynamoQuery {
    /// The request document for GetItem, Query or Scan.
    pub fn to_request(&self) -> serde_json::Value {
        let mut request = Map::new();
        request.insert("TableName".into(), json!(self.table));
        if self.mode == AccessMode::Get {
            request.insert("Key".into(), attribute_map(&self.key));
        }
        if let Some(index) = &self.index {
            request.insert("IndexName".into(), json!(index));
        }
        if let Some(condition) = &self.key_condition {
            request.insert("KeyConditionExpression".into(), json!(condition));
        }
        if let Some(filter) = &self.filter {
            request.insert("FilterExpression".into(), json!(filter));
        }
        if let Some(projection) = &self.projection {
            request.insert("ProjectionExpression".into(), json!(projection));
        }
        if !self.names.is_empty() {
            request.insert("ExpressionAttributeNames".into(), json!(self.names));
        }
        if !self.values.is_empty() {
            request.insert(
                "ExpressionAttributeValues".into(),
                attribute_map(&self.values),
            );
        }
        if let Some(limit) = self.limit {
            request.insert("Limit".into(), json!(limit));
        }
        if self.mode == AccessMode::Query {
            request.insert("ScanIndexForward".into(), json!(self.scan_forward));
        }
        if !self.exclusive_start_key.is_empty() {
            request.insert(
                "ExclusiveStartKey".into(),
                attribute_map(&self.exclusive_start_key),
            );
        }
        request.into()
    }

    /// `after(...)` term resuming from the last evaluated key. Key columns
    /// of the chosen index come first, the rest in name order.
    pub fn continuation(&self, last_key: &Map<String, serde_json::Value>) -> Option<Term> {
        if last_key.is_empty() {
            return None;
        }
        let mut columns: Vec<&str> = Vec::new();
        for key in [self.partition_key.as_deref(), self.sort_key.as_deref()]
            .into_iter()
            .flatten()
        {
            if last_key.contains_key(key) {
                columns.push(key);
            }
        }
        let mut rest: Vec<&str> = last_key
            .keys()
            .map(String::as_str)
            .filter(|k| !columns.contains(k))
            .collect();
        rest.sort_unstable();
        columns.extend(rest);

        let mut args = Vec::with_capacity(columns.len() * 2);
        for column in columns {
            args.push(Term::leaf(column));
            args.push(Value::from_json(&last_key[column]).to_term());
        }
        Some(Term::func("after", args))
    }
}

/// Allocates `#varN` / `:valN` placeholders in first-seen order.
#[derive(Debug, Default)]
struct Placeholders {
    names: BTreeMap<String, String>,
    by_attribute: HashMap<String, String>,
    values: BTreeMap<String, Value>,
    next_name: usize,
    next_value: usize,
}

impl Placeholders {
    fn name(&mut self, attribute: &str) -> String {
        if let Some(existing) = self.by_attribute.get(attribute) {
            return existing.clone();
        }
        self.next_name += 1;
        let placeholder = format!("#var{}", self.next_name);
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.by_attribute
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        self.next_value += 1;
        let placeholder = format!(":val{}", self.next_value);
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

/// Replace null checks with forms that also match missing attributes.
///
/// `n`/`emp` become `or(attribute_not_exists(c),eq(c,null))` and
/// `nn`/`nemp` become `and(attribute_exists(c),ne(c,null))`; several
/// columns are ANDed.
pub fn rewrite_nulls(term: &Term) -> Term {
    let Term::Function { name, args } = term else {
        return term.clone();
    };
    let (outer, exists, compare) = match name.as_str() {
        "n" | "emp" => ("or", "attribute_not_exists", "eq"),
        "nn" | "nemp" => ("and", "attribute_exists", "ne"),
        _ => return Term::func(name, args.iter().map(rewrite_nulls)),
    };
    let mut checks: Vec<Term> = args
        .iter()
        .map(|column| {
            Term::func(
                outer,
                [
                    Term::func(exists, [column.clone()]),
                    Term::func(compare, [column.clone(), Term::leaf("null")]),
                ],
            )
        })
        .collect();
    if checks.len() == 1 {
        checks.remove(0)
    } else {
        Term::func("and", checks)
    }
}

/// How well a predicate constrains an index's sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SortMatch {
    None,
    Range,
    Equality,
}

/// Single-value equality usable as a key condition.
fn key_equality(terms: &[&Term], column: &str) -> Option<usize> {
    terms.iter().position(|t| {
        t.is_named("eq")
            && t.args().len() == 2
            && t.args()[0].token() == column
            && is_key_value(&t.args()[1])
            && !(t.args()[1].is_string() && wildcard::has_wildcard(t.args()[1].token()))
    })
}

/// Comparison usable as a sort key condition.
fn key_range(terms: &[&Term], column: &str) -> Option<usize> {
    terms.iter().position(|t| {
        t.is_any_of(&["lt", "le", "gt", "ge", "sw"])
            && t.args().len() == 2
            && t.args()[0].token() == column
            && is_key_value(&t.args()[1])
    })
}

fn is_key_value(term: &Term) -> bool {
    term.is_leaf() && !term.is_identifier() && !term.is_null()
}

struct Selection<'c> {
    index: Option<&'c Index>,
    partition: Option<usize>,
    sort: Option<(usize, SortMatch)>,
}

pub struct DynamoCompiler {
    options: CompileOptions,
}

impl DynamoCompiler {
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
        if query.page.offset.is_some() {
            return Err(RqlError::unsupported(BACKEND, "offset"));
        }
        if query.page.page.is_some() {
            return Err(RqlError::unsupported(BACKEND, "page"));
        }
        if query.order.sorts.len() > 1 {
            return Err(RqlError::compile(
                format!("sort({})", query.order.sorts.len()),
                "only one sort column is supported",
            ));
        }
        Ok(())
    }

    /// Index pinned by a continuation token.
    fn pinned<'c>(
        &self,
        after: &Term,
        collection: &'c Collection,
        sort: Option<&Sort>,
    ) -> RqlResult<&'c Index> {
        let args = after.args();
        if args.len() % 2 != 0 {
            return Err(RqlError::validation(after, "expected column/value pairs"));
        }
        let first = args.first().map(Term::token);
        let second = args.get(2).map(Term::token);
        let index = collection
            .indexes_by_priority()
            .into_iter()
            .find(|i| {
                i.partition_key() == first
                    && (i.sort_key().is_none() || i.sort_key() == second)
            })
            .ok_or_else(|| RqlError::compile(after, "continuation does not match any index"))?;
        if let Some(sort) = sort {
            if index.sort_key() != Some(sort.column.as_str()) {
                return Err(RqlError::compile(
                    after,
                    "sort key does not match continuation token",
                ));
            }
        }
        Ok(index)
    }

    fn select_index<'c>(
        &self,
        query: &Query,
        terms: &[&Term],
        collection: &'c Collection,
    ) -> RqlResult<Selection<'c>> {
        let sort = query.order.first();

        if let Some(after) = &query.page.after {
            let index = self.pinned(after, collection, sort)?;
            let partition = index.partition_key().and_then(|pk| key_equality(terms, pk));
            let sort_match = match (partition, index.sort_key()) {
                (Some(_), Some(sk)) => sort_condition(terms, sk),
                _ => None,
            };
            return Ok(Selection {
                index: Some(index),
                partition,
                sort: sort_match,
            });
        }

        let mut chosen: Option<Selection<'c>> = None;
        for index in collection.indexes_by_priority() {
            let Some(pk) = index.partition_key() else {
                continue;
            };
            let Some(partition) = key_equality(terms, pk) else {
                continue;
            };
            if let Some(sort) = sort {
                if index.sort_key() != Some(sort.column.as_str()) {
                    continue;
                }
            }
            let sort_match = index.sort_key().and_then(|sk| sort_condition(terms, sk));
            let score = sort_match.map(|(_, m)| m).unwrap_or(SortMatch::None);
            let better = match &chosen {
                None => true,
                Some(prev) => score > prev.sort.map(|(_, m)| m).unwrap_or(SortMatch::None),
            };
            if better {
                chosen = Some(Selection {
                    index: Some(index),
                    partition: Some(partition),
                    sort: sort_match,
                });
            }
        }

        if let Some(sort) = sort {
            if chosen.is_none() {
                if sort.direction == Direction::Desc {
                    return Err(RqlError::compile(
                        format!("sort(-{})", sort.column),
                        "descending order requires a partition key equality",
                    ));
                }
                return Err(RqlError::compile(
                    format!("sort({})", sort.column),
                    "no compatible index for requested sort",
                ));
            }
        }

        Ok(chosen.unwrap_or(Selection {
            index: None,
            partition: None,
            sort: None,
        }))
    }
}

fn sort_condition(terms: &[&Term], column: &str) -> Option<(usize, SortMatch)> {
    key_equality(terms, column)
        .map(|i| (i, SortMatch::Equality))
        .or_else(|| key_range(terms, column).map(|i| (i, SortMatch::Range)))
}

/// Renders filter and key condition expressions.
struct ExpressionWriter<'a> {
    collection: &'a Collection,
    placeholders: Placeholders,
}

impl ExpressionWriter<'_> {
    fn name(&mut self, column: &str) -> String {
        let attribute = self.collection.column(column).to_string();
        self.placeholders.name(&attribute)
    }

    fn value(&mut self, column: &str, term: &Term) -> RqlResult<String> {
        if term.is_identifier() {
            return Ok(self.name(term.token()));
        }
        let value = Value::from_term(term, self.collection.property_type(column))
            .map_err(|message| RqlError::validation(term, message))?;
        Ok(self.placeholders.value(value))
    }

    fn string_value(&mut self, term: &Term, text: &str) -> RqlResult<String> {
        if term.is_identifier() {
            return Err(RqlError::validation(term, "a pattern must be a literal"));
        }
        Ok(self.placeholders.value(Value::String(text.to_string())))
    }

    fn any_of(parts: Vec<String>, op: &str) -> String {
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", parts.join(op))
        }
    }

    /// Pattern match with the backend's string functions.
    fn pattern(&mut self, name: &str, column: &str, term: &Term, op: &str) -> RqlResult<String> {
        let text = term.token();
        match (op, wildcard::shape(text)) {
            ("sw" | "w", _) if wildcard::has_wildcard(text) => Err(RqlError::unsupported(
                BACKEND,
                format!("{} with wildcard pattern '{}'", op, text),
            )),
            ("sw", _) => Ok(format!("begins_with({}, {})", name, self.string_value(term, text)?)),
            ("w", _) => Ok(format!("contains({}, {})", name, self.string_value(term, text)?)),
            (_, WildcardShape::Exact) => Ok(format!("{} = {}", name, self.value(column, term)?)),
            (_, WildcardShape::Prefix) => Ok(format!(
                "begins_with({}, {})",
                name,
                self.string_value(term, wildcard::core(text))?
            )),
            (_, WildcardShape::Contains) => Ok(format!(
                "contains({}, {})",
                name,
                self.string_value(term, wildcard::core(text))?
            )),
            _ => Err(RqlError::unsupported(
                BACKEND,
                format!("{} with wildcard pattern '{}'", op, text),
            )),
        }
    }

    fn predicate(&mut self, term: &Term) -> RqlResult<String> {
        let args = term.args();
        match term.token() {
            "and" | "or" => {
                let op = if term.is_named("and") { " AND " } else { " OR " };
                let mut parts = Vec::new();
                for arg in args {
                    parts.push(self.predicate(arg)?);
                }
                Ok(Self::any_of(parts, op))
            }
            "not" => {
                let inner = term
                    .arg(0)
                    .ok_or_else(|| RqlError::compile(term, "not() needs a predicate"))?;
                let inner = self.predicate(inner)?;
                Ok(if inner.starts_with('(') {
                    format!("NOT {}", inner)
                } else {
                    format!("NOT ({})", inner)
                })
            }
            "attribute_exists" | "attribute_not_exists" => {
                let mut parts = Vec::new();
                for arg in args {
                    parts.push(format!("{}({})", term.token(), self.name(arg.token())));
                }
                Ok(Self::any_of(parts, " AND "))
            }
            "eq" | "like" => {
                let column = args[0].token();
                let name = self.name(column);
                let mut parts = Vec::new();
                for value in &args[1..] {
                    let part = if value.is_string() {
                        self.pattern(&name, column, value, term.token())?
                    } else {
                        format!("{} = {}", name, self.value(column, value)?)
                    };
                    parts.push(part);
                }
                Ok(Self::any_of(parts, " OR "))
            }
            "ne" => {
                let column = args[0].token();
                let name = self.name(column);
                let mut parts = Vec::new();
                for value in &args[1..] {
                    parts.push(format!("{} <> {}", name, self.value(column, value)?));
                }
                Ok(Self::any_of(parts, " AND "))
            }
            op @ ("lt" | "le" | "gt" | "ge") => {
                let symbol = match op {
                    "lt" => "<",
                    "le" => "<=",
                    "gt" => ">",
                    _ => ">=",
                };
                let column = args[0].token();
                let name = self.name(column);
                Ok(format!("{} {} {}", name, symbol, self.value(column, &args[1])?))
            }
            op @ ("in" | "out") => {
                let column = args[0].token();
                let name = self.name(column);
                let mut values = Vec::new();
                for value in &args[1..] {
                    values.push(self.value(column, value)?);
                }
                let list = format!("{} IN ({})", name, values.join(", "));
                Ok(if op == "out" { format!("NOT ({})", list) } else { list })
            }
            op @ ("sw" | "w") => {
                let column = args[0].token();
                let name = self.name(column);
                let mut parts = Vec::new();
                for value in &args[1..] {
                    parts.push(self.pattern(&name, column, value, op)?);
                }
                Ok(Self::any_of(parts, " OR "))
            }
            "ew" => Err(RqlError::unsupported(BACKEND, "ew")),
            "n" | "nn" | "emp" | "nemp" => Err(RqlError::internal(format!(
                "null check '{}' reached the expression writer without rewriting",
                term
            ))),
            _ => Err(RqlError::compile(term, "unknown function")),
        }
    }

    /// Key condition for a partition or sort key predicate.
    fn key_condition(&mut self, term: &Term) -> RqlResult<String> {
        match term.token() {
            "sw" => match term.args() {
                [column, value] => {
                    let name = self.name(column.token());
                    self.pattern(&name, column.token(), value, "sw")
                }
                _ => Err(RqlError::compile(term, "expects a column and one value")),
            },
            _ => self.predicate(term),
        }
    }
}

impl Compiler for DynamoCompiler {
    type Output = DynamoQuery;

    fn backend(&self) -> Backend {
        BACKEND
    }

    fn compile(&self, query: &Query, collection: &Collection) -> RqlResult<DynamoQuery> {
        self.check_supported(query)?;
        query.filter.validate(BACKEND)?;

        let rewritten: Vec<Term> = query.filter.conjuncts().into_iter().map(rewrite_nulls).collect();
        let terms: Vec<&Term> = rewritten.iter().collect();
        let selection = self.select_index(query, &terms, collection)?;

        let mut consumed: Vec<usize> = Vec::new();
        consumed.extend(selection.partition);
        consumed.extend(selection.sort.map(|(i, _)| i));
        let residual: Vec<&Term> = terms
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, t)| *t)
            .collect();

        let index = selection.index;
        let mode = match (index, selection.partition, selection.sort) {
            (Some(i), Some(_), Some((_, SortMatch::Equality)))
                if i.is_primary() && residual.is_empty() && query.page.after.is_none() =>
            {
                AccessMode::Get
            }
            (Some(_), Some(_), _) => AccessMode::Query,
            _ => AccessMode::Scan,
        };

        let mut writer = ExpressionWriter {
            collection,
            placeholders: Placeholders::default(),
        };
        let mut key = BTreeMap::new();
        let mut key_condition = None;

        if mode == AccessMode::Get {
            for i in &consumed {
                let term = terms[*i];
                let column = term.args()[0].token();
                let value = Value::from_term(&term.args()[1], collection.property_type(column))
                    .map_err(|message| RqlError::validation(term, message))?;
                key.insert(collection.column(column).to_string(), value);
            }
        } else if mode == AccessMode::Query {
            let mut parts = Vec::new();
            for i in &consumed {
                parts.push(writer.key_condition(terms[*i])?);
            }
            key_condition = Some(parts.join(" AND "));
        }

        let mut filters = Vec::new();
        for term in &residual {
            filters.push(writer.predicate(term)?);
        }
        let filter = (!filters.is_empty()).then(|| filters.join(" AND "));

        let projection = if query.select.includes.is_empty() {
            None
        } else {
            let mut columns: Vec<String> = query.select.includes.clone();
            for pk in collection.primary_columns() {
                if !columns.iter().any(|c| c == pk) {
                    columns.push(pk.to_string());
                }
            }
            let names: Vec<String> = columns.iter().map(|c| writer.name(c)).collect();
            Some(names.join(", "))
        };

        let exclusive_start_key = match &query.page.after {
            Some(after) => after
                .args()
                .chunks(2)
                .map(|pair| {
                    let column = pair[0].token();
                    Value::from_term(&pair[1], collection.property_type(column))
                        .map(|v| (collection.column(column).to_string(), v))
                        .map_err(|message| RqlError::validation(after, message))
                })
                .collect::<RqlResult<BTreeMap<_, _>>>()?,
            None => BTreeMap::new(),
        };

        let window = query.page.window(&self.options)?;
        let placeholders = writer.placeholders;
        let plan = DynamoQuery {
            table: collection.table_name().to_string(),
            mode,
            index: index.filter(|i| !i.is_primary()).map(|i| i.name.clone()),
            partition_key: index.and_then(|i| i.partition_key()).map(str::to_string),
            sort_key: index.and_then(|i| i.sort_key()).map(str::to_string),
            key,
            key_condition,
            filter,
            names: placeholders.names,
            values: placeholders.values,
            projection,
            limit: if mode == AccessMode::Get { None } else { window.limit },
            scan_forward: query.order.first().is_none_or(|s| s.direction == Direction::Asc),
            exclusive_start_key,
        };

        tracing::debug!(
            collection = %collection.name,
            mode = ?plan.mode,
            index = ?plan.index,
            "selected key-value access plan"
        );
        Ok(plan)
    }
}
