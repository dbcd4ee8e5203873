//! Leaf resolution of queries against a [`DatabaseState`].

use crate::database::index::{DatabaseState, IndexKey, PROPERTY_SCORE, Postings};
use crate::database::text;
use crate::error::QueryError;
use crate::query::{CompareOp, EvalFlags, EvalHandler, EvalRequest};
use crate::types::{DocumentHandle, PropertyValue, SearchResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;

// ============================================================================
// Functions
// ============================================================================

/// A call such as `len(name)>5` as seen by a [`SearchFunction`].
#[derive(Debug, Clone, Copy)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    /// Raw text between the parentheses.
    pub arguments: &'a str,
    /// Trailing comparison, `None` for a bare call.
    pub op: Option<CompareOp>,
    pub operand: Option<&'a str>,
}

/// Resolves a function leaf. Implemented for matching closures.
pub trait SearchFunction: Send + Sync {
    fn call(&self, call: &FunctionCall<'_>, view: &DatabaseView<'_>) -> Vec<SearchResult>;
}

impl<F> SearchFunction for F
where
    F: Fn(&FunctionCall<'_>, &DatabaseView<'_>) -> Vec<SearchResult> + Send + Sync,
{
    fn call(&self, call: &FunctionCall<'_>, view: &DatabaseView<'_>) -> Vec<SearchResult> {
        self(call, view)
    }
}

pub type FunctionRegistry = HashMap<String, Arc<dyn SearchFunction>>;

/// Read-only access to documents for [`SearchFunction`] implementations.
pub struct DatabaseView<'a> {
    state: &'a DatabaseState,
}

impl<'a> DatabaseView<'a> {
    pub fn documents(&self) -> impl Iterator<Item = DocumentHandle> + 'a {
        self.state.documents.keys().copied()
    }

    pub fn document_name(&self, doc: DocumentHandle) -> Option<&'a str> {
        self.state.documents.get(&doc).map(|d| d.name.as_str())
    }

    pub fn document_timestamp(&self, doc: DocumentHandle) -> Option<DateTime<Utc>> {
        self.state.documents.get(&doc).map(|d| d.timestamp)
    }

    /// Property value by (case-folded) name.
    pub fn property(&self, doc: DocumentHandle, name: &str) -> Option<&'a PropertyValue> {
        let name = text::fold_case(name, self.state.case_sensitive());
        self.state.documents.get(&doc)?.properties.get(&name)
    }
}

// ============================================================================
// Query values
// ============================================================================

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A numeric query value: a number, or a calendar day as a span of seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericValue {
    Point(f64),
    Day { start: f64, end: f64 },
}

impl NumericValue {
    fn parse(value: &str) -> Option<Self> {
        if let Ok(n) = value.parse::<f64>() {
            return n.is_finite().then_some(NumericValue::Point(n));
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        let start = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp() as f64;
        Some(NumericValue::Day {
            start,
            end: start + SECONDS_PER_DAY,
        })
    }

    /// Bounds selecting stored numbers for `op`. `None` for `!=`.
    fn bounds(self, op: CompareOp) -> Option<(Bound<f64>, Bound<f64>)> {
        use Bound::*;
        Some(match (self, op) {
            (_, CompareOp::NotEq) => return None,
            (NumericValue::Point(v), CompareOp::Equal | CompareOp::Contains) => (Included(v), Included(v)),
            (NumericValue::Point(v), CompareOp::Less) => (Unbounded, Excluded(v)),
            (NumericValue::Point(v), CompareOp::LessEq) => (Unbounded, Included(v)),
            (NumericValue::Point(v), CompareOp::Greater) => (Excluded(v), Unbounded),
            (NumericValue::Point(v), CompareOp::GreaterEq) => (Included(v), Unbounded),
            (NumericValue::Day { start, end }, CompareOp::Equal | CompareOp::Contains) => {
                (Included(start), Excluded(end))
            }
            (NumericValue::Day { start, .. }, CompareOp::Less) => (Unbounded, Excluded(start)),
            (NumericValue::Day { end, .. }, CompareOp::LessEq) => (Unbounded, Excluded(end)),
            (NumericValue::Day { end, .. }, CompareOp::Greater) => (Included(end), Unbounded),
            (NumericValue::Day { start, .. }, CompareOp::GreaterEq) => (Included(start), Unbounded),
        })
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Evaluates query leaves against a locked database state.
pub struct Resolver<'a> {
    state: &'a DatabaseState,
    functions: &'a FunctionRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(state: &'a DatabaseState, functions: &'a FunctionRegistry) -> Self {
        Self { state, functions }
    }

    fn collect(&self, out: &mut Vec<SearchResult>, postings: Option<&Postings>, and_set: Option<&[SearchResult]>) {
        let Some(postings) = postings else {
            return;
        };
        match and_set {
            // Probe the smaller side
            Some(set) if set.len() < postings.len() => {
                out.extend(
                    set.iter()
                        .filter_map(|r| postings.get(&r.id).map(|&score| SearchResult::new(r.id, score))),
                );
            }
            _ => out.extend(postings.iter().map(|(&id, &score)| SearchResult::new(id, score))),
        }
    }

    fn words(&self, request: &EvalRequest<'_>) -> Vec<SearchResult> {
        if request.value.chars().count() < 2 {
            return Vec::new();
        }

        let contains = request.flags.contains(EvalFlags::OP_CONTAINS) && self.state.variations_enabled();
        let mut out = Vec::new();
        for term in text::query_terms(request.value, self.state.case_sensitive()) {
            if contains {
                let key = IndexKey::Variation { term: term.clone() };
                self.collect(&mut out, self.state.postings(&key), request.and_set);
            }
            let key = IndexKey::Word { term };
            self.collect(&mut out, self.state.postings(&key), request.and_set);
        }
        out
    }

    fn property(&self, request: &EvalRequest<'_>) -> Vec<SearchResult> {
        let Some(op) = request.op() else {
            return Vec::new();
        };
        let property = text::fold_case(request.name, self.state.case_sensitive());
        let value = request.value.trim();
        if property.is_empty() || value.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        match NumericValue::parse(value) {
            Some(number) => {
                self.numeric(&mut out, &property, number, op, request.and_set);
                if matches!(number, NumericValue::Point(_)) && matches!(op, CompareOp::Equal | CompareOp::Contains) {
                    self.text(&mut out, &property, value, op, request.and_set);
                }
            }
            None => self.text(&mut out, &property, value, op, request.and_set),
        }
        out
    }

    fn numeric(
        &self,
        out: &mut Vec<SearchResult>,
        property: &str,
        number: NumericValue,
        op: CompareOp,
        and_set: Option<&[SearchResult]>,
    ) {
        let Some((lower, upper)) = number.bounds(op) else {
            let mut equal = Vec::new();
            self.numeric(&mut equal, property, number, CompareOp::Equal, None);
            let equal = crate::query::eval::normalize(equal);
            let all = self.all_with_property(property, and_set);
            out.extend(crate::query::eval::difference(&all, &equal));
            return;
        };

        for (_, postings) in self.state.index.range(IndexKey::number_range(property, lower, upper)) {
            self.collect(out, Some(postings), and_set);
        }
    }

    fn text(
        &self,
        out: &mut Vec<SearchResult>,
        property: &str,
        value: &str,
        op: CompareOp,
        and_set: Option<&[SearchResult]>,
    ) {
        let terms = text::query_terms(value, self.state.case_sensitive());
        match op {
            CompareOp::Equal => {
                for term in terms {
                    let exact = IndexKey::Property {
                        property: property.to_string(),
                        value: term.clone(),
                    };
                    self.collect(out, self.state.postings(&exact), and_set);
                    if self.state.variations_enabled() {
                        let variation = IndexKey::PropertyVariation {
                            property: property.to_string(),
                            value: term,
                        };
                        self.collect(out, self.state.postings(&variation), and_set);
                    }
                }
            }
            CompareOp::Contains => {
                for (stored, postings) in self.property_values(property) {
                    if terms.iter().any(|term| stored.contains(term.as_str())) {
                        self.collect(out, Some(postings), and_set);
                    }
                }
            }
            CompareOp::NotEq => {
                let mut equal = Vec::new();
                self.text(&mut equal, property, value, CompareOp::Equal, None);
                let equal = crate::query::eval::normalize(equal);
                let all = self.all_with_property(property, and_set);
                out.extend(crate::query::eval::difference(&all, &equal));
            }
            CompareOp::Less | CompareOp::LessEq | CompareOp::Greater | CompareOp::GreaterEq => {
                // Stored values are singular
                let needle = &terms[terms.len() - 1];
                for (stored, postings) in self.property_values(property) {
                    if op.compare(stored, needle.as_str()) {
                        self.collect(out, Some(postings), and_set);
                    }
                }
            }
        }
    }

    /// Stored text values of `property` with their postings.
    fn property_values<'s>(&'s self, property: &'s str) -> impl Iterator<Item = (&'a str, &'a Postings)> + 's {
        let start = IndexKey::Property {
            property: property.to_string(),
            value: String::new(),
        };
        self.state.index.range(start..).map_while(move |(key, postings)| match key {
            IndexKey::Property { property: p, value } if p == property => Some((value.as_str(), postings)),
            _ => None,
        })
    }

    /// Documents carrying any indexed value of `property`, sorted by id.
    fn all_with_property(&self, property: &str, and_set: Option<&[SearchResult]>) -> Vec<SearchResult> {
        let numbers = self
            .state
            .index
            .range(IndexKey::number_range(property, Bound::Unbounded, Bound::Unbounded));
        let texts = self.property_values(property).map(|(_, postings)| postings);

        let mut out = Vec::new();
        for postings in numbers.map(|(_, postings)| postings).chain(texts) {
            self.collect(&mut out, Some(postings), and_set);
        }
        crate::query::eval::normalize(out)
            .into_iter()
            .map(|r| SearchResult::new(r.id, PROPERTY_SCORE))
            .collect()
    }

    fn function(&self, request: &EvalRequest<'_>) -> Vec<SearchResult> {
        if request.value.trim().is_empty() {
            return Vec::new();
        }
        let name = request.name.to_lowercase();
        let Some(function) = self.functions.get(&name) else {
            tracing::warn!(function = %request.name, "unknown search function");
            return Vec::new();
        };

        let call = FunctionCall {
            name: request.name,
            arguments: request.value,
            op: if request.flags.contains(EvalFlags::OP_EVAL) {
                None
            } else {
                request.op()
            },
            operand: request.operand,
        };
        function.call(&call, &DatabaseView { state: self.state })
    }
}

impl EvalHandler for Resolver<'_> {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Vec<SearchResult>, QueryError> {
        let results = if request.flags.contains(EvalFlags::WORD) {
            self.words(request)
        } else if request.flags.contains(EvalFlags::PROPERTY) {
            self.property(request)
        } else if request.flags.contains(EvalFlags::FUNCTION) {
            self.function(request)
        } else {
            Vec::new()
        };
        // Postings of removed documents are purged eagerly, but function
        // resolvers may hand back arbitrary handles.
        Ok(results
            .into_iter()
            .filter(|r| self.state.is_valid(r.id))
            .collect())
    }

    fn universe(&self) -> Vec<SearchResult> {
        self.state
            .documents
            .keys()
            .map(|&id| SearchResult::new(id, 0))
            .collect()
    }
}
