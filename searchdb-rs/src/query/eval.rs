//! Evaluation of an expression tree against an [`EvalHandler`].
//!
//! Result sets handed between nodes are kept sorted by document id with no
//! duplicates, which lets every set operation run as a linear merge.
//!
//! Score combination:
//! - `and` keeps ids present on both sides and sums their scores (saturating)
//! - `or` keeps the union and the higher score of an id present on both sides
//! - `not` yields documents with a score of 0

use crate::error::{QueryError, QueryErrorKind};
use crate::query::types::{CompareOp, EvalFlags, Node, TokenKind};
use crate::types::SearchResult;
use std::cmp::Ordering;

/// A leaf evaluation request passed to an [`EvalHandler`].
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    /// Property or function name. Empty for words.
    pub name: &'a str,
    /// Word text, property value, or raw function argument text.
    pub value: &'a str,
    /// Comparison operand of a function call such as `len(name)>5`.
    pub operand: Option<&'a str>,
    pub flags: EvalFlags,
    /// Documents already selected by the left side of an enclosing `and`.
    /// Results outside this set are discarded by the evaluator, so handlers
    /// may use it to narrow their lookups.
    pub and_set: Option<&'a [SearchResult]>,
}

impl EvalRequest<'_> {
    pub fn op(&self) -> Option<CompareOp> {
        CompareOp::from_flags(self.flags)
    }
}

/// Resolves leaves of a query against some document store.
pub trait EvalHandler {
    /// Return the positive set of documents matching a leaf.
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Vec<SearchResult>, QueryError>;

    /// All documents a negation is taken against.
    fn universe(&self) -> Vec<SearchResult>;
}

/// Evaluate a tree (usually a [`Node::Root`]) and return its result set
/// sorted by document id.
pub fn evaluate(node: &Node, handler: &dyn EvalHandler) -> Result<Vec<SearchResult>, QueryError> {
    Evaluator { handler }.node(node, None, false)
}

struct Evaluator<'h> {
    handler: &'h dyn EvalHandler,
}

impl Evaluator<'_> {
    fn node(
        &self,
        node: &Node,
        and_set: Option<&[SearchResult]>,
        negated: bool,
    ) -> Result<Vec<SearchResult>, QueryError> {
        match node {
            Node::Root { expression, .. } => self.node(expression, and_set, negated),
            Node::Word(token) => {
                let op = if token.kind == TokenKind::Literal {
                    EvalFlags::OP_EQUAL
                } else {
                    EvalFlags::OP_CONTAINS
                };
                self.leaf(
                    EvalRequest {
                        name: "",
                        value: &token.value,
                        operand: None,
                        flags: EvalFlags::WORD | op,
                        and_set,
                    },
                    negated,
                )
            }
            Node::Property(token) => {
                let valid_value = token
                    .children
                    .first()
                    .is_some_and(|child| matches!(child.kind, TokenKind::Word | TokenKind::Literal));
                if !valid_value {
                    return Err(QueryError::new(
                        QueryErrorKind::InvalidPropertyDeclaration,
                        &token.source,
                        "Property value must be a word or a quoted literal",
                    ));
                }
                let op = token.op.ok_or_else(|| {
                    QueryError::new(
                        QueryErrorKind::InvalidOperator,
                        &token.source,
                        "Missing comparison operator",
                    )
                })?;
                self.leaf(
                    EvalRequest {
                        name: &token.name,
                        value: &token.value,
                        operand: None,
                        flags: EvalFlags::PROPERTY | op.flag(),
                        and_set,
                    },
                    negated,
                )
            }
            Node::Function(token) => {
                let op = token.op.map(CompareOp::flag).unwrap_or(EvalFlags::OP_EVAL);
                let operand = token.op.and(token.children.get(1)).map(|t| t.value.as_str());
                self.leaf(
                    EvalRequest {
                        name: &token.name,
                        value: &token.value,
                        operand,
                        flags: EvalFlags::FUNCTION | op,
                        and_set,
                    },
                    negated,
                )
            }
            Node::Not { left, .. } => {
                let excluded = self.node(left, and_set, !negated)?;
                let base = match and_set {
                    Some(set) => set.to_vec(),
                    None => normalize(self.handler.universe()),
                };
                Ok(difference(&base, &excluded)
                    .into_iter()
                    .map(|r| SearchResult::new(r.id, 0))
                    .collect())
            }
            Node::And { left, right, .. } => {
                let lhs = self.node(left, and_set, negated)?;
                if lhs.is_empty() {
                    return Ok(lhs);
                }
                let rhs = self.node(right, Some(&lhs), negated)?;
                Ok(intersect(&lhs, &rhs))
            }
            Node::Or { left, right, .. } => {
                let lhs = self.node(left, and_set, negated)?;
                let rhs = self.node(right, and_set, negated)?;
                Ok(union(&lhs, &rhs))
            }
        }
    }

    fn leaf(&self, mut request: EvalRequest<'_>, negated: bool) -> Result<Vec<SearchResult>, QueryError> {
        if negated {
            request.flags |= EvalFlags::EXCLUDE;
        }
        tracing::trace!(name = request.name, value = request.value, flags = %request.flags, "evaluating leaf");
        let results = normalize(self.handler.evaluate(&request)?);
        Ok(match request.and_set {
            Some(set) => intersect_keep_left(&results, set),
            None => results,
        })
    }
}

// ============================================================================
// Result set operations
// ============================================================================

/// Sort by id and collapse duplicates, keeping the highest score.
pub fn normalize(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(|a, b| a.id.cmp(&b.id).then(b.score.cmp(&a.score)));
    results.dedup_by_key(|r| r.id);
    results
}

fn merge(
    a: &[SearchResult],
    b: &[SearchResult],
    mut on_both: impl FnMut(&SearchResult, &SearchResult) -> Option<SearchResult>,
    keep_a: bool,
    keep_b: bool,
) -> Vec<SearchResult> {
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].id.cmp(&b[j].id) {
            Ordering::Less => {
                if keep_a {
                    out.push(a[i]);
                }
                i += 1;
            }
            Ordering::Greater => {
                if keep_b {
                    out.push(b[j]);
                }
                j += 1;
            }
            Ordering::Equal => {
                if let Some(result) = on_both(&a[i], &b[j]) {
                    out.push(result);
                }
                i += 1;
                j += 1;
            }
        }
    }
    if keep_a {
        out.extend_from_slice(&a[i..]);
    }
    if keep_b {
        out.extend_from_slice(&b[j..]);
    }
    out
}

/// Ids present in both sets, with summed scores.
pub fn intersect(a: &[SearchResult], b: &[SearchResult]) -> Vec<SearchResult> {
    merge(
        a,
        b,
        |x, y| Some(SearchResult::new(x.id, x.score.saturating_add(y.score))),
        false,
        false,
    )
}

fn intersect_keep_left(a: &[SearchResult], b: &[SearchResult]) -> Vec<SearchResult> {
    merge(a, b, |x, _| Some(*x), false, false)
}

/// Ids present in either set, with the higher score for shared ids.
pub fn union(a: &[SearchResult], b: &[SearchResult]) -> Vec<SearchResult> {
    merge(
        a,
        b,
        |x, y| Some(SearchResult::new(x.id, x.score.max(y.score))),
        true,
        true,
    )
}

/// Ids of `a` that are not in `b`.
pub fn difference(a: &[SearchResult], b: &[SearchResult]) -> Vec<SearchResult> {
    merge(a, b, |_, _| None, true, false)
}
