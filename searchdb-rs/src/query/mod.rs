//! The query language: tokenizer, tree builder and evaluator.

pub mod eval;
pub mod parser;
pub mod tokenizer;
pub mod types;

pub use eval::{EvalHandler, EvalRequest, evaluate};
pub use parser::{build_tree, parse};
pub use tokenizer::tokenize;
pub use types::*;

use crate::error::QueryError;
use crate::types::SearchResult;

/// A parsed query and, once evaluated, its results.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    text: String,
    root: Node,
    results: Option<Vec<SearchResult>>,
}

impl SearchQuery {
    /// Parse `text`. Parse failures are returned before anything is evaluated.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let root = parse(text).inspect_err(|e| {
            tracing::warn!(query = text, kind = %e.kind, token = %e.token, "failed to parse query: {}", e.message);
        })?;
        tracing::debug!(query = text, tree = %root, "parsed query");
        Ok(Self {
            text: text.to_string(),
            root,
            results: None,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The top-level token list.
    pub fn tokens(&self) -> &[Token] {
        match &self.root {
            Node::Root { tokens, .. } => tokens,
            _ => &[],
        }
    }

    /// Evaluate against `handler` and keep the results.
    pub fn evaluate(&mut self, handler: &dyn EvalHandler) -> Result<&[SearchResult], QueryError> {
        let results = evaluate(&self.root, handler)?;
        Ok(self.results.insert(results).as_slice())
    }

    pub fn is_completed(&self) -> bool {
        self.results.is_some()
    }

    pub fn results(&self) -> Option<&[SearchResult]> {
        self.results.as_deref()
    }

    pub fn into_results(self) -> Option<Vec<SearchResult>> {
        self.results
    }
}
