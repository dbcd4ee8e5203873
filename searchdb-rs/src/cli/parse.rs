//! Parse command implementation.

use crate::cli::args::ParseArgs;
use crate::cli::output::{CommandResponse, Output};
use crate::error::Result;
use crate::query::{SearchQuery, Token};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub query: String,
    /// S-expression rendering of the tree.
    pub tree: String,
    pub tokens: Vec<Token>,
}

pub fn describe(text: &str) -> Result<ParseResponse> {
    let query = SearchQuery::parse(text)?;
    Ok(ParseResponse {
        query: text.to_string(),
        tree: query.root().to_string(),
        tokens: query.tokens().to_vec(),
    })
}

pub fn run(args: &ParseArgs, output: &Output) -> Result<()> {
    output.print(&CommandResponse::data(describe(&args.text)?))
}
