//! Builds the boolean expression tree from a token list.
//!
//! The builder runs a single left-to-right pass holding at most one pending
//! operator and two pending operands. As soon as two operands are available
//! (or the input ends) they are reduced into a node, which becomes the left
//! operand of whatever follows. `and` and `or` therefore chain strictly
//! left-associatively with no relative precedence; only groups change the
//! shape of the tree.

use crate::error::{QueryError, QueryErrorKind};
use crate::query::tokenizer::tokenize;
use crate::query::types::{Node, Token, TokenKind};

/// Tokenize and parse `text` into a tree rooted at [`Node::Root`].
pub fn parse(text: &str) -> Result<Node, QueryError> {
    let tokens = tokenize(text)?;
    let expression = build_tree(&tokens).map_err(|e| {
        if e.token.is_empty() {
            QueryError { token: text.to_string(), ..e }
        } else {
            e
        }
    })?;
    Ok(Node::Root {
        tokens,
        expression: Box::new(expression),
    })
}

/// Build an expression tree from a flat token list.
pub fn build_tree(tokens: &[Token]) -> Result<Node, QueryError> {
    let mut node: Option<Node> = None;
    let mut op: Option<&Token> = None;
    let mut left: Option<&Token> = None;
    let mut right: Option<&Token> = None;

    for (i, token) in tokens.iter().enumerate() {
        let last = i + 1 == tokens.len();

        if !token.is_operand() {
            if op.is_some() {
                return Err(QueryError::new(
                    QueryErrorKind::UnexpectedOperator,
                    &token.source,
                    "Unexpected operator",
                ));
            }
            if node.is_none() && left.is_none() {
                return Err(QueryError::new(
                    QueryErrorKind::MissingLeftOperand,
                    &token.source,
                    "Missing left operand",
                ));
            }
            op = Some(token);
        } else if node.is_none() && left.is_none() {
            left = Some(token);
        } else if right.is_none() {
            right = Some(token);
        } else {
            return Err(QueryError::new(
                QueryErrorKind::UnexpectedOperand,
                &token.source,
                "Unexpected operand",
            ));
        }

        let reducible = (right.is_some() && (node.is_some() || left.is_some()))
            || ((left.is_some() || node.is_some()) && last);
        if !reducible {
            continue;
        }

        let Some(right_token) = right.take() else {
            if let Some(op_token) = op {
                let kind = if op_token.kind == TokenKind::Or {
                    QueryErrorKind::MissingOrRightOperand
                } else {
                    QueryErrorKind::MissingAndRightOperand
                };
                return Err(QueryError::new(kind, &op_token.source, "Missing right operand"));
            }
            if let Some(left_token) = left.take() {
                node = Some(build_leaf(left_token)?);
            }
            continue;
        };

        let lhs = match node.take() {
            Some(previous) => previous,
            None => match left.take() {
                Some(left_token) => build_leaf(left_token)?,
                None => continue,
            },
        };
        let rhs = build_leaf(right_token)?;

        node = Some(match op.take() {
            Some(op_token) if op_token.kind == TokenKind::Or => Node::Or {
                token: op_token.clone(),
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
            op_token => Node::And {
                token: op_token.cloned(),
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
        });
    }

    node.ok_or_else(|| {
        let source = tokens.first().map(|t| t.source.as_str()).unwrap_or_default();
        QueryError::new(QueryErrorKind::MissingRightOperand, source, "Empty expression")
    })
}

fn build_leaf(token: &Token) -> Result<Node, QueryError> {
    match token.kind {
        TokenKind::Word | TokenKind::Literal => Ok(Node::Word(token.clone())),
        TokenKind::Property => Ok(Node::Property(token.clone())),
        TokenKind::Function => Ok(Node::Function(token.clone())),
        TokenKind::Group => build_tree(&token.children).map_err(|e| with_context(e, token)),
        TokenKind::Not => {
            let negated = build_tree(&token.children).map_err(|e| with_context(e, token))?;
            Ok(Node::Not {
                token: token.clone(),
                left: Box::new(negated),
            })
        }
        TokenKind::And | TokenKind::Or => Err(QueryError::new(
            QueryErrorKind::InvalidLeafNode,
            &token.source,
            "Operator cannot be used as an operand",
        )),
    }
}

fn with_context(e: QueryError, token: &Token) -> QueryError {
    if e.token.is_empty() {
        QueryError {
            token: token.source.clone(),
            ..e
        }
    } else {
        e
    }
}
