//! Tokens, expression nodes and evaluation flags of the query language.

use bitflags::bitflags;
use serde::Serialize;
use std::fmt;
use std::ops::Range;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Literal,
    Property,
    Function,
    Group,
    And,
    Or,
    Not,
}

/// A token scanned from query text.
///
/// `source` is the exact substring the token was parsed from and `span` its
/// byte range in the query. For properties `name` holds the property name and
/// `value` the value text; for functions `name` is the function name and
/// `value` the raw argument text between the parentheses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<CompareOp>,
    pub source: String,
    pub span: Range<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, text: &str, span: Range<usize>) -> Self {
        let source = text[span.clone()].to_string();
        Self {
            kind,
            name: String::new(),
            value: String::new(),
            identifier: source.clone(),
            op: None,
            source,
            span,
            children: Vec::new(),
        }
    }

    /// Whether the token can stand as an operand of `and`/`or`.
    pub fn is_operand(&self) -> bool {
        !matches!(self.kind, TokenKind::And | TokenKind::Or)
    }
}

// ============================================================================
// Comparison operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Less,
    LessEq,
    Equal,
    GreaterEq,
    Greater,
    NotEq,
    Contains,
}

impl CompareOp {
    /// Two-char operators come first so they win over their one-char prefixes.
    const ALL: [CompareOp; 7] = [
        CompareOp::NotEq,
        CompareOp::GreaterEq,
        CompareOp::LessEq,
        CompareOp::Equal,
        CompareOp::Contains,
        CompareOp::Less,
        CompareOp::Greater,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessEq => "<=",
            CompareOp::Equal => "=",
            CompareOp::GreaterEq => ">=",
            CompareOp::Greater => ">",
            CompareOp::NotEq => "!=",
            CompareOp::Contains => ":",
        }
    }

    pub fn parse(s: &str) -> Option<CompareOp> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Match the longest operator starting at `bytes[0]`.
    pub(crate) fn match_prefix(bytes: &[u8]) -> Option<CompareOp> {
        Self::ALL
            .into_iter()
            .find(|op| bytes.starts_with(op.as_str().as_bytes()))
    }

    pub fn flag(self) -> EvalFlags {
        match self {
            CompareOp::Less => EvalFlags::OP_LESS,
            CompareOp::LessEq => EvalFlags::OP_LESS_EQ,
            CompareOp::Equal => EvalFlags::OP_EQUAL,
            CompareOp::GreaterEq => EvalFlags::OP_GREATER_EQ,
            CompareOp::Greater => EvalFlags::OP_GREATER,
            CompareOp::NotEq => EvalFlags::OP_NOT_EQ,
            CompareOp::Contains => EvalFlags::OP_CONTAINS,
        }
    }

    /// Recover the comparison encoded in a set of evaluation flags.
    pub fn from_flags(flags: EvalFlags) -> Option<CompareOp> {
        Self::ALL.into_iter().find(|op| flags.contains(op.flag()))
    }

    pub fn compare<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOp::Less => lhs < rhs,
            CompareOp::LessEq => lhs <= rhs,
            CompareOp::Equal | CompareOp::Contains => lhs == rhs,
            CompareOp::GreaterEq => lhs >= rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::NotEq => lhs != rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Evaluation flags
// ============================================================================

bitflags! {
    /// Flags passed to an [`EvalHandler`](crate::query::EvalHandler) for each leaf.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EvalFlags: u32 {
        /// The leaf is evaluated under a negation. Handlers still return the
        /// positive set; the evaluator takes the complement.
        const EXCLUDE = 1 << 0;
        const WORD = 1 << 1;
        const PROPERTY = 1 << 2;
        const FUNCTION = 1 << 3;
        const OP_LESS = 1 << 13;
        const OP_LESS_EQ = 1 << 14;
        const OP_EQUAL = 1 << 15;
        const OP_GREATER_EQ = 1 << 16;
        const OP_GREATER = 1 << 17;
        const OP_NOT_EQ = 1 << 18;
        const OP_CONTAINS = 1 << 19;
        const OP_EVAL = 1 << 20;
    }
}

impl fmt::Display for EvalFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EvalFlags, &str); 12] = [
            (EvalFlags::EXCLUDE, "Exclude"),
            (EvalFlags::WORD, "Word"),
            (EvalFlags::PROPERTY, "Property"),
            (EvalFlags::FUNCTION, "Function"),
            (EvalFlags::OP_LESS, "Less"),
            (EvalFlags::OP_LESS_EQ, "LessEq"),
            (EvalFlags::OP_EQUAL, "Equal"),
            (EvalFlags::OP_GREATER_EQ, "GreaterEq"),
            (EvalFlags::OP_GREATER, "Greater"),
            (EvalFlags::OP_NOT_EQ, "NotEq"),
            (EvalFlags::OP_CONTAINS, "Contains"),
            (EvalFlags::OP_EVAL, "Eval"),
        ];

        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Expression tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Word,
    Property,
    Function,
    And,
    Or,
    Not,
    Root,
}

/// A node of the boolean expression tree.
///
/// Leaves own a copy of the token they were built from. The tree is rooted at
/// [`Node::Root`], which also owns the flat top-level token list.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root {
        tokens: Vec<Token>,
        expression: Box<Node>,
    },
    Word(Token),
    Property(Token),
    Function(Token),
    /// `token` is `None` for an implicit `and`.
    And {
        token: Option<Token>,
        left: Box<Node>,
        right: Box<Node>,
    },
    Or {
        token: Token,
        left: Box<Node>,
        right: Box<Node>,
    },
    Not {
        token: Token,
        left: Box<Node>,
    },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Root { .. } => NodeKind::Root,
            Node::Word(_) => NodeKind::Word,
            Node::Property(_) => NodeKind::Property,
            Node::Function(_) => NodeKind::Function,
            Node::And { .. } => NodeKind::And,
            Node::Or { .. } => NodeKind::Or,
            Node::Not { .. } => NodeKind::Not,
        }
    }

    pub fn left(&self) -> Option<&Node> {
        match self {
            Node::Root { expression, .. } => Some(expression),
            Node::And { left, .. } | Node::Or { left, .. } | Node::Not { left, .. } => Some(left),
            Node::Word(_) | Node::Property(_) | Node::Function(_) => None,
        }
    }

    pub fn right(&self) -> Option<&Node> {
        match self {
            Node::And { right, .. } | Node::Or { right, .. } => Some(right),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Node::Word(token) | Node::Property(token) | Node::Function(token) => Some(token),
            Node::Or { token, .. } | Node::Not { token, .. } => Some(token),
            Node::And { token, .. } => token.as_ref(),
            Node::Root { .. } => None,
        }
    }
}

/// Renders the tree as an s-expression, e.g. `(and apple (not banana))`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Root { expression, .. } => write!(f, "{}", expression),
            Node::Word(token) if token.kind == TokenKind::Literal => {
                write!(f, "\"{}\"", token.value)
            }
            Node::Word(token) => f.write_str(&token.value),
            Node::Property(token) => {
                let op = token.op.map(CompareOp::as_str).unwrap_or("?");
                write!(f, "{}{}{}", token.name, op, token.value)
            }
            Node::Function(token) => {
                write!(f, "{}({})", token.name, token.value)?;
                match (token.op, token.children.get(1)) {
                    (Some(op), Some(operand)) => write!(f, "{}{}", op, operand.value),
                    _ => Ok(()),
                }
            }
            Node::And { left, right, .. } => write!(f, "(and {} {})", left, right),
            Node::Or { left, right, .. } => write!(f, "(or {} {})", left, right),
            Node::Not { left, .. } => write!(f, "(not {})", left),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_op_longest_prefix() {
        assert_eq!(CompareOp::match_prefix(b">=3"), Some(CompareOp::GreaterEq));
        assert_eq!(CompareOp::match_prefix(b">3"), Some(CompareOp::Greater));
        assert_eq!(CompareOp::match_prefix(b"!=x"), Some(CompareOp::NotEq));
        assert_eq!(CompareOp::match_prefix(b"!x"), None);
        assert_eq!(CompareOp::match_prefix(b":x"), Some(CompareOp::Contains));
    }

    #[test]
    fn test_compare_op_flags() {
        for op in CompareOp::ALL {
            assert_eq!(CompareOp::from_flags(EvalFlags::PROPERTY | op.flag()), Some(op));
            assert_eq!(CompareOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(CompareOp::from_flags(EvalFlags::WORD), None);
    }

    #[test]
    fn test_eval_flags_display() {
        assert_eq!((EvalFlags::WORD | EvalFlags::OP_CONTAINS).to_string(), "Word | Contains");
        assert_eq!(
            (EvalFlags::EXCLUDE | EvalFlags::PROPERTY | EvalFlags::OP_LESS_EQ).to_string(),
            "Exclude | Property | LessEq"
        );
        assert_eq!(EvalFlags::empty().to_string(), "None");
    }

    #[test]
    fn test_eval_flag_bits() {
        assert_eq!(EvalFlags::EXCLUDE.bits(), 1);
        assert_eq!(EvalFlags::OP_EQUAL.bits(), 1 << 15);
        assert_eq!(EvalFlags::OP_EVAL.bits(), 1 << 20);
    }
}
