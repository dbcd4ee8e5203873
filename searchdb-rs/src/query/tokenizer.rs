//! Tokenizer for query strings.
//!
//! Produces a nested token list: groups and negations carry their operand
//! tokens as `children`, properties carry their value token, functions carry
//! their argument group (and the comparison operand, if any).
//!
//! All delimiters are ASCII, so every split position is a valid UTF-8 char
//! boundary and slicing `text` by byte offsets is safe.

use crate::error::{QueryError, QueryErrorKind};
use crate::query::types::{CompareOp, Token, TokenKind};

/// Tokenize a query string.
pub fn tokenize(text: &str) -> Result<Vec<Token>, QueryError> {
    Tokenizer::new(text).tokens(0, text.len())
}

fn error(kind: QueryErrorKind, token: &str, message: impl Into<String>) -> QueryError {
    QueryError::new(kind, token, message)
}

fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\''
}

fn is_keyword_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'(' || is_quote(b)
}

/// Resolve `\x` escapes to `x`.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

struct Tokenizer<'a> {
    text: &'a str,
    bytes: &'a [u8],
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
        }
    }

    // ========================================================================
    // Scanning helpers
    // ========================================================================

    fn skip_whitespace(&self, mut pos: usize, end: usize) -> usize {
        while pos < end && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    fn find_whitespace(&self, mut pos: usize, end: usize) -> usize {
        while pos < end && !self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    /// Position of the unescaped `quote` closing a literal opened before `start`.
    fn find_quote_end(&self, start: usize, end: usize, quote: u8) -> Option<usize> {
        let mut i = start;
        while i < end {
            match self.bytes[i] {
                b'\\' => i += 2,
                b if b == quote => return Some(i),
                _ => i += 1,
            }
        }
        None
    }

    /// Position of the `)` matching a `(` opened before `start`.
    fn find_group_end(&self, start: usize, end: usize) -> Option<usize> {
        let mut depth = 1usize;
        let mut i = start;
        while i < end {
            match self.bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b if is_quote(b) => {
                    if let Some(close) = self.find_quote_end(i + 1, end, b) {
                        i = close + 1;
                        continue;
                    }
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn keyword_at(&self, pos: usize, end: usize, keyword: &str) -> bool {
        let stop = pos + keyword.len();
        stop <= end
            && self.bytes[pos..stop].eq_ignore_ascii_case(keyword.as_bytes())
            && (stop == end || is_keyword_boundary(self.bytes[stop]))
    }

    // ========================================================================
    // Token stream
    // ========================================================================

    fn tokens(&self, start: usize, end: usize) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();
        let mut pos = start;

        loop {
            pos = self.skip_whitespace(pos, end);
            if pos >= end {
                break;
            }

            if self.bytes[pos] == b'-' {
                pos = self.parse_negation(pos, pos + 1, end, QueryErrorKind::UnexpectedToken, &mut tokens)?;
                continue;
            }

            let next = self.parse_block(pos, end, &mut tokens)?;
            if next > pos {
                pos = next;
                continue;
            }

            let next = self.parse_keyword(pos, end, &mut tokens)?;
            if next > pos {
                pos = next;
                continue;
            }

            let next = self.parse_variable(pos, end, &mut tokens)?;
            if next == pos {
                let stop = self.find_whitespace(pos, end);
                return Err(error(
                    QueryErrorKind::UnexpectedToken,
                    &self.text[pos..stop],
                    "Unexpected token",
                ));
            }
            pos = next;
        }

        Ok(tokens)
    }

    /// Parse the operand of `-` or `not`. `start` is where the negation
    /// begins, `after` is the first byte past the `-`/`not` marker.
    fn parse_negation(
        &self,
        start: usize,
        after: usize,
        end: usize,
        missing: QueryErrorKind,
        tokens: &mut Vec<Token>,
    ) -> Result<usize, QueryError> {
        let operand = self.skip_whitespace(after, end);
        if operand >= end {
            return Err(error(missing, &self.text[start..end], "Missing expression to negate"));
        }

        let mut children = Vec::new();
        let next = if self.bytes[operand] == b'-' {
            self.parse_negation(operand, operand + 1, end, missing, &mut children)?
        } else {
            let next = self.parse_block(operand, end, &mut children)?;
            if next > operand {
                next
            } else {
                self.parse_variable(operand, end, &mut children)?
            }
        };
        if next == operand || children.is_empty() {
            return Err(error(
                QueryErrorKind::UnexpectedToken,
                &self.text[start..end],
                "Expected a group or a term after negation",
            ));
        }

        let mut token = Token::new(TokenKind::Not, self.text, start..next);
        token.identifier = self.text[operand..next].to_string();
        token.value = token.identifier.clone();
        token.children = children;
        tokens.push(token);
        Ok(next)
    }

    /// Groups and literals. Returns `pos` unchanged if neither starts here.
    fn parse_block(&self, pos: usize, end: usize, tokens: &mut Vec<Token>) -> Result<usize, QueryError> {
        match self.bytes[pos] {
            b'(' => {
                let close = self.find_group_end(pos + 1, end).ok_or_else(|| {
                    error(
                        QueryErrorKind::UnexpectedGroupEnd,
                        &self.text[pos..end],
                        "Missing closing parenthesis",
                    )
                })?;
                let children = self.tokens(pos + 1, close)?;
                let mut token = Token::new(TokenKind::Group, self.text, pos..close + 1);
                token.value = self.text[pos + 1..close].to_string();
                token.children = children;
                tokens.push(token);
                Ok(close + 1)
            }
            b')' => Err(error(
                QueryErrorKind::UnexpectedGroupEnd,
                ")",
                "Unexpected closing parenthesis",
            )),
            b if is_quote(b) => self.parse_literal(pos, end, tokens),
            _ => Ok(pos),
        }
    }

    fn parse_literal(&self, pos: usize, end: usize, tokens: &mut Vec<Token>) -> Result<usize, QueryError> {
        let quote = self.bytes[pos];
        let close = self
            .find_quote_end(pos + 1, end, quote)
            .filter(|&close| close > pos + 1)
            .ok_or_else(|| {
                error(
                    QueryErrorKind::UnexpectedQuoteEnd,
                    &self.text[pos..end],
                    "Missing closing quote",
                )
            })?;

        let mut token = Token::new(TokenKind::Literal, self.text, pos..close + 1);
        token.value = unescape(&self.text[pos + 1..close]);
        token.identifier = token.value.clone();
        tokens.push(token);
        Ok(close + 1)
    }

    fn parse_keyword(&self, pos: usize, end: usize, tokens: &mut Vec<Token>) -> Result<usize, QueryError> {
        if self.keyword_at(pos, end, "and") {
            tokens.push(Token::new(TokenKind::And, self.text, pos..pos + 3));
            return Ok(pos + 3);
        }
        if self.keyword_at(pos, end, "or") {
            tokens.push(Token::new(TokenKind::Or, self.text, pos..pos + 2));
            return Ok(pos + 2);
        }
        if self.keyword_at(pos, end, "not") {
            return self.parse_negation(pos, pos + 3, end, QueryErrorKind::MissingNotRightOperand, tokens);
        }
        Ok(pos)
    }

    // ========================================================================
    // Variables: properties, functions and words
    // ========================================================================

    fn parse_variable(&self, pos: usize, end: usize, tokens: &mut Vec<Token>) -> Result<usize, QueryError> {
        let first = self.bytes[pos];
        if is_quote(first) || first == b'(' || first == b')' {
            return self.parse_block(pos, end, tokens);
        }

        let span_end = self.find_whitespace(pos, end);
        let op_at = (pos + 1..span_end).find_map(|i| {
            CompareOp::match_prefix(&self.bytes[i..span_end]).map(|op| (i, op))
        });
        let paren_at = (pos + 2..span_end).find(|&i| self.bytes[i] == b'(');

        if let Some(paren) = paren_at {
            if op_at.is_none_or(|(at, _)| paren < at) {
                return self.parse_function(pos, paren, end, tokens);
            }
        }
        if let Some((at, op)) = op_at {
            return self.parse_property(pos, at, op, end, tokens);
        }

        let mut token = Token::new(TokenKind::Word, self.text, pos..span_end);
        token.value = token.source.clone();
        tokens.push(token);
        Ok(span_end)
    }

    /// Parse the value following a comparison operator at `op_end`.
    fn parse_operand(
        &self,
        start: usize,
        op_end: usize,
        end: usize,
        children: &mut Vec<Token>,
    ) -> Result<(usize, String), QueryError> {
        let missing = || {
            error(
                QueryErrorKind::MissingPropertyValue,
                &self.text[start..end],
                "Missing value after comparison operator",
            )
        };

        let value_start = self.skip_whitespace(op_end, end);
        if value_start >= end {
            return Err(missing());
        }

        let before = children.len();
        let next = self.parse_variable(value_start, end, children)?;
        if next == value_start || children.len() == before {
            return Err(missing());
        }

        let value = match children.last() {
            Some(child) if child.kind == TokenKind::Literal => child.value.clone(),
            _ => self.text[value_start..next].to_string(),
        };
        Ok((next, value))
    }

    fn parse_property(
        &self,
        pos: usize,
        op_at: usize,
        op: CompareOp,
        end: usize,
        tokens: &mut Vec<Token>,
    ) -> Result<usize, QueryError> {
        let mut children = Vec::new();
        let (next, value) = self.parse_operand(pos, op_at + op.as_str().len(), end, &mut children)?;

        let mut token = Token::new(TokenKind::Property, self.text, pos..next);
        token.name = self.text[pos..op_at].to_string();
        token.value = value;
        token.op = Some(op);
        token.children = children;
        tokens.push(token);
        Ok(next)
    }

    fn parse_function(
        &self,
        pos: usize,
        paren: usize,
        end: usize,
        tokens: &mut Vec<Token>,
    ) -> Result<usize, QueryError> {
        let name = &self.text[pos..paren];
        if self.find_group_end(paren + 1, end).is_none() {
            return Err(error(
                QueryErrorKind::MissingFunctionGroup,
                &self.text[pos..end],
                format!("Missing argument group for function `{}`", name),
            ));
        }

        let mut children = Vec::new();
        let group_end = self.parse_block(paren, end, &mut children)?;
        let arguments = children
            .first()
            .map(|group| group.value.clone())
            .unwrap_or_default();

        let mut next = group_end;
        let mut op = None;
        if group_end < end {
            if let Some(found) = CompareOp::match_prefix(&self.bytes[group_end..end]) {
                let (operand_end, _) =
                    self.parse_operand(pos, group_end + found.as_str().len(), end, &mut children)?;
                next = operand_end;
                op = Some(found);
            }
        }

        let mut token = Token::new(TokenKind::Function, self.text, pos..next);
        token.name = name.to_string();
        token.value = arguments;
        token.op = op;
        token.children = children;
        tokens.push(token);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn err_kind(text: &str) -> QueryErrorKind {
        tokenize(text).unwrap_err().kind
    }

    #[test]
    fn test_words() {
        let tokens = tokenize("  apple   banana ").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Word, TokenKind::Word]);
        assert_eq!(tokens[0].value, "apple");
        assert_eq!(tokens[1].value, "banana");
    }

    #[test]
    fn test_source_spans() {
        let text = "apple  -banana";
        let tokens = tokenize(text).unwrap();
        assert_eq!(tokens[1].source, "-banana");
        assert_eq!(tokens[1].span, 7..14);
        assert_eq!(tokens[1].identifier, "banana");
        assert_eq!(&text[tokens[1].span.clone()], tokens[1].source);
    }

    #[test]
    fn test_literal_and_nested_negation() {
        let tokens = tokenize("\"number > 32\" -(-joe -last!=smith)").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Literal, TokenKind::Not]);
        assert_eq!(tokens[0].value, "number > 32");

        let group = &tokens[1].children[0];
        assert_eq!(group.kind, TokenKind::Group);
        assert_eq!(kinds(&group.children), vec![TokenKind::Not, TokenKind::Not]);

        let property = &group.children[1].children[0];
        assert_eq!(property.kind, TokenKind::Property);
        assert_eq!(property.name, "last");
        assert_eq!(property.op, Some(CompareOp::NotEq));
        assert_eq!(property.value, "smith");
    }

    #[test]
    fn test_group_with_function() {
        let tokens = tokenize("(bob and func(smith))").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Group]);
        let group = &tokens[0];
        assert_eq!(
            kinds(&group.children),
            vec![TokenKind::Word, TokenKind::And, TokenKind::Function]
        );
        assert_eq!(group.children[2].name, "func");
        assert_eq!(group.children[2].value, "smith");
        assert_eq!(group.children[2].op, None);
    }

    #[test]
    fn test_not_keyword_and_mixed_tokens() {
        let tokens =
            tokenize("not (joe and (bob (kim or -yolland)) suzy) -will age<=10 or age>=20").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Not,
                TokenKind::Not,
                TokenKind::Property,
                TokenKind::Or,
                TokenKind::Property
            ]
        );
        assert_eq!(tokens[0].children[0].kind, TokenKind::Group);
        assert_eq!(tokens[2].op, Some(CompareOp::LessEq));
        assert_eq!(tokens[4].op, Some(CompareOp::GreaterEq));
    }

    #[test]
    fn test_dash_followed_by_space() {
        let tokens = tokenize("-will - space age<=10 or age>=20").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1].kind, TokenKind::Not);
        assert_eq!(tokens[1].children[0].value, "space");
    }

    #[test]
    fn test_double_negation() {
        let tokens = tokenize("--apple").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Not);
        assert_eq!(tokens[0].children[0].kind, TokenKind::Not);
        assert_eq!(tokens[0].children[0].children[0].value, "apple");
    }

    #[test]
    fn test_property_value_after_whitespace() {
        let tokens = tokenize("age>= 2").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "age");
        assert_eq!(tokens[0].value, "2");
        assert_eq!(tokens[0].source, "age>= 2");
    }

    #[test]
    fn test_property_literal_value() {
        let tokens = tokenize("name:\"mr. patrick\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Property);
        assert_eq!(tokens[0].op, Some(CompareOp::Contains));
        assert_eq!(tokens[0].value, "mr. patrick");
        assert_eq!(tokens[0].children[0].kind, TokenKind::Literal);
    }

    #[test]
    fn test_negative_number_value() {
        let tokens = tokenize("-age>-100").unwrap();
        let property = &tokens[0].children[0];
        assert_eq!(property.op, Some(CompareOp::Greater));
        assert_eq!(property.value, "-100");
    }

    #[test]
    fn test_function_with_comparison() {
        let tokens = tokenize("count(a, b)>=3 next").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Function, TokenKind::Word]);
        let function = &tokens[0];
        assert_eq!(function.name, "count");
        assert_eq!(function.value, "a, b");
        assert_eq!(function.op, Some(CompareOp::GreaterEq));
        assert_eq!(function.children[1].value, "3");
        assert_eq!(function.source, "count(a, b)>=3");
    }

    #[test]
    fn test_keyword_boundaries() {
        let tokens = tokenize("andrew oracle AND x Or y").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::And,
                TokenKind::Word,
                TokenKind::Or,
                TokenKind::Word
            ]
        );
    }

    #[test]
    fn test_not_before_group() {
        let tokens = tokenize("not(a b)").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Not);
        assert_eq!(tokens[0].children[0].kind, TokenKind::Group);
    }

    #[test]
    fn test_escapes() {
        let tokens = tokenize(r#""say \"hi\"""#).unwrap();
        assert_eq!(tokens[0].value, "say \"hi\"");

        let tokens = tokenize(r#"("a)b" c)"#).unwrap();
        let group = &tokens[0];
        assert_eq!(kinds(&group.children), vec![TokenKind::Literal, TokenKind::Word]);
        assert_eq!(group.children[0].value, "a)b");
    }

    #[test]
    fn test_unicode_text() {
        let tokens = tokenize("name=MÉlanie café").unwrap();
        assert_eq!(tokens[0].value, "MÉlanie");
        assert_eq!(tokens[1].value, "café");
    }

    #[test]
    fn test_errors() {
        assert_eq!(err_kind("(a"), QueryErrorKind::UnexpectedGroupEnd);
        assert_eq!(err_kind("a )"), QueryErrorKind::UnexpectedGroupEnd);
        assert_eq!(err_kind("\"a"), QueryErrorKind::UnexpectedQuoteEnd);
        assert_eq!(err_kind("\"\""), QueryErrorKind::UnexpectedQuoteEnd);
        assert_eq!(err_kind("name="), QueryErrorKind::MissingPropertyValue);
        assert_eq!(err_kind("name=   "), QueryErrorKind::MissingPropertyValue);
        assert_eq!(err_kind("func(a"), QueryErrorKind::MissingFunctionGroup);
        assert_eq!(err_kind("apple -"), QueryErrorKind::UnexpectedToken);
        assert_eq!(err_kind("apple not"), QueryErrorKind::MissingNotRightOperand);
    }

    #[test]
    fn test_error_carries_offending_text() {
        let err = tokenize("apple (banana").unwrap_err();
        assert_eq!(err.token, "(banana");
    }
}
