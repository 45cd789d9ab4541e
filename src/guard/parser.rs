// Guard expression lexer + recursive-descent parser.
//
// Grammar, loosest binding first:
//   expr    := or
//   or      := and ( '||' and )*
//   and     := cmp ( '&&' cmp )*
//   cmp     := unary ( ('=='|'!='|'>'|'>='|'<'|'<=') unary )?
//   unary   := '!' unary | primary
//   primary := literal | path | '(' expr ')'
//   path    := ident ( '.' ident )*

use serde_json::Value;
use thiserror::Error;

use crate::guard::ast::{CmpOp, GuardExpr};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number literal '{text}'")]
    InvalidNumber { text: String },
    #[error("unexpected token {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("trailing input after expression")]
    TrailingInput,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Dot,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar { ch, offset: i });
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar { ch, offset: i });
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar { ch, offset: i });
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = ch;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ParseError::UnterminatedString),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some(&next) => {
                                    if !matches!(next, '\\' | '\'' | '"') {
                                        text.push('\\');
                                    }
                                    text.push(next);
                                }
                                None => return Err(ParseError::UnterminatedString),
                            }
                            i += 2;
                        }
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '-' | '0'..='9' => {
                let start = i;
                if ch == '-' {
                    if !chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                        return Err(ParseError::UnexpectedChar { ch, offset: i });
                    }
                    i += 1;
                }
                while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                // Fractional part only when the dot is followed by a
                // digit; a bare dot after digits belongs to no valid
                // guard and falls out as a parse error later.
                if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    i += 1;
                    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber { text: text.clone() })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(ParseError::UnexpectedChar { ch, offset: i }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(ParseError::UnexpectedToken {
                token: format!("{token:?}"),
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_or(&mut self) -> Result<GuardExpr, ParseError> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            expr = GuardExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<GuardExpr, ParseError> {
        let mut expr = self.parse_cmp()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let rhs = self.parse_cmp()?;
            expr = GuardExpr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_cmp(&mut self) -> Result<GuardExpr, ParseError> {
        let lhs = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::Ne,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_unary()?;
        Ok(GuardExpr::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_unary(&mut self) -> Result<GuardExpr, ParseError> {
        if self.peek() == Some(&Token::Bang) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(GuardExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<GuardExpr, ParseError> {
        match self.advance() {
            Some(Token::Number(n)) => {
                let value = serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                Ok(GuardExpr::Literal(value))
            }
            Some(Token::Str(s)) => Ok(GuardExpr::Literal(Value::String(s))),
            Some(Token::True) => Ok(GuardExpr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(GuardExpr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(GuardExpr::Literal(Value::Null)),
            Some(Token::Ident(first)) => {
                let mut segments = vec![first];
                while self.peek() == Some(&Token::Dot) {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(segment)) => segments.push(segment),
                        Some(token) => {
                            return Err(ParseError::UnexpectedToken {
                                token: format!("{token:?}"),
                            })
                        }
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                }
                Ok(GuardExpr::Path(segments))
            }
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(ParseError::UnexpectedToken {
                token: format!("{token:?}"),
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// Parse a guard expression source string into its AST.
pub fn parse(source: &str) -> Result<GuardExpr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError::TrailingInput);
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse("props.word_count > 0").unwrap();
        assert_eq!(
            expr,
            GuardExpr::Cmp {
                op: CmpOp::Gt,
                lhs: Box::new(GuardExpr::Path(vec![
                    "props".to_string(),
                    "word_count".to_string()
                ])),
                rhs: Box::new(GuardExpr::Literal(json!(0.0))),
            }
        );
    }

    #[test]
    fn respects_precedence() {
        // a == 1 || b == 2 && c == 3  parses as  a == 1 || (b == 2 && c == 3)
        let expr = parse("a == 1 || b == 2 && c == 3").unwrap();
        match expr {
            GuardExpr::Or(lhs, rhs) => {
                assert!(matches!(*lhs, GuardExpr::Cmp { op: CmpOp::Eq, .. }));
                assert!(matches!(*rhs, GuardExpr::And(_, _)));
            }
            other => panic!("expected Or at the top, got {other:?}"),
        }
    }

    #[test]
    fn parses_grouping_and_negation() {
        let expr = parse("!(status == 'done' || archived)").unwrap();
        assert!(matches!(expr, GuardExpr::Not(_)));
    }

    #[test]
    fn parses_string_literals_with_either_quote() {
        assert_eq!(
            parse("state == 'draft'").unwrap(),
            parse("state == \"draft\"").unwrap()
        );
    }

    #[test]
    fn parses_negative_and_fractional_numbers() {
        let expr = parse("props.delta >= -1.5").unwrap();
        match expr {
            GuardExpr::Cmp { rhs, .. } => {
                assert_eq!(*rhs, GuardExpr::Literal(json!(-1.5)));
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn rejects_function_calls() {
        assert!(parse("delete()").is_err());
        assert!(parse("props.f(1)").is_err());
    }

    #[test]
    fn rejects_single_equals() {
        assert!(matches!(
            parse("state = 'draft'"),
            Err(ParseError::UnexpectedChar { ch: '=', .. })
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert_eq!(parse("a == 1 b"), Err(ParseError::TrailingInput));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert_eq!(parse("state == 'draft"), Err(ParseError::UnterminatedString));
    }

    #[test]
    fn rejects_empty_expression() {
        assert_eq!(parse(""), Err(ParseError::UnexpectedEnd));
    }

    #[test]
    fn keywords_are_literals_not_paths() {
        assert_eq!(parse("true").unwrap(), GuardExpr::Literal(json!(true)));
        assert_eq!(parse("null").unwrap(), GuardExpr::Literal(Value::Null));
    }
}
