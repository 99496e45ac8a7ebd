//! Boolean expressions over tags.
//!
//! ```text
//! expr  := or
//! or    := and ( ("||" | "|" | "or") and )*
//! and   := unary ( ("&&" | "&" | "and") unary )*
//! unary := ("!" | "not") unary | "(" expr ")" | TAG
//! ```
//!
//! An empty expression selects everything.

use crate::error::TagExprError;
use crate::tagged::Tagged;
use std::fmt;
use std::str::FromStr;

/// Parsed tag expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagExpr {
    /// Matches every entity
    #[default]
    All,
    Tag(String),
    Not(Box<TagExpr>),
    And(Box<TagExpr>, Box<TagExpr>),
    Or(Box<TagExpr>, Box<TagExpr>),
}

impl TagExpr {
    /// Parses an expression. Whitespace-only input yields `All`.
    pub fn parse(input: &str) -> Result<Self, TagExprError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(TagExpr::All);
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some((position, tok)) => Err(TagExprError::UnexpectedToken {
                position: *position,
                found: tok.to_string(),
            }),
        }
    }

    /// Shorthand for a single-tag expression.
    pub fn tag(tag: impl Into<String>) -> Self {
        TagExpr::Tag(tag.into())
    }

    pub fn matches(&self, tagged: &Tagged) -> bool {
        match self {
            TagExpr::All => true,
            TagExpr::Tag(t) => tagged.has_tag(t),
            TagExpr::Not(e) => !e.matches(tagged),
            TagExpr::And(a, b) => a.matches(tagged) && b.matches(tagged),
            TagExpr::Or(a, b) => a.matches(tagged) || b.matches(tagged),
        }
    }
}

impl FromStr for TagExpr {
    type Err = TagExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagExpr::parse(s)
    }
}

impl fmt::Display for TagExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpr::All => Ok(()),
            TagExpr::Tag(t) => write!(f, "{}", t),
            TagExpr::Not(e) => write!(f, "!({})", e),
            TagExpr::And(a, b) => write!(f, "({} && {})", a, b),
            TagExpr::Or(a, b) => write!(f, "({} || {})", a, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Tag(t) => write!(f, "{}", t),
            Token::Not => write!(f, "!"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, TagExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::Open,
            ')' => Token::Close,
            '!' => Token::Not,
            '&' => {
                chars.next_if(|&(_, n)| n == '&');
                Token::And
            }
            '|' => {
                chars.next_if(|&(_, n)| n == '|');
                Token::Or
            }
            c if is_tag_char(c) => {
                let mut word = String::from(c);
                while let Some((_, n)) = chars.next_if(|&(_, n)| is_tag_char(n)) {
                    word.push(n);
                }
                match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Tag(word),
                }
            }
            ch => return Err(TagExprError::InvalidCharacter { position: pos, ch }),
        };
        tokens.push((pos, token));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn or(&mut self) -> Result<TagExpr, TagExprError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = TagExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<TagExpr, TagExprError> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = TagExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<TagExpr, TagExprError> {
        let (position, token) = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(TagExprError::UnexpectedEnd)?;
        self.pos += 1;

        match token {
            Token::Not => Ok(TagExpr::Not(Box::new(self.unary()?))),
            Token::Tag(t) => Ok(TagExpr::Tag(t)),
            Token::Open => {
                let inner = self.or()?;
                match self.tokens.get(self.pos) {
                    Some((_, Token::Close)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some((position, tok)) => Err(TagExprError::UnexpectedToken {
                        position: *position,
                        found: tok.to_string(),
                    }),
                    None => Err(TagExprError::UnexpectedEnd),
                }
            }
            tok => Err(TagExprError::UnexpectedToken {
                position,
                found: tok.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tags: &[&str]) -> Tagged {
        let mut t = Tagged::new();
        for tag in tags {
            t.add_tag(*tag);
        }
        t
    }

    #[test]
    fn test_empty_matches_all() {
        assert_eq!(TagExpr::parse("").unwrap(), TagExpr::All);
        assert_eq!(TagExpr::parse("   ").unwrap(), TagExpr::All);
        assert!(TagExpr::All.matches(&Tagged::new()));
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let e = TagExpr::parse("x || y && top").unwrap();
        assert!(e.matches(&tagged(&["x"])));
        assert!(!e.matches(&tagged(&["y"])));
        assert!(e.matches(&tagged(&["y", "top"])));
    }

    #[test]
    fn test_negation_and_parens() {
        let e: TagExpr = "boundary & !(north | south)".parse().unwrap();
        assert!(e.matches(&tagged(&["boundary", "west"])));
        assert!(!e.matches(&tagged(&["boundary", "north"])));
        assert!(!e.matches(&tagged(&["inner"])));
    }

    #[test]
    fn test_word_operators() {
        let e = TagExpr::parse("not inner and z").unwrap();
        assert!(e.matches(&tagged(&["boundary", "z"])));
        assert!(!e.matches(&tagged(&["inner", "z"])));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(TagExpr::parse("x &&"), Err(TagExprError::UnexpectedEnd));
        assert_eq!(TagExpr::parse("(x"), Err(TagExprError::UnexpectedEnd));
        assert_eq!(
            TagExpr::parse("x y"),
            Err(TagExprError::UnexpectedToken {
                position: 2,
                found: "y".to_string()
            })
        );
        assert_eq!(
            TagExpr::parse("x $ y"),
            Err(TagExprError::InvalidCharacter { position: 2, ch: '$' })
        );
        assert!(TagExpr::parse(")").is_err());
    }
}
