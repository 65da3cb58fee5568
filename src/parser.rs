//! Textual PCTL syntax.
//!
//! Grammar (precedence `!` > `&` > `|`, `U` binds loosest):
//!
//! ```text
//! formula := 'X' unary
//!          | disj [ 'U' [ '<=' INT ] disj ]
//! disj    := conj ( '|' conj )*
//! conj    := unary ( '&' unary )*
//! unary   := '!' unary | primary
//! primary := 'true' | 'false' | ATOM
//!          | 'P' bound '(' formula ')'
//!          | '(' formula ')'
//! bound   := '[' NUM ',' NUM ']' | '>=' NUM | '<=' NUM | '==' NUM
//! ```
//!
//! Atoms are identifiers starting with a lowercase letter or `_`. Whitespace is
//! insignificant. The output of [`Formula`]'s `Display` parses back to an
//! equivalent formula.
//!
//! ```
//! use pctl_rs::parser::parse_state;
//!
//! let phi = parse_state("P>=0.5(a U<=3 b)").unwrap();
//! assert_eq!(phi.to_string(), "P[0.5, 1](a U<=3 b)");
//! ```

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::formula::{Formula, StateFormula};
use crate::types::Interval;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    True,
    False,
    Atom(String),
    Number(String),
    Next,
    Until,
    Prob,
    Not,
    And,
    Or,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Le,
    Ge,
    EqEq,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Atom(a) => format!("atom '{}'", a),
            Token::Number(n) => format!("number '{}'", n),
            Token::Next => "'X'".to_string(),
            Token::Until => "'U'".to_string(),
            Token::Prob => "'P'".to_string(),
            Token::Not => "'!'".to_string(),
            Token::And => "'&'".to_string(),
            Token::Or => "'|'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::EqEq => "'=='".to_string(),
        }
    }
}

fn parse_error(position: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        position,
        message: message.into(),
    }
}

/// Splits the input into `(byte offset, token)` pairs.
fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            b'!' => Token::Not,
            b'&' => Token::And,
            b'|' => Token::Or,
            b'X' => Token::Next,
            b'U' => Token::Until,
            b'P' => Token::Prob,
            b'<' | b'>' | b'=' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return Err(parse_error(start, format!("expected '=' after '{}'", c as char)));
                }
                i += 1;
                match c {
                    b'<' => Token::Le,
                    b'>' => Token::Ge,
                    _ => Token::EqEq,
                }
            }
            b'-' | b'.' | b'0'..=b'9' => {
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                tokens.push((start, Token::Number(input[start..i].to_string())));
                continue;
            }
            b'a'..=b'z' | b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let token = match &input[start..i] {
                    "true" => Token::True,
                    "false" => Token::False,
                    ident => Token::Atom(ident.to_string()),
                };
                tokens.push((start, token));
                continue;
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(parse_error(start, format!("unexpected character '{}'", ch)));
            }
        };
        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    /// Byte offset of the current token, or the end of input.
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let offset = self.offset();
        match self.bump() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(parse_error(
                offset,
                format!("expected {}, found {}", expected.describe(), t.describe()),
            )),
            None => Err(parse_error(
                offset,
                format!("expected {}, found end of input", expected.describe()),
            )),
        }
    }

    fn number(&mut self) -> Result<(usize, String)> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::Number(n)) => Ok((offset, n)),
            Some(t) => Err(parse_error(offset, format!("expected number, found {}", t.describe()))),
            None => Err(parse_error(offset, "expected number, found end of input")),
        }
    }

    fn probability(&mut self) -> Result<f64> {
        let (offset, text) = self.number()?;
        text.parse::<f64>()
            .map_err(|_| parse_error(offset, format!("malformed number '{}'", text)))
    }

    fn step_bound(&mut self) -> Result<usize> {
        let (offset, text) = self.number()?;
        if let Ok(k) = text.parse::<usize>() {
            return Ok(k);
        }
        match text.parse::<f64>() {
            Ok(_) => Err(Error::InvalidBound(format!(
                "step bound must be a non-negative integer, got {}",
                text
            ))),
            Err(_) => Err(parse_error(offset, format!("malformed number '{}'", text))),
        }
    }

    fn formula(&mut self) -> Result<Formula> {
        if self.eat(&Token::Next) {
            let phi = self.unary()?;
            return Formula::next(phi);
        }
        let lhs = self.disjunction()?;
        if self.eat(&Token::Until) {
            let bound = if self.eat(&Token::Le) { Some(self.step_bound()?) } else { None };
            let rhs = self.disjunction()?;
            return match bound {
                Some(k) => Formula::bounded_until(lhs, rhs, k),
                None => Formula::until(lhs, rhs),
            };
        }
        Ok(lhs)
    }

    fn disjunction(&mut self) -> Result<Formula> {
        let mut lhs = self.conjunction()?;
        while self.eat(&Token::Or) {
            let rhs = self.conjunction()?;
            lhs = Formula::disjunction(lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<Formula> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            lhs = Formula::conjunction(lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Formula> {
        if self.eat(&Token::Not) {
            let phi = self.unary()?;
            return Formula::negation(phi);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Formula> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::True) => Ok(StateFormula::tt().into()),
            Some(Token::False) => Ok(StateFormula::ff().into()),
            Some(Token::Atom(a)) => Ok(StateFormula::atom(a).into()),
            Some(Token::Prob) => {
                let interval = self.bound()?;
                self.expect(Token::LParen)?;
                let psi = self.formula()?;
                self.expect(Token::RParen)?;
                Formula::prob(interval, psi)
            }
            Some(Token::LParen) => {
                let inner = self.formula()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(t) => Err(parse_error(offset, format!("unexpected {}", t.describe()))),
            None => Err(parse_error(offset, "unexpected end of input")),
        }
    }

    fn bound(&mut self) -> Result<Interval> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::LBracket) => {
                let lb = self.probability()?;
                self.expect(Token::Comma)?;
                let ub = self.probability()?;
                self.expect(Token::RBracket)?;
                Interval::new(lb, ub)
            }
            Some(Token::Ge) => Interval::at_least(self.probability()?),
            Some(Token::Le) => Interval::at_most(self.probability()?),
            Some(Token::EqEq) => Interval::exactly(self.probability()?),
            Some(t) => Err(parse_error(
                offset,
                format!("expected probability bound, found {}", t.describe()),
            )),
            None => Err(parse_error(offset, "expected probability bound, found end of input")),
        }
    }
}

/// Parses a formula of either sort.
pub fn parse(input: &str) -> Result<Formula> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let formula = parser.formula()?;
    if let Some(t) = parser.peek() {
        return Err(parse_error(
            parser.offset(),
            format!("unexpected {} after formula", t.describe()),
        ));
    }
    log::trace!("parsed '{}' as {}", input, formula);
    Ok(formula)
}

/// Parses a formula that must be a state formula.
pub fn parse_state(input: &str) -> Result<Rc<StateFormula>> {
    parse(input)?.into_state()
}
