//! CSS selector parsing.
//!
//! Supports the subset HideBox generates and users commonly write by hand:
//! type/universal selectors, `#id`, `.class`, attribute selectors with all
//! six operators, the four combinators, and the structural pseudo-classes
//! (`:nth-child`, `:nth-last-child`, `:nth-of-type`, `:nth-last-of-type`,
//! `:first-child`, `:last-child`, `:first-of-type`, `:last-of-type`).
//! Identifiers and strings accept CSS escapes (`\31 `, `\.`).

use std::str::FromStr;

use crate::errors::SelectorError;

/// Relationship between two compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[a=v]`
    Equals,
    /// `[a~=v]`
    Includes,
    /// `[a|=v]`
    DashMatch,
    /// `[a^=v]`
    Prefix,
    /// `[a$=v]`
    Suffix,
    /// `[a*=v]`
    Substring,
}

/// `an+b` position formula (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    pub a: i32,
    pub b: i32,
}

impl Nth {
    pub const FIRST: Nth = Nth { a: 0, b: 1 };

    pub fn matches(&self, index: usize) -> bool {
        let index = index as i64;
        let a = i64::from(self.a);
        let b = i64::from(self.b);
        if a == 0 {
            return index == b;
        }
        let diff = index - b;
        diff % a == 0 && diff / a >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        matcher: Option<(AttrOperator, String)>,
        case_insensitive: bool,
    },
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
}

/// Type selector plus simple selectors, e.g. `li.item:nth-of-type(2)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    /// Lowercased tag name; `None` is the universal selector.
    pub tag: Option<String>,
    pub simple: Vec<SimpleSelector>,
}

/// Compounds joined by combinators, read left to right.
///
/// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub compounds: Vec<CompoundSelector>,
    pub combinators: Vec<Combinator>,
}

/// Comma separated selector group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse a selector group.
pub fn parse(input: &str) -> Result<SelectorList, SelectorError> {
    Parser::new(input).parse_list()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(ch) => SelectorError::UnexpectedChar {
                ch,
                offset: self.pos,
            },
            None => SelectorError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(SelectorError::Empty);
        }

        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                Some(_) => return Err(self.unexpected()),
            }
        }

        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();
        let mut parsed_any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                parsed_any = true;
            }
            Some(c) if is_ident_start(c, self.peek_at(1)) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
                parsed_any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    compound.simple.push(SimpleSelector::Id(id));
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.parse_ident()?;
                    compound.simple.push(SimpleSelector::Class(class));
                }
                Some('[') => {
                    let attribute = self.parse_attribute()?;
                    compound.simple.push(attribute);
                }
                Some(':') => {
                    let pseudo = self.parse_pseudo()?;
                    compound.simple.push(pseudo);
                }
                _ => break,
            }
            parsed_any = true;
        }

        if !parsed_any {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(c) if is_ident_start(c, self.peek_at(1)) => {}
            _ => return Err(self.unexpected()),
        }

        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Escape body; the backslash has already been consumed.
    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        match self.peek() {
            None => Err(SelectorError::UnexpectedEnd),
            Some('\n') => Err(self.unexpected()),
            Some(c) if c.is_ascii_hexdigit() => {
                let mut code: u32 = 0;
                let mut digits = 0;
                while digits < 6 {
                    match self.peek().and_then(|h| h.to_digit(16)) {
                        Some(value) => {
                            code = code * 16 + value;
                            digits += 1;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                if matches!(self.peek(), Some(c) if c.is_whitespace()) {
                    self.pos += 1;
                }
                Ok(char::from_u32(code)
                    .filter(|c| *c != '\0')
                    .unwrap_or('\u{FFFD}'))
            }
            Some(c) => {
                self.pos += 1;
                Ok(c)
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, SelectorError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnexpectedEnd),
                Some(c) if c == quote => break,
                Some('\\') => {
                    if self.peek() == Some('\n') {
                        self.pos += 1;
                    } else {
                        out.push(self.parse_escape()?);
                    }
                }
                Some('\n') => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn parse_attribute(&mut self) -> Result<SimpleSelector, SelectorError> {
        self.expect('[')?;
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(SimpleSelector::Attribute {
                name,
                matcher: None,
                case_insensitive: false,
            });
        }

        let operator = match self.peek() {
            Some('=') => {
                self.pos += 1;
                AttrOperator::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => AttrOperator::Includes,
                    '|' => AttrOperator::DashMatch,
                    '^' => AttrOperator::Prefix,
                    '$' => AttrOperator::Suffix,
                    _ => AttrOperator::Substring,
                }
            }
            _ => return Err(self.unexpected()),
        };
        self.skip_whitespace();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.parse_string(q)?,
            Some(c) if is_ident_start(c, self.peek_at(1)) => self.parse_ident()?,
            _ => return Err(self.unexpected()),
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        match self.peek() {
            Some('i' | 'I') => {
                self.pos += 1;
                case_insensitive = true;
                self.skip_whitespace();
            }
            Some('s' | 'S') => {
                self.pos += 1;
                self.skip_whitespace();
            }
            _ => {}
        }
        self.expect(']')?;

        Ok(SimpleSelector::Attribute {
            name,
            matcher: Some((operator, value)),
            case_insensitive,
        })
    }

    fn parse_pseudo(&mut self) -> Result<SimpleSelector, SelectorError> {
        self.expect(':')?;
        if self.peek() == Some(':') {
            self.pos += 1;
            let name = self.parse_ident().unwrap_or_default();
            return Err(SelectorError::UnsupportedPseudo(format!(":{name}")));
        }
        let name = self.parse_ident()?.to_ascii_lowercase();

        let argument = if self.peek() == Some('(') {
            self.pos += 1;
            let mut arg = String::new();
            loop {
                match self.bump() {
                    None => return Err(SelectorError::UnexpectedEnd),
                    Some(')') => break,
                    Some(c) => arg.push(c),
                }
            }
            Some(arg)
        } else {
            None
        };

        match (name.as_str(), argument) {
            ("first-child", None) => Ok(SimpleSelector::NthChild(Nth::FIRST)),
            ("last-child", None) => Ok(SimpleSelector::NthLastChild(Nth::FIRST)),
            ("first-of-type", None) => Ok(SimpleSelector::NthOfType(Nth::FIRST)),
            ("last-of-type", None) => Ok(SimpleSelector::NthLastOfType(Nth::FIRST)),
            ("nth-child", Some(arg)) => Ok(SimpleSelector::NthChild(parse_nth(&arg)?)),
            ("nth-last-child", Some(arg)) => Ok(SimpleSelector::NthLastChild(parse_nth(&arg)?)),
            ("nth-of-type", Some(arg)) => Ok(SimpleSelector::NthOfType(parse_nth(&arg)?)),
            ("nth-last-of-type", Some(arg)) => {
                Ok(SimpleSelector::NthLastOfType(parse_nth(&arg)?))
            }
            ("nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type", None) => {
                Err(SelectorError::InvalidNth(String::new()))
            }
            _ => Err(SelectorError::UnsupportedPseudo(name)),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_ident_start(c: char, next: Option<char>) -> bool {
    match c {
        '-' => matches!(
            next,
            Some(n) if n.is_ascii_alphabetic() || n == '_' || n == '-' || n == '\\' || !n.is_ascii()
        ),
        '\\' => true,
        c => c.is_ascii_alphabetic() || c == '_' || !c.is_ascii(),
    }
}

fn parse_nth(raw: &str) -> Result<Nth, SelectorError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let invalid = || SelectorError::InvalidNth(raw.trim().to_string());

    match compact.as_str() {
        "odd" => return Ok(Nth { a: 2, b: 1 }),
        "even" => return Ok(Nth { a: 2, b: 0 }),
        "" => return Err(invalid()),
        _ => {}
    }

    match compact.split_once('n') {
        Some((a_part, b_part)) => {
            let a = match a_part {
                "" | "+" => 1,
                "-" => -1,
                other => other.parse::<i32>().map_err(|_| invalid())?,
            };
            let b = if b_part.is_empty() {
                0
            } else if b_part.starts_with('+') || b_part.starts_with('-') {
                b_part.parse::<i32>().map_err(|_| invalid())?
            } else {
                return Err(invalid());
            };
            Ok(Nth { a, b })
        }
        None => {
            let b = compact.parse::<i32>().map_err(|_| invalid())?;
            Ok(Nth { a: 0, b })
        }
    }
}
