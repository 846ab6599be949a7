/* Pattern preprocessing. A raw lex pattern is turned into a flat sequence of tagged symbols:
 * quoted text becomes literal operands, bracket classes become explicit union groups, escapes
 * are decoded and {name} references are replaced by the already expanded definition. */

use crate::symbol::{display_sequence, unescape, Operator, Symbol, ALPHABET_SIZE};
use log::debug;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    UnterminatedQuote(String),
    UnterminatedCharacterClass(String),
    EmptyCharacterClass(String),
    InvalidCharacterRange(char, char),
    DanglingEscape(String),
    NonAsciiCharacter(char),
    UndefinedDefinition(String),
    UnterminatedDefinitionReference(String),
    DuplicateDefinition(String),
    UnbalancedParenthesis(String),
    UnsupportedOperator(char),
    MissingOperand(char),
    UnusedOperands(usize),
    EmptyPattern,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::UnterminatedQuote(pattern) => {
                write!(f, "Error: {} has an unterminated quoted string!", pattern)
            }
            PatternError::UnterminatedCharacterClass(pattern) => {
                write!(f, "Error: {} has an unterminated character class!", pattern)
            }
            PatternError::EmptyCharacterClass(pattern) => {
                write!(f, "Error: {} contains a character class matching nothing!", pattern)
            }
            PatternError::InvalidCharacterRange(start, end) => write!(
                f,
                "Error: Invalid character range provided: {} - {}",
                start.escape_default(),
                end.escape_default()
            ),
            PatternError::DanglingEscape(pattern) => {
                write!(f, "Error: {} ends with a lone backslash!", pattern)
            }
            PatternError::NonAsciiCharacter(ch) => {
                write!(f, "Error: {} is not a 7 bit ASCII character!", ch)
            }
            PatternError::UndefinedDefinition(name) => {
                write!(f, "Error: Reference to undefined definition {{{}}}!", name)
            }
            PatternError::UnterminatedDefinitionReference(name) => {
                write!(f, "Error: Definition reference {{{} is never closed!", name)
            }
            PatternError::DuplicateDefinition(name) => {
                write!(f, "Error: Definition {} is defined more than once!", name)
            }
            PatternError::UnbalancedParenthesis(pattern) => {
                write!(f, "Error: {} has unbalanced parenthesis!", pattern)
            }
            PatternError::UnsupportedOperator(op) => {
                write!(f, "Error: Operator {} is not supported!", op)
            }
            PatternError::MissingOperand(op) => {
                write!(f, "Error: Operator {} is missing an operand!", op)
            }
            PatternError::UnusedOperands(count) => {
                write!(f, "Error: {} operands are left without an operator!", count)
            }
            PatternError::EmptyPattern => write!(f, "Error: Empty pattern provided!"),
        }
    }
}

impl std::error::Error for PatternError {}

/// A pattern error together with the definition or rule it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    InDefinition {
        name: String,
        source: PatternError,
    },
    InRule {
        rule: usize,
        pattern: String,
        source: PatternError,
    },
    EmptyRuleSet,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::InDefinition { name, source } => {
                write!(f, "{} (in definition {})", source, name)
            }
            CompileError::InRule {
                rule,
                pattern,
                source,
            } => write!(f, "{} (in rule {}: {})", source, rule + 1, pattern),
            CompileError::EmptyRuleSet => {
                write!(f, "Error: The specification does not contain any rules!")
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::InDefinition { source, .. } | CompileError::InRule { source, .. } => {
                Some(source)
            }
            CompileError::EmptyRuleSet => None,
        }
    }
}

enum Mode {
    Normal,
    Quoted,
    Bracket { complement: bool, members: Vec<u8> },
}

/// Emit `( c1 | c2 | ... | cn )` for the given characters.
fn union_group<I: IntoIterator<Item = u8>>(chars: I) -> Vec<Symbol> {
    let mut group = vec![Symbol::operator(Operator::LParen)];
    for (idx, ch) in chars.into_iter().enumerate() {
        if idx > 0 {
            group.push(Symbol::operator(Operator::Union));
        }
        group.push(Symbol::operand(ch));
    }
    group.push(Symbol::operator(Operator::RParen));
    group
}

// Reads one class member starting at pos, returns it with the number of bytes consumed
fn read_class_char(pattern: &str, pos: usize) -> Result<(u8, usize), PatternError> {
    let bytes = pattern.as_bytes();
    match bytes.get(pos) {
        Some(b'\\') => match bytes.get(pos + 1) {
            Some(next) => Ok((unescape(*next), 2)),
            None => Err(PatternError::UnterminatedCharacterClass(pattern.to_string())),
        },
        Some(ch) => Ok((*ch, 1)),
        None => Err(PatternError::UnterminatedCharacterClass(pattern.to_string())),
    }
}

fn close_class(pattern: &str, complement: bool, members: &[u8]) -> Result<Vec<Symbol>, PatternError> {
    let chars: Vec<u8> = if complement {
        let mut allowed = [true; ALPHABET_SIZE];
        for member in members {
            allowed[*member as usize] = false;
        }
        (0..ALPHABET_SIZE as u8)
            .filter(|ch| allowed[*ch as usize])
            .collect()
    } else {
        members.to_vec()
    };

    if chars.is_empty() {
        return Err(PatternError::EmptyCharacterClass(pattern.to_string()));
    }
    Ok(union_group(chars))
}

/// Expand quotes, bracket classes and escapes of a raw pattern into a tagged sequence. Unescaped
/// must-escape characters become operators, `{name}` references are left as brace operators for
/// [`Definitions::expand`].
pub fn preprocess(pattern: &str) -> Result<Vec<Symbol>, PatternError> {
    if let Some(ch) = pattern.chars().find(|ch| !ch.is_ascii()) {
        return Err(PatternError::NonAsciiCharacter(ch));
    }

    let bytes = pattern.as_bytes();
    let mut result = Vec::new();
    let mut mode = Mode::Normal;
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        match &mut mode {
            Mode::Normal => match ch {
                b'"' => mode = Mode::Quoted,
                b'[' => {
                    let complement = bytes.get(pos + 1) == Some(&b'^');
                    if complement {
                        pos += 1;
                    }
                    mode = Mode::Bracket {
                        complement,
                        members: Vec::new(),
                    };
                }
                b'\\' => {
                    let next = bytes
                        .get(pos + 1)
                        .ok_or_else(|| PatternError::DanglingEscape(pattern.to_string()))?;
                    result.push(Symbol::operand(unescape(*next)));
                    pos += 1;
                }
                _ => match Operator::from_char(ch) {
                    Some(op) => result.push(Symbol::operator(op)),
                    None => result.push(Symbol::operand(ch)),
                },
            },
            Mode::Quoted => match ch {
                b'"' => mode = Mode::Normal,
                b'\\' => {
                    let next = bytes
                        .get(pos + 1)
                        .ok_or_else(|| PatternError::UnterminatedQuote(pattern.to_string()))?;
                    result.push(Symbol::operand(unescape(*next)));
                    pos += 1;
                }
                _ => result.push(Symbol::operand(ch)),
            },
            Mode::Bracket {
                complement,
                members,
            } => match ch {
                b']' => {
                    result.extend(close_class(pattern, *complement, members)?);
                    mode = Mode::Normal;
                }
                b'-' if !members.is_empty()
                    && pos + 1 < bytes.len()
                    && bytes[pos + 1] != b']' =>
                {
                    // Range from the previous member up to the next character
                    let start = members[members.len() - 1];
                    let (end, consumed) = read_class_char(pattern, pos + 1)?;
                    if end < start {
                        return Err(PatternError::InvalidCharacterRange(
                            start as char,
                            end as char,
                        ));
                    }
                    members.extend((start..=end).skip(1));
                    pos += consumed;
                }
                _ => {
                    let (member, consumed) = read_class_char(pattern, pos)?;
                    members.push(member);
                    pos += consumed - 1;
                }
            },
        }
        pos += 1;
    }

    match mode {
        Mode::Normal => Ok(result),
        Mode::Quoted => Err(PatternError::UnterminatedQuote(pattern.to_string())),
        Mode::Bracket { .. } => Err(PatternError::UnterminatedCharacterClass(
            pattern.to_string(),
        )),
    }
}

/// Replace every `.` operator by a union over the alphabet without the newline.
pub fn expand_dot(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut result = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if symbol.is_op(Operator::Dot) {
            result.extend(union_group(
                (0..ALPHABET_SIZE as u8).filter(|ch| *ch != b'\n'),
            ));
        } else {
            result.push(*symbol);
        }
    }
    result
}

/// Named regular definitions, expanded once in declaration order and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct Definitions {
    map: HashMap<String, Vec<Symbol>>,
}

impl Definitions {
    /// Resolve `(name, pattern)` pairs in order. A definition may only reference definitions
    /// declared before it.
    pub fn resolve(definitions: &[(String, String)]) -> Result<Definitions, CompileError> {
        let mut resolved = Definitions::default();

        for (name, pattern) in definitions {
            let in_definition = |source| CompileError::InDefinition {
                name: name.to_string(),
                source,
            };

            if resolved.map.contains_key(name) {
                return Err(in_definition(PatternError::DuplicateDefinition(
                    name.to_string(),
                )));
            }

            let symbols = preprocess(pattern)
                .and_then(|symbols| resolved.expand(&symbols))
                .map_err(in_definition)?;

            debug!("definition {} => {}", name, display_sequence(&symbols));
            resolved.map.insert(name.to_string(), symbols);
        }

        Ok(resolved)
    }

    pub fn get(&self, name: &str) -> Option<&[Symbol]> {
        self.map.get(name).map(|symbols| symbols.as_slice())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Substitute every `{name}` reference by `( expansion )`.
    pub fn expand(&self, symbols: &[Symbol]) -> Result<Vec<Symbol>, PatternError> {
        let mut result = Vec::with_capacity(symbols.len());
        let mut iter = symbols.iter();

        while let Some(symbol) = iter.next() {
            if !symbol.is_op(Operator::LBrace) {
                result.push(*symbol);
                continue;
            }

            let mut name = String::new();
            let mut closed = false;
            for inner in iter.by_ref() {
                if inner.is_op(Operator::RBrace) {
                    closed = true;
                    break;
                }
                name.push(inner.code() as char);
            }

            if !closed {
                return Err(PatternError::UnterminatedDefinitionReference(name));
            }

            let expansion = self
                .get(&name)
                .ok_or(PatternError::UndefinedDefinition(name.clone()))?;

            result.push(Symbol::operator(Operator::LParen));
            result.extend_from_slice(expansion);
            result.push(Symbol::operator(Operator::RParen));
        }

        Ok(result)
    }
}
