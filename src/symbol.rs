/* The tagged alphabet shared by every stage of pattern compilation. A pattern symbol is either
 * an operand, a literal 7 bit character, or one of the regex operators. */

use std::fmt;

/// Number of characters in the scanner alphabet (7 bit ASCII).
pub const ALPHABET_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    LParen,
    RParen,
    Union,
    Concat,
    Star,
    Plus,
    Question,
    LBrace,
    RBrace,
    Dot,
    Backslash,
    Quote,
    Caret,
    Dollar,
    LBracket,
    RBracket,
    Slash,
}

impl Operator {
    /// Map a character of the must-escape set onto its operator. The concatenation operator is
    /// never written by users, so '&' does not map to it.
    pub fn from_char(ch: u8) -> Option<Operator> {
        let op = match ch {
            b'(' => Operator::LParen,
            b')' => Operator::RParen,
            b'|' => Operator::Union,
            b'*' => Operator::Star,
            b'+' => Operator::Plus,
            b'?' => Operator::Question,
            b'{' => Operator::LBrace,
            b'}' => Operator::RBrace,
            b'.' => Operator::Dot,
            b'\\' => Operator::Backslash,
            b'"' => Operator::Quote,
            b'^' => Operator::Caret,
            b'$' => Operator::Dollar,
            b'[' => Operator::LBracket,
            b']' => Operator::RBracket,
            b'/' => Operator::Slash,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_char(self) -> u8 {
        match self {
            Operator::LParen => b'(',
            Operator::RParen => b')',
            Operator::Union => b'|',
            Operator::Concat => b'&',
            Operator::Star => b'*',
            Operator::Plus => b'+',
            Operator::Question => b'?',
            Operator::LBrace => b'{',
            Operator::RBrace => b'}',
            Operator::Dot => b'.',
            Operator::Backslash => b'\\',
            Operator::Quote => b'"',
            Operator::Caret => b'^',
            Operator::Dollar => b'$',
            Operator::LBracket => b'[',
            Operator::RBracket => b']',
            Operator::Slash => b'/',
        }
    }

    /// Binding strength used by the postfix conversion. Only the operators that survive to the
    /// postfix stage have a priority.
    pub fn priority(self) -> Option<u8> {
        match self {
            Operator::Star | Operator::Plus | Operator::Question => Some(7),
            Operator::Concat => Some(5),
            Operator::Union => Some(3),
            _ => None,
        }
    }

    pub fn is_postfix_unary(self) -> bool {
        matches!(self, Operator::Star | Operator::Plus | Operator::Question)
    }
}

/// Characters which have to be escaped to be matched literally outside of quotes and classes.
pub fn need_escape(ch: u8) -> bool {
    Operator::from_char(ch).is_some()
}

/// Translate the letter following a backslash into the character it stands for. Control
/// letters become control characters, everything else stands for itself.
pub fn unescape(ch: u8) -> u8 {
    match ch {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Operand(u8),
    Operator(Operator),
}

impl Symbol {
    pub fn operand(ch: u8) -> Symbol {
        Symbol::Operand(ch & 0x7f)
    }

    pub fn operator(op: Operator) -> Symbol {
        Symbol::Operator(op)
    }

    /// The character code carried by the symbol, without its tag.
    pub fn code(&self) -> u8 {
        match self {
            Symbol::Operand(ch) => *ch,
            Symbol::Operator(op) => op.to_char(),
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Symbol::Operator(_))
    }

    pub fn is_op(&self, op: Operator) -> bool {
        *self == Symbol::Operator(op)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Operand(ch) if need_escape(*ch) => write!(f, "\\{}", *ch as char),
            Symbol::Operand(ch) => write!(f, "{}", crate::fa::display_char(*ch)),
            Symbol::Operator(op) => write!(f, "<{}>", op.to_char() as char),
        }
    }
}

/// Render a tagged sequence for log output, operators are wrapped in angle brackets.
pub fn display_sequence(symbols: &[Symbol]) -> String {
    symbols.iter().map(|symbol| symbol.to_string()).collect()
}

#[cfg(test)]
mod symbol_tests {
    use super::*;

    #[test]
    fn test_tag_untag_keeps_code() {
        for ch in 0..ALPHABET_SIZE as u8 {
            assert_eq!(Symbol::operand(ch).code(), ch);
            if let Some(op) = Operator::from_char(ch) {
                assert_eq!(Symbol::operator(op).code(), ch);
                assert!(Symbol::operator(op).is_operator());
            }
            assert!(!Symbol::operand(ch).is_operator());
        }
    }

    #[test]
    fn test_must_escape_set() {
        for ch in b"\\\".^$[]*+?{}|/()".iter() {
            assert!(need_escape(*ch), "{} should need escaping", *ch as char);
        }
        assert!(!need_escape(b'a'));
        assert!(!need_escape(b'&'));
        assert!(!need_escape(b'-'));
    }

    #[test]
    fn test_concat_has_no_source_char() {
        assert_eq!(Operator::from_char(b'&'), None);
        assert_eq!(Operator::Concat.to_char(), b'&');
    }

    #[test]
    fn test_priorities() {
        assert!(Operator::Star.priority() > Operator::Concat.priority());
        assert!(Operator::Concat.priority() > Operator::Union.priority());
        assert_eq!(Operator::Plus.priority(), Operator::Question.priority());
        assert_eq!(Operator::LParen.priority(), None);
        assert_eq!(Operator::Caret.priority(), None);
    }

    #[test]
    fn test_display_sequence() {
        let symbols = vec![
            Symbol::operator(Operator::LParen),
            Symbol::operand(b'*'),
            Symbol::operator(Operator::Star),
            Symbol::operand(b'\n'),
        ];
        assert_eq!(display_sequence(&symbols), "<(>\\*<*>\\n");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(b'n'), b'\n');
        assert_eq!(unescape(b't'), b'\t');
        assert_eq!(unescape(b'v'), 0x0b);
        assert_eq!(unescape(b'a'), 0x07);
        assert_eq!(unescape(b'q'), b'q');
        assert_eq!(unescape(b'.'), b'.');
    }
}
