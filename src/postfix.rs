/* Infix to postfix conversion of preprocessed patterns. Juxtaposition is made explicit with the
 * concatenation operator and the sequence is then reordered with the shunting-yard algorithm.
 *
 * Priorities: * + ? (7) > & (5) > | (3) */

use crate::regex::{expand_dot, preprocess, CompileError, Definitions, PatternError};
use crate::symbol::{display_sequence, Operator, Symbol};
use color_eyre::eyre::{Report, Result};
use log::debug;

/// A rule whose pattern has been compiled down to a postfix sequence.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub pattern: String,
    pub postfix: Vec<Symbol>,
    pub action: String,
}

// A symbol after which an operand can follow directly
fn is_completable(symbol: &Symbol) -> bool {
    match symbol {
        Symbol::Operand(_) => true,
        Symbol::Operator(op) => *op == Operator::RParen || op.is_postfix_unary(),
    }
}

fn starts_operand(symbol: &Symbol) -> bool {
    matches!(symbol, Symbol::Operand(_)) || symbol.is_op(Operator::LParen)
}

/// Insert an explicit concatenation operator wherever two symbols are juxtaposed.
pub fn insert_concatenation(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut result = Vec::with_capacity(symbols.len() * 2);
    let mut prev: Option<&Symbol> = None;

    for symbol in symbols {
        if let Some(prev) = prev {
            if is_completable(prev) && starts_operand(symbol) {
                result.push(Symbol::operator(Operator::Concat));
            }
        }
        result.push(*symbol);
        prev = Some(symbol);
    }
    result
}

/// Convert an infix sequence with explicit concatenation to postfix. Parentheses have to balance
/// and only the regex operators may appear.
pub fn to_postfix(infix: &[Symbol]) -> Result<Vec<Symbol>, PatternError> {
    let mut result = Vec::with_capacity(infix.len());
    let mut stack: Vec<Operator> = Vec::new();

    for symbol in infix {
        let op = match symbol {
            Symbol::Operand(_) => {
                result.push(*symbol);
                continue;
            }
            Symbol::Operator(op) => *op,
        };

        match op {
            Operator::LParen => stack.push(op),
            Operator::RParen => loop {
                match stack.pop() {
                    Some(Operator::LParen) => break,
                    Some(top) => result.push(Symbol::operator(top)),
                    None => {
                        return Err(PatternError::UnbalancedParenthesis(display_sequence(infix)))
                    }
                }
            },
            _ => {
                let priority = op
                    .priority()
                    .ok_or(PatternError::UnsupportedOperator(op.to_char() as char))?;

                while let Some(top) = stack.last() {
                    match top.priority() {
                        Some(top_priority) if priority <= top_priority => {
                            result.push(Symbol::operator(*top));
                            stack.pop();
                        }
                        _ => break,
                    }
                }
                stack.push(op);
            }
        }
    }

    while let Some(top) = stack.pop() {
        if top == Operator::LParen {
            return Err(PatternError::UnbalancedParenthesis(display_sequence(infix)));
        }
        result.push(Symbol::operator(top));
    }

    Ok(result)
}

/// Run one raw pattern through every preprocessing stage down to its postfix form.
pub fn compile_pattern(pattern: &str, definitions: &Definitions) -> Result<Vec<Symbol>, PatternError> {
    let symbols = preprocess(pattern)?;
    let symbols = definitions.expand(&symbols)?;
    let symbols = expand_dot(&symbols);
    let infix = insert_concatenation(&symbols);
    let postfix = to_postfix(&infix)?;

    if postfix.is_empty() {
        return Err(PatternError::EmptyPattern);
    }
    Ok(postfix)
}

/// Resolve the definitions and compile every rule pattern in declaration order. The rule order is
/// kept, it decides the priority between rules matching the same text.
pub fn parse_rule_list(
    definitions: &[(String, String)],
    rules: &[(String, String)],
) -> Result<Vec<Pattern>> {
    if rules.is_empty() {
        return Err(Report::new(CompileError::EmptyRuleSet));
    }

    let definitions = Definitions::resolve(definitions).map_err(Report::new)?;

    let mut pattern_list = Vec::with_capacity(rules.len());

    for (rule, (pattern, action)) in rules.iter().enumerate() {
        let postfix = match compile_pattern(pattern, &definitions) {
            Ok(postfix) => postfix,
            Err(source) => {
                let err = CompileError::InRule {
                    rule,
                    pattern: pattern.to_string(),
                    source,
                };
                return Err(Report::new(err));
            }
        };

        debug!("rule {} postfix: {}", rule, display_sequence(&postfix));

        pattern_list.push(Pattern {
            pattern: pattern.to_string(),
            postfix,
            action: action.to_string(),
        });
    }

    Ok(pattern_list)
}

#[cfg(test)]
mod postfix_tests {
    use super::*;

    // Render a postfix sequence as plain text, operators are written as their characters
    fn render(symbols: &[Symbol]) -> String {
        symbols.iter().map(|symbol| symbol.code() as char).collect()
    }

    fn postfix_of(pattern: &str) -> String {
        render(&compile_pattern(pattern, &Definitions::default()).unwrap())
    }

    #[test]
    fn test_insert_concatenation() {
        let symbols = preprocess("ab(c)*d?e").unwrap();
        assert_eq!(render(&insert_concatenation(&symbols)), "a&b&(c)*&d?&e");
    }

    #[test]
    fn test_no_concatenation_around_union() {
        let symbols = preprocess("a|b").unwrap();
        assert_eq!(render(&insert_concatenation(&symbols)), "a|b");
    }

    #[test]
    fn test_simple_postfix() {
        assert_eq!(postfix_of("ab"), "ab&");
        assert_eq!(postfix_of("a|b"), "ab|");
        assert_eq!(postfix_of("a*"), "a*");
    }

    #[test]
    fn test_precedence() {
        assert_eq!(postfix_of("ab|c"), "ab&c|");
        assert_eq!(postfix_of("a|bc"), "abc&|");
        assert_eq!(postfix_of("ab*"), "ab*&");
        assert_eq!(postfix_of("(a|b)*c"), "ab|*c&");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(postfix_of("abc"), "ab&c&");
        assert_eq!(postfix_of("a|b|c"), "ab|c|");
    }

    #[test]
    fn test_stacked_quantifiers() {
        assert_eq!(postfix_of("a*?"), "a*?");
    }

    #[test]
    fn test_unmatched_closing_paren() {
        match compile_pattern("a)b", &Definitions::default()) {
            Err(PatternError::UnbalancedParenthesis(_)) => {}
            result => panic!("Expected UnbalancedParenthesis, got {:?}", result),
        }
    }

    #[test]
    fn test_unmatched_opening_paren() {
        match compile_pattern("(ab", &Definitions::default()) {
            Err(PatternError::UnbalancedParenthesis(_)) => {}
            result => panic!("Expected UnbalancedParenthesis, got {:?}", result),
        }
    }

    #[test]
    fn test_unsupported_operator() {
        let result = compile_pattern("^abc", &Definitions::default());
        assert_eq!(result, Err(PatternError::UnsupportedOperator('^')));

        let result = compile_pattern("ab/c", &Definitions::default());
        assert_eq!(result, Err(PatternError::UnsupportedOperator('/')));
    }

    #[test]
    fn test_empty_pattern() {
        let result = compile_pattern("", &Definitions::default());
        assert_eq!(result, Err(PatternError::EmptyPattern));
    }

    #[test]
    fn test_empty_rule_set() {
        let result = parse_rule_list(&[], &[]);
        match result.unwrap_err().downcast_ref::<CompileError>() {
            Some(CompileError::EmptyRuleSet) => {}
            err => panic!("Expected EmptyRuleSet, got {:?}", err),
        }
    }

    #[test]
    fn test_rule_error_names_rule() {
        let rules = vec![
            ("a".to_string(), "A".to_string()),
            ("{UNKNOWN}".to_string(), "B".to_string()),
        ];
        let result = parse_rule_list(&[], &rules);
        match result.unwrap_err().downcast_ref::<CompileError>() {
            Some(CompileError::InRule {
                rule,
                source: PatternError::UndefinedDefinition(name),
                ..
            }) => {
                assert_eq!(*rule, 1);
                assert_eq!(name, "UNKNOWN");
            }
            err => panic!("Expected undefined definition in rule 1, got {:?}", err),
        }
    }

    #[test]
    fn test_parse_rule_list_keeps_order() {
        let definitions = vec![("D".to_string(), "[0-9]".to_string())];
        let rules = vec![
            ("{D}+".to_string(), "NUMBER".to_string()),
            ("x".to_string(), "X".to_string()),
        ];
        let pattern_list = parse_rule_list(&definitions, &rules).unwrap();
        assert_eq!(pattern_list.len(), 2);
        assert_eq!(pattern_list[0].action, "NUMBER");
        assert_eq!(pattern_list[1].pattern, "x");
        assert_eq!(render(&pattern_list[1].postfix), "x");
    }
}
