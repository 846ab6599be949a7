/* Thompson construction over postfix patterns. Every combinator is a pure function from fragments
 * to a new fragment; a fragment starts in state 0, which has no incoming edges, and accepts in its
 * last state, which has no outgoing edges. The per-rule fragments are finally merged into a
 * single NFA whose accept states are tagged with their rule index. */

use bitvec::prelude::*;
use color_eyre::eyre::{Report, Result};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::fa::{Label, FA};
use crate::postfix::Pattern;
use crate::regex::{CompileError, PatternError};
use crate::symbol::{Operator, Symbol};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NFAState {
    transitions: HashMap<Label, HashSet<usize>>,
}

impl NFAState {
    fn new() -> Self {
        NFAState::default()
    }

    fn add_transition(&mut self, label: Label, to: usize) {
        self.transitions.entry(label).or_default().insert(to);
    }

    pub fn get_transitions(&self) -> &HashMap<Label, HashSet<usize>> {
        &self.transitions
    }

    // Copy of the state with every target renumbered
    fn renumbered<F: Fn(usize) -> usize>(&self, map: F) -> NFAState {
        let transitions = self
            .transitions
            .iter()
            .map(|(label, targets)| (*label, targets.iter().map(|target| map(*target)).collect()))
            .collect();
        NFAState { transitions }
    }

    fn merge_from(&mut self, other: NFAState) {
        for (label, targets) in other.transitions {
            self.transitions.entry(label).or_default().extend(targets);
        }
    }

    fn sorted_transitions(&self) -> Vec<(Label, usize)> {
        let mut transition_list: Vec<(Label, usize)> = self
            .transitions
            .iter()
            .flat_map(|(label, targets)| targets.iter().map(move |target| (*label, *target)))
            .collect();
        transition_list.sort_unstable();
        transition_list
    }
}

/// The NFA of one pattern. Start state is 0 and the only accept state is the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    states: Vec<NFAState>,
}

impl Fragment {
    /// `0 --ch--> 1`
    pub fn literal(ch: u8) -> Fragment {
        let mut states = vec![NFAState::new(), NFAState::new()];
        states[0].add_transition(Label::Char(ch), 1);
        Fragment { states }
    }

    pub fn get_num_states(&self) -> usize {
        self.states.len()
    }

    pub fn get_accept_state(&self) -> usize {
        self.states.len() - 1
    }

    pub fn get_state_transitions(&self, state_id: usize) -> Vec<(Label, usize)> {
        self.states[state_id].sorted_transitions()
    }

    /// Both starts are fused into state 0 and both accepts into the last state. The lhs keeps its
    /// numbering, the rhs states other than its start follow it.
    pub fn union(lhs: &Fragment, rhs: &Fragment) -> Fragment {
        let x = lhs.states.len();
        let y = rhs.states.len();
        let merged_accept = x + y - 3;

        let lhs_map = |state: usize| if state == x - 1 { merged_accept } else { state };
        let rhs_map = |state: usize| if state == 0 { 0 } else { state + x - 2 };

        let mut states: Vec<NFAState> = lhs.states[..x - 1]
            .iter()
            .map(|state| state.renumbered(lhs_map))
            .collect();

        states[0].merge_from(rhs.states[0].renumbered(rhs_map));

        for state in &rhs.states[1..] {
            states.push(state.renumbered(rhs_map));
        }

        Fragment { states }
    }

    /// The rhs start takes the place of the lhs accept.
    pub fn concat(lhs: &Fragment, rhs: &Fragment) -> Fragment {
        let offset = lhs.states.len() - 1;

        let mut states: Vec<NFAState> = lhs.states[..offset].to_vec();
        for state in &rhs.states {
            states.push(state.renumbered(|target| target + offset));
        }

        Fragment { states }
    }

    /// Kleene closure with a fresh start and a fresh accept.
    pub fn star(fragment: &Fragment) -> Fragment {
        let n = fragment.states.len();
        let new_accept = n + 1;

        let mut states = vec![NFAState::new()];
        for state in &fragment.states {
            states.push(state.renumbered(|target| target + 1));
        }
        states.push(NFAState::new());

        states[0].add_transition(Label::Epsilon, 1);
        states[0].add_transition(Label::Epsilon, new_accept);
        states[n].add_transition(Label::Epsilon, 1);
        states[n].add_transition(Label::Epsilon, new_accept);

        Fragment { states }
    }

    /// One or more, built as the fragment followed by the closure of a copy of itself.
    pub fn plus(fragment: &Fragment) -> Fragment {
        Fragment::concat(fragment, &Fragment::star(fragment))
    }

    pub fn optional(fragment: &Fragment) -> Fragment {
        let mut result = fragment.clone();
        let accept = result.get_accept_state();
        result.states[0].add_transition(Label::Epsilon, accept);
        result
    }
}

fn pop_operand(stack: &mut Vec<Fragment>, op: Operator) -> Result<Fragment, PatternError> {
    stack
        .pop()
        .ok_or(PatternError::MissingOperand(op.to_char() as char))
}

/// Evaluate a postfix pattern with a stack of fragments.
pub fn build_fragment(postfix: &[Symbol]) -> Result<Fragment, PatternError> {
    let mut stack: Vec<Fragment> = Vec::new();

    for symbol in postfix {
        let op = match symbol {
            Symbol::Operand(ch) => {
                stack.push(Fragment::literal(*ch));
                continue;
            }
            Symbol::Operator(op) => *op,
        };

        let fragment = match op {
            Operator::Union | Operator::Concat => {
                let rhs = pop_operand(&mut stack, op)?;
                let lhs = pop_operand(&mut stack, op)?;
                if op == Operator::Union {
                    Fragment::union(&lhs, &rhs)
                } else {
                    Fragment::concat(&lhs, &rhs)
                }
            }
            Operator::Star => Fragment::star(&pop_operand(&mut stack, op)?),
            Operator::Plus => Fragment::plus(&pop_operand(&mut stack, op)?),
            Operator::Question => Fragment::optional(&pop_operand(&mut stack, op)?),
            _ => return Err(PatternError::UnsupportedOperator(op.to_char() as char)),
        };
        stack.push(fragment);
    }

    match stack.len() {
        0 => Err(PatternError::EmptyPattern),
        1 => Ok(stack.remove(0)),
        count => Err(PatternError::UnusedOperands(count - 1)),
    }
}

#[derive(Debug, Clone)]
pub struct NFA {
    states: Vec<NFAState>,
    start_state: usize,
    accept_states: BitVec<u8>,
    accept_rules: Vec<Option<usize>>,
    alphabet: BTreeSet<u8>,
}

impl FA for NFA {
    fn get_num_states(&self) -> usize {
        self.states.len()
    }

    fn get_start_state(&self) -> usize {
        self.start_state
    }

    fn get_acceptor_states(&self) -> &BitVec<u8> {
        &self.accept_states
    }

    fn get_accept_rule(&self, state_id: usize) -> Option<usize> {
        self.accept_rules[state_id]
    }

    fn get_state_transitions(&self, state_id: usize) -> Vec<(Label, usize)> {
        self.states[state_id].sorted_transitions()
    }
}

impl NFA {
    /// Join the fragments under a fresh start state, rule `i` being the `i`th fragment.
    pub fn merge(fragments: &[Fragment]) -> NFA {
        let mut states = vec![NFAState::new()];
        let mut accept_rules = vec![None];

        for (rule, fragment) in fragments.iter().enumerate() {
            let offset = states.len();
            states[0].add_transition(Label::Epsilon, offset);

            for state in &fragment.states {
                states.push(state.renumbered(|target| target + offset));
                accept_rules.push(None);
            }

            accept_rules[offset + fragment.get_accept_state()] = Some(rule);
        }

        let mut accept_states: BitVec<u8> = BitVec::repeat(false, states.len());
        for (state_id, rule) in accept_rules.iter().enumerate() {
            if rule.is_some() {
                accept_states.set(state_id, true);
            }
        }

        let alphabet = states
            .iter()
            .flat_map(|state| state.transitions.keys())
            .filter_map(|label| match label {
                Label::Char(ch) => Some(*ch),
                Label::Epsilon => None,
            })
            .collect();

        NFA {
            states,
            start_state: 0,
            accept_states,
            accept_rules,
            alphabet,
        }
    }

    pub fn get_state(&self, id: usize) -> Option<&NFAState> {
        self.states.get(id)
    }

    /// Characters which label at least one edge, ascending.
    pub fn get_alphabet(&self) -> &BTreeSet<u8> {
        &self.alphabet
    }

    /// Every state reachable from the given set through epsilon edges only, the set included.
    pub fn epsilon_closure(&self, nfa_states: &BitVec<u8>) -> BitVec<u8> {
        let mut closure = nfa_states.clone();
        closure.resize(self.states.len(), false);

        let mut work_list: VecDeque<usize> = closure.iter_ones().collect();

        while let Some(state) = work_list.pop_front() {
            let targets = match self.states[state].transitions.get(&Label::Epsilon) {
                Some(targets) => targets,
                None => continue,
            };

            for target in targets {
                if !closure[*target] {
                    closure.set(*target, true);
                    work_list.push_back(*target);
                }
            }
        }

        closure
    }

    /// States reached by one `ch` edge from the epsilon closure of the set.
    pub fn move_on(&self, nfa_states: &BitVec<u8>, ch: u8) -> BitVec<u8> {
        let closure = self.epsilon_closure(nfa_states);
        let mut result: BitVec<u8> = BitVec::repeat(false, self.states.len());

        for state in closure.iter_ones() {
            if let Some(targets) = self.states[state].transitions.get(&Label::Char(ch)) {
                for target in targets {
                    result.set(*target, true);
                }
            }
        }
        result
    }

    /// Lowest rule index among the accept states in the set.
    pub fn accept_rule_of(&self, nfa_states: &BitVec<u8>) -> Option<usize> {
        nfa_states
            .iter_ones()
            .filter_map(|state| self.accept_rules.get(state).copied().flatten())
            .min()
    }

    /// Rule matching the whole input, if any.
    pub fn accepts(&self, input: &str) -> Option<usize> {
        let mut current: BitVec<u8> = BitVec::repeat(false, self.states.len());
        current.set(self.start_state, true);

        for ch in input.bytes() {
            current = self.move_on(&current, ch);
            if current.not_any() {
                return None;
            }
        }

        self.accept_rule_of(&self.epsilon_closure(&current))
    }
}

/// Build the merged NFA of an ordered rule list.
pub fn construct_nfa(pattern_list: &[Pattern]) -> Result<NFA> {
    let mut fragments = Vec::with_capacity(pattern_list.len());

    for (rule, pattern) in pattern_list.iter().enumerate() {
        let fragment = build_fragment(&pattern.postfix).map_err(|source| {
            Report::new(CompileError::InRule {
                rule,
                pattern: pattern.pattern.to_string(),
                source,
            })
        })?;

        debug!(
            "rule {} fragment has {} states",
            rule,
            fragment.get_num_states()
        );
        fragments.push(fragment);
    }

    let nfa = NFA::merge(&fragments);

    info!(
        "NFA constructed with {} states for {} rules",
        nfa.get_num_states(),
        fragments.len()
    );

    Ok(nfa)
}

#[cfg(test)]
mod nfa_tests {
    use super::*;
    use crate::postfix::{compile_pattern, parse_rule_list};
    use crate::regex::Definitions;

    fn fragment_of(pattern: &str) -> Fragment {
        let postfix = compile_pattern(pattern, &Definitions::default()).unwrap();
        build_fragment(&postfix).unwrap()
    }

    fn nfa_of(patterns: &[&str]) -> NFA {
        let rules: Vec<(String, String)> = patterns
            .iter()
            .map(|pattern| (pattern.to_string(), String::new()))
            .collect();
        construct_nfa(&parse_rule_list(&[], &rules).unwrap()).unwrap()
    }

    // Start has no incoming edges and the accept has no outgoing edges
    fn assert_fragment_shape(fragment: &Fragment) {
        let accept = fragment.get_accept_state();
        assert!(fragment.get_state_transitions(accept).is_empty());
        for state in 0..fragment.get_num_states() {
            for (_, target) in fragment.get_state_transitions(state) {
                assert_ne!(target, 0);
                assert!(target < fragment.get_num_states());
            }
        }
    }

    #[test]
    fn test_literal() {
        let fragment = Fragment::literal(b'a');
        assert_eq!(fragment.get_num_states(), 2);
        assert_eq!(
            fragment.get_state_transitions(0),
            vec![(Label::Char(b'a'), 1)]
        );
        assert_fragment_shape(&fragment);
    }

    #[test]
    fn test_union_shares_start_and_accept() {
        let fragment = Fragment::union(&Fragment::literal(b'a'), &Fragment::literal(b'b'));
        assert_eq!(fragment.get_num_states(), 2);
        assert_eq!(
            fragment.get_state_transitions(0),
            vec![(Label::Char(b'a'), 1), (Label::Char(b'b'), 1)]
        );
        assert_fragment_shape(&fragment);
    }

    #[test]
    fn test_union_state_count() {
        let lhs = fragment_of("ab");
        let rhs = fragment_of("cde");
        let fragment = Fragment::union(&lhs, &rhs);
        assert_eq!(
            fragment.get_num_states(),
            lhs.get_num_states() + rhs.get_num_states() - 2
        );
        assert_fragment_shape(&fragment);
    }

    #[test]
    fn test_concat() {
        let fragment = Fragment::concat(&Fragment::literal(b'a'), &Fragment::literal(b'b'));
        assert_eq!(fragment.get_num_states(), 3);
        assert_eq!(
            fragment.get_state_transitions(1),
            vec![(Label::Char(b'b'), 2)]
        );
        assert_fragment_shape(&fragment);
    }

    #[test]
    fn test_star() {
        let fragment = Fragment::star(&Fragment::literal(b'a'));
        assert_eq!(fragment.get_num_states(), 4);
        assert_eq!(
            fragment.get_state_transitions(0),
            vec![(Label::Epsilon, 1), (Label::Epsilon, 3)]
        );
        assert_eq!(
            fragment.get_state_transitions(2),
            vec![(Label::Epsilon, 1), (Label::Epsilon, 3)]
        );
        assert_fragment_shape(&fragment);
    }

    #[test]
    fn test_plus_and_optional_keep_shape() {
        assert_fragment_shape(&Fragment::plus(&fragment_of("a|b")));
        assert_fragment_shape(&Fragment::optional(&fragment_of("ab")));
        assert_fragment_shape(&fragment_of("(a|b)*c?(de)+"));
    }

    #[test]
    fn test_combinators_are_pure() {
        let literal = Fragment::literal(b'x');
        let copy = literal.clone();
        let _ = Fragment::star(&literal);
        let _ = Fragment::union(&literal, &literal);
        assert_eq!(literal, copy);
    }

    #[test]
    fn test_missing_operand() {
        let postfix = vec![Symbol::operand(b'a'), Symbol::operator(Operator::Union)];
        assert_eq!(
            build_fragment(&postfix),
            Err(PatternError::MissingOperand('|'))
        );

        let postfix = vec![Symbol::operator(Operator::Star)];
        assert_eq!(
            build_fragment(&postfix),
            Err(PatternError::MissingOperand('*'))
        );
    }

    #[test]
    fn test_leftover_operands() {
        let postfix = vec![Symbol::operand(b'a'), Symbol::operand(b'b')];
        assert_eq!(build_fragment(&postfix), Err(PatternError::UnusedOperands(1)));
    }

    #[test]
    fn test_empty_postfix() {
        assert_eq!(build_fragment(&[]), Err(PatternError::EmptyPattern));
    }

    #[test]
    fn test_merge_tags_rules() {
        let nfa = nfa_of(&["a", "bc"]);
        assert_eq!(nfa.get_num_states(), 1 + 2 + 3);
        assert_eq!(
            nfa.get_state_transitions(0),
            vec![(Label::Epsilon, 1), (Label::Epsilon, 3)]
        );
        assert_eq!(nfa.get_accept_rule(2), Some(0));
        assert_eq!(nfa.get_accept_rule(5), Some(1));
        assert_eq!(nfa.get_acceptor_states().count_ones(), 2);
        assert_eq!(
            nfa.get_alphabet().iter().copied().collect::<Vec<u8>>(),
            vec![b'a', b'b', b'c']
        );
    }

    #[test]
    fn test_epsilon_closure() {
        let nfa = nfa_of(&["a*"]);
        let mut start: BitVec<u8> = BitVec::repeat(false, nfa.get_num_states());
        start.set(0, true);
        let closure = nfa.epsilon_closure(&start);
        // merged start, star start, old start and star accept
        assert_eq!(closure.iter_ones().collect::<Vec<usize>>(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_accepts() {
        let nfa = nfa_of(&["(a|b)*abb", "a+"]);
        assert_eq!(nfa.accepts("abb"), Some(0));
        assert_eq!(nfa.accepts("babaabb"), Some(0));
        assert_eq!(nfa.accepts("aaa"), Some(1));
        assert_eq!(nfa.accepts("ab"), None);
        assert_eq!(nfa.accepts(""), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let nfa = nfa_of(&["if", "[a-z]+"]);
        assert_eq!(nfa.accepts("if"), Some(0));
        assert_eq!(nfa.accepts("iffy"), Some(1));
    }

    #[test]
    fn test_optional() {
        let nfa = nfa_of(&["colou?r"]);
        assert_eq!(nfa.accepts("color"), Some(0));
        assert_eq!(nfa.accepts("colour"), Some(0));
        assert_eq!(nfa.accepts("colouur"), None);
    }
}
