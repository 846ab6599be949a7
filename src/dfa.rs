/* Perform subset construction to convert the merged NFA into a DFA
 * Minimize the DFA by partition refinement and prune the states which can never accept */

use crate::fa::{Label, FA};
use crate::nfa::NFA;
use crate::symbol::ALPHABET_SIZE;
use bitvec::prelude::*;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};

/// A struct which is a bitvec and its hash stored together to ease fetching the hash of the bitvec
/// quickly instead of calculating it each time.

#[derive(Clone)]
struct HashedBitVec {
    bv: BitVec<u8>,
    hash: u64,
}

impl HashedBitVec {
    fn new(bv: BitVec<u8>) -> Self {
        let mut hasher = DefaultHasher::new();
        bv.hash(&mut hasher);
        let hash = hasher.finish();
        Self { bv, hash }
    }
}

impl Hash for HashedBitVec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for HashedBitVec {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bv == other.bv
    }
}

impl Eq for HashedBitVec {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DFAState {
    transitions: Vec<Option<usize>>,
    accept: Option<usize>,
}

impl DFAState {
    fn new() -> Self {
        DFAState {
            transitions: vec![None; ALPHABET_SIZE],
            accept: None,
        }
    }

    /// Successor for every character code, `None` where the state rejects.
    pub fn get_transitions(&self) -> &[Option<usize>] {
        &self.transitions
    }

    /// The rule accepted in this state, if it is an accept state.
    pub fn get_accept(&self) -> Option<usize> {
        self.accept
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DFA {
    states: Vec<DFAState>,
    start_state: usize,
    accept_states: BitVec<u8>,
}

impl FA for DFA {
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
        self.states[state_id].accept
    }

    fn get_state_transitions(&self, state_id: usize) -> Vec<(Label, usize)> {
        self.states[state_id]
            .transitions
            .iter()
            .enumerate()
            .filter_map(|(ch, target)| target.map(|target| (Label::Char(ch as u8), target)))
            .collect()
    }
}

impl DFA {
    fn new() -> Self {
        DFA {
            states: Vec::new(),
            start_state: 0,
            accept_states: BitVec::new(),
        }
    }

    fn add_state(&mut self) -> usize {
        let state_id = self.states.len();
        self.states.push(DFAState::new());
        self.accept_states.push(false);
        state_id
    }

    fn set_accept(&mut self, state_id: usize, accept: Option<usize>) {
        self.states[state_id].accept = accept;
        self.accept_states.set(state_id, accept.is_some());
    }

    /// Returns a reference to the DFA state whose id is provided
    pub fn get_state(&self, id: usize) -> Option<&DFAState> {
        self.states.get(id)
    }

    pub fn get_states(&self) -> &[DFAState] {
        &self.states
    }

    pub fn next_state(&self, state_id: usize, ch: u8) -> Option<usize> {
        self.states[state_id]
            .transitions
            .get(ch as usize)
            .copied()
            .flatten()
    }

    /// Rule matching the whole input, if any.
    pub fn accepts(&self, input: &str) -> Option<usize> {
        let mut state = self.start_state;
        for ch in input.bytes() {
            state = self.next_state(state, ch)?;
        }
        self.states[state].accept
    }
}

///  Apply the subset construction algorithm on the merged NFA to build a DFA. Each DFA state
///  accepts the lowest rule among the NFA accept states it contains.
pub fn construct_dfa(nfa: &NFA) -> DFA {
    let mut result = DFA::new();

    let mut q_list: HashMap<HashedBitVec, usize> = HashMap::new(); // Mapping from nfa state set to DFA state
    let mut work_list: VecDeque<(HashedBitVec, usize)> = VecDeque::new();

    let mut nfa_states: BitVec<u8> = BitVec::repeat(false, nfa.get_num_states());
    nfa_states.set(nfa.get_start_state(), true);

    let q0 = HashedBitVec::new(nfa.epsilon_closure(&nfa_states));
    let d0 = result.add_state();
    result.set_accept(d0, nfa.accept_rule_of(&q0.bv));
    result.start_state = d0;

    q_list.insert(q0.clone(), d0);
    work_list.push_back((q0, d0));

    while let Some((q, dq)) = work_list.pop_front() {
        // Characters outside the alphabet never lead anywhere
        for ch in nfa.get_alphabet().iter() {
            let end_states = nfa.move_on(&q.bv, *ch);
            if end_states.not_any() {
                continue;
            }

            let t = HashedBitVec::new(nfa.epsilon_closure(&end_states));

            let dt = match q_list.get(&t) {
                Some(&existing) => existing,
                None => {
                    let dt = result.add_state();
                    result.set_accept(dt, nfa.accept_rule_of(&t.bv));
                    q_list.insert(t.clone(), dt);
                    work_list.push_back((t, dt));
                    dt
                }
            };

            result.states[dq].transitions[*ch as usize] = Some(dt);
        }
    }

    info!(
        "DFA constructed with {} states, {} accepting",
        result.get_num_states(),
        result.accept_states.count_ones()
    );

    result
}

/// Assignment of every DFA state to an equivalence group.
struct Partition {
    group_of: Vec<usize>,
    num_groups: usize,
}

impl Partition {
    /// One group per distinct accept tag, numbered in order of first appearance.
    fn by_accept(dfa: &DFA) -> Self {
        let mut tag_to_group: HashMap<Option<usize>, usize> = HashMap::new();
        let group_of = dfa
            .states
            .iter()
            .map(|state| {
                let next_group = tag_to_group.len();
                *tag_to_group.entry(state.accept).or_insert(next_group)
            })
            .collect();

        Partition {
            group_of,
            num_groups: tag_to_group.len(),
        }
    }

    fn get_group_of_state(&self, state: usize) -> usize {
        self.group_of[state]
    }

    // Group of every successor, absent successors stay absent
    fn signature(&self, state: &DFAState) -> Vec<Option<usize>> {
        state
            .transitions
            .iter()
            .map(|target| target.map(|target| self.group_of[target]))
            .collect()
    }

    /// Split every group by the transition signature of its members. Returns the refined
    /// partition, which has as many groups as this one when nothing was split.
    fn refine(&self, dfa: &DFA) -> Partition {
        let mut key_to_group: HashMap<(usize, Vec<Option<usize>>), usize> = HashMap::new();
        let group_of = dfa
            .states
            .iter()
            .enumerate()
            .map(|(state_id, state)| {
                let key = (self.group_of[state_id], self.signature(state));
                let next_group = key_to_group.len();
                *key_to_group.entry(key).or_insert(next_group)
            })
            .collect();

        Partition {
            group_of,
            num_groups: key_to_group.len(),
        }
    }
}

fn get_partition(dfa: &DFA) -> Partition {
    let mut partition = Partition::by_accept(dfa);

    loop {
        let refined = partition.refine(dfa);
        if refined.num_groups == partition.num_groups {
            break;
        }
        debug!(
            "partition refined from {} to {} groups",
            partition.num_groups, refined.num_groups
        );
        partition = refined;
    }
    partition
}

/// Renumber the states reachable from the start in breadth first order, following characters in
/// ascending order. The start becomes state 0 and unreachable states are dropped.
fn reorder_dfa(dfa: &DFA) -> DFA {
    let mut result = DFA::new();
    let mut reorder_map: Vec<Option<usize>> = vec![None; dfa.states.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();

    reorder_map[dfa.start_state] = Some(result.add_state());
    queue.push_back(dfa.start_state);

    while let Some(state_id) = queue.pop_front() {
        let reordered_id = match reorder_map[state_id] {
            Some(id) => id,
            None => continue,
        };

        let state = &dfa.states[state_id];
        result.set_accept(reordered_id, state.accept);

        for (ch, target) in state.transitions.iter().enumerate() {
            let target = match target {
                Some(target) => *target,
                None => continue,
            };

            let reordered_target = match reorder_map[target] {
                Some(id) => id,
                None => {
                    let id = result.add_state();
                    reorder_map[target] = Some(id);
                    queue.push_back(target);
                    id
                }
            };

            result.states[reordered_id].transitions[ch] = Some(reordered_target);
        }
    }

    result.start_state = 0;
    result
}

/// Merge equivalent states of a DFA. Two states are equivalent when they accept the same rule and
/// every character leads both to equivalent states or both nowhere. The result is renumbered
/// canonically, so minimizing an already minimal DFA gives back an identical DFA.
pub fn construct_minimal_dfa(dfa: &DFA) -> DFA {
    let partition = get_partition(dfa);

    let mut quotient = DFA::new();
    for _ in 0..partition.num_groups {
        quotient.add_state();
    }

    for (state_id, state) in dfa.states.iter().enumerate() {
        let group = partition.get_group_of_state(state_id);
        quotient.set_accept(group, state.accept);
        quotient.states[group].transitions = partition.signature(state);
    }
    quotient.start_state = partition.get_group_of_state(dfa.start_state);

    let result = reorder_dfa(&quotient);

    info!(
        "Minimal DFA has {} states (from {})",
        result.get_num_states(),
        dfa.get_num_states()
    );

    result
}

/// Delete every state from which no accept state can be reached. Edges into deleted states become
/// absent. The start state always survives; if it is dead itself all of its edges are removed.
pub fn remove_dead_states(dfa: &DFA) -> DFA {
    let num_states = dfa.states.len();

    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_states];
    for (state_id, state) in dfa.states.iter().enumerate() {
        for target in state.transitions.iter().flatten() {
            predecessors[*target].push(state_id);
        }
    }

    // Reverse reachability from the accept states
    let mut live = dfa.accept_states.clone();
    let mut work_list: VecDeque<usize> = live.iter_ones().collect();
    while let Some(state_id) = work_list.pop_front() {
        for pred in &predecessors[state_id] {
            if !live[*pred] {
                live.set(*pred, true);
                work_list.push_back(*pred);
            }
        }
    }

    let mut result = DFA::new();
    let mut reorder_map: Vec<Option<usize>> = vec![None; num_states];
    for state_id in 0..num_states {
        if live[state_id] || state_id == dfa.start_state {
            reorder_map[state_id] = Some(result.add_state());
        }
    }

    for (state_id, state) in dfa.states.iter().enumerate() {
        let new_id = match reorder_map[state_id] {
            Some(id) => id,
            None => continue,
        };
        result.set_accept(new_id, state.accept);

        if !live[state_id] {
            continue;
        }
        for (ch, target) in state.transitions.iter().enumerate() {
            result.states[new_id].transitions[ch] = target.and_then(|target| {
                if live[target] {
                    reorder_map[target]
                } else {
                    None
                }
            });
        }
    }

    if let Some(start) = reorder_map[dfa.start_state] {
        result.start_state = start;
    }

    let removed = num_states - result.get_num_states();
    if removed > 0 {
        info!("Removed {} dead states", removed);
    }

    result
}
