use bitvec::prelude::BitVec;

/// An edge label of a finite automaton. Only NFAs carry epsilon edges.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Label {
    Epsilon,
    Char(u8),
}

/// Read-only view over an automaton, shared by the NFA and the DFAs for export and visualization.
pub trait FA {
    fn get_num_states(&self) -> usize;
    fn get_start_state(&self) -> usize;
    fn get_acceptor_states(&self) -> &BitVec<u8>;
    /// Rule index accepted in the given state, if any.
    fn get_accept_rule(&self, state_id: usize) -> Option<usize>;
    /// All outgoing edges of a state, ordered by label and then by target.
    fn get_state_transitions(&self, state_id: usize) -> Vec<(Label, usize)>;
}

/// Printable form of a single character, control characters are written as C escapes.
pub fn display_char(ch: u8) -> String {
    match ch {
        b'\n' => "\\n".to_string(),
        b'\t' => "\\t".to_string(),
        b'\r' => "\\r".to_string(),
        0x07 => "\\a".to_string(),
        0x08 => "\\b".to_string(),
        0x0b => "\\v".to_string(),
        0x0c => "\\f".to_string(),
        b' ' => "' '".to_string(),
        b'\\' => "\\\\".to_string(),
        ch if ch.is_ascii_graphic() => (ch as char).to_string(),
        ch => format!("\\x{:02x}", ch),
    }
}

/// Compact rendering of a set of labels: epsilon first, then characters in ascending order with
/// runs of three or more collapsed into ranges, e.g. `ε, 0-9, _, a-z`.
pub fn format_labels(labels: &[Label]) -> String {
    let mut chars: Vec<u8> = labels
        .iter()
        .filter_map(|label| match label {
            Label::Char(ch) => Some(*ch),
            Label::Epsilon => None,
        })
        .collect();
    chars.sort_unstable();
    chars.dedup();

    let mut parts = Vec::new();

    if labels.contains(&Label::Epsilon) {
        parts.push("ε".to_string());
    }

    let mut idx = 0;
    while idx < chars.len() {
        let start = chars[idx];
        let mut end = start;
        while idx + 1 < chars.len() && chars[idx + 1] == end + 1 {
            idx += 1;
            end = chars[idx];
        }

        match end - start {
            0 => parts.push(display_char(start)),
            1 => {
                parts.push(display_char(start));
                parts.push(display_char(end));
            }
            _ => parts.push(format!("{}-{}", display_char(start), display_char(end))),
        }
        idx += 1;
    }

    parts.join(", ")
}
