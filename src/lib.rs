//! # lexgen
//!
//! A lexical analyzer generator in the style of lex.
//!
//! This library provides functionality to:
//! - Read lex specification files (definitions, rules and user code)
//! - Preprocess patterns into tagged symbols and convert them to postfix
//! - Convert the rules to a single tagged NFA using Thompson Construction
//! - Convert the NFA to a DFA using Subset Construction
//! - Minimize the DFA by partition refinement and prune dead states
//! - Emit a table driven C scanner, or scan input directly with the tables
//! - Export and visualize the automata

pub mod codegen;
pub mod dfa;
pub mod fa;
pub mod nfa;
pub mod postfix;
pub mod regex;
pub mod scanner;
pub mod spec_file;
pub mod symbol;
pub mod visualizer;

use color_eyre::eyre::Result;
use log::info;

// Re-export commonly used functions for convenience
pub use codegen::{generate_c, write_scanner_source};
pub use dfa::{construct_dfa, construct_minimal_dfa, remove_dead_states, DFA};
pub use nfa::{construct_nfa, NFA};
pub use postfix::parse_rule_list;
pub use scanner::{construct_scanner, load_scanner};
pub use spec_file::{parse_lex_spec, read_lex_file, LexSpec};
pub use visualizer::{save_fa, visualize};

/// Switches for the optional stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub minimize: bool,
    pub remove_dead_states: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            minimize: true,
            remove_dead_states: true,
        }
    }
}

/// Every automaton built for a specification. `dfa` is the unoptimized result of subset
/// construction, `minimal_dfa` is present when minimization was requested, and `final_dfa` is
/// the one code is generated from.
#[derive(Debug)]
pub struct Pipeline {
    pub nfa: NFA,
    pub dfa: DFA,
    pub minimal_dfa: Option<DFA>,
    pub final_dfa: DFA,
}

impl Pipeline {
    /// Actions of the rules, indexed by rule.
    pub fn actions(spec: &LexSpec) -> Vec<String> {
        spec.rules.iter().map(|(_, action)| action.clone()).collect()
    }
}

/// Run the regex compilation pipeline on a parsed specification.
pub fn build_pipeline(spec: &LexSpec, options: &GeneratorOptions) -> Result<Pipeline> {
    let pattern_list = parse_rule_list(&spec.definitions, &spec.rules)?;

    let nfa = construct_nfa(&pattern_list)?;

    let dfa = construct_dfa(&nfa);

    let minimal_dfa = if options.minimize {
        Some(construct_minimal_dfa(&dfa))
    } else {
        None
    };

    let mut final_dfa = minimal_dfa.clone().unwrap_or_else(|| dfa.clone());
    if options.remove_dead_states {
        final_dfa = remove_dead_states(&final_dfa);
    }

    info!("Final DFA has {} states", final_dfa.get_states().len());

    Ok(Pipeline {
        nfa,
        dfa,
        minimal_dfa,
        final_dfa,
    })
}

/// Generate the C scanner source for a parsed specification.
pub fn generate(spec: &LexSpec, options: &GeneratorOptions) -> Result<String> {
    let pipeline = build_pipeline(spec, options)?;
    Ok(generate_c(spec, &pipeline.final_dfa))
}
