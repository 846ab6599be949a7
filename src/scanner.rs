/* Implementation of Maximal Munch Table Scanner. Given a sequence of text, this scanner finds the
 * longest prefix accepted by any rule, ties going to the rule declared first, and reports the
 * lexeme together with the rule and its action. The DFA columns are compressed into character
 * classes first. */

use serde::{Deserialize, Serialize};

use crate::dfa::DFA;
use crate::fa::FA;
use crate::symbol::ALPHABET_SIZE;
use color_eyre::eyre::{Report, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    token: String,
    rule: usize,
    action: String,
}

impl Token {
    pub fn new(token: String, rule: usize, action: String) -> Self {
        Token {
            token,
            rule,
            action,
        }
    }
    /// Get the lexeme from the Token struct
    pub fn get_token(&self) -> &String {
        &self.token
    }
    /// Index of the rule which matched the lexeme
    pub fn get_rule(&self) -> usize {
        self.rule
    }

    pub fn get_action(&self) -> &String {
        &self.action
    }
}

/// List of possible errors in the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerError {
    /// Found a bad token which cannot be matched by any rule
    BadToken(String),
    /// The input ended in the middle of a token
    UnexpectedEof(String),
}

impl std::fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::BadToken(token) => {
                write!(f, "Error: Bad token found! {} is not a valid token!", token)
            }
            ScannerError::UnexpectedEof(token) => {
                write!(f, "Error: unexpected end of file after {}!", token)
            }
        }
    }
}

impl std::error::Error for ScannerError {}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Scanner {
    transition_table: Vec<Vec<usize>>, // Matrix of dfa states and character classes
    classifier_table: Vec<usize>,      // Mapping from character code to its class id
    accept_table: Vec<Option<usize>>,  // Rule accepted in each state
    actions: Vec<String>,
    error_state: usize,
    start_state: usize,
}

impl Scanner {
    fn new() -> Self {
        Scanner {
            transition_table: vec![],
            classifier_table: vec![],
            accept_table: vec![],
            actions: vec![],
            error_state: 0,
            start_state: 0,
        }
    }

    fn compress_init_table(&mut self, init_table: &[Vec<usize>]) {
        // Columns with identical contents share a class id, classes are numbered in order of
        // their first character.

        let num_rows = init_table.len();

        let mut column_to_class_map: HashMap<Vec<usize>, usize> = HashMap::new();

        for col_id in 0..ALPHABET_SIZE {
            let column: Vec<usize> = init_table.iter().map(|row| row[col_id]).collect();
            let next_class = column_to_class_map.len();
            let class_id = *column_to_class_map.entry(column).or_insert(next_class);
            self.classifier_table.push(class_id);
        }

        let num_classes = column_to_class_map.len();

        self.transition_table = vec![vec![self.error_state; num_classes]; num_rows];

        for (row_id, row) in init_table.iter().enumerate() {
            for (col_id, destination) in row.iter().enumerate() {
                let class_id = self.classifier_table[col_id];
                self.transition_table[row_id][class_id] = *destination;
            }
        }
    }

    fn init_transition_table(&mut self, dfa: &DFA) {
        let num_states = dfa.get_num_states();

        // One extra row for the error state, which loops on itself
        self.error_state = num_states;

        let mut init_table = vec![vec![self.error_state; ALPHABET_SIZE]; num_states + 1];

        for (state_id, state) in dfa.get_states().iter().enumerate() {
            for (ch, target) in state.get_transitions().iter().enumerate() {
                if let Some(target) = target {
                    init_table[state_id][ch] = *target;
                }
            }
        }

        self.compress_init_table(&init_table);

        self.start_state = dfa.get_start_state();

        self.accept_table = dfa.get_states().iter().map(|state| state.get_accept()).collect();
        self.accept_table.push(None);
    }

    pub fn get_num_classes(&self) -> usize {
        self.transition_table.first().map_or(0, |row| row.len())
    }

    pub fn get_num_states(&self) -> usize {
        self.transition_table.len()
    }

    fn get_lexeme(input: &[u8], start: usize, end: usize) -> String {
        String::from_utf8_lossy(&input[start..end]).into_owned()
    }

    /// Find the longest token starting at `start`. Returns the end of the token and the rule
    /// which matched it.
    fn next_word(&self, input: &[u8], start: usize) -> Result<(usize, usize), ScannerError> {
        let mut state = self.start_state; // Keeps track of the current state in the DFA
        let mut cur_pos = start;
        let mut last_accept: Option<(usize, usize)> = None;

        while cur_pos < input.len() {
            let class_id = match self.classifier_table.get(input[cur_pos] as usize) {
                Some(class_id) => *class_id,
                None => break,
            };

            let next_state = self.transition_table[state][class_id];
            if next_state == self.error_state {
                break;
            }

            state = next_state;
            cur_pos += 1;

            if let Some(rule) = self.accept_table[state] {
                last_accept = Some((cur_pos, rule));
            }
        }

        match last_accept {
            Some(accept) => Ok(accept),
            None if cur_pos == input.len() => Err(ScannerError::UnexpectedEof(
                Self::get_lexeme(input, start, cur_pos),
            )),
            None => Err(ScannerError::BadToken(Self::get_lexeme(
                input,
                start,
                cur_pos + 1,
            ))),
        }
    }

    /// Scan the whole input and return the tokens in order. Scanning stops at the first position
    /// where no rule matches.
    pub fn scan(&self, input: &str) -> Result<Vec<Token>> {
        let input = input.as_bytes();
        let mut token_list: Vec<Token> = Vec::new();
        let mut pos = 0;

        while pos < input.len() {
            let (end, rule) = match self.next_word(input, pos) {
                Ok(word) => word,
                Err(err) => {
                    let err = Report::new(err);
                    return Err(err);
                }
            };

            let token = Token::new(
                Self::get_lexeme(input, pos, end),
                rule,
                self.actions[rule].to_string(),
            );
            debug!("token {:?} matched rule {}", token.get_token(), rule);

            token_list.push(token);
            pos = end;
        }

        Ok(token_list)
    }

    /// Scan a source file, see [`Scanner::scan`].
    pub fn scan_file<P: AsRef<Path>>(&self, source_file: P) -> Result<Vec<Token>> {
        let text = fs::read_to_string(source_file)?;
        self.scan(&text)
    }

    pub fn save_scanner(&self, file_name: &str) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;

        let mut file = File::create(file_name)?;

        writeln!(file, "{}", json_string)?;

        info!("Scanner saved to {}", file_name);
        Ok(())
    }
}
/// Construct a scanner for the provided DFA and the actions of its rules. For best performance,
/// always provide the minimized DFA.
pub fn construct_scanner(dfa: &DFA, actions: &[String]) -> Scanner {
    let mut scanner = Scanner::new();

    scanner.init_transition_table(dfa);

    scanner.actions = actions.to_vec();

    info!(
        "Scanner built with {} states and {} character classes",
        scanner.get_num_states(),
        scanner.get_num_classes()
    );

    scanner
}

/// Load a scanner from a saved json file
pub fn load_scanner(file_name: &str) -> Result<Scanner> {
    let file = File::open(file_name)?;

    let buf_reader = BufReader::new(file);

    let scanner: Scanner = serde_json::from_reader(buf_reader)?;
    Ok(scanner)
}

#[cfg(test)]
mod scanner_test_helpers {
    use super::{construct_scanner, Scanner};
    use crate::dfa::{construct_dfa, construct_minimal_dfa};
    use crate::nfa::construct_nfa;
    use crate::postfix::parse_rule_list;

    pub fn setup_scanner(definitions: &[(&str, &str)], rules: &[(&str, &str)]) -> Scanner {
        let definitions: Vec<(String, String)> = definitions
            .iter()
            .map(|(name, pattern)| (name.to_string(), pattern.to_string()))
            .collect();
        let rules: Vec<(String, String)> = rules
            .iter()
            .map(|(pattern, action)| (pattern.to_string(), action.to_string()))
            .collect();

        let pattern_list = parse_rule_list(&definitions, &rules).unwrap();
        let nfa = construct_nfa(&pattern_list).unwrap();
        let dfa = construct_minimal_dfa(&construct_dfa(&nfa));

        let actions: Vec<String> = rules.into_iter().map(|(_, action)| action).collect();
        construct_scanner(&dfa, &actions)
    }
}
