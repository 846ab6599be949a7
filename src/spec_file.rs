/* Reader for lex specification files. A specification has up to three sections separated by %%
 * lines: definitions (with %{ %} code blocks copied to the prologue), rules, and user code copied
 * to the epilogue. */

use log::debug;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexSpec {
    pub prologue: String,
    pub definitions: Vec<(String, String)>,
    pub rules: Vec<(String, String)>,
    pub epilogue: String,
}

/// List of structural errors in a specification file. Line numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    FileOpenError(String),
    TooManySeparators { line: usize },
    MalformedDefinition { line: usize, text: String },
    UnterminatedCodeBlock { line: usize },
    OrphanContinuation { line: usize },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::FileOpenError(err_line) => write!(f, "{}", err_line),
            SpecError::TooManySeparators { line } => write!(
                f,
                "Error: Line {}: too many %% separators, at most two are allowed!",
                line
            ),
            SpecError::MalformedDefinition { line, text } => write!(
                f,
                "Error: Line {}: malformed definition {}, expected name<TAB>pattern!",
                line, text
            ),
            SpecError::UnterminatedCodeBlock { line } => {
                write!(f, "Error: Line {}: %{{ block is never closed by %}}!", line)
            }
            SpecError::OrphanContinuation { line } => write!(
                f,
                "Error: Line {}: action continuation without a preceding rule!",
                line
            ),
        }
    }
}

impl std::error::Error for SpecError {}

enum Section {
    Definitions,
    Rules,
    UserCode,
}

// Split `head<TAB>tail`, any run of tabs between the two is part of the separator
fn split_at_tab(line: &str) -> Option<(&str, &str)> {
    line.split_once('\t')
        .map(|(head, tail)| (head, tail.trim_start_matches('\t').trim_end()))
}

/// Split the text of a specification into its sections.
pub fn parse_lex_spec(text: &str) -> Result<LexSpec, SpecError> {
    let mut spec = LexSpec::default();
    let mut section = Section::Definitions;
    let mut code_block_start: Option<usize> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line == "%%" && code_block_start.is_none() {
            section = match section {
                Section::Definitions => Section::Rules,
                Section::Rules => Section::UserCode,
                Section::UserCode => {
                    return Err(SpecError::TooManySeparators { line: line_number })
                }
            };
            continue;
        }

        match section {
            Section::Definitions => {
                if code_block_start.is_some() {
                    if line == "%}" {
                        code_block_start = None;
                    } else {
                        spec.prologue.push_str(line);
                        spec.prologue.push('\n');
                    }
                    continue;
                }

                if line == "%{" {
                    code_block_start = Some(line_number);
                    continue;
                }

                if line.trim().is_empty() {
                    continue;
                }

                let malformed = || SpecError::MalformedDefinition {
                    line: line_number,
                    text: line.to_string(),
                };

                let (name, pattern) = split_at_tab(line).ok_or_else(malformed)?;
                if name.is_empty() || pattern.is_empty() {
                    return Err(malformed());
                }

                spec.definitions
                    .push((name.to_string(), pattern.to_string()));
            }
            Section::Rules => {
                if line.trim().is_empty() {
                    continue;
                }

                match split_at_tab(line) {
                    Some(("", continuation)) => {
                        let (_, action) = spec
                            .rules
                            .last_mut()
                            .ok_or(SpecError::OrphanContinuation { line: line_number })?;
                        action.push('\n');
                        action.push_str(continuation);
                    }
                    Some((pattern, action)) => {
                        spec.rules.push((pattern.to_string(), action.to_string()));
                    }
                    None => spec.rules.push((line.trim_end().to_string(), String::new())),
                }
            }
            Section::UserCode => {
                spec.epilogue.push_str(line);
                spec.epilogue.push('\n');
            }
        }
    }

    if let Some(line) = code_block_start {
        return Err(SpecError::UnterminatedCodeBlock { line });
    }

    debug!(
        "specification has {} definitions and {} rules",
        spec.definitions.len(),
        spec.rules.len()
    );

    Ok(spec)
}

/// Read and split a specification file.
pub fn read_lex_file<P: AsRef<Path>>(file_path: P) -> Result<LexSpec, SpecError> {
    let file_path = file_path.as_ref();

    let text = match fs::read_to_string(file_path) {
        Ok(text) => text,
        Err(error) => {
            let err_line = format!(
                "Error: Failed to read the specification file {}: {}",
                file_path.display(),
                error
            );
            return Err(SpecError::FileOpenError(err_line));
        }
    };

    parse_lex_spec(&text)
}

#[cfg(test)]
mod spec_file_tests {
    use super::*;

    const SPEC: &str = "%{\n#include \"tokens.h\"\n%}\nD\t[0-9]\nL\t\t[a-zA-Z_]  \n\n%%\n{D}+\treturn NUMBER;\n{L}+\t{\n\t\treturn IDENT;\n\t}\n\" \"\n%%\nint yywrap(void) { return 1; }\n";

    #[test]
    fn test_sections() {
        let spec = parse_lex_spec(SPEC).unwrap();
        assert_eq!(spec.prologue, "#include \"tokens.h\"\n");
        assert_eq!(
            spec.definitions,
            vec![
                ("D".to_string(), "[0-9]".to_string()),
                ("L".to_string(), "[a-zA-Z_]".to_string())
            ]
        );
        assert_eq!(spec.rules.len(), 3);
        assert_eq!(spec.rules[0], ("{D}+".to_string(), "return NUMBER;".to_string()));
        assert_eq!(spec.epilogue, "int yywrap(void) { return 1; }\n");
    }

    #[test]
    fn test_continuation_lines() {
        let spec = parse_lex_spec(SPEC).unwrap();
        assert_eq!(spec.rules[1].0, "{L}+");
        assert_eq!(spec.rules[1].1, "{\nreturn IDENT;\n}");
    }

    #[test]
    fn test_rule_without_action() {
        let spec = parse_lex_spec(SPEC).unwrap();
        assert_eq!(spec.rules[2], ("\" \"".to_string(), String::new()));
    }

    #[test]
    fn test_no_separator() {
        let spec = parse_lex_spec("D\t[0-9]\n").unwrap();
        assert_eq!(spec.definitions.len(), 1);
        assert!(spec.rules.is_empty());
    }

    #[test]
    fn test_too_many_separators() {
        let text = "D\t[0-9]\n%%\n{D}+\tNUMBER\n%%\n\nint x;\n%%\nmore\n";
        assert_eq!(
            parse_lex_spec(text),
            Err(SpecError::TooManySeparators { line: 7 })
        );
    }

    #[test]
    fn test_malformed_definition() {
        let text = "DIGIT [0-9]\n%%\na\tA\n";
        assert_eq!(
            parse_lex_spec(text),
            Err(SpecError::MalformedDefinition {
                line: 1,
                text: "DIGIT [0-9]".to_string()
            })
        );
    }

    #[test]
    fn test_unterminated_code_block() {
        let text = "\n%{\nint x;\n%%\na\tA\n";
        assert_eq!(
            parse_lex_spec(text),
            Err(SpecError::UnterminatedCodeBlock { line: 2 })
        );
    }

    #[test]
    fn test_orphan_continuation() {
        let text = "%%\n\treturn 1;\n";
        assert_eq!(
            parse_lex_spec(text),
            Err(SpecError::OrphanContinuation { line: 2 })
        );
    }

    #[test]
    fn test_missing_file() {
        match read_lex_file("does/not/exist.l") {
            Err(SpecError::FileOpenError(_)) => {}
            result => panic!("Expected FileOpenError, got {:?}", result),
        }
    }
}
