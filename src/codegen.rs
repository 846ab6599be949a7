/* Emission of a table driven C scanner. The output is the prologue of the specification, the
 * accept and transition tables of the DFA, the yylex driver with one switch case per rule, and
 * finally the user code section. */

use crate::dfa::DFA;
use crate::fa::FA;
use crate::spec_file::LexSpec;
use crate::symbol::ALPHABET_SIZE;
use color_eyre::eyre::Result;
use log::info;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Default name of the generated scanner source.
pub const DEFAULT_OUTPUT: &str = "lex.yy.c";

const YYLMAX: usize = 8192;

const TABLE_ROW_WIDTH: usize = 16;

fn write_header(out: &mut String, dfa: &DFA, num_rules: usize) -> std::fmt::Result {
    writeln!(
        out,
        "/* Scanner generated by lexgen: {} states, {} rules */",
        dfa.get_num_states(),
        num_rules
    )?;
    writeln!(out, "#include <stdio.h>")?;
    writeln!(out, "#include <string.h>")?;
    writeln!(out)?;
    writeln!(out, "#define YYLMAX {}", YYLMAX)?;
    writeln!(out, "#define YY_NO_TRANSITION -1")?;
    writeln!(out)
}

fn write_tables(out: &mut String, dfa: &DFA) -> std::fmt::Result {
    let num_states = dfa.get_num_states();

    writeln!(out, "static const int yy_accept[{}] = {{", num_states)?;
    for chunk in dfa.get_states().chunks(TABLE_ROW_WIDTH) {
        let row: Vec<String> = chunk
            .iter()
            .map(|state| match state.get_accept() {
                Some(rule) => rule.to_string(),
                None => "-1".to_string(),
            })
            .collect();
        writeln!(out, "\t{},", row.join(", "))?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "static const int yy_tran[{}][{}] = {{", num_states, ALPHABET_SIZE)?;
    for (state_id, state) in dfa.get_states().iter().enumerate() {
        writeln!(out, "\t/* state {} */", state_id)?;
        writeln!(out, "\t{{")?;
        for chunk in state.get_transitions().chunks(TABLE_ROW_WIDTH) {
            let row: Vec<String> = chunk
                .iter()
                .map(|target| match target {
                    Some(target) => target.to_string(),
                    None => "YY_NO_TRANSITION".to_string(),
                })
                .collect();
            writeln!(out, "\t\t{},", row.join(", "))?;
        }
        writeln!(out, "\t}},")?;
    }
    writeln!(out, "}};")?;
    writeln!(out)
}

fn write_scanner_state(out: &mut String) -> std::fmt::Result {
    out.push_str(
        "char yytext[YYLMAX];
int yyleng = 0;
int yylineno = 1;
static const char *yy_cursor = \"\";

void yy_scan_string(const char *str)
{
\tyy_cursor = str;
}

",
    );
    Ok(())
}

fn write_driver(out: &mut String, dfa: &DFA, actions: &[&str]) -> std::fmt::Result {
    writeln!(out, "int yylex(void)")?;
    writeln!(out, "{{")?;
    writeln!(out, "\twhile (*yy_cursor) {{")?;
    writeln!(out, "\t\tint yy_state = {};", dfa.get_start_state())?;
    out.push_str(
        "\t\tint yy_last_accept = -1;
\t\tconst char *yy_last_end = yy_cursor;
\t\tconst char *yy_forward = yy_cursor;
\t\tint yy_i;

\t\twhile (*yy_forward) {
\t\t\tunsigned char yy_ch = (unsigned char)*yy_forward;
\t\t\tif (yy_ch >= 128)
\t\t\t\tbreak;
\t\t\tyy_state = yy_tran[yy_state][yy_ch];
\t\t\tif (yy_state == YY_NO_TRANSITION)
\t\t\t\tbreak;
\t\t\t++yy_forward;
\t\t\tif (yy_accept[yy_state] != -1) {
\t\t\t\tyy_last_accept = yy_accept[yy_state];
\t\t\t\tyy_last_end = yy_forward;
\t\t\t}
\t\t}

\t\tif (yy_last_accept == -1) {
\t\t\tif (*yy_forward == '\\0') {
\t\t\t\tfprintf(stderr, \"unexpected end of file\\n\");
\t\t\t} else {
\t\t\t\tfprintf(stderr, \"line %d: unexpected character '%c'\\n\", yylineno, *yy_cursor);
\t\t\t}
\t\t\treturn -1;
\t\t}

\t\tyyleng = (int)(yy_last_end - yy_cursor);
\t\tif (yyleng >= YYLMAX)
\t\t\tyyleng = YYLMAX - 1;
\t\tmemcpy(yytext, yy_cursor, yyleng);
\t\tyytext[yyleng] = '\\0';
\t\tfor (yy_i = 0; yy_i < yyleng; ++yy_i)
\t\t\tif (yytext[yy_i] == '\\n')
\t\t\t\t++yylineno;
\t\tyy_cursor = yy_last_end;

\t\tswitch (yy_last_accept) {
",
    );

    for (rule, action) in actions.iter().enumerate() {
        writeln!(out, "\t\tcase {}:", rule)?;
        for line in action.lines() {
            writeln!(out, "\t\t\t{}", line)?;
        }
        writeln!(out, "\t\t\tbreak;")?;
    }

    writeln!(out, "\t\tdefault:")?;
    writeln!(out, "\t\t\tbreak;")?;
    writeln!(out, "\t\t}}")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\treturn 0;")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

/// Render the complete C source of the scanner for a specification and its DFA.
pub fn generate_c(spec: &LexSpec, dfa: &DFA) -> String {
    let actions: Vec<&str> = spec.rules.iter().map(|(_, action)| action.as_str()).collect();

    let mut out = String::new();
    out.push_str(&spec.prologue);

    // Writing into a String cannot fail
    let _ = write_body(&mut out, dfa, &actions);

    out.push_str(&spec.epilogue);
    out
}

fn write_body(out: &mut String, dfa: &DFA, actions: &[&str]) -> std::fmt::Result {
    write_header(out, dfa, actions.len())?;
    write_tables(out, dfa)?;
    write_scanner_state(out)?;
    write_driver(out, dfa, actions)
}

/// Write the generated scanner to a file.
pub fn write_scanner_source<P: AsRef<Path>>(
    file_path: P,
    spec: &LexSpec,
    dfa: &DFA,
) -> Result<()> {
    let source = generate_c(spec, dfa);
    fs::write(file_path.as_ref(), source)?;
    info!("Scanner source written to {}", file_path.as_ref().display());
    Ok(())
}
