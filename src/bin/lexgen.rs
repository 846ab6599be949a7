use clap::{Arg, ArgAction, Command};
use color_eyre::eyre::{eyre, Report};
use lexgen::codegen::DEFAULT_OUTPUT;
use lexgen::{
    build_pipeline, construct_scanner, read_lex_file, save_fa, visualize, write_scanner_source,
    GeneratorOptions, Pipeline,
};
use log::{LevelFilter, Log, Metadata, Record};
use std::path::PathBuf;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Command::new("lexgen")
        .version("1.0")
        .about("A lexical analyzer generator that compiles lex specifications into table driven C scanners")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("The lex specification file with definitions, rules and user code separated by %% lines")
                .value_name("SPECIFICATION FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("The file to write the generated C scanner to")
                .value_name("OUTPUT SOURCE FILE")
                .default_value(DEFAULT_OUTPUT)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("no-minimize")
                .long("no-minimize")
                .help("Generate the scanner from the un-optimized DFA obtained after Subset Construction")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-nfa")
                .short('n')
                .long("save-nfa")
                .help("Save the NFA after Thompson Construction of the rules as nfa.dot")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-dfa")
                .short('d')
                .long("save-dfa")
                .help("Save the un-optimized DFA obtained after Subset Construction of the NFA as dfa.dot")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-minimal-dfa")
                .short('m')
                .long("save-minimal-dfa")
                .help("Save the minimal DFA as minimal_dfa.dot")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-scanner")
                .long("save-scanner")
                .help("Save the scanner tables as json so they can be loaded again later")
                .value_name("SCANNER FILE")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("scan")
                .short('s')
                .long("scan")
                .help("Tokenize a source file with the generated tables and print each token with its rule")
                .value_name("SOURCE FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("visualize")
                .long("visualize")
                .help("Visualize the finite automata graphs inside an interactive window that allows for zooming, panning and clicking of elements")
                .value_name("NFA, DFA, MINIMAL")
                .value_parser(clap::value_parser!(String))
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase logging verbosity, repeat for more detail")
                .action(ArgAction::Count),
        )
        .get_matches();

    init_logger(args.get_count("verbose"));

    let spec_file_path = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| eyre!("Error: Specification file not provided!"))?;

    let out_file_path = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let visualize_target = match args.get_one::<String>("visualize") {
        None => None,
        Some(target) => {
            let target = target.to_ascii_lowercase();
            if !matches!(target.as_str(), "nfa" | "dfa" | "minimal") {
                return Err(eyre!("visualize should be one of NFA | DFA | MINIMAL"));
            }
            Some(target)
        }
    };

    let options = GeneratorOptions {
        minimize: !args.get_flag("no-minimize"),
        ..GeneratorOptions::default()
    };

    let spec = read_lex_file(spec_file_path).map_err(Report::new)?;

    let pipeline = build_pipeline(&spec, &options)?;

    if args.get_flag("save-nfa") {
        save_fa(&pipeline.nfa, "nfa")?;
    }

    if args.get_flag("save-dfa") {
        save_fa(&pipeline.dfa, "dfa")?;
    }

    if args.get_flag("save-minimal-dfa") {
        match &pipeline.minimal_dfa {
            Some(minimal_dfa) => save_fa(minimal_dfa, "minimal_dfa")?,
            None => log::warn!("Minimization is disabled, minimal DFA not saved"),
        }
    }

    write_scanner_source(&out_file_path, &spec, &pipeline.final_dfa)?;

    let scanner = construct_scanner(&pipeline.final_dfa, &Pipeline::actions(&spec));

    if let Some(scanner_file) = args.get_one::<String>("save-scanner") {
        scanner.save_scanner(scanner_file)?;
    }

    if let Some(src_file_path) = args.get_one::<PathBuf>("scan") {
        for token in scanner.scan_file(src_file_path)? {
            println!("({:?}, {})", token.get_token(), token.get_rule());
        }
    }

    match visualize_target.as_deref() {
        Some("nfa") => visualize(&pipeline.nfa)?,
        Some("dfa") => visualize(&pipeline.dfa)?,
        Some("minimal") => match &pipeline.minimal_dfa {
            Some(minimal_dfa) => visualize(minimal_dfa)?,
            None => visualize(&pipeline.final_dfa)?,
        },
        _ => {}
    }

    Ok(())
}
