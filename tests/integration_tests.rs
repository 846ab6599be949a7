mod integration_tests_helper {

    use lexgen::scanner::{Scanner, Token};
    use lexgen::{
        build_pipeline, construct_scanner, read_lex_file, GeneratorOptions, LexSpec, Pipeline,
    };

    pub fn get_token(token: &str, rule: usize, action: &str) -> Token {
        Token::new(token.to_string(), rule, action.to_string())
    }

    pub fn get_spec(spec_path: &str) -> LexSpec {
        let spec = read_lex_file(spec_path);

        // assert that reading the file was successful
        assert!(spec.is_ok());

        spec.unwrap()
    }

    pub fn get_scanner(spec_path: &str) -> Scanner {
        let spec = get_spec(spec_path);

        let pipeline = build_pipeline(&spec, &GeneratorOptions::default());

        // assert that the automata were built
        assert!(pipeline.is_ok());

        let pipeline = pipeline.unwrap();

        construct_scanner(&pipeline.final_dfa, &Pipeline::actions(&spec))
    }
}

mod integration_tests {
    use crate::integration_tests_helper::{get_scanner, get_spec, get_token};

    use lexgen::codegen::generate_c;
    use lexgen::scanner::{ScannerError, Token};
    use lexgen::spec_file::SpecError;
    use lexgen::{build_pipeline, load_scanner, read_lex_file, GeneratorOptions};

    const SKIP: &str = "/* skip whitespace */";

    #[test]
    fn test_valid_invalid_lex() {
        let scanner = get_scanner("test_data/tokens.l");

        let expected_list: Vec<Token> = vec![
            get_token("while", 1, "return KEYWORD;"),
            get_token(" ", 6, SKIP),
            get_token("(", 4, "return LPAREN;"),
            get_token("x1", 3, "return IDENTIFIER;"),
            get_token(")", 5, "return RPAREN;"),
            get_token(" ", 6, SKIP),
            get_token("if", 0, "return KEYWORD;"),
            get_token(" ", 6, SKIP),
            get_token("42", 2, "return NUMBER;"),
            get_token("\n", 6, SKIP),
        ];

        let token_list = scanner.scan_file("test_data/valid.src");

        // assert that scanning succeeded
        assert!(token_list.is_ok());

        assert_eq!(token_list.unwrap(), expected_list);

        let token_list = scanner.scan_file("test_data/invalid.src");
        assert!(token_list.is_err());

        let err = token_list.unwrap_err();

        match err.downcast_ref::<ScannerError>() {
            Some(ScannerError::BadToken(lexeme)) => assert_eq!(lexeme, "$"),
            other => panic!("Expected BadToken, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let scanner = get_scanner("test_data/tokens.l");

        let token_list = scanner.scan("iffy").unwrap();
        assert_eq!(
            token_list,
            vec![get_token("iffy", 3, "return IDENTIFIER;")]
        );
    }

    #[test]
    fn test_too_many_separators() {
        let result = read_lex_file("test_data/separators.l");
        assert_eq!(result, Err(SpecError::TooManySeparators { line: 6 }));
    }

    #[test]
    fn test_generated_source() {
        let spec = get_spec("test_data/tokens.l");
        let pipeline = build_pipeline(&spec, &GeneratorOptions::default()).unwrap();

        let source = generate_c(&spec, &pipeline.final_dfa);
        assert!(source.starts_with("#include <stdio.h>\n"));
        assert!(source.ends_with("int yywrap(void) { return 1; }\n"));
        for rule in 0..spec.rules.len() {
            assert!(source.contains(&format!("\t\tcase {}:\n", rule)));
        }
    }

    #[test]
    fn test_minimization_keeps_language() {
        let spec = get_spec("test_data/tokens.l");
        let minimal = build_pipeline(&spec, &GeneratorOptions::default()).unwrap();
        let options = GeneratorOptions {
            minimize: false,
            remove_dead_states: false,
        };
        let unoptimized = build_pipeline(&spec, &options).unwrap();

        for word in ["if", "while", "whilex", "42", "x_1", "(", ")", " \t\n", "4a", "", "$"] {
            assert_eq!(
                minimal.final_dfa.accepts(word),
                unoptimized.final_dfa.accepts(word),
                "word {:?}",
                word
            );
        }
        assert!(minimal.final_dfa.get_states().len() <= unoptimized.final_dfa.get_states().len());
    }

    #[test]
    fn test_save_and_load_scanner() {
        let scanner = get_scanner("test_data/tokens.l");

        let file_path = std::env::temp_dir().join("lexgen_integration_scanner.json");
        let file_name = file_path.to_str().unwrap();

        assert!(scanner.save_scanner(file_name).is_ok());

        let loaded = load_scanner(file_name).unwrap();
        assert_eq!(loaded, scanner);
        assert_eq!(
            loaded.scan("if 7").unwrap(),
            scanner.scan("if 7").unwrap()
        );

        std::fs::remove_file(file_path).unwrap();
    }
}
