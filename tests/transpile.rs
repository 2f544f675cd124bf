use std::fs;
use std::path::Path;
use dreamberd_compiler::compiler::{CHECKPOINT, UNCLASSIFIED_MARKER};
use dreamberd_compiler::error::{CompilerError, Rule};
use dreamberd_compiler::{output, transpile, CompileOptions};

fn compile(source: &str) -> Result<Vec<String>, CompilerError> {
    let units = transpile(source, Path::new("main.db"), &CompileOptions::default())?;
    Ok(units.into_iter().map(|unit| unit.body).collect())
}

fn statements(body: &str) -> Vec<&str> {
    body.lines().filter(|line| line.trim() != CHECKPOINT).collect()
}

#[test]
fn declarations_carry_their_flags_and_priority() {
    let bodies = compile("var var x = 5!\nconst const pi = 3.14!!!\n").unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec![
            "assign(\"x\", 5, true, 1, -1);",
            "assign(\"pi\", 3.14, false, 3, -1);",
        ]
    );
}

#[test]
fn checkpoint_follows_every_statement() {
    let bodies = compile("var var x = 1!\nx = x + 1!\n").unwrap();
    let lines: Vec<&str> = bodies[0].lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], CHECKPOINT);
    assert_eq!(lines[3], CHECKPOINT);
}

#[test]
fn statement_lifetime_kills_five_statements_later() {
    let source = "var var x<5> = 1!\na = 1!\nb = 1!\nc = 1!\nd = 1!\ne = 1!\nf = 1!\n";
    let bodies = compile(source).unwrap();
    let lines = statements(&bodies[0]);
    let kill = lines
        .iter()
        .position(|line| *line == "current_scope.get_var(\"x\").kill();")
        .unwrap();
    assert_eq!(lines[kill - 1], "assign(\"d\", 1, undefined, 1, -1);");
    assert_eq!(lines[kill + 1], "assign(\"e\", 1, undefined, 1, -1);");
}

#[test]
fn whitespace_changes_grouping() {
    let bodies = compile("var var a = 1 + 2 * 3!\nvar var b = 1 + 2  *  3!\n").unwrap();
    let lines = statements(&bodies[0]);
    assert_eq!(
        lines[0],
        "assign(\"a\", current_scope.resolve(1, \"+\", current_scope.resolve(2, \"*\", 3)), true, 1, -1);"
    );
    assert_eq!(
        lines[1],
        "assign(\"b\", current_scope.resolve(current_scope.resolve(1, \"+\", 2), \"*\", 3), true, 1, -1);"
    );
}

#[test]
fn literal_equality_is_folded() {
    let bodies = compile("const const same = x ==== x!\nconst const other = x ==== y!\n").unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec![
            "assign(\"same\", true, false, 1, -1);",
            "assign(\"other\", false, false, 1, -1);",
        ]
    );
}

#[test]
fn four_space_indentation_is_rejected() {
    match compile("var var x = 1!\nfn f() => {\n    return x\n}\n") {
        Err(CompilerError::Syntax(error)) => {
            assert_eq!(error.rule(), Rule::Indentation);
            assert_eq!(error.line(), 3);
            assert!(error.to_string().starts_with("SyntaxError in indentation:"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn lexical_errors_are_reported_together() {
    match compile("var var a = 1.x!\nvar var b = c ===== d!\n") {
        Err(CompilerError::Lexing(errors)) => {
            assert_eq!(errors.len(), 2);
            let rendered = CompilerError::Lexing(errors).to_string();
            assert!(rendered.starts_with("-Tokenizer: ParseError on Line 1:"));
            assert!(rendered.contains("-Tokenizer: ParseError on Line 2:"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn errors_use_file_lines_across_units() {
    let source = "===== a =====\nvar var x = 1!\n===== b =====\nvar var y = 1!\n    y = 2!\n";
    match compile(source) {
        Err(CompilerError::Syntax(error)) => assert_eq!(error.line(), 5),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn units_do_not_share_scheduled_kills() {
    let source = "===== a =====\nvar var x<1> = 1!\n===== b =====\ny = 1!\nz = 1!\n";
    let bodies = compile(source).unwrap();
    assert_eq!(bodies.len(), 2);
    assert!(!bodies[0].contains("kill"));
    assert!(!bodies[1].contains("kill"));
}

#[test]
fn unknown_statements_pass_through_unless_strict() {
    let bodies = compile("print(x)!\n").unwrap();
    assert_eq!(statements(&bodies[0]), vec![format!("print(x) {UNCLASSIFIED_MARKER}")]);

    let strict = CompileOptions {
        strict: true,
        ..CompileOptions::default()
    };
    assert!(transpile("print(x)!\n", Path::new("main.db"), &strict).is_err());
}

#[test]
fn functions_and_bodies() {
    let source = "fn add(a, b) => {\n   return a + b!\n}\nvar var sum = 1!\n";
    let bodies = compile(source).unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec![
            "function add(a, b) {",
            "   return current_scope.resolve(\"a\", \"+\", \"b\");",
            "}",
            "assign(\"sum\", 1, true, 1, -1);",
        ]
    );
}

#[test]
fn build_writes_wrapped_units() {
    let dir = tempfile::tempdir().unwrap();
    let source = "===== add.ts =====\nvar var x = 1!\n===== =====\nconst const y = 2!\n";

    let units = transpile(source, Path::new("main.db"), &CompileOptions::default()).unwrap();
    let written = output::write_units(&units, dir.path(), output::DEFAULT_TEMPLATE).unwrap();

    assert_eq!(written, vec![dir.path().join("add.ts"), dir.path().join("0.tsx")]);
    let first = fs::read_to_string(dir.path().join("add.ts")).unwrap();
    assert!(first.starts_with("import { assign, current_scope, WHEN_BLOCK_MANAGER }"));
    assert!(first.contains("assign(\"x\", 1, true, 1, -1);\nWHEN_BLOCK_MANAGER.checkConditions();"));
    assert!(!first.contains(output::MARKER));
}

#[test]
fn float_spellings_are_variable_names() {
    let bodies = compile("var var inf = 1!\nvar var y = inf + 1!\nvar var z = nan!\n").unwrap();
    let lines = statements(&bodies[0]);
    assert_eq!(lines[1], "assign(\"y\", current_scope.resolve(\"inf\", \"+\", 1), true, 1, -1);");
    assert_eq!(lines[2], "assign(\"z\", current_scope.get_var(\"nan\"), true, 1, -1);");
}

#[test]
fn oversized_integers_pass_through() {
    let bodies = compile("var var big = 123456789012345678901234567890!\n").unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec!["assign(\"big\", 123456789012345678901234567890, true, 1, -1);"]
    );
}

#[test]
fn unterminated_strings_are_closed() {
    let bodies = compile("var var s = \"never closed").unwrap();
    assert_eq!(statements(&bodies[0]), vec!["assign(\"s\", \"never closed\", true, 0, -1);"]);
}

#[test]
fn quote_formats_and_booleans() {
    let bodies = compile("var var s = \"\"hello\"\"!\nvar var b = TRUE!\n").unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec![
            "assign(\"s\", \"hello\", true, 1, -1);",
            "assign(\"b\", true, true, 1, -1);",
        ]
    );
}

#[test]
fn several_statements_on_one_line() {
    let bodies = compile("var var x = 1! var var y = 2!\n").unwrap();
    assert_eq!(
        statements(&bodies[0]),
        vec![
            "assign(\"x\", 1, true, 1, -1);",
            "assign(\"y\", 2, true, 1, -1);",
        ]
    );
}

#[test]
fn unit_names_cannot_leave_the_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("built");
    let units = transpile("===== ../x =====\nvar var a = 1!\n", Path::new("main.db"), &CompileOptions::default())
        .unwrap();
    assert!(matches!(
        output::write_units(&units, &out, output::DEFAULT_TEMPLATE),
        Err(CompilerError::UnitName(_))
    ));
    assert!(!dir.path().join("x.tsx").exists());
}
