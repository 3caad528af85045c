use loxide::ast::{Expr, Literal, Stmt};
use loxide::error::LoxError;
use loxide::parser::Parser;
use loxide::scanner::Scanner;
use loxide::token::Token;

fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
        .scan_tokens()
        .expect("test source must scan cleanly");

    Parser::new(tokens, 0).parse()
}

fn parse_error_messages(source: &str) -> Vec<String> {
    parse(source)
        .expect_err("expected the parse to fail")
        .iter()
        .map(|e| e.to_string())
        .collect()
}

#[test]
fn for_loop_desugars_to_block_and_while() {
    let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();

    assert_eq!(statements.len(), 1);

    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected the initializer block, got {:?}", statements[0]);
    };

    assert!(matches!(outer[0], Stmt::Var { ref name, .. } if name == "i"));

    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected a while loop, got {:?}", outer[1]);
    };

    // Body block runs the original statement, then the increment.
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected the body block, got {:?}", body);
    };

    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
}

#[test]
fn for_loop_without_clauses_has_no_wrappers() {
    let statements = parse("for (;;) print 1;").unwrap();

    // No initializer: no outer block.  No condition: literal true.
    let Stmt::While { condition, body } = &statements[0] else {
        panic!("expected a bare while loop, got {:?}", statements[0]);
    };

    assert!(matches!(condition, Expr::Literal(Literal::Bool(true))));
    // No increment: no inner block either.
    assert!(matches!(body.as_ref(), Stmt::Print(_)));
}

#[test]
fn invalid_assignment_target_is_reported() {
    let messages = parse_error_messages("1 + 2 = 3;");

    assert_eq!(messages, vec!["[line 1] Error: Invalid assignment target."]);
}

#[test]
fn errors_accumulate_across_declarations() {
    let messages = parse_error_messages("+;\n-;\nprint 1;");

    assert_eq!(
        messages,
        vec![
            "[line 1] Error: Expect expression.",
            "[line 2] Error: Expect expression.",
        ]
    );
}

#[test]
fn synchronization_recovers_at_statement_keywords() {
    // The first declaration is broken; the parser must still see the
    // following `print` and report only one error.
    let messages = parse_error_messages("var 123;\nprint \"ok\";");

    assert_eq!(messages, vec!["[line 1] Error: Expect variable name."]);
}

#[test]
fn error_at_end_of_input_uses_eof_location() {
    let messages = parse_error_messages("print 1");

    assert_eq!(messages, vec!["[end of file] Error: Expect ';' after value."]);
}

#[test]
fn class_with_superclass_and_methods() {
    let statements = parse("class B < A { init(x) {} m() {} }").unwrap();

    let Stmt::Class {
        name,
        superclass,
        methods,
        ..
    } = &statements[0]
    else {
        panic!("expected a class declaration, got {:?}", statements[0]);
    };

    assert_eq!(name, "B");
    assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name == "A"));

    let method_names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(method_names, vec!["init", "m"]);
    assert_eq!(methods[0].params, vec!["x".to_string()]);
}

#[test]
fn assignment_is_right_associative() {
    let statements = parse("a = b = 1;").unwrap();

    let Stmt::Expression(Expr::Assign { name, value, .. }) = &statements[0] else {
        panic!("expected an assignment, got {:?}", statements[0]);
    };

    assert_eq!(name, "a");
    assert!(matches!(value.as_ref(), Expr::Assign { name, .. } if name == "b"));
}

#[test]
fn call_chains_parse_left_to_right() {
    let statements = parse("object.method(1)(2).field;").unwrap();

    // Outermost node is the trailing property access.
    let Stmt::Expression(Expr::Get { name, object, .. }) = &statements[0] else {
        panic!("expected a property access, got {:?}", statements[0]);
    };

    assert_eq!(name, "field");
    assert!(matches!(object.as_ref(), Expr::Call { .. }));
}

#[test]
fn resolvable_expressions_get_distinct_ids() {
    let tokens: Vec<Token> = Scanner::new(b"a + a + a;".to_vec())
        .scan_tokens()
        .unwrap();

    let mut parser = Parser::new(tokens, 7);
    parser.parse().unwrap();

    // Three variable reads, ids 7, 8, 9: the watermark moves past them.
    assert_eq!(parser.watermark(), 10);
}
