//! End-to-end tests: source in, captured `print` output (or errors) out.

use loxide::error::LoxError;
use loxide::interpreter::Interpreter;

fn run_capture(source: &str) -> (String, Result<(), Vec<LoxError>>) {
    let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

    let result = interpreter.run(source.as_bytes());

    let output: String =
        String::from_utf8(interpreter.output().clone()).expect("print output is UTF-8");

    (output, result)
}

fn interpret(source: &str) -> String {
    let (output, result) = run_capture(source);

    if let Err(errors) = result {
        let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        panic!("unexpected errors: {:?}", rendered);
    }

    output
}

fn error_messages(source: &str) -> Vec<String> {
    let (_, result) = run_capture(source);

    result
        .expect_err("expected interpretation to fail")
        .iter()
        .map(|e| e.to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(interpret("print 1 + 2 * 3;"), "7\n");
    assert_eq!(interpret("print (1 + 2) * 3;"), "9\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(interpret("print \"a\" + \"b\";"), "ab\n");
}

#[test]
fn mixed_addition_is_a_runtime_error() {
    assert_eq!(
        error_messages("print 1 + \"a\";"),
        vec!["[line 1] Error: Operands must be two numbers or two strings."]
    );
}

#[test]
fn numbers_print_without_integral_fraction() {
    assert_eq!(interpret("print 3.0;"), "3\n");
    assert_eq!(interpret("print 2.5;"), "2.5\n");
    assert_eq!(interpret("print 10 / 4;"), "2.5\n");
}

#[test]
fn division_by_zero_follows_ieee754() {
    assert_eq!(interpret("print 1 / 0;"), "inf\n");
    assert_eq!(interpret("print -1 / 0;"), "-inf\n");
}

#[test]
fn unary_operators() {
    assert_eq!(interpret("print -3;"), "-3\n");
    assert_eq!(interpret("print !nil;"), "true\n");
    assert_eq!(interpret("print !!0;"), "true\n");

    assert_eq!(
        error_messages("print -\"oops\";"),
        vec!["[line 1] Error: Operand must be a number."]
    );
}

#[test]
fn comparison_requires_numbers() {
    assert_eq!(interpret("print 1 < 2;"), "true\n");
    assert_eq!(interpret("print 2 <= 1;"), "false\n");

    assert_eq!(
        error_messages("print \"a\" < \"b\";"),
        vec!["[line 1] Error: Operands must be numbers."]
    );
}

#[test]
fn equality_never_type_errors() {
    assert_eq!(interpret("print nil == nil;"), "true\n");
    assert_eq!(interpret("print nil == false;"), "false\n");
    assert_eq!(interpret("print 1 == \"1\";"), "false\n");
    assert_eq!(interpret("print \"a\" != \"b\";"), "true\n");
}

#[test]
fn logical_operators_return_the_deciding_operand() {
    assert_eq!(interpret("print \"hi\" or 2;"), "hi\n");
    assert_eq!(interpret("print nil or \"yes\";"), "yes\n");
    assert_eq!(interpret("print nil and 2;"), "nil\n");
    assert_eq!(interpret("print true and \"x\";"), "x\n");
}

#[test]
fn logical_operators_short_circuit_side_effects() {
    let source = r#"
        var called = false;
        fun touch() { called = true; return true; }
        false and touch();
        print called;
        true or touch();
        print called;
    "#;

    assert_eq!(interpret(source), "false\nfalse\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Variables, scopes, control flow
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn assignment_is_an_expression() {
    assert_eq!(interpret("var a = 1; print a = 2; print a;"), "2\n2\n");
}

#[test]
fn undefined_variable_read_and_write() {
    assert_eq!(
        error_messages("print missing;"),
        vec!["[line 1] Error: Undefined variable 'missing'."]
    );

    assert_eq!(
        error_messages("missing = 1;"),
        vec!["[line 1] Error: Undefined variable 'missing'."]
    );
}

#[test]
fn uninitialized_variables_are_nil() {
    assert_eq!(interpret("var a; print a;"), "nil\n");
}

#[test]
fn global_redefinition_is_allowed() {
    assert_eq!(interpret("var a = 1; var a = 2; print a;"), "2\n");
}

#[test]
fn local_redefinition_is_rejected() {
    assert_eq!(
        error_messages("{ var a = 1; var a = 2; }"),
        vec!["[line 1] Error: Already variable with this name in this scope."]
    );
}

#[test]
fn blocks_shadow_and_restore() {
    assert_eq!(
        interpret("var foo = 42; { var foo = 24; print foo; } print foo;"),
        "24\n42\n"
    );
}

#[test]
fn inner_blocks_assign_through_to_outer_frames() {
    assert_eq!(interpret("var x = 2; { x = x + 1; } print x;"), "3\n");
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    assert_eq!(
        error_messages("{ var a = a; }"),
        vec!["[line 1] Error: Can't read local variable 'a' in its own initializer."]
    );
}

#[test]
fn if_else_branches() {
    assert_eq!(
        interpret("if (2 + 2 == 4) print \"yes\"; else print \"no\";"),
        "yes\n"
    );
    assert_eq!(
        interpret("if (2 + 2 == 5) print \"yes\"; else print \"no\";"),
        "no\n"
    );
}

#[test]
fn while_loop_counts() {
    assert_eq!(
        interpret("var i = 0; while (i < 5) { print i; i = i + 1; }"),
        "0\n1\n2\n3\n4\n"
    );
}

#[test]
fn for_loop_side_effects() {
    assert_eq!(
        interpret("var s = \"\"; for (var i = 0; i < 3; i = i + 1) s = s + \".\"; print s;"),
        "...\n"
    );
}

#[test]
fn for_loop_variable_is_scoped_to_the_loop() {
    assert_eq!(
        error_messages("for (var i = 0; i < 1; i = i + 1) {} print i;"),
        vec!["[line 1] Error: Undefined variable 'i'."]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Functions and closures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn function_calls_and_recursion() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
    "#;

    assert_eq!(interpret(source), "55\n");
}

#[test]
fn functions_without_return_yield_nil() {
    assert_eq!(interpret("fun f() {} print f();"), "nil\n");
}

#[test]
fn return_unwinds_nested_blocks() {
    let source = r#"
        fun f() {
            while (true) {
                { return 1; }
            }
        }
        print f();
    "#;

    assert_eq!(interpret(source), "1\n");
}

#[test]
fn function_values_display_with_arity() {
    assert_eq!(interpret("fun f(a, b) {} print f;"), "<fn/2>\n");
    assert_eq!(interpret("print clock;"), "<fn>\n");
}

#[test]
fn closures_capture_their_defining_environment() {
    let source = r#"
        var a = "global";
        {
            fun show() { print a; }
            show();
            var a = "local";
            show();
        }
    "#;

    assert_eq!(interpret(source), "global\nglobal\n");
}

#[test]
fn closures_share_mutable_state() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() {
                i = i + 1;
                print i;
            }
            return count;
        }
        var counter = makeCounter();
        counter();
        counter();
    "#;

    assert_eq!(interpret(source), "1\n2\n");
}

#[test]
fn arity_mismatch_is_a_runtime_error() {
    assert_eq!(
        error_messages("fun f(a) {} f(1, 2);"),
        vec!["[line 1] Error: Expected 1 arguments but got 2."]
    );
}

#[test]
fn only_functions_and_classes_are_callable() {
    assert_eq!(
        error_messages("\"nope\"();"),
        vec!["[line 1] Error: Can only call functions and classes."]
    );
}

#[test]
fn return_at_top_level_is_rejected() {
    assert_eq!(
        error_messages("return 1;"),
        vec!["[line 1] Error: Can't return from top-level code."]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn classes_and_instances_display() {
    assert_eq!(interpret("class C {} print C;"), "C\n");
    assert_eq!(interpret("class C {} print C();"), "C instance\n");
}

#[test]
fn fields_are_per_instance() {
    let source = r#"
        class Bag {}
        var a = Bag();
        var b = Bag();
        a.item = "apple";
        b.item = "brick";
        print a.item;
        print b.item;
    "#;

    assert_eq!(interpret(source), "apple\nbrick\n");
}

#[test]
fn set_expression_yields_the_assigned_value() {
    assert_eq!(interpret("class C {} var c = C(); print c.x = 9;"), "9\n");
}

#[test]
fn initializer_binds_this() {
    let source = r#"
        class Bacon {
            init(kind) { this.kind = kind; }
            eat() { print "Crunch " + this.kind + "!"; }
        }
        Bacon("veggie").eat();
    "#;

    assert_eq!(interpret(source), "Crunch veggie!\n");
}

#[test]
fn methods_observe_their_receiver() {
    let source = r#"
        class C {
            who() { return this; }
        }
        var c = C();
        print c.who() == c;
    "#;

    assert_eq!(interpret(source), "true\n");
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Speaker {
            init(name) { this.name = name; }
            speak() { print this.name; }
        }
        var method = Speaker("alice").speak;
        method();
    "#;

    assert_eq!(interpret(source), "alice\n");
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class C {
            m() { print "method"; }
        }
        var c = C();
        fun replacement() { print "field"; }
        c.m = replacement;
        c.m();
    "#;

    assert_eq!(interpret(source), "field\n");
}

#[test]
fn property_access_on_non_instances_fails() {
    assert_eq!(
        error_messages("print \"s\".length;"),
        vec!["[line 1] Error: Only instances have properties."]
    );

    assert_eq!(
        error_messages("1.x = 2;"),
        vec!["[line 1] Error: Only instances have fields."]
    );
}

#[test]
fn undefined_property_fails() {
    assert_eq!(
        error_messages("class C {} print C().ghost;"),
        vec!["[line 1] Error: Undefined property 'ghost'."]
    );
}

#[test]
fn class_arity_follows_init() {
    let source = r#"
        class Point {
            init(x, y) {
                this.x = x;
                this.y = y;
            }
        }
        var p = Point(3, 4);
        print p.x + p.y;
    "#;

    assert_eq!(interpret(source), "7\n");

    assert_eq!(
        error_messages("class P { init(x, y) {} } P(1);"),
        vec!["[line 1] Error: Expected 2 arguments but got 1."]
    );
}

#[test]
fn initializer_returns_this_even_on_early_return() {
    let source = r#"
        class Foo {
            init() {
                return;
                print "unreachable";
            }
        }
        var f = Foo();
        print f;
    "#;

    assert_eq!(interpret(source), "Foo instance\n");
}

#[test]
fn calling_init_directly_returns_the_instance() {
    assert_eq!(
        interpret("class Foo { init() {} } var f = Foo(); print f.init();"),
        "Foo instance\n"
    );
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    assert_eq!(
        error_messages("class Foo { init() { return 1; } }"),
        vec!["[line 1] Error: Can't return a value from an initializer."]
    );
}

#[test]
fn methods_can_name_their_own_class() {
    let source = r#"
        class C {
            make() { return C(); }
        }
        print C().make();
    "#;

    assert_eq!(interpret(source), "C instance\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Inheritance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn methods_are_inherited() {
    let source = r#"
        class A { m() { print "a"; } }
        class B < A {}
        B().m();
    "#;

    assert_eq!(interpret(source), "a\n");
}

#[test]
fn initializers_are_inherited() {
    let source = r#"
        class A { init() { this.x = 1; } }
        class B < A {}
        print B().x;
    "#;

    assert_eq!(interpret(source), "1\n");
}

#[test]
fn super_calls_the_overridden_method() {
    let source = r#"
        class A { greet() { print "A"; } }
        class B < A {
            greet() {
                super.greet();
                print "B";
            }
        }
        B().greet();
    "#;

    assert_eq!(interpret(source), "A\nB\n");
}

#[test]
fn super_lookup_starts_at_the_immediate_superclass() {
    let source = r#"
        class A { m() { print "A"; } }
        class B < A { m() { print "B"; } }
        class C < B { m() { super.m(); } }
        C().m();
    "#;

    assert_eq!(interpret(source), "B\n");
}

#[test]
fn super_on_a_missing_method_fails() {
    let source = r#"
        class A {}
        class B < A {
            m() { super.ghost(); }
        }
        B().m();
    "#;

    assert_eq!(
        error_messages(source),
        vec!["[line 4] Error: Undefined property 'ghost'."]
    );
}

#[test]
fn superclass_must_be_a_class() {
    assert_eq!(
        error_messages("var NotAClass = \"str\"; class C < NotAClass {}"),
        vec!["[line 1] Error: Superclass must be a class."]
    );
}

#[test]
fn a_class_cannot_inherit_from_itself() {
    assert_eq!(
        error_messages("class Ouroboros < Ouroboros {}"),
        vec!["[line 1] Error: A class can't inherit from itself."]
    );
}

#[test]
fn this_and_super_placement_rules() {
    assert_eq!(
        error_messages("print this;"),
        vec!["[line 1] Error: Can't use 'this' outside of a class."]
    );

    assert_eq!(
        error_messages("print super.m;"),
        vec!["[line 1] Error: Can't use 'super' outside of a class."]
    );

    assert_eq!(
        error_messages("class C { m() { super.m(); } }"),
        vec!["[line 1] Error: Can't use 'super' in a class with no superclass."]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions (REPL contract)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn state_persists_across_source_units() {
    let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

    interpreter.run(b"var x = 1;").unwrap();
    interpreter.run(b"fun inc() { x = x + 1; }").unwrap();
    interpreter.run(b"inc(); inc(); print x;").unwrap();

    assert_eq!(interpreter.output(), b"3\n");
}

#[test]
fn closures_survive_across_source_units() {
    let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

    interpreter
        .run(
            br#"
            fun make() {
                var i = 0;
                fun inc() {
                    i = i + 1;
                    print i;
                }
                return inc;
            }
            "#,
        )
        .unwrap();
    interpreter.run(b"var c = make();").unwrap();
    interpreter.run(b"c(); c();").unwrap();

    assert_eq!(interpreter.output(), b"1\n2\n");
}

#[test]
fn a_failed_line_leaves_earlier_definitions_intact() {
    let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

    interpreter.run(b"var x = 40;").unwrap();
    assert!(interpreter.run(b"x + ;").is_err());
    interpreter.run(b"print x + 2;").unwrap();

    assert_eq!(interpreter.output(), b"42\n");
}

#[test]
fn output_before_a_runtime_error_is_preserved() {
    let (output, result) = run_capture("print 1; print nil + 2;");

    assert_eq!(output, "1\n");
    assert_eq!(
        result.unwrap_err()[0].to_string(),
        "[line 1] Error: Operands must be two numbers or two strings."
    );
}
