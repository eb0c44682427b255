//! Colon definitions and the compiled control-flow constructs.

use pretty_assertions::assert_eq;
use tacit::{ParseError, Repl, TacitError, TacitValue};

fn run(source: &str) -> Vec<TacitValue> {
    let mut repl = Repl::new();
    repl.feed_no_print(source).unwrap();
    repl.stack()
}

fn parse_error(source: &str) -> ParseError {
    let mut repl = Repl::new();
    match repl.feed_no_print(source) {
        Err(TacitError::Parse(e)) => e,
        other => panic!("expected a parse error, got {other:?}"),
    }
}

fn num(n: f32) -> TacitValue {
    TacitValue::Number(n)
}

#[test]
fn colon_definition_and_call() {
    assert_eq!(run(": square dup mul ; 4 square"), vec![num(16.0)]);
}

#[test]
fn definitions_compose() {
    assert_eq!(run(": double 2 mul ; : quad double double ; 3 quad"), vec![num(12.0)]);
}

#[test]
fn definition_body_is_skipped_at_top_level() {
    // Nothing runs until the word is called.
    assert_eq!(run(": noisy 1 2 3 ;"), vec![]);
}

#[test]
fn redefinition_shadows() {
    assert_eq!(run(": f 1 ; : f 2 ; f"), vec![num(2.0)]);
}

#[test]
fn if_else_takes_the_matching_arm() {
    assert_eq!(run("1 if 100 else 200 ; 0 if 100 else 200 ;"), vec![num(100.0), num(200.0)]);
}

#[test]
fn if_without_else() {
    assert_eq!(run("1 if 42 ;"), vec![num(42.0)]);
    assert_eq!(run("0 if 42 ;"), vec![]);
}

#[test]
fn nested_if() {
    assert_eq!(run("1 if 0 if 10 else 20 ; else 30 ;"), vec![num(20.0)]);
}

#[test]
fn when_with_no_matching_clause_keeps_the_scrutinee() {
    assert_eq!(
        run("5 when do 1 eq if 10 ; do 2 eq if 20 ; ;"),
        vec![num(5.0)]
    );
}

#[test]
fn when_runs_the_first_matching_clause() {
    assert_eq!(
        run("2 when do 1 eq if 10 ; do 2 eq if 20 ; ;"),
        vec![num(2.0), num(20.0)]
    );
}

#[test]
fn when_clause_without_a_guard_always_runs() {
    // `do` copies the scrutinee for the guard; an unguarded clause sees the
    // copy and the original.
    assert_eq!(run("7 when do drop drop 99 ; ;"), vec![num(99.0)]);
}

#[test]
fn case_dispatches_on_the_discriminant() {
    assert_eq!(
        run(r#"1 case 1 of "one" ; 2 of "two" ; DEFAULT "other" ; ;"#),
        vec![TacitValue::Str("one".into())]
    );
    assert_eq!(
        run(r#"2 case 1 of "one" ; 2 of "two" ; DEFAULT "other" ; ;"#),
        vec![TacitValue::Str("two".into())]
    );
}

#[test]
fn case_falls_back_to_default() {
    assert_eq!(
        run(r#"7 case 1 of "one" ; 2 of "two" ; DEFAULT "other" ; ;"#),
        vec![TacitValue::Str("other".into())]
    );
}

#[test]
fn case_without_default_drops_the_discriminant() {
    assert_eq!(run(r#"9 case 1 of "one" ; ;"#), vec![]);
}

#[test]
fn case_matches_string_discriminants() {
    assert_eq!(run(r#""b" case "a" of 1 ; "b" of 2 ; ;"#), vec![num(2.0)]);
}

#[test]
fn code_values_and_eval() {
    assert_eq!(run(": inc 1 add ; 5 @inc eval"), vec![num(6.0)]);
    assert_eq!(run("3 @dup eval"), vec![num(3.0), num(3.0)]);
}

#[test]
fn unclosed_constructs_are_reported() {
    assert_eq!(parse_error(": broken 1"), ParseError::Unclosed { construct: "DEFINITION" });
    assert_eq!(parse_error("1 if 2"), ParseError::Unclosed { construct: "IF" });
    assert_eq!(parse_error("1 when"), ParseError::Unclosed { construct: "WHEN" });
    assert_eq!(parse_error("1 case"), ParseError::Unclosed { construct: "CASE" });
    assert_eq!(parse_error("( 1 2"), ParseError::Unclosed { construct: "list" });
}

#[test]
fn stray_words_are_reported() {
    assert!(matches!(parse_error(";"), ParseError::UnexpectedTerminator { .. }));
    assert!(matches!(parse_error("1 else 2 ;"), ParseError::MisplacedWord { word: "else", .. }));
    assert!(matches!(parse_error("1 of 2 ;"), ParseError::MisplacedWord { word: "of", .. }));
    assert!(matches!(parse_error("do 1 ;"), ParseError::MisplacedWord { word: "do", .. }));
    assert!(matches!(parse_error(": a : b ; ;"), ParseError::NestedDefinition { .. }));
}

#[test]
fn duplicate_default_is_rejected() {
    assert!(matches!(
        parse_error("1 case DEFAULT 1 ; DEFAULT 2 ; ;"),
        ParseError::DuplicateDefault { .. }
    ));
}

#[test]
fn unknown_words_carry_their_position() {
    assert_eq!(
        parse_error("1 2 mystery"),
        ParseError::UnknownWord { word: "mystery".into(), position: 4 }
    );
}
