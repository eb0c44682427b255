//! The finally wrapper and the err/inFinally unwinding protocol.

use pretty_assertions::assert_eq;
use tacit::{Repl, TacitError, TacitValue, VmError};

fn num(n: f32) -> TacitValue {
    TacitValue::Number(n)
}

#[test]
fn normal_exit_runs_body_then_cleanup_once() {
    let mut repl = Repl::new();
    repl.feed_no_print("0 global body-ran 0 global cleanups").unwrap();
    repl.feed_no_print(": f 1 -> body-ran finally cleanups 1 add -> cleanups ;").unwrap();
    repl.feed_no_print("f body-ran cleanups").unwrap();
    assert_eq!(repl.stack(), vec![num(1.0), num(1.0)]);
}

#[test]
fn cleanup_runs_once_per_call() {
    let mut repl = Repl::new();
    repl.feed_no_print("0 global n : f finally n 1 add -> n ;").unwrap();
    repl.feed_no_print("f f f n").unwrap();
    assert_eq!(repl.stack(), vec![num(3.0)]);
}

#[test]
fn an_error_in_the_body_still_runs_cleanup_then_propagates() {
    let mut repl = Repl::new();
    repl.feed_no_print("0 global a 0 global b").unwrap();
    repl.feed_no_print(r#": f 1 -> a "boom" raise 99 -> a finally 1 -> b ;"#).unwrap();
    let err = repl.feed_no_print("f").unwrap_err();
    match err {
        TacitError::Run(VmError::Uncaught { err }) => assert_eq!(err, "boom"),
        other => panic!("expected uncaught error, got {other:?}"),
    }
    // The raise skipped the rest of the body but the cleanup ran.
    repl.feed_no_print("a b").unwrap();
    assert_eq!(repl.stack(), vec![num(1.0), num(1.0)]);
}

#[test]
fn an_error_in_cleanup_preserves_the_original_and_suppresses_the_rest() {
    let mut repl = Repl::new();
    repl.feed_no_print("0 global b").unwrap();
    repl.feed_no_print(r#": f "first" raise finally "second" raise 5 -> b ;"#).unwrap();
    let err = repl.feed_no_print("f").unwrap_err();
    match err {
        TacitError::Run(VmError::Uncaught { err }) => assert_eq!(err, "first"),
        other => panic!("expected uncaught error, got {other:?}"),
    }
    repl.feed_no_print("b").unwrap();
    assert_eq!(repl.stack(), vec![num(0.0)]);
}

#[test]
fn errors_unwind_through_plain_frames_to_a_finally_wrapper() {
    let mut repl = Repl::new();
    repl.feed_no_print("0 global cleaned").unwrap();
    repl.feed_no_print(r#": deep "boom" raise ; : mid deep ; : f mid finally 1 -> cleaned ;"#).unwrap();
    assert!(repl.feed_no_print("f").is_err());
    repl.feed_no_print("cleaned").unwrap();
    assert_eq!(repl.stack(), vec![num(1.0)]);
}

#[test]
fn an_uncaught_error_with_no_wrapper_halts_the_submission() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print(r#": f "oops" raise ; f"#).unwrap_err();
    assert!(matches!(err, TacitError::Run(VmError::Uncaught { .. })), "{err}");
    // The session recovers.
    repl.feed_no_print("1 2 add").unwrap();
    assert_eq!(repl.stack(), vec![num(3.0)]);
}

#[test]
fn locals_are_rejected_in_the_cleanup_region() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print(": f 1 var x finally x ;").unwrap_err();
    assert!(matches!(err, TacitError::Parse(tacit::ParseError::LocalInCleanup { .. })), "{err}");
}

#[test]
fn finally_outside_a_definition_is_rejected() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print("finally").unwrap_err();
    assert!(matches!(err, TacitError::Parse(tacit::ParseError::MisplacedWord { .. })), "{err}");
}
