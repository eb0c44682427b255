//! Local variables: frame slots, compound locals, assignment.
//!
//! A bare local read yields the slot's value for simple locals and the
//! reference to the frame-resident payload for compound locals; `load` is
//! the explicit materializer and `&x` the slot address.

use pretty_assertions::assert_eq;
use tacit::{ParseError, Repl, TacitError, TacitValue, VmError};

fn run(source: &str) -> Vec<TacitValue> {
    let mut repl = Repl::new();
    repl.feed_no_print(source).unwrap();
    repl.stack()
}

fn num(n: f32) -> TacitValue {
    TacitValue::Number(n)
}

fn list(items: Vec<TacitValue>) -> TacitValue {
    TacitValue::List(items)
}

#[test]
fn simple_local_read() {
    assert_eq!(run(": f 10 var x x x add ; f"), vec![num(20.0)]);
}

#[test]
fn simple_local_assignment() {
    assert_eq!(run(": f 1 var x 5 -> x x ; f"), vec![num(5.0)]);
}

#[test]
fn increment_in_place() {
    assert_eq!(run(": f 1 var x 3 +> x x ; f"), vec![num(4.0)]);
}

#[test]
fn several_locals_get_distinct_slots() {
    assert_eq!(run(": f 1 var a 2 var b 3 var c a b c ; f"), vec![num(1.0), num(2.0), num(3.0)]);
}

#[test]
fn compound_local_reads_as_a_reference() {
    // The list is queried through the frame, not copied per mention.
    assert_eq!(run(": f ( 1 2 3 ) var xs xs length ; f"), vec![num(3.0)]);
}

#[test]
fn compound_local_materializes_with_load() {
    assert_eq!(
        run(": f ( 1 2 3 ) var xs xs load ; f"),
        vec![list(vec![num(1.0), num(2.0), num(3.0)])]
    );
}

#[test]
fn slot_address_fetch_load_round_trips_a_compound() {
    assert_eq!(
        run(": f ( 7 8 ) var y &y fetch load ; f"),
        vec![list(vec![num(7.0), num(8.0)])]
    );
}

#[test]
fn compatible_compound_assignment_updates_in_place() {
    assert_eq!(
        run(": f ( 1 2 ) var xs ( 5 6 ) -> xs xs load ; f"),
        vec![list(vec![num(5.0), num(6.0)])]
    );
}

#[test]
fn reference_source_assignment_copies_between_frames() {
    assert_eq!(
        run(": f ( 1 2 ) var a ( 3 4 ) var b a -> b b load ; f"),
        vec![list(vec![num(1.0), num(2.0)])]
    );
}

#[test]
fn incompatible_compound_assignment_is_fatal() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print(": f ( 1 2 ) var xs ( 1 2 3 ) -> xs ; f").unwrap_err();
    assert!(matches!(err, TacitError::Run(VmError::StoreIncompatible { .. })), "{err}");
}

#[test]
fn simple_compound_mismatch_is_fatal() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print(": f ( 1 2 ) var xs 5 -> xs ; f").unwrap_err();
    assert!(matches!(err, TacitError::Run(VmError::StoreIncompatible { .. })), "{err}");
}

#[test]
fn top_level_locals_work_in_the_root_frame() {
    assert_eq!(run("42 var answer answer"), vec![num(42.0)]);
    assert_eq!(run("( 1 2 ) var xs xs load"), vec![list(vec![num(1.0), num(2.0)])]);
}

#[test]
fn locals_shadow_globals_during_compilation() {
    assert_eq!(run("1 global x : f 2 var x x ; f x"), vec![num(2.0), num(1.0)]);
}

#[test]
fn local_names_are_forgotten_after_the_definition() {
    let mut repl = Repl::new();
    repl.feed_no_print(": f 1 var secret secret ;").unwrap();
    let err = repl.feed_no_print("secret").unwrap_err();
    assert!(matches!(
        err,
        TacitError::Parse(ParseError::UnknownWord { .. })
    ));
}

#[test]
fn top_level_locals_are_not_visible_inside_definitions() {
    let mut repl = Repl::new();
    repl.feed_no_print("5 var t").unwrap();
    let err = repl.feed_no_print(": g t ;").unwrap_err();
    assert!(matches!(
        err,
        TacitError::Parse(ParseError::RootLocalInDefinition { .. })
    ));
}

#[test]
fn assignment_to_an_unknown_name_is_a_parse_error() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print("5 -> nowhere").unwrap_err();
    assert!(matches!(err, TacitError::Parse(ParseError::UnknownWord { .. })));
}

#[test]
fn increment_targets_locals_only() {
    let mut repl = Repl::new();
    repl.feed_no_print("1 global g").unwrap();
    let err = repl.feed_no_print("1 +> g").unwrap_err();
    assert!(matches!(err, TacitError::Parse(ParseError::BadAssignTarget { .. })));
}

#[test]
fn locals_are_frame_private_across_recursion_depth() {
    // Each call gets fresh slots: the outer x is unchanged by the inner call.
    assert_eq!(
        run(": inner 99 var x x drop ; : outer 7 var x inner x ; outer"),
        vec![num(7.0)]
    );
}
