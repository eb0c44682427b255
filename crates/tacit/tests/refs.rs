//! References: fetch, load, store, and path access.

use pretty_assertions::assert_eq;
use tacit::{Repl, TacitError, TacitValue, VmError};

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
fn load_is_the_identity_on_non_refs() {
    assert_eq!(run("5 load"), vec![num(5.0)]);
    assert_eq!(run(r#""s" load"#), vec![TacitValue::Str("s".into())]);
    assert_eq!(run("nil load"), vec![TacitValue::Nil]);
    assert_eq!(run("( 1 2 ) load"), run("( 1 2 )"));
}

#[test]
fn fetch_requires_a_reference() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print("5 fetch").unwrap_err();
    assert!(matches!(err, TacitError::Run(VmError::FetchExpectsRef { .. })), "{err}");
}

#[test]
fn fetch_reads_one_cell_and_materializes_headers() {
    // A slot address fetches the slot's content verbatim; the payload
    // reference then materializes.
    assert_eq!(run("( 10 20 ) global xs &xs fetch load"), run("( 10 20 )"));
}

#[test]
fn slot_addresses_read_and_write_through_store() {
    assert_eq!(run("( 10 20 ) global xs 0 xs slot fetch"), vec![num(10.0)]);
    assert_eq!(
        run("( 10 20 ) global xs 99 0 xs slot store xs load"),
        vec![list(vec![num(99.0), num(20.0)])]
    );
}

#[test]
fn store_compound_through_a_reference_round_trips() {
    // fetch(ref) equals the stored compound cell-for-cell.
    assert_eq!(
        run("( 1 2 ) global xs ( 8 9 ) xs store xs fetch"),
        run("( 8 9 )")
    );
}

#[test]
fn identity_store_is_a_no_op() {
    assert_eq!(run("( 1 2 ) global xs xs xs store xs load"), run("( 1 2 )"));
}

#[test]
fn get_walks_keys_and_indices() {
    assert_eq!(run("( `a 1 `b 2 ) global m m ( `b ) get"), vec![num(2.0)]);
    assert_eq!(run("( `a 1 `b ( `c 5 ) ) global m m ( `b `c ) get"), vec![num(5.0)]);
    assert_eq!(run("( 10 20 30 ) global v v ( 0 ) get"), vec![num(30.0)]);
}

#[test]
fn get_misses_softly() {
    assert_eq!(run("( `a 1 ) global m m ( `z ) get"), vec![TacitValue::Nil]);
    assert_eq!(run("( `a 1 ) global m m ( `a `deeper ) get"), vec![TacitValue::Nil]);
}

#[test]
fn get_on_a_simple_target_answers_only_the_empty_path() {
    assert_eq!(run("5 global s s ( ) get"), vec![num(5.0)]);
    assert_eq!(run("5 global s s ( `k ) get"), vec![TacitValue::Nil]);
}

#[test]
fn set_stores_through_a_walked_path() {
    assert_eq!(
        run("( `a 1 `b 2 ) global m 99 &m ( `b ) set m load"),
        vec![list(vec![
            TacitValue::Str("a".into()),
            num(1.0),
            TacitValue::Str("b".into()),
            num(99.0),
        ])]
    );
}

#[test]
fn set_with_an_empty_path_is_a_no_op() {
    assert_eq!(run("( `a 1 ) global m 5 &m ( ) set m load"), run("( `a 1 )"));
}

#[test]
fn set_with_a_missing_key_is_a_no_op() {
    assert_eq!(run("( `a 1 ) global m 5 &m ( `z ) set m load"), run("( `a 1 )"));
}

#[test]
fn references_into_a_stack_resident_list_stay_valid_while_it_does() {
    assert_eq!(
        run("1 ( 10 20 ) slot fetch"),
        vec![list(vec![num(10.0), num(20.0)]), num(20.0)]
    );
}

#[test]
fn print_renders_values(){
    let mut repl = Repl::new();
    let mut collect = tacit::CollectStringPrint::new();
    repl.feed("( 1 2 3 ) print 4 print \"hi\" print nil print", &mut collect).unwrap();
    assert_eq!(collect.output(), "( 1 2 3 )\n4\nhi\nnil\n");
}
