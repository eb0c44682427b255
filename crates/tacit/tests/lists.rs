//! List representation and the structural operations.
//!
//! Lists live in reverse layout: payload in source order, header on top, and
//! the logical first element directly under the header. `head`/`tail`/`cons`
//! therefore work at the header end, while `slot`, `find`, `keys` and
//! `values` index from the base.

use pretty_assertions::assert_eq;
use tacit::{Repl, TacitValue};

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
fn literal_builds_payload_in_source_order() {
    assert_eq!(run("( 1 2 3 )"), vec![list(vec![num(1.0), num(2.0), num(3.0)])]);
}

#[test]
fn nested_literals_nest_structurally() {
    assert_eq!(
        run("( 1 ( 2 3 ) 4 )"),
        vec![list(vec![num(1.0), list(vec![num(2.0), num(3.0)]), num(4.0)])]
    );
}

#[test]
fn slots_counts_payload_cells() {
    assert_eq!(run("( 1 ( 2 3 ) 4 ) slots"), vec![num(5.0)]);
}

#[test]
fn length_counts_logical_elements() {
    assert_eq!(run("( 1 ( 2 3 ) 4 ) length"), vec![num(3.0)]);
    assert_eq!(run("( 1 2 3 ) length"), vec![num(3.0)]);
}

#[test]
fn length_never_exceeds_slots() {
    assert_eq!(run("( 1 ( 2 3 ) 4 ) length ( 1 ( 2 3 ) 4 ) slots le"), vec![num(1.0)]);
}

#[test]
fn empty_list_boundaries() {
    assert_eq!(run("( ) length"), vec![num(0.0)]);
    assert_eq!(run("( ) head"), vec![TacitValue::Nil]);
    assert_eq!(run("( ) tail"), vec![list(vec![])]);
}

#[test]
fn cons_grows_by_one_and_head_sees_it() {
    assert_eq!(run("( 1 2 ) 5 cons slots"), vec![num(3.0)]);
    assert_eq!(run("( 1 2 ) 5 cons head"), vec![num(5.0)]);
}

#[test]
fn cons_tail_is_the_identity() {
    assert_eq!(run("( 1 2 ) 5 cons tail"), run("( 1 2 )"));
}

#[test]
fn cons_of_a_compound_element() {
    let result = run("( 1 ) ( 2 3 ) cons");
    assert_eq!(result, vec![list(vec![num(1.0), list(vec![num(2.0), num(3.0)])])]);
    assert_eq!(run("( 1 ) ( 2 3 ) cons head"), vec![list(vec![num(2.0), num(3.0)])]);
}

#[test]
fn head_is_the_element_at_the_header_end() {
    assert_eq!(run("( 1 2 3 ) head"), vec![num(3.0)]);
}

#[test]
fn tail_drops_the_header_end_element() {
    assert_eq!(run("( 1 2 3 ) tail"), run("( 1 2 )"));
}

#[test]
fn uncons_splits_into_tail_and_head() {
    assert_eq!(run("( 1 2 3 ) uncons"), vec![list(vec![num(1.0), num(2.0)]), num(3.0)]);
    assert_eq!(run("( ) uncons"), vec![list(vec![]), TacitValue::Nil]);
}

#[test]
fn concat_joins_in_storage_order() {
    assert_eq!(run("( 1 2 ) ( 3 4 ) concat"), run("( 1 2 3 4 )"));
    assert_eq!(run("( ) ( 1 ) concat"), run("( 1 )"));
}

#[test]
fn concat_is_associative() {
    assert_eq!(
        run("( 1 2 ) ( 3 ) concat ( 4 5 ) concat"),
        run("( 1 2 ) ( 3 ) ( 4 5 ) concat concat")
    );
}

#[test]
fn append_inserts_at_the_logical_end() {
    assert_eq!(run("( 1 2 ) 9 append"), vec![list(vec![num(9.0), num(1.0), num(2.0)])]);
    // The logical first element is unchanged.
    assert_eq!(run("( 1 2 ) 9 append head"), vec![num(2.0)]);
}

#[test]
fn reverse_flips_element_order() {
    assert_eq!(run("( 1 2 3 ) reverse"), vec![list(vec![num(3.0), num(2.0), num(1.0)])]);
    assert_eq!(
        run("( 1 ( 2 3 ) 4 ) reverse"),
        vec![list(vec![num(4.0), list(vec![num(2.0), num(3.0)]), num(1.0)])]
    );
}

#[test]
fn pack_headers_existing_stack_items() {
    assert_eq!(run("1 2 3 3 pack"), run("( 1 2 3 )"));
    assert_eq!(run("0 pack"), run("( )"));
}

#[test]
fn pack_unpack_round_trips() {
    assert_eq!(run("1 2 3 3 pack unpack"), vec![num(1.0), num(2.0), num(3.0)]);
    assert_eq!(run("( 1 2 3 ) unpack 3 pack"), run("( 1 2 3 )"));
}

#[test]
fn slot_addresses_payload_cells_from_the_base() {
    assert_eq!(
        run("0 ( 10 20 30 ) slot fetch"),
        vec![list(vec![num(10.0), num(20.0), num(30.0)]), num(10.0)]
    );
    assert_eq!(
        run("2 ( 10 20 30 ) slot fetch"),
        vec![list(vec![num(10.0), num(20.0), num(30.0)]), num(30.0)]
    );
}

#[test]
fn slot_out_of_range_is_nil() {
    assert_eq!(
        run("5 ( 1 ) slot"),
        vec![list(vec![num(1.0)]), TacitValue::Nil]
    );
}

#[test]
fn elem_addresses_logical_elements() {
    assert_eq!(
        run("0 ( 10 20 30 ) elem fetch"),
        vec![list(vec![num(10.0), num(20.0), num(30.0)]), num(30.0)]
    );
    // A compound element materializes through its header.
    assert_eq!(
        run("0 ( 1 ( 2 3 ) ) elem fetch"),
        vec![
            list(vec![num(1.0), list(vec![num(2.0), num(3.0)])]),
            list(vec![num(2.0), num(3.0)]),
        ]
    );
}

#[test]
fn find_scans_key_value_pairs() {
    assert_eq!(
        run("`b ( `a 1 `b 2 ) find fetch"),
        vec![
            list(vec![
                TacitValue::Str("a".into()),
                num(1.0),
                TacitValue::Str("b".into()),
                num(2.0),
            ]),
            num(2.0),
        ]
    );
}

#[test]
fn find_missing_key_is_nil() {
    let result = run("`z ( `a 1 ) find");
    assert_eq!(result[1], TacitValue::Nil);
}

#[test]
fn find_falls_back_to_the_default_key() {
    let result = run("`z ( `a 1 `default 99 ) find fetch");
    assert_eq!(result[1], num(99.0));
}

#[test]
fn keys_and_values_split_a_maplist() {
    assert_eq!(
        run("( `a 1 `b 2 ) keys"),
        vec![list(vec![TacitValue::Str("a".into()), TacitValue::Str("b".into())])]
    );
    assert_eq!(run("( `a 1 `b 2 ) values"), vec![list(vec![num(1.0), num(2.0)])]);
}

#[test]
fn stack_shuffles_move_whole_spans() {
    assert_eq!(run("( 1 2 ) dup"), run("( 1 2 ) ( 1 2 )"));
    assert_eq!(run("1 ( 2 3 ) drop"), vec![num(1.0)]);
    assert_eq!(run("( 1 2 ) 3 swap"), vec![num(3.0), list(vec![num(1.0), num(2.0)])]);
    assert_eq!(
        run("( 1 2 ) 3 over"),
        vec![list(vec![num(1.0), num(2.0)]), num(3.0), list(vec![num(1.0), num(2.0)])]
    );
    assert_eq!(run("1 2 nip"), vec![num(2.0)]);
    assert_eq!(run("1 2 tuck"), vec![num(2.0), num(1.0), num(2.0)]);
    assert_eq!(run("1 2 3 rot"), vec![num(2.0), num(3.0), num(1.0)]);
    assert_eq!(run("1 2 3 -rot"), vec![num(3.0), num(1.0), num(2.0)]);
    assert_eq!(run("10 20 30 2 pick"), vec![num(10.0), num(20.0), num(30.0), num(10.0)]);
    assert_eq!(run("1 2 depth"), vec![num(1.0), num(2.0), num(2.0)]);
}

#[test]
fn shuffle_underflow_is_fatal() {
    let mut repl = Repl::new();
    assert!(repl.feed_no_print("drop").is_err());
    assert!(repl.feed_no_print("1 swap").is_err());
}
