//! Stateful session behavior: persistence, rollback, snapshots.

use pretty_assertions::assert_eq;
use tacit::{CollectStringPrint, ParseError, Repl, TacitError, TacitValue};

fn num(n: f32) -> TacitValue {
    TacitValue::Number(n)
}

#[test]
fn definitions_persist_across_submissions() {
    let mut repl = Repl::new();
    repl.feed_no_print(": inc 1 add ;").unwrap();
    repl.feed_no_print("5 inc").unwrap();
    assert_eq!(repl.stack(), vec![num(6.0)]);
}

#[test]
fn the_data_stack_persists_across_submissions() {
    let mut repl = Repl::new();
    repl.feed_no_print("1 2").unwrap();
    repl.feed_no_print("add").unwrap();
    assert_eq!(repl.stack(), vec![num(3.0)]);
}

#[test]
fn a_parse_error_rolls_the_submission_back() {
    let mut repl = Repl::new();
    repl.feed_no_print("10").unwrap();
    let err = repl.feed_no_print(": broken 1 2").unwrap_err();
    assert!(matches!(err, TacitError::Parse(ParseError::Unclosed { .. })));
    // Neither the half definition nor its code survive; the session works.
    assert!(matches!(
        repl.feed_no_print("broken"),
        Err(TacitError::Parse(ParseError::UnknownWord { .. }))
    ));
    repl.feed_no_print(": works 1 ; works").unwrap();
    assert_eq!(repl.stack(), vec![num(10.0), num(1.0)]);
}

#[test]
fn an_unknown_word_leaves_earlier_state_intact() {
    let mut repl = Repl::new();
    repl.feed_no_print("7").unwrap();
    assert!(repl.feed_no_print("nonsense").is_err());
    assert_eq!(repl.stack(), vec![num(7.0)]);
}

#[test]
fn a_runtime_error_keeps_definitions_from_the_same_submission() {
    let mut repl = Repl::new();
    let err = repl.feed_no_print(": five 5 ; 0 fetch").unwrap_err();
    assert!(matches!(err, TacitError::Run(_)));
    repl.feed_no_print("five").unwrap();
    assert_eq!(repl.stack(), vec![num(5.0)]);
}

#[test]
fn print_output_goes_to_the_supplied_writer() {
    let mut repl = Repl::new();
    let mut collect = CollectStringPrint::new();
    repl.feed(": greet \"hello\" print ; greet greet", &mut collect).unwrap();
    assert_eq!(collect.output(), "hello\nhello\n");
}

#[test]
fn sessions_snapshot_and_restore() {
    let mut repl = Repl::new();
    repl.feed_no_print(": sq dup mul ; 2 sq").unwrap();
    let bytes = repl.dump().unwrap();

    let mut restored = Repl::load(&bytes).unwrap();
    assert_eq!(restored.stack(), vec![num(4.0)]);
    restored.feed_no_print("3 sq add").unwrap();
    assert_eq!(restored.stack(), vec![num(13.0)]);
}

#[test]
fn snapshots_preserve_interned_strings_and_globals() {
    let mut repl = Repl::new();
    repl.feed_no_print(r#"( `a 1 ) global m"#).unwrap();
    let bytes = repl.dump().unwrap();

    let mut restored = Repl::load(&bytes).unwrap();
    restored.feed_no_print("m ( `a ) get").unwrap();
    assert_eq!(restored.stack(), vec![num(1.0)]);
}

#[test]
fn top_level_locals_persist_across_submissions() {
    let mut repl = Repl::new();
    repl.feed_no_print("3 buffer var b").unwrap();
    repl.feed_no_print("1 b write 2 b write").unwrap();
    repl.feed_no_print("b read b read").unwrap();
    assert_eq!(repl.stack(), vec![num(1.0), num(2.0)]);
}
