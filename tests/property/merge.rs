//! Region merge properties over generated texts

use proptest::prelude::*;
use roomsync::merge::merge_lines;

const START: &str = "    // <USER CODE>";
const END: &str = "    // </USER CODE>";

/// `segments` surround the regions, so there is one more segment than bodies
fn render(segments: &[Vec<String>], bodies: &[Vec<String>]) -> Vec<String> {
    let mut lines = segments[0].clone();
    for (body, segment) in bodies.iter().zip(&segments[1..]) {
        lines.push(START.to_string());
        lines.extend(body.iter().cloned());
        lines.push(END.to_string());
        lines.extend(segment.iter().cloned());
    }
    lines
}

fn block() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z ;(){}]{0,10}", 0..4)
}

/// Segments and bodies for a text with `regions` regions
fn text(regions: usize) -> impl Strategy<Value = (Vec<Vec<String>>, Vec<Vec<String>>)> {
    (
        prop::collection::vec(block(), regions + 1),
        prop::collection::vec(block(), regions),
    )
}

#[test]
fn test_merge_takes_bodies_from_current_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let strategy = (0usize..4).prop_flat_map(|regions| (text(regions), text(regions)));
    runner
        .run(
            &strategy,
            |((current_segments, current_bodies), (incoming_segments, incoming_bodies))| {
                let current = render(&current_segments, &current_bodies);
                let incoming = render(&incoming_segments, &incoming_bodies);

                let outcome = merge_lines(&current, &incoming);

                prop_assert!(!outcome.structure_mismatch);
                prop_assert_eq!(&outcome.regions, &current_bodies);
                prop_assert_eq!(outcome.lines, render(&incoming_segments, &current_bodies));
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_merge_is_idempotent_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let strategy = ((0usize..3).prop_flat_map(text), (0usize..3).prop_flat_map(text));
    runner
        .run(
            &strategy,
            |((current_segments, current_bodies), (incoming_segments, incoming_bodies))| {
                let current = render(&current_segments, &current_bodies);
                let incoming = render(&incoming_segments, &incoming_bodies);

                let once = merge_lines(&current, &incoming);
                let twice = merge_lines(&once.lines, &incoming);

                prop_assert!(!twice.structure_mismatch);
                prop_assert_eq!(twice.lines, once.lines);
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_merge_with_itself_is_identity_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0usize..4).prop_flat_map(text), |(segments, bodies)| {
            let lines = render(&segments, &bodies);
            let outcome = merge_lines(&lines, &lines);
            prop_assert_eq!(outcome.lines, lines);
            Ok(())
        })
        .unwrap();
}
