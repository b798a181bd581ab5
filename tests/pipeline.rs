use pretty_assertions::assert_eq;
use xml_flow::events::Event;
use xml_flow::pipeline::{EventStream, PathSegment};
use xml_flow::validate::{Attributes, Comments, ProcessingInstructions, WellFormed};
use xml_flow::{ErrorKind, Reader};

fn relay(event: Event, _path: &[PathSegment]) -> Vec<Event> {
    vec![event]
}

fn validated(xml: &str) -> Vec<Event> {
    Reader::from_str(xml)
        .into_events()
        .transform(WellFormed::new())
        .transform(Attributes::new())
        .transform(Comments::new())
        .transform(ProcessingInstructions::new())
        .collect()
}

#[test]
fn tag_mismatch_carries_expected_and_got() {
    let events: Vec<Event> = Reader::from_str("<a></b>")
        .into_events()
        .transform(relay)
        .collect();
    let error = events.iter().find_map(|e| e.error()).unwrap();
    assert_eq!(error.kind(), ErrorKind::TagMismatch);
    assert_eq!(error.message(), "Expected </a>, got </b>");
    assert_eq!(error.get("expected"), Some("a"));
    assert_eq!(error.get("got"), Some("b"));
}

#[test]
fn well_formed_document_passes_all_validators() {
    let xml = r#"<?xml version="1.0"?>
<catalog>
    <item id="1">first</item>
    <item id="2"><!-- second --><?render now?></item>
</catalog>"#;
    assert!(validated(xml).iter().all(|e| !e.is_error()));
}

#[test]
fn prolog_without_root_is_missing_root() {
    let events = validated("<?xml version=\"1.0\"?>");
    let errors: Vec<_> = events.iter().filter_map(|e| e.error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "Document has no root element");
    assert_eq!(events.last(), Some(&Event::EndDocument));
}

#[test]
fn validators_compose_and_each_reports_its_own_fault() {
    let xml = "<a x=\"1\" x=\"2\"><!-- -- --><?xml bad?></a><b/>";
    let events = validated(xml);
    let kinds: Vec<ErrorKind> = events.iter().filter_map(|e| e.error()).map(|e| e.kind()).collect();
    assert!(kinds.contains(&ErrorKind::DuplicateAttr));
    assert!(kinds.contains(&ErrorKind::InvalidCharacter)); // '--' in comment
    assert!(kinds.contains(&ErrorKind::ParseError)); // reserved PI + second root
    assert_eq!(kinds.len(), 4);
}

#[test]
fn errors_from_the_pipeline_precede_transform_output() {
    let events: Vec<Event> = Reader::from_str("<a></b>")
        .into_events()
        .transform(|event: Event, _: &[PathSegment]| vec![event])
        .collect();
    let error_idx = events.iter().position(|e| e.is_error()).unwrap();
    assert!(matches!(events[error_idx + 1], Event::EndElement(_)));
}

#[test]
fn rewriting_transform_changes_the_stream() {
    // Drop all comments, duplicate all character data.
    let events: Vec<Event> = Reader::from_str("<a><!--x-->hi</a>")
        .into_events()
        .transform(|event: Event, _: &[PathSegment]| match event {
            Event::Comment(_) => vec![],
            Event::Characters(t) => {
                vec![Event::Characters(t.clone()), Event::Characters(t)]
            }
            other => vec![other],
        })
        .collect();
    assert!(!events.iter().any(|e| matches!(e, Event::Comment(_))));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Characters(_)))
            .count(),
        2
    );
}

#[test]
fn transform_accumulates_state_across_events() {
    let mut names = Vec::new();
    let events: Vec<Event> = Reader::from_str("<a><b/><c/></a>")
        .into_events()
        .transform(|event: Event, path: &[PathSegment]| {
            if let Event::StartElement(_) = &event {
                names.push(
                    path.iter()
                        .map(|p| p.local_name().to_string())
                        .collect::<Vec<_>>()
                        .join("/"),
                );
            }
            vec![event]
        })
        .collect();
    drop(events);
    assert_eq!(names, vec!["a", "a/b", "a/c"]);
}

#[test]
fn halt_on_error_short_circuits() {
    let events: Vec<Event> = Reader::from_str("<a><b></c><d/></a>")
        .into_events()
        .transform(relay)
        .halt_on_error()
        .collect();
    // Everything after the first error is gone, except the closing
    // EndDocument.
    assert_eq!(events.iter().filter(|e| e.is_error()).count(), 1);
    assert_eq!(events.last(), Some(&Event::EndDocument));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::StartElement(s) if s.name().local_name() == "d")));
}

#[test]
fn split_errors_partitions_the_stream() {
    let (events, errors) = Reader::from_str("<a><b></b></c></a>")
        .into_events()
        .transform(relay)
        .split_errors();
    assert!(events.iter().all(|e| !e.is_error()));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::TagMismatch);
}

#[test]
fn unclosed_elements_surface_in_the_finalizer() {
    let events: Vec<Event> = Reader::from_str("<a><b>")
        .into_events()
        .transform(relay)
        .collect();
    let unclosed: Vec<&str> = events
        .iter()
        .filter_map(|e| e.error())
        .filter(|e| e.kind() == ErrorKind::UnclosedTag)
        .filter_map(|e| e.get("element"))
        .collect();
    assert_eq!(unclosed, vec!["b", "a"]);
    // The finalizer runs before EndDocument is forwarded.
    assert_eq!(events.last(), Some(&Event::EndDocument));
}

#[test]
fn tolerate_and_continue_keeps_data_flowing() {
    let events: Vec<Event> = Reader::from_str("<a></b><c>text</c></a>")
        .into_events()
        .transform(relay)
        .collect();
    assert!(events.iter().any(|e| e.is_error()));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Characters(t) if t.content() == "text")));
}
