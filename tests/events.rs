use pretty_assertions::assert_eq;
use xml_flow::events::Event;
use xml_flow::{Position, Reader};

fn parse(xml: &str) -> Vec<Event> {
    Reader::from_str(xml).into_events().collect()
}

#[test]
fn simple_element_with_attributes() {
    let events = parse(r#"<root a="1" b="2"/>"#);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], Event::StartDocument);
    match &events[1] {
        Event::StartElement(e) => {
            assert_eq!(e.name().local_name(), "root");
            let attrs: Vec<(String, String)> = e
                .attributes()
                .iter()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect();
            assert_eq!(
                attrs,
                vec![
                    ("a".to_string(), "1".to_string()),
                    ("b".to_string(), "2".to_string())
                ]
            );
        }
        other => panic!("expected StartElement, got {:?}", other),
    }
    match &events[2] {
        Event::EndElement(e) => assert_eq!(e.name().local_name(), "root"),
        other => panic!("expected EndElement, got {:?}", other),
    }
    assert_eq!(events[3], Event::EndDocument);
}

#[test]
fn predefined_entities_resolve_in_text() {
    let events = parse("<a>hello &amp; world</a>");
    let text = events
        .iter()
        .find_map(|e| match e {
            Event::Characters(t) => Some(t.content().to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(text, "hello & world");
}

#[test]
fn character_references_resolve_in_both_radixes() {
    let events = parse("<a>&#65;&#x42;</a>");
    assert_eq!(
        events.iter().find_map(|e| e.content()),
        Some("AB")
    );
}

#[test]
fn empty_input_yields_only_the_brackets() {
    assert_eq!(parse(""), vec![Event::StartDocument, Event::EndDocument]);
}

#[test]
fn document_brackets_are_unique_and_ordered() {
    let xml = "<?xml version=\"1.0\"?><r><a/><b>t</b><!--c--></r>";
    let events = parse(xml);
    assert_eq!(events.first(), Some(&Event::StartDocument));
    assert_eq!(events.last(), Some(&Event::EndDocument));
    assert_eq!(
        events.iter().filter(|e| **e == Event::StartDocument).count(),
        1
    );
    assert_eq!(
        events.iter().filter(|e| **e == Event::EndDocument).count(),
        1
    );
}

#[test]
fn start_and_end_elements_pair_up() {
    let events = parse("<a><b><c/></b><d/></a>");
    let mut depth = 0i64;
    let mut stack = Vec::new();
    for event in &events {
        match event {
            Event::StartElement(e) => {
                depth += 1;
                stack.push(e.name().to_string());
            }
            Event::EndElement(e) => {
                depth -= 1;
                assert_eq!(stack.pop(), Some(e.name().to_string()));
            }
            _ => {}
        }
    }
    assert_eq!(depth, 0);
    assert!(stack.is_empty());
}

#[test]
fn positions_are_monotonic_and_in_bounds() {
    let xml = "<r>\n  <a x=\"1\"/>\n  text\n  <!-- c -->\n</r>";
    let events = parse(xml);
    let mut last = Position::START;
    for event in &events {
        if let Some(position) = event.position() {
            assert!(position.line >= 1);
            assert!(position.line_start <= position.absolute);
            assert!(position.absolute <= xml.len() as u64);
            assert!(position.absolute >= last.absolute, "{:?}", event);
            last = position;
        }
    }
}

#[test]
fn whitespace_and_characters_are_distinct_events() {
    let events = parse("<a>  <b/>x</a>");
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Whitespace(t) if t.content() == "  ")));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Characters(t) if t.content() == "x")));
}

#[test]
fn cdata_allows_double_brackets() {
    let events = parse("<a><![CDATA[x ]] y]]></a>");
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CData(t) if t.content() == "x ]] y")));
}

#[test]
fn comments_and_pis_carry_their_payloads() {
    let events = parse("<a><!-- note --><?job run fast?></a>");
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Comment(t) if t.content() == " note ")));
    assert!(events.iter().any(
        |e| matches!(e, Event::ProcessingInstruction(pi) if pi.target() == "job" && pi.data() == "run fast")
    ));
}

#[test]
fn prolog_pseudo_attributes() {
    let events = parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>");
    match &events[1] {
        Event::Prolog(p) => {
            assert_eq!(p.target(), "xml");
            assert_eq!(p.version(), Some("1.0"));
            assert_eq!(p.encoding(), Some("UTF-8"));
            assert_eq!(p.standalone(), Some("yes"));
        }
        other => panic!("expected Prolog, got {:?}", other),
    }
}

#[test]
fn deep_nesting_parses_without_overflow() {
    let depth = 1000;
    let mut xml = String::new();
    for i in 0..depth {
        xml.push_str(&format!("<e{}>", i));
    }
    for i in (0..depth).rev() {
        xml.push_str(&format!("</e{}>", i));
    }
    let events = parse(&xml);
    assert!(events.iter().all(|e| !e.is_error()));
    let starts = events
        .iter()
        .filter(|e| matches!(e, Event::StartElement(_)))
        .count();
    assert_eq!(starts, depth);
}

#[test]
fn attribute_normalization_replaces_literal_whitespace() {
    let events = parse("<a v=\"one\ttwo\nthree\"/>");
    match &events[1] {
        Event::StartElement(e) => {
            assert_eq!(e.attributes().get("v"), Some("one two three"));
        }
        other => panic!("expected StartElement, got {:?}", other),
    }
}

#[test]
fn referenced_whitespace_is_preserved_in_attributes() {
    let events = parse("<a v=\"one&#x9;two&#xA;three\"/>");
    match &events[1] {
        Event::StartElement(e) => {
            assert_eq!(e.attributes().get("v"), Some("one\ttwo\nthree"));
        }
        other => panic!("expected StartElement, got {:?}", other),
    }
}

#[test]
fn opposite_quote_is_legal_inside_attribute_values() {
    let events = parse(r#"<a single='He said "hi"' double="It's fine"/>"#);
    match &events[1] {
        Event::StartElement(e) => {
            assert_eq!(e.attributes().get("single"), Some(r#"He said "hi""#));
            assert_eq!(e.attributes().get("double"), Some("It's fine"));
        }
        other => panic!("expected StartElement, got {:?}", other),
    }
}

#[test]
fn line_ends_normalize_to_line_feed() {
    let events = parse("<a>one\r\ntwo\rthree</a>");
    assert_eq!(events.iter().find_map(|e| e.content()), Some("one\ntwo\nthree"));
}

#[test]
fn edition_names_follow_the_selected_character_classes() {
    // U+0100 starts a name under both editions.
    let xml = "<\u{100}root/>";
    for events in vec![
        Reader::builder().into_str_reader(xml).into_events().collect::<Vec<_>>(),
        Reader::builder()
            .edition4()
            .into_str_reader(xml)
            .into_events()
            .collect::<Vec<_>>(),
    ] {
        assert!(
            matches!(&events[1], Event::StartElement(e) if e.name().local_name() == "\u{100}root")
        );
    }

    // A supplementary-plane character is a Fifth Edition addition.
    let xml = "<t\u{10000}/>";
    let ed5: Vec<Event> = Reader::builder().into_str_reader(xml).into_events().collect();
    assert!(matches!(&ed5[1], Event::StartElement(_)));
    let ed4: Vec<Event> = Reader::builder()
        .edition4()
        .into_str_reader(xml)
        .into_events()
        .collect();
    assert!(ed4.iter().any(|e| matches!(
        e.error().map(|err| err.kind()),
        Some(xml_flow::ErrorKind::InvalidCharacter)
    )));
}

#[test]
fn doctype_event_carries_the_raw_declaration() {
    let events = parse("<!DOCTYPE r [<!ENTITY x \"y\">]><r/>");
    match &events[1] {
        Event::Doctype(d) => {
            assert_eq!(d.content(), "DOCTYPE r [<!ENTITY x \"y\">]");
        }
        other => panic!("expected Doctype, got {:?}", other),
    }
}
