use criterion::{self, criterion_group, criterion_main, Criterion};
use pretty_assertions::assert_eq;
use xml_flow::c14n::{canonicalize_to_string, C14nOptions};
use xml_flow::escape::{escape, unescape};
use xml_flow::events::Event;
use xml_flow::pipeline::EventStream;
use xml_flow::validate::{Attributes, WellFormed};
use xml_flow::Reader;

static LOREM_IPSUM_TEXT: &str =
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt
ut labore et dolore magna aliqua. Hac habitasse platea dictumst vestibulum rhoncus est pellentesque.
Risus ultricies tristique nulla aliquet enim tortor at. Fermentum odio eu feugiat pretium nibh ipsum.";

/// Builds a synthetic feed-like document with `items` entries.
fn sample_document(items: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><feed xmlns:m=\"urn:meta\">");
    for i in 0..items {
        xml.push_str(&format!(
            "<item id=\"{}\" m:rank=\"{}\"><title>Entry &amp; notes #{}</title>\
             <body>{}</body><!-- boundary --></item>",
            i,
            i % 7,
            i,
            LOREM_IPSUM_TEXT
        ));
    }
    xml.push_str("</feed>");
    xml
}

/// Benchmarks pulling every event out of an in-memory document.
fn read_event(c: &mut Criterion) {
    let xml = sample_document(250);
    let mut group = c.benchmark_group("read_event");
    group.bench_function("in_memory", |b| {
        b.iter(|| {
            let mut reader = Reader::from_str(&xml);
            let mut count = criterion::black_box(0);
            loop {
                match reader.read_event().unwrap() {
                    Event::StartElement(_) => count += 1,
                    Event::EndDocument => break,
                    _ => (),
                }
            }
            assert_eq!(count, 751, "Overall tag count in the synthetic feed");
        })
    });

    group.bench_function("chunked", |b| {
        b.iter(|| {
            let chunks: Vec<Vec<u8>> =
                xml.as_bytes().chunks(512).map(|c| c.to_vec()).collect();
            let mut count = criterion::black_box(0);
            for event in Reader::from_chunks(chunks.into_iter()).into_events() {
                if let Event::StartElement(_) = event {
                    count += 1;
                }
            }
            assert_eq!(count, 751, "Overall tag count in the synthetic feed");
        })
    });
    group.finish();
}

/// Benchmarks the validator pipeline on top of the reader.
fn validated_stream(c: &mut Criterion) {
    let xml = sample_document(250);
    let mut group = c.benchmark_group("validated_stream");
    group.bench_function("well_formed + attributes", |b| {
        b.iter(|| {
            let errors = Reader::from_str(&xml)
                .into_events()
                .transform(WellFormed::new())
                .transform(Attributes::new())
                .filter(|e| e.is_error())
                .count();
            assert_eq!(errors, 0);
        })
    });
    group.finish();
}

/// Benchmarks canonical serialization of the whole stream.
fn c14n(c: &mut Criterion) {
    let xml = sample_document(100);
    let mut group = c.benchmark_group("c14n");
    group.bench_function("canonical", |b| {
        b.iter(|| {
            let out = canonicalize_to_string(
                Reader::from_str(&xml).into_events(),
                &C14nOptions::default(),
            )
            .unwrap();
            criterion::black_box(out);
        })
    });
    group.finish();
}

/// Benchmarks the escape helpers on their own.
fn escaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("escaping");
    group.bench_function("escape", |b| {
        b.iter(|| criterion::black_box(escape(LOREM_IPSUM_TEXT)))
    });
    let escaped = escape("5 < 6 && 7 > 3, \"quoted\", 'aposed'").into_owned();
    group.bench_function("unescape", |b| {
        b.iter(|| criterion::black_box(unescape(&escaped)))
    });
    group.finish();
}

criterion_group!(benches, read_event, validated_stream, c14n, escaping);
criterion_main!(benches);
