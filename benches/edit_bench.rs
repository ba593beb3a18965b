use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gapdoc::{Content, Document, GapBuffer, RopeContent};
use std::time::Duration;

fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line {} of the sample text, long enough to matter\n", i))
        .collect()
}

fn content_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("content");
    group.measurement_time(Duration::from_secs(5));
    let text = sample_text(200);

    // Typing at one spot: the gap stays put
    group.bench_function("gap_local_typing", |b| {
        b.iter(|| {
            let mut buffer = GapBuffer::new();
            buffer.insert_string(0, &text).unwrap();
            for i in 0..100 {
                buffer.insert_string(500 + i, "x").unwrap();
            }
            black_box(buffer.len())
        })
    });

    group.bench_function("rope_local_typing", |b| {
        b.iter(|| {
            let mut rope = RopeContent::new();
            rope.insert_string(0, &text).unwrap();
            for i in 0..100 {
                rope.insert_string(500 + i, "x").unwrap();
            }
            black_box(rope.len())
        })
    });

    // Jumping around: every insert moves the gap
    group.bench_function("gap_scattered_inserts", |b| {
        b.iter(|| {
            let mut buffer = GapBuffer::new();
            buffer.insert_string(0, &text).unwrap();
            for i in 0..100 {
                let offset = (i * 977) % buffer.len();
                buffer.insert_string(offset, "x").unwrap();
            }
            black_box(buffer.len())
        })
    });

    group.finish();
}

fn document_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");
    group.measurement_time(Duration::from_secs(5));

    for lines in [10, 100, 1000].iter() {
        let text = sample_text(*lines);
        group.bench_with_input(BenchmarkId::new("load", lines), &text, |b, text| {
            b.iter(|| {
                let mut doc = Document::new();
                black_box(doc.insert_string(0, text, None).unwrap())
            })
        });
    }

    let text = sample_text(100);
    group.bench_function("split_and_merge_paragraph", |b| {
        let mut doc = Document::new();
        doc.insert_string(0, &text, None).unwrap();
        b.iter(|| {
            doc.insert_string(20, "\n", None).unwrap();
            black_box(doc.remove(20, 1).unwrap())
        })
    });

    group.bench_function("rtl_typing", |b| {
        let mut doc = Document::new();
        doc.insert_string(0, &text, None).unwrap();
        b.iter(|| {
            doc.insert_string(10, "\u{05d0}", None).unwrap();
            black_box(doc.remove(10, 1).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, content_benchmark, document_benchmark);
criterion_main!(benches);
