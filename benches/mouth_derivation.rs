use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use talkbox::SynthSink;
use talkbox::audio::resample::resample;
use talkbox::mouth::event::derive_mouth_events;
use talkbox::speech::BoundaryEvent;
use talkbox::voice::Session;

/// Boundary stream for `words` words spoken ~300ms apart, one sentence per 12 words.
fn boundary_stream(words: u64) -> Vec<BoundaryEvent> {
    let mut events = Vec::with_capacity(words as usize + words as usize / 12 + 1);
    for i in 0..words {
        if i % 12 == 0 {
            events.push(BoundaryEvent::sentence(i * 300));
        }
        events.push(BoundaryEvent::word(i * 300 + 5));
    }
    events.push(BoundaryEvent::end(words * 300 + 120));
    events
}

fn bench_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_mouth_events");
    for words in [10u64, 100, 1000] {
        let events = boundary_stream(words);
        group.bench_with_input(BenchmarkId::from_parameter(words), &events, |b, events| {
            b.iter(|| derive_mouth_events(black_box(events), 20));
        });
    }
    group.finish();
}

fn bench_session_chunks(c: &mut Criterion) {
    // 10 seconds of 22.05kHz audio in 100ms chunks with a word per chunk.
    let chunk = vec![0i16; 2205];
    c.bench_function("session_100_chunks", |b| {
        b.iter(|| {
            let mut session = Session::default();
            session.begin(22050);
            for i in 0..100u64 {
                session.on_chunk(&chunk, &[BoundaryEvent::word(i * 100)]);
            }
            session.on_chunk(&[], &[BoundaryEvent::end(10_000)]);
            black_box(session.mouth_events().len())
        });
    });
}

fn bench_resample(c: &mut Criterion) {
    let samples: Vec<i16> = (0..22050).map(|i| ((i % 200) as i16 - 100) * 100).collect();
    c.bench_function("resample_22050_to_48000", |b| {
        b.iter(|| resample(black_box(&samples), 22050, 48000));
    });
}

criterion_group!(benches, bench_derivation, bench_session_chunks, bench_resample);
criterion_main!(benches);
