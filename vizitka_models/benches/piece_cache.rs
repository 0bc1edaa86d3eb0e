// Chain execution with and without a warm piece cache.
//
// Builds a four-voice piece in memory and times the noterest →
// vertical_interval → ngram → frequency chain. The cold case clears the
// cache before every run; the warm case hits the cached final prefix.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vizitka_analysis::{ChainSettings, Settings};
use vizitka_models::IndexedPiece;
use vizitka_score::{Part, Pitch, Score};

const CHAIN: &[&str] = &["ngram", "frequency"];

fn voice(name: &str, base: u8, len: usize) -> Part {
    let pitches: Vec<String> = (0..len)
        .map(|i| Pitch::from_midi(base + ((i * 7) % 12) as u8).name())
        .collect();
    let sequence: Vec<(&str, f64)> = pitches.iter().map(|p| (p.as_str(), 1.0)).collect();
    Part::from_sequence(name, &sequence).unwrap()
}

fn piece() -> IndexedPiece {
    let score = Score::new(vec![
        voice("Soprano", 72, 400),
        voice("Alto", 64, 400),
        voice("Tenor", 55, 400),
        voice("Bass", 43, 400),
    ]);
    IndexedPiece::from_score(score)
}

fn settings() -> ChainSettings {
    ChainSettings::new().with("ngram", Settings::new().with("n", 3u64))
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("piece_cache");
    let settings = settings();

    group.bench_function("cold", |b| {
        let mut piece = piece();
        b.iter(|| {
            piece.clear_cache();
            black_box(piece.get(black_box(CHAIN), &settings, None).unwrap());
        });
    });

    group.bench_function("warm", |b| {
        let mut piece = piece();
        piece.get(CHAIN, &settings, None).unwrap();
        b.iter(|| {
            black_box(piece.get(black_box(CHAIN), &settings, None).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
