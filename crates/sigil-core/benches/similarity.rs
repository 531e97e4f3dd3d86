use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use sigil_core::{EngineConfig, SigilEngine, SigilMetadata, SourceType};

const WORDS: &[&str] = &[
    "ocean", "light", "shadow", "fear", "river", "home", "flying", "stone", "forest", "calm",
    "fire", "door", "night", "breath", "mirror", "wonder",
];

fn populated(n: usize) -> SigilEngine {
    let mut engine = SigilEngine::new(EngineConfig::default()).unwrap();
    for i in 0..n {
        let text: Vec<&str> = (0..6).map(|k| WORDS[(i * 7 + k * 3) % WORDS.len()]).collect();
        engine.generate(&text.join(" "), SourceType::Dream, SigilMetadata::default());
    }
    engine
}

fn bench_encode(c: &mut Criterion) {
    let engine = populated(0);
    c.bench_function("encode_sentence", |b| {
        b.iter(|| {
            engine
                .encoder()
                .encode(black_box("a peaceful ocean of light under the night sky"), SourceType::Dream)
        })
    });
}

fn bench_find_similar(c: &mut Criterion) {
    let engine = populated(500);
    let target = engine.store().newest().map(|s| s.id).unwrap();
    c.bench_function("find_similar_500", |b| {
        b.iter(|| engine.find_similar(black_box(target), 0.7).len())
    });
}

fn bench_cluster(c: &mut Criterion) {
    let engine = populated(200);
    c.bench_function("cluster_all_200", |b| b.iter(|| engine.cluster_all()));
}

criterion_group!(benches, bench_encode, bench_find_similar, bench_cluster);
criterion_main!(benches);
