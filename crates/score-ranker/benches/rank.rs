use criterion::{black_box, criterion_group, criterion_main, Criterion};
use score_ranker::{rank, LabelTable};

fn bench_rank(c: &mut Criterion) {
    let labels: LabelTable = (0..1000).map(|i| format!("condition_{}", i)).collect();
    let logits: Vec<f32> = (0..1000).map(|i| ((i * 7919) % 1000) as f32 / 100.0 - 5.0).collect();

    c.bench_function("rank_1000_logits_top5", |b| {
        b.iter(|| rank(black_box(&logits), &labels, 5).unwrap())
    });
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
