use criterion::{criterion_group, criterion_main, Criterion};
use newsdex_core::tokenizer::normalize;

const ARTICLE: &str = "Central banks across Europe held interest rates steady on Thursday, \
    signalling that policymakers remain wary of cutting borrowing costs while services \
    inflation stays stubbornly high. Markets had priced in a pause, and bond yields were \
    little changed after the announcement.";

fn bench_normalize(c: &mut Criterion) {
    let text = ARTICLE.repeat(50);
    c.bench_function("normalize_article", |b| b.iter(|| normalize(&text)));
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
