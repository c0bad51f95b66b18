use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ed_core::{Chain, ModelKind, PosteriorDraws, StepLayout};
use ed_data::IdentifierMap;
use ed_inference::{SummaryOptions, compute_param_diagnostics, summarize_items};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal as RandNormal};
use std::hint::black_box;

/// GPCM-shaped draws: `n_items` items with 3 steps each, 4 chains.
fn gpcm_draws(n_items: usize, n_samples: usize) -> (PosteriorDraws, IdentifierMap, StepLayout) {
    let layout = StepLayout::per_item(vec![3; n_items]);
    let names: Vec<String> = (1..=n_items)
        .map(|i| format!("alpha[{i}]"))
        .chain((1..=layout.beta_len(n_items)).map(|k| format!("beta[{k}]")))
        .collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let noise = RandNormal::new(0.0, 1.0).unwrap();
    let chains = (0..4)
        .map(|_| Chain {
            draws: (0..n_samples)
                .map(|_| (0..names.len()).map(|_| noise.sample(&mut rng)).collect())
                .collect(),
        })
        .collect();
    let items =
        IdentifierMap::from_labels((1..=n_items).map(|i| format!("item{i}")), "item").unwrap();
    (PosteriorDraws::new(names, chains, n_samples), items, layout)
}

fn bench_summarize_items(c: &mut Criterion) {
    let spec = ModelKind::Gpcm.spec();
    let mut group = c.benchmark_group("summarize_items");
    for n_items in [10usize, 50] {
        let (draws, items, layout) = gpcm_draws(n_items, 1000);
        for compute in [false, true] {
            let opts = SummaryOptions::default().compute_missing_diagnostics(compute);
            let id = if compute { "with_diagnostics" } else { "moments_only" };
            group.bench_with_input(BenchmarkId::new(id, n_items), &n_items, |b, _| {
                b.iter(|| {
                    black_box(summarize_items(
                        black_box(&draws),
                        &items,
                        spec,
                        &layout,
                        &opts,
                    ))
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

fn bench_param_diagnostics(c: &mut Criterion) {
    let mut group = c.benchmark_group("param_diagnostics");
    for n_samples in [500usize, 2000] {
        let (draws, _, _) = gpcm_draws(1, n_samples);
        let chains = draws.param_draws(0);
        group.bench_with_input(BenchmarkId::from_parameter(n_samples), &n_samples, |b, _| {
            b.iter(|| black_box(compute_param_diagnostics(black_box(&chains))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_summarize_items, bench_param_diagnostics);
criterion_main!(benches);
