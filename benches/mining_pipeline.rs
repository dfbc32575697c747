use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fsmine::{
    canonical_code, Dataset, DatasetGenerator, GeneratorConfig, LabelPolicy, MinSupport, MinerConfig,
    MiningParameters, MiningWorkflow,
};

fn generated(graphs: usize, nodes: usize, seed: u64) -> Dataset {
    let raws = DatasetGenerator::generate(&GeneratorConfig {
        graphs,
        nodes,
        edge_probability: 0.15,
        seed: Some(seed),
        ..GeneratorConfig::default()
    })
    .expect("generate dataset");
    Dataset::from_raw_graphs(&raws, &LabelPolicy::keys(["type"])).expect("build dataset")
}

fn bench_mining(c: &mut Criterion) {
    let data = generated(40, 20, 42);
    let params = MiningParameters::new(MinSupport::Fraction(0.3)).with_max_pattern_size(4);

    c.bench_function("mine_parallel_40x20", |b| {
        b.iter(|| {
            let result = MiningWorkflow::new(MinerConfig::default(), black_box(&data))
                .execute(&params)
                .expect("mine");
            black_box(result.len())
        })
    });

    let sequential = MinerConfig {
        parallel: false,
        ..MinerConfig::default()
    };
    c.bench_function("mine_sequential_40x20", |b| {
        b.iter(|| {
            let result = MiningWorkflow::new(sequential.clone(), black_box(&data))
                .execute(&params)
                .expect("mine");
            black_box(result.len())
        })
    });
}

fn bench_canonical(c: &mut Criterion) {
    let data = generated(1, 30, 7);
    let graph = &data.graphs()[0];
    c.bench_function("canonical_code_30_nodes", |b| {
        b.iter(|| black_box(canonical_code(black_box(graph))))
    });
}

criterion_group!(benches, bench_mining, bench_canonical);
criterion_main!(benches);
