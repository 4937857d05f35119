//! Criterion benchmarks for mlexp-core: stratified splits and CV search.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mlexp_core::{
    CvSearch, MLSetup, Model, ModelError, Observations, ParamDistribution, ParamSpace, ParamValue,
    SearchStrategy, StratifiedShuffleSplit,
};
use mlexp_metrics::Scorer;

/// Nearest class mean on every feature, with means shrunk toward the global mean.
#[derive(Clone)]
struct ShrunkCentroid {
    shrinkage: f64,
    centroids: Vec<Vec<f64>>,
}

impl Model for ShrunkCentroid {
    type Label = usize;

    fn fit(&mut self, observations: &Observations, labels: &[usize]) -> Result<(), ModelError> {
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let n_features = observations.n_features();
        let mut sums = vec![vec![0.0; n_features]; n_classes];
        let mut counts = vec![0usize; n_classes];
        let mut global = vec![0.0; n_features];
        for (row, &label) in observations.rows().iter().zip(labels) {
            counts[label] += 1;
            for (f, &v) in row.iter().enumerate() {
                sums[label][f] += v;
                global[f] += v;
            }
        }
        let n = labels.len() as f64;
        self.centroids = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| {
                s.iter()
                    .zip(&global)
                    .map(|(&v, &g)| {
                        let mean = if c > 0 { v / c as f64 } else { g / n };
                        (1.0 - self.shrinkage) * mean + self.shrinkage * g / n
                    })
                    .collect()
            })
            .collect();
        Ok(())
    }

    fn predict(&self, observations: &Observations) -> Result<Vec<usize>, ModelError> {
        Ok(observations
            .rows()
            .iter()
            .map(|row| {
                self.centroids
                    .iter()
                    .enumerate()
                    .map(|(c, centroid)| {
                        let d: f64 = row.iter().zip(centroid).map(|(a, b)| (a - b).powi(2)).sum();
                        (c, d)
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map_or(0, |(c, _)| c)
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        match (name, value.as_f64()) {
            ("shrinkage", Some(v)) => {
                self.shrinkage = v;
                Ok(())
            }
            _ => Err(ModelError::UnknownParameter { name: name.to_string() }),
        }
    }
}

fn make_classification(n_samples: usize, n_features: usize, n_classes: usize, seed: u64) -> MLSetup<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        rows.push(row);
    }
    let columns = (0..n_features).map(|f| format!("f{f}")).collect();
    MLSetup::new(Observations::new(columns, rows).unwrap(), labels).unwrap()
}

fn bench_splits(c: &mut Criterion) {
    let data = make_classification(2000, 5, 5, 42);
    let splitter = StratifiedShuffleSplit::new(5, 0.4).unwrap().with_seed(100);

    c.bench_function("stratified_shuffle_split_2000x5splits", |b| {
        b.iter(|| splitter.split(data.labels()).unwrap());
    });
}

fn bench_grid_search(c: &mut Criterion) {
    let data = make_classification(500, 20, 5, 42);
    let splits = StratifiedShuffleSplit::new(5, 0.4)
        .unwrap()
        .with_seed(100)
        .split(data.labels())
        .unwrap();
    let space = ParamSpace::new().with_values("shrinkage", [0.0, 0.25, 0.5, 0.75]);
    let model = ShrunkCentroid { shrinkage: 0.0, centroids: Vec::new() };
    let search = CvSearch::new(Scorer::classification("f1_macro").unwrap(), SearchStrategy::Grid);

    c.bench_function("grid_search_500x20_4candidates", |b| {
        b.iter(|| search.run(&model, &space, &data, &splits).unwrap());
    });
}

fn bench_randomized_search(c: &mut Criterion) {
    let data = make_classification(500, 20, 5, 42);
    let splits = StratifiedShuffleSplit::new(5, 0.4)
        .unwrap()
        .with_seed(100)
        .split(data.labels())
        .unwrap();
    let space = ParamSpace::new()
        .with_distribution("shrinkage", ParamDistribution::Uniform { low: 0.0, high: 1.0 });
    let model = ShrunkCentroid { shrinkage: 0.0, centroids: Vec::new() };
    let search = CvSearch::new(
        Scorer::classification("accuracy").unwrap(),
        SearchStrategy::Randomized { n_iter: 10 },
    )
    .with_seed(7);

    c.bench_function("randomized_search_500x20_10iter", |b| {
        b.iter(|| search.run(&model, &space, &data, &splits).unwrap());
    });
}

criterion_group!(benches, bench_splits, bench_grid_search, bench_randomized_search);
criterion_main!(benches);
