//! Cross-validated hyperparameter search.

use std::fmt;

use mlexp_metrics::{Prediction, Scorer};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::ExperimentError;
use crate::model::{Model, ParamSet, format_params};
use crate::params::ParamSpace;
use crate::setup::{MLSetup, Target};
use crate::split::Split;

/// How candidates are drawn from a parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Every combination of the candidate lists.
    Grid,
    /// A fixed budget of sampled candidates.
    Randomized {
        /// Number of candidates to evaluate.
        n_iter: usize,
    },
}

impl SearchStrategy {
    /// Default randomized budget.
    pub const DEFAULT_ITERATIONS: usize = 20;

    /// `"grid_search"` selects [`SearchStrategy::Grid`]; any other name
    /// selects randomized search with `n_iter` candidates.
    #[must_use]
    pub fn from_name(name: &str, n_iter: usize) -> Self {
        if name == "grid_search" {
            Self::Grid
        } else {
            Self::Randomized { n_iter }
        }
    }
}

impl Default for SearchStrategy {
    fn default() -> Self {
        Self::Randomized {
            n_iter: Self::DEFAULT_ITERATIONS,
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid => f.write_str("grid_search"),
            Self::Randomized { n_iter } => write!(f, "randomized_search(n_iter={n_iter})"),
        }
    }
}

/// Scores of one candidate across all splits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    /// The assignment evaluated.
    pub params: ParamSet,
    /// Score on each split, in split order.
    pub split_scores: Vec<f64>,
    /// Mean of `split_scores`.
    pub mean_score: f64,
    /// Population standard deviation of `split_scores`.
    pub std_score: f64,
    /// 1 for the best mean; tied means share a rank.
    pub rank: usize,
}

/// Every candidate's cross-validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvResults {
    /// Scorer used to rank candidates.
    pub scorer: String,
    /// Strategy that produced the candidates.
    pub strategy: String,
    /// Number of splits each candidate was scored on.
    pub n_splits: usize,
    /// Candidates in evaluation order.
    pub candidates: Vec<CandidateResult>,
    /// Position of the winning candidate in `candidates`.
    pub best_index: usize,
}

impl CvResults {
    /// The winning candidate.
    #[must_use]
    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }
}

impl fmt::Display for CvResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} over {} candidates x {} splits, scored by {}",
            self.strategy,
            self.candidates.len(),
            self.n_splits,
            self.scorer
        )?;
        writeln!(f, "{:>4}  {:>10}  {:>10}  params", "rank", "mean", "std")?;
        let mut order: Vec<&CandidateResult> = self.candidates.iter().collect();
        order.sort_by_key(|c| c.rank);
        for candidate in order {
            writeln!(
                f,
                "{:>4}  {:>10.4}  {:>10.4}  {}",
                candidate.rank,
                candidate.mean_score,
                candidate.std_score,
                format_params(&candidate.params)
            )?;
        }
        let best = self.best();
        write!(
            f,
            "best: {} (mean {:.4})",
            format_params(&best.params),
            best.mean_score
        )
    }
}

/// The refit winner of a search plus the full report.
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    /// Best candidate, refit on all of the search data.
    pub best_estimator: M,
    /// Its parameters.
    pub best_params: ParamSet,
    /// Its mean split score.
    pub best_score: f64,
    /// Every candidate's scores.
    pub results: CvResults,
}

/// A search over a parameter space with a fixed scorer and strategy.
///
/// Candidates are evaluated one at a time in a single worker. The best mean
/// score wins; on ties the earliest candidate wins.
///
/// Construct via [`CvSearch::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CvSearch<L> {
    scorer: Scorer<L>,
    strategy: SearchStrategy,
    seed: u64,
}

impl<L: Target> CvSearch<L> {
    /// Create a search.
    #[must_use]
    pub fn new(scorer: Scorer<L>, strategy: SearchStrategy) -> Self {
        Self {
            scorer,
            strategy,
            seed: 42,
        }
    }

    /// Set the seed for randomized candidate sampling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The candidate assignments this search would evaluate.
    ///
    /// # Errors
    ///
    /// Any error of [`ParamSpace::grid`] or [`ParamSpace::sample`].
    pub fn candidates(&self, space: &ParamSpace) -> Result<Vec<ParamSet>, ExperimentError> {
        match self.strategy {
            SearchStrategy::Grid => space.grid(),
            SearchStrategy::Randomized { n_iter } => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                space.sample(n_iter, &mut rng)
            }
        }
    }

    /// Score every candidate on every split and refit the winner on `data`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::InvalidSplitCount`] | `splits` is empty |
    /// | Parameter-space errors | From [`CvSearch::candidates`] |
    /// | [`ExperimentError::Model`] | A parameter, fit or predict failure |
    /// | [`ExperimentError::Metric`] | The scorer rejected a prediction |
    #[instrument(skip_all, fields(scorer = self.scorer.name(), strategy = %self.strategy, n_splits = splits.len()))]
    pub fn run<M: Model<Label = L>>(
        &self,
        model: &M,
        space: &ParamSpace,
        data: &MLSetup<L>,
        splits: &[Split],
    ) -> Result<SearchOutcome<M>, ExperimentError> {
        if splits.is_empty() {
            return Err(ExperimentError::InvalidSplitCount { n_splits: 0 });
        }
        let candidates = self.candidates(space)?;
        let folds: Vec<(MLSetup<L>, MLSetup<L>)> = splits
            .iter()
            .map(|s| (data.select(&s.train), data.select(&s.test)))
            .collect();

        let mut scored = Vec::with_capacity(candidates.len());
        for params in candidates {
            let mut split_scores = Vec::with_capacity(folds.len());
            for (train, test) in &folds {
                split_scores.push(self.score_split(model, &params, train, test)?);
            }
            let (mean_score, std_score) = mean_std(&split_scores);
            debug!(params = %format_params(&params), mean_score, std_score, "candidate scored");
            scored.push(CandidateResult {
                params,
                split_scores,
                mean_score,
                std_score,
                rank: 0,
            });
        }

        let best_index = rank_candidates(&mut scored);
        let results = CvResults {
            scorer: self.scorer.name().to_string(),
            strategy: self.strategy.to_string(),
            n_splits: splits.len(),
            candidates: scored,
            best_index,
        };
        info!("cross-validation report\n{results}");

        let best_params = results.best().params.clone();
        let best_score = results.best().mean_score;
        let mut best_estimator = model.clone();
        best_estimator.set_params(&best_params)?;
        best_estimator.fit(data.observations(), data.labels())?;

        info!(
            best_score,
            best_params = %format_params(&best_params),
            "search complete"
        );

        Ok(SearchOutcome {
            best_estimator,
            best_params,
            best_score,
            results,
        })
    }

    fn score_split<M: Model<Label = L>>(
        &self,
        model: &M,
        params: &ParamSet,
        train: &MLSetup<L>,
        test: &MLSetup<L>,
    ) -> Result<f64, ExperimentError> {
        let mut candidate = model.clone();
        candidate.set_params(params)?;
        candidate.fit(train.observations(), train.labels())?;
        let score = if self.scorer.needs_probabilities() {
            let probabilities = candidate.predict_proba(test.observations())?;
            self.scorer
                .score(test.labels(), Prediction::Probabilities(&probabilities))?
        } else {
            let predicted = candidate.predict(test.observations())?;
            self.scorer.score(test.labels(), Prediction::Labels(&predicted))?
        };
        Ok(score)
    }
}

fn mean_std(scores: &[f64]) -> (f64, f64) {
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|&s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Assign ranks in place and return the winner's position.
fn rank_candidates(candidates: &mut [CandidateResult]) -> usize {
    // NaN means rank last.
    let key = |c: &CandidateResult| {
        if c.mean_score.is_nan() {
            f64::NEG_INFINITY
        } else {
            c.mean_score
        }
    };
    let keys: Vec<f64> = candidates.iter().map(key).collect();
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = 1 + keys.iter().filter(|&&k| k > keys[i]).count();
    }
    let mut best = 0;
    for (i, &k) in keys.iter().enumerate().skip(1) {
        if k > keys[best] {
            best = i;
        }
    }
    best
}
