// Neighbor-graph manifold reduction (UMAP-style) ahead of density clustering.
//
// HDBSCAN degrades in high dimensions because every pairwise distance
// converges to the same value. We project the 384-d embeddings down to a
// handful of components while keeping local neighborhoods intact:
//
// 1. k-nearest-neighbor graph under cosine distance
// 2. fuzzy membership weights per point (rho = nearest-neighbor distance,
//    sigma found by binary search so the weights sum to log2(k))
// 3. fuzzy union to symmetrize the graph
// 4. seeded stochastic layout: attract along graph edges, repel random
//    negative samples, learning rate decaying linearly to zero
//
// Everything random draws from one StdRng seeded by the caller, and edges
// are visited in a fixed order, so a given seed reproduces the layout.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::AnalysisConfig;

/// Repulsive samples drawn per attractive update.
const NEGATIVE_SAMPLE_RATE: usize = 5;
/// Per-coordinate gradient clip.
const GRAD_CLIP: f64 = 4.0;
/// Half-width of the random initial layout box.
const INIT_SCALE: f64 = 10.0;
const SIGMA_SEARCH_ITERATIONS: usize = 64;
const SIGMA_TOLERANCE: f64 = 1e-5;

pub struct ManifoldReducer {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub epochs: usize,
    pub seed: u64,
}

impl ManifoldReducer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            n_components: config.n_components,
            n_neighbors: config.n_neighbors,
            min_dist: config.min_dist,
            epochs: config.umap_epochs,
            seed: config.seed,
        }
    }

    /// Neighbor count actually used for a corpus of `n` points.
    ///
    /// A point has only n-1 possible neighbors, so when the corpus is smaller
    /// than `n_neighbors + 1` the count drops to n-1.
    pub fn effective_neighbors(&self, n: usize) -> usize {
        if n < self.n_neighbors + 1 {
            n.saturating_sub(1)
        } else {
            self.n_neighbors
        }
    }

    /// Project `data` (n x D) to n x `n_components`.
    ///
    /// A single point maps to the origin; an empty input maps to nothing.
    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![vec![0.0; self.n_components]];
        }

        let k = self.effective_neighbors(n);
        if k < self.n_neighbors {
            debug!(
                configured = self.n_neighbors,
                effective = k,
                points = n,
                "Reduced neighbor count for small corpus"
            );
        }

        let distances = cosine_distance_matrix(data);
        let knn = nearest_neighbors(&distances, k);
        let graph = fuzzy_graph(&knn, k);
        let (a, b) = fit_curve_params(self.min_dist, 1.0);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut layout: Vec<Vec<f64>> = (0..n)
            .map(|_| {
                (0..self.n_components)
                    .map(|_| rng.random_range(-INIT_SCALE..INIT_SCALE))
                    .collect()
            })
            .collect();

        optimize_layout(&mut layout, &graph, a, b, self.epochs, &mut rng);

        debug!(
            points = n,
            neighbors = k,
            edges = graph.len(),
            components = self.n_components,
            a = a,
            b = b,
            "Manifold layout complete"
        );

        layout
    }
}

/// Pairwise cosine distance (1 - cosine similarity), in 0.0..=2.0.
fn cosine_distance_matrix(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = data.len();
    let norms: Vec<f64> = data
        .iter()
        .map(|v| v.iter().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let mut d = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let denom = norms[i] * norms[j];
            let sim = if denom < f64::EPSILON {
                0.0
            } else {
                let dot: f64 = data[i].iter().zip(&data[j]).map(|(x, y)| x * y).sum();
                (dot / denom).clamp(-1.0, 1.0)
            };
            d[i][j] = 1.0 - sim;
            d[j][i] = d[i][j];
        }
    }
    d
}

/// The k nearest other points of each point, closest first. Ties go to
/// the lower index.
fn nearest_neighbors(distances: &[Vec<f64>], k: usize) -> Vec<Vec<(usize, f64)>> {
    distances
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut others: Vec<(usize, f64)> = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, &d)| (j, d))
                .collect();
            others.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
            others.truncate(k);
            others
        })
        .collect()
}

/// Symmetric fuzzy membership graph as (i, j) -> weight with i < j.
fn fuzzy_graph(knn: &[Vec<(usize, f64)>], k: usize) -> BTreeMap<(usize, usize), f64> {
    let target = (k.max(1) as f64).log2();
    let mean_distance = {
        let all: Vec<f64> = knn.iter().flatten().map(|&(_, d)| d).collect();
        if all.is_empty() {
            0.0
        } else {
            all.iter().sum::<f64>() / all.len() as f64
        }
    };

    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, neighbors) in knn.iter().enumerate() {
        let rho = neighbors
            .iter()
            .map(|&(_, d)| d)
            .find(|&d| d > 0.0)
            .unwrap_or(0.0);
        let sigma = smooth_sigma(neighbors, rho, target).max(1e-3 * mean_distance);

        for &(j, d) in neighbors {
            let w = if sigma > 0.0 {
                (-((d - rho).max(0.0)) / sigma).exp()
            } else {
                1.0
            };
            directed.insert((i, j), w);
        }
    }

    // Fuzzy union: w_ij + w_ji - w_ij * w_ji
    let mut graph = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let key = if i < j { (i, j) } else { (j, i) };
        if graph.contains_key(&key) {
            continue;
        }
        let reverse = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let combined = w + reverse - w * reverse;
        if combined > 0.0 {
            graph.insert(key, combined);
        }
    }
    graph
}

/// Binary search for the bandwidth that makes a point's membership
/// weights sum to `target`.
fn smooth_sigma(neighbors: &[(usize, f64)], rho: f64, target: f64) -> f64 {
    let mut lo = 0.0_f64;
    let mut hi = f64::INFINITY;
    let mut mid = 1.0_f64;

    for _ in 0..SIGMA_SEARCH_ITERATIONS {
        let psum: f64 = neighbors
            .iter()
            .map(|&(_, d)| {
                let excess = d - rho;
                if excess > 0.0 {
                    (-excess / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < SIGMA_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }
    mid
}

/// Fit `1 / (1 + a * x^(2b))` to the target membership curve implied by
/// `min_dist` and `spread`, by coarse-to-fine grid search.
pub fn fit_curve_params(min_dist: f64, spread: f64) -> (f64, f64) {
    let xs: Vec<f64> = (1..=300).map(|i| i as f64 * spread * 3.0 / 300.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let loss = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let fit = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fit - y) * (fit - y)
            })
            .sum()
    };

    let (mut best_a, mut best_b) = (1.0_f64, 1.0_f64);
    let (mut a_lo, mut a_hi, mut b_lo, mut b_hi) = (0.05_f64, 5.0_f64, 0.2_f64, 2.0_f64);
    const STEPS: usize = 40;

    for _ in 0..4 {
        let mut best_loss = f64::INFINITY;
        for ia in 0..=STEPS {
            let a = a_lo + (a_hi - a_lo) * ia as f64 / STEPS as f64;
            for ib in 0..=STEPS {
                let b = b_lo + (b_hi - b_lo) * ib as f64 / STEPS as f64;
                let l = loss(a, b);
                if l < best_loss {
                    best_loss = l;
                    best_a = a;
                    best_b = b;
                }
            }
        }
        let a_step = (a_hi - a_lo) / STEPS as f64;
        let b_step = (b_hi - b_lo) / STEPS as f64;
        a_lo = (best_a - 2.0 * a_step).max(1e-3);
        a_hi = best_a + 2.0 * a_step;
        b_lo = (best_b - 2.0 * b_step).max(1e-3);
        b_hi = best_b + 2.0 * b_step;
    }

    (best_a, best_b)
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRAD_CLIP, GRAD_CLIP)
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Stochastic layout optimization over the fuzzy graph.
///
/// Heavier edges are sampled more often (every max_w / w epochs). Each
/// attractive update is followed by NEGATIVE_SAMPLE_RATE repulsive updates
/// against uniformly drawn points.
fn optimize_layout(
    layout: &mut [Vec<f64>],
    graph: &BTreeMap<(usize, usize), f64>,
    a: f64,
    b: f64,
    epochs: usize,
    rng: &mut StdRng,
) {
    let n = layout.len();
    let edges: Vec<(usize, usize, f64)> = graph.iter().map(|(&(i, j), &w)| (i, j, w)).collect();
    if edges.is_empty() || n < 2 {
        return;
    }

    let max_w = edges.iter().map(|e| e.2).fold(0.0_f64, f64::max);
    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_w / e.2).collect();
    let epochs_per_negative: Vec<f64> = epochs_per_sample
        .iter()
        .map(|&e| e / NEGATIVE_SAMPLE_RATE as f64)
        .collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();
    let dim = layout[0].len();

    for epoch in 0..epochs {
        let alpha = 1.0 - epoch as f64 / epochs as f64;
        let epoch_f = epoch as f64;

        for (e, &(i, j, _)) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            let dist_sq = squared_distance(&layout[i], &layout[j]);
            if dist_sq > 0.0 {
                let coef = (-2.0 * a * b * dist_sq.powf(b - 1.0)) / (a * dist_sq.powf(b) + 1.0);
                for d in 0..dim {
                    let grad = clip(coef * (layout[i][d] - layout[j][d])) * alpha;
                    layout[i][d] += grad;
                    layout[j][d] -= grad;
                }
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((epoch_f - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.random_range(0..n);
                if other == i {
                    continue;
                }
                let dist_sq = squared_distance(&layout[i], &layout[other]);
                let coef = if dist_sq > 0.0 {
                    2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..dim {
                    let grad = if coef > 0.0 {
                        clip(coef * (layout[i][d] - layout[other][d]))
                    } else {
                        GRAD_CLIP
                    };
                    layout[i][d] += grad * alpha;
                }
            }
            next_negative[e] += n_neg as f64 * epochs_per_negative[e];
        }
    }
}
