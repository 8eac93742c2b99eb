// HDBSCAN (Hierarchical Density-Based Spatial Clustering of Applications
// with Noise) over the reduced document vectors.
//
// Algorithm:
// 1. Core distance of each point (distance to its (min_samples - 1)-th
//    nearest other point)
// 2. Mutual reachability distance: max(core(a), core(b), dist(a, b))
// 3. Minimum spanning tree of the mutual reachability graph (Prim)
// 4. Single-linkage hierarchy from the MST edges in ascending order
// 5. Condensed tree: splits where both sides have at least
//    min_cluster_size points create new clusters, smaller sides fall out
// 6. Excess-of-mass selection of the most stable clusters
//
// Both trees are arenas indexed by usize. Points are single-linkage nodes
// 0..n, merges are n.. in merge order.

use tracing::debug;

/// Label for points that belong to no selected cluster.
pub const NOISE: i32 = -1;

/// Smallest distance used when converting a merge distance to a lambda.
/// Exact duplicates merge at distance 0, which would otherwise be infinite.
const MIN_DISTANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct LinkageNode {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

#[derive(Debug, Clone)]
struct CondensedCluster {
    parent: Option<usize>,
    birth_lambda: f64,
    children: Vec<usize>,
    stability: f64,
}

/// Result of a single HDBSCAN fit.
#[derive(Debug, Clone, PartialEq)]
pub struct HdbscanResult {
    /// Per-point label: dense `0..k` for selected clusters, `NOISE` otherwise.
    pub labels: Vec<i32>,
    /// Number of selected clusters.
    pub cluster_count: usize,
}

pub struct Hdbscan {
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl Hdbscan {
    /// `min_samples` defaults to `min_cluster_size`.
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(2),
            min_samples: min_cluster_size.max(2),
        }
    }

    pub fn fit(&self, points: &[Vec<f64>]) -> HdbscanResult {
        let n = points.len();
        if n < 2 {
            return HdbscanResult {
                labels: vec![NOISE; n],
                cluster_count: 0,
            };
        }

        let distances = euclidean_matrix(points);
        let core = self.core_distances(&distances);
        let reach = mutual_reachability(&distances, &core);
        let mst = minimum_spanning_tree(&reach);
        let linkage = single_linkage(&mst, n);
        let (clusters, fell_from) = self.condense(&linkage, n);
        let selected = select_clusters(&clusters);

        debug!(
            points = n,
            condensed_clusters = clusters.len(),
            selected = selected.iter().filter(|&&s| s).count(),
            "HDBSCAN hierarchy built"
        );

        label_points(&clusters, &selected, &fell_from)
    }

    /// Distance to the (min_samples - 1)-th nearest other point; the point
    /// itself counts as the first sample.
    fn core_distances(&self, distances: &[Vec<f64>]) -> Vec<f64> {
        let rank = self.min_samples.saturating_sub(1);
        distances
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if rank == 0 {
                    return 0.0;
                }
                let mut others: Vec<f64> = row
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &d)| d)
                    .collect();
                others.sort_by(f64::total_cmp);
                let idx = (rank - 1).min(others.len().saturating_sub(1));
                others.get(idx).copied().unwrap_or(0.0)
            })
            .collect()
    }

    /// Walk the single-linkage tree top-down and build the condensed tree.
    ///
    /// Returns the condensed clusters (index 0 is the root) and, for every
    /// point, the cluster it fell out of and the lambda at which it did.
    fn condense(&self, linkage: &[LinkageNode], n: usize) -> (Vec<CondensedCluster>, Vec<(usize, f64)>) {
        let mut clusters = vec![CondensedCluster {
            parent: None,
            birth_lambda: 0.0,
            children: Vec::new(),
            stability: 0.0,
        }];
        let mut fell_from = vec![(0usize, 0.0_f64); n];

        let root = n + linkage.len() - 1;
        // (single-linkage node, condensed cluster it currently belongs to)
        let mut stack = vec![(root, 0usize)];

        while let Some((node, cluster)) = stack.pop() {
            if node < n {
                // A lone point reached as a cluster continuation; only
                // possible when min_cluster_size is 1.
                let lambda = clusters[cluster].birth_lambda;
                fell_from[node] = (cluster, lambda);
                continue;
            }

            let merge = linkage[node - n];
            let lambda = 1.0 / merge.distance.max(MIN_DISTANCE);
            let left_size = node_size(linkage, n, merge.left);
            let right_size = node_size(linkage, n, merge.right);
            let left_big = left_size >= self.min_cluster_size;
            let right_big = right_size >= self.min_cluster_size;

            match (left_big, right_big) {
                (true, true) => {
                    let parent_birth = clusters[cluster].birth_lambda;
                    for child in [merge.left, merge.right] {
                        let id = clusters.len();
                        clusters.push(CondensedCluster {
                            parent: Some(cluster),
                            birth_lambda: lambda,
                            children: Vec::new(),
                            stability: 0.0,
                        });
                        clusters[cluster].children.push(id);
                        let size = node_size(linkage, n, child);
                        clusters[cluster].stability += size as f64 * (lambda - parent_birth);
                        stack.push((child, id));
                    }
                }
                (true, false) => {
                    self.fall_out(linkage, n, merge.right, cluster, lambda, &mut clusters, &mut fell_from);
                    stack.push((merge.left, cluster));
                }
                (false, true) => {
                    self.fall_out(linkage, n, merge.left, cluster, lambda, &mut clusters, &mut fell_from);
                    stack.push((merge.right, cluster));
                }
                (false, false) => {
                    self.fall_out(linkage, n, merge.left, cluster, lambda, &mut clusters, &mut fell_from);
                    self.fall_out(linkage, n, merge.right, cluster, lambda, &mut clusters, &mut fell_from);
                }
            }
        }

        (clusters, fell_from)
    }

    /// Every point under `node` leaves `cluster` at `lambda`.
    #[allow(clippy::too_many_arguments)]
    fn fall_out(
        &self,
        linkage: &[LinkageNode],
        n: usize,
        node: usize,
        cluster: usize,
        lambda: f64,
        clusters: &mut [CondensedCluster],
        fell_from: &mut [(usize, f64)],
    ) {
        let birth = clusters[cluster].birth_lambda;
        for point in leaves(linkage, n, node) {
            fell_from[point] = (cluster, lambda);
            clusters[cluster].stability += lambda - birth;
        }
    }
}

fn euclidean_matrix(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut d = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            d[i][j] = dist;
            d[j][i] = dist;
        }
    }
    d
}

/// MR(a, b) = max(core(a), core(b), dist(a, b))
fn mutual_reachability(distances: &[Vec<f64>], core: &[f64]) -> Vec<Vec<f64>> {
    let n = distances.len();
    let mut mr = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let v = distances[i][j].max(core[i]).max(core[j]);
            mr[i][j] = v;
            mr[j][i] = v;
        }
    }
    mr
}

/// Prim's algorithm from node 0. Edges are returned sorted by weight;
/// equal weights keep insertion order.
fn minimum_spanning_tree(distances: &[Vec<f64>]) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    if n == 0 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        min_dist[j] = distances[0][j];
    }

    for _ in 1..n {
        let mut best = f64::INFINITY;
        let mut best_idx = None;
        for j in 0..n {
            if !in_tree[j] && (best_idx.is_none() || min_dist[j] < best) {
                best = min_dist[j];
                best_idx = Some(j);
            }
        }
        let Some(next) = best_idx else {
            break;
        };

        in_tree[next] = true;
        edges.push((min_edge[next], next, best));

        for j in 0..n {
            if !in_tree[j] && distances[next][j] < min_dist[j] {
                min_dist[j] = distances[next][j];
                min_edge[j] = next;
            }
        }
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

fn find(parent: &mut [usize], i: usize) -> usize {
    if parent[i] != i {
        parent[i] = find(parent, parent[i]);
    }
    parent[i]
}

/// Merge MST edges in ascending order into a binary linkage tree.
/// Node `n + m` is the m-th merge.
fn single_linkage(mst: &[(usize, usize, f64)], n: usize) -> Vec<LinkageNode> {
    let mut parent: Vec<usize> = (0..n).collect();
    // Linkage node currently representing each union-find root
    let mut node_of: Vec<usize> = (0..n).collect();
    let mut linkage: Vec<LinkageNode> = Vec::with_capacity(n.saturating_sub(1));

    for &(a, b, distance) in mst {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra == rb {
            continue;
        }
        let left = node_of[ra];
        let right = node_of[rb];
        let size = node_size(&linkage, n, left) + node_size(&linkage, n, right);
        linkage.push(LinkageNode {
            left,
            right,
            distance,
            size,
        });
        parent[rb] = ra;
        node_of[ra] = n + linkage.len() - 1;
    }

    linkage
}

fn node_size(linkage: &[LinkageNode], n: usize, node: usize) -> usize {
    if node < n {
        1
    } else {
        linkage[node - n].size
    }
}

/// Point indices under a linkage node.
fn leaves(linkage: &[LinkageNode], n: usize, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current < n {
            out.push(current);
        } else {
            let merge = linkage[current - n];
            stack.push(merge.right);
            stack.push(merge.left);
        }
    }
    out
}

/// Excess-of-mass selection.
///
/// Children always have larger indices than their parent, so a reverse
/// sweep sees every subtree before its root. A cluster wins over its
/// selected descendants when its own stability is at least their sum.
/// The root is never selected.
fn select_clusters(clusters: &[CondensedCluster]) -> Vec<bool> {
    let mut selected = vec![false; clusters.len()];
    let mut subtree = vec![0.0_f64; clusters.len()];

    for id in (1..clusters.len()).rev() {
        let cluster = &clusters[id];
        if cluster.children.is_empty() {
            selected[id] = true;
            subtree[id] = cluster.stability;
            continue;
        }

        let child_sum: f64 = cluster.children.iter().map(|&c| subtree[c]).sum();
        if cluster.stability >= child_sum {
            selected[id] = true;
            subtree[id] = cluster.stability;
            deselect_descendants(clusters, id, &mut selected);
        } else {
            subtree[id] = child_sum;
        }
    }

    selected
}

fn deselect_descendants(clusters: &[CondensedCluster], id: usize, selected: &mut [bool]) {
    let mut stack = clusters[id].children.clone();
    while let Some(c) = stack.pop() {
        selected[c] = false;
        stack.extend(clusters[c].children.iter().copied());
    }
}

/// Each point takes the label of the nearest selected ancestor of the
/// cluster it fell out of, or `NOISE`. Labels are dense in ascending
/// condensed-cluster order.
fn label_points(clusters: &[CondensedCluster], selected: &[bool], fell_from: &[(usize, f64)]) -> HdbscanResult {
    let mut dense = vec![NOISE; clusters.len()];
    let mut next = 0i32;
    for (id, &is_selected) in selected.iter().enumerate() {
        if is_selected {
            dense[id] = next;
            next += 1;
        }
    }

    let labels = fell_from
        .iter()
        .map(|&(cluster, _)| {
            let mut current = Some(cluster);
            while let Some(c) = current {
                if selected[c] {
                    return dense[c];
                }
                current = clusters[c].parent;
            }
            NOISE
        })
        .collect();

    HdbscanResult {
        labels,
        cluster_count: next as usize,
    }
}
