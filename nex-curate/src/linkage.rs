//! Average-linkage agglomerative clustering over a precomputed distance matrix.

/// Slack applied to the merge threshold so pairs sitting exactly on it merge
/// despite float rounding.
const MERGE_TOLERANCE: f64 = 1e-9;

/// Cluster `n` points given their pairwise `distances`.
///
/// Starting from singletons, the two clusters with the smallest average
/// pairwise distance are merged until that distance exceeds `max_distance`.
/// When several pairs share the minimum, the pair with the lowest indices
/// wins, so the result depends only on the matrix.
///
/// Each returned cluster lists its member indices ascending. Clusters are
/// ordered by their smallest member.
pub fn average_linkage(distances: &[Vec<f64>], max_distance: f64) -> Vec<Vec<usize>> {
    let n = distances.len();
    let mut dist: Vec<Vec<f64>> = distances.to_vec();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let limit = max_distance + MERGE_TOLERANCE;

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if members[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if members[j].is_none() {
                    continue;
                }
                let d = dist[i][j];
                if best.is_none_or(|(_, _, b)| d < b) {
                    best = Some((i, j, d));
                }
            }
        }

        let Some((a, b, d)) = best else { break };
        if d > limit {
            break;
        }

        let absorbed = members[b].take().unwrap_or_default();
        let (size_a, size_b) = match &members[a] {
            Some(m) => (m.len() as f64, absorbed.len() as f64),
            None => break,
        };
        // Lance-Williams update for average linkage.
        for k in 0..n {
            if k == a || members[k].is_none() {
                continue;
            }
            let merged = (size_a * dist[k][a] + size_b * dist[k][b]) / (size_a + size_b);
            dist[k][a] = merged;
            dist[a][k] = merged;
        }
        if let Some(m) = members[a].as_mut() {
            m.extend(absorbed);
            m.sort_unstable();
        }
    }

    // Surviving slots are indexed by their smallest member already.
    members.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n: usize, pairs: &[(usize, usize, f64)], default: f64) -> Vec<Vec<f64>> {
        let mut m = vec![vec![default; n]; n];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        for &(i, j, d) in pairs {
            m[i][j] = d;
            m[j][i] = d;
        }
        m
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(average_linkage(&[], 0.5).is_empty());
        assert_eq!(average_linkage(&[vec![0.0]], 0.5), vec![vec![0]]);
    }

    #[test]
    fn merges_at_threshold_inclusive() {
        let m = matrix(3, &[(0, 2, 0.5)], 2.0);
        assert_eq!(average_linkage(&m, 0.5), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn average_distance_blocks_loose_join() {
        // 0 and 1 are tight; 2 is close to 1 but far from 0.
        let m = matrix(3, &[(0, 1, 0.1), (1, 2, 0.4), (0, 2, 1.0)], 2.0);
        assert_eq!(average_linkage(&m, 0.5), vec![vec![0, 1], vec![2]]);
        assert_eq!(average_linkage(&m, 0.8), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn clusters_are_ordered_by_first_member() {
        let m = matrix(4, &[(1, 3, 0.1), (0, 2, 0.2)], 2.0);
        assert_eq!(average_linkage(&m, 0.3), vec![vec![0, 2], vec![1, 3]]);
    }
}
