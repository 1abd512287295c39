//! Dense-vector arithmetic shared by the forest and the LSH index.
//!
//! Every function here works on plain `&[f64]` slices; none of it knows
//! about item ids, trees, or buckets.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::error::{Error, Result};

/// Sum of elementwise products of `u` and `v`.
pub fn dot(u: &[f64], v: &[f64]) -> Result<f64> {
    if u.len() != v.len() {
        return Err(Error::DimensionMismatch { expected: u.len(), received: v.len() });
    }
    if u.is_empty() {
        return Err(Error::EmptyVector);
    }
    Ok(u.iter().zip(v).map(|(a, b)| a * b).sum())
}

/// Cosine similarity of `u` and `v`, computed in a single pass that
/// accumulates the dot product and both squared norms together.
pub fn cosine(u: &[f64], v: &[f64]) -> Result<f64> {
    if u.len() != v.len() {
        return Err(Error::DimensionMismatch { expected: u.len(), received: v.len() });
    }
    if u.is_empty() {
        return Err(Error::EmptyVector);
    }

    let (mut dot, mut norm_u, mut norm_v) = (0.0, 0.0, 0.0);
    for (a, b) in u.iter().zip(v) {
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return Err(Error::ZeroNorm);
    }

    Ok((dot / (norm_u.sqrt() * norm_v.sqrt())).clamp(-1.0, 1.0))
}

/// `1 - cosine(u, v)`.
pub fn cosine_distance(u: &[f64], v: &[f64]) -> Result<f64> {
    cosine(u, v).map(|c| 1.0 - c)
}

/// Euclidean (L2) distance between `u` and `v`.
pub fn euclidean_distance(u: &[f64], v: &[f64]) -> Result<f64> {
    if u.len() != v.len() {
        return Err(Error::DimensionMismatch { expected: u.len(), received: v.len() });
    }
    if u.is_empty() {
        return Err(Error::EmptyVector);
    }
    Ok(u.iter().zip(v).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt())
}

/// `1 - euclidean_distance(u, v)`.
///
/// Not a bounded similarity — it goes arbitrarily negative for distant
/// points — but it is exactly what the forest's split-generating k-means
/// uses as its objective, since maximizing it is equivalent to minimizing
/// Euclidean distance. See the design notes for why the name is kept
/// despite being slightly misleading.
pub fn euclidean_similarity(u: &[f64], v: &[f64]) -> Result<f64> {
    euclidean_distance(u, v).map(|d| 1.0 - d)
}

/// Index of the maximum value, ties broken in favor of the **last**
/// occurrence. This tie-break is load-bearing for [`crate::numerics::kmeans`]
/// and is covered by a dedicated test; do not "fix" it to first-occurrence.
pub fn argmax<T: PartialOrd + Copy>(values: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => best = Some((i, v)),
            None => best = Some((i, v)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

/// Componentwise arithmetic mean of a non-empty list of equal-length rows.
pub fn mean(rows: &[&[f64]]) -> Result<Vec<f64>> {
    let Some(first) = rows.first() else {
        return Err(Error::EmptyVector);
    };
    let cols = first.len();
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != cols {
            return Err(Error::RaggedRows { expected: cols, received: row.len(), row: row_idx });
        }
    }

    let mut sums = vec![0.0; cols];
    for row in rows {
        for (s, &x) in sums.iter_mut().zip(*row) {
            *s += x;
        }
    }
    let n = rows.len() as f64;
    for s in &mut sums {
        *s /= n;
    }
    Ok(sums)
}

/// Lloyd's algorithm, seeded by a random permutation of the data indices
/// rather than a random re-draw, and driven by a caller-chosen similarity
/// rather than a fixed distance metric — the forest calls this with
/// [`euclidean_similarity`], which makes the assignment step equivalent to
/// nearest-centroid-by-distance despite the argmax framing.
///
/// Empty clusters keep their previous iteration's centroid rather than
/// being reseeded or dropped.
pub fn kmeans<R, S>(
    rng: &mut R,
    data: &[Vec<f64>],
    k: usize,
    max_iter: usize,
    similarity: S,
) -> Result<Vec<Vec<f64>>>
where
    R: Rng,
    S: Fn(&[f64], &[f64]) -> Result<f64>,
{
    let n = data.len();
    if k > n {
        return Err(Error::InsufficientData { k, n });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let mut centroids: Vec<Vec<f64>> = order[..k].iter().map(|&i| data[i].clone()).collect();

    for _ in 0..max_iter {
        let mut clusters: Vec<Vec<&[f64]>> = vec![Vec::new(); k];
        for point in data {
            let sims = centroids
                .iter()
                .map(|c| similarity(point, c))
                .collect::<Result<Vec<_>>>()?;
            let best = argmax(&sims).expect("centroids list is non-empty");
            clusters[best].push(point.as_slice());
        }

        let mut next = Vec::with_capacity(k);
        for (cluster, previous) in clusters.iter().zip(&centroids) {
            if cluster.is_empty() {
                next.push(previous.clone());
            } else {
                next.push(mean(cluster)?);
            }
        }

        if next == centroids {
            centroids = next;
            break;
        }
        centroids = next;
    }

    Ok(centroids)
}

/// Convenience wrapper around [`kmeans`] that seeds a fresh [`StdRng`] from
/// an integer seed, for the reproducible scenarios in the test suite.
pub fn kmeans_seeded<S>(
    seed: u64,
    data: &[Vec<f64>],
    k: usize,
    max_iter: usize,
    similarity: S,
) -> Result<Vec<Vec<f64>>>
where
    S: Fn(&[f64], &[f64]) -> Result<f64>,
{
    let mut rng = StdRng::seed_from_u64(seed);
    kmeans(&mut rng, data, k, max_iter, similarity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_rejects_mismatched_lengths() {
        assert!(matches!(dot(&[1.0, 2.0], &[1.0]), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn dot_rejects_empty_vectors() {
        assert!(matches!(dot(&[], &[]), Err(Error::EmptyVector)));
    }

    #[test]
    fn dot_basic() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
    }

    #[test]
    fn cosine_rejects_zero_norm() {
        assert!(matches!(cosine(&[0.0, 0.0], &[1.0, 1.0]), Err(Error::ZeroNorm)));
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0]).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn argmax_breaks_ties_last() {
        assert_eq!(argmax(&[1, 50, 2, 20]), Some(1));
        assert_eq!(argmax(&[5, 5, 5]), Some(2));
    }

    #[test]
    fn mean_matches_fixture() {
        let rows: Vec<&[f64]> =
            vec![&[1.0, 1.0, 1.0], &[2.0, 3.0, 4.0], &[0.0, 2.0, 7.0]];
        assert_eq!(mean(&rows).unwrap(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn mean_rejects_ragged_rows() {
        let rows: Vec<&[f64]> = vec![&[1.0, 2.0], &[1.0]];
        assert!(matches!(mean(&rows), Err(Error::RaggedRows { .. })));
    }

    #[test]
    fn kmeans_matches_fixture() {
        let points = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![4.0, 3.0],
            vec![5.0, 4.0],
        ];
        let centroids =
            kmeans_seeded(1234, &points, 2, 200, |a, b| euclidean_similarity(a, b)).unwrap();
        assert_eq!(centroids, vec![vec![4.5, 3.5], vec![1.5, 1.0]]);
    }

    #[test]
    fn kmeans_rejects_k_greater_than_n() {
        let points = vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![4.0, 3.0], vec![5.0, 4.0]];
        let err =
            kmeans_seeded(1234, &points, 10, 1, |a, b| euclidean_similarity(a, b)).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { k: 10, n: 4 }));
    }

    #[test]
    fn kmeans_is_a_fixed_point() {
        let points = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![4.0, 3.0],
            vec![5.0, 4.0],
        ];
        let centroids =
            kmeans_seeded(42, &points, 2, 200, |a, b| euclidean_similarity(a, b)).unwrap();

        let mut clusters: Vec<Vec<&[f64]>> = vec![Vec::new(); 2];
        for point in &points {
            let sims: Vec<f64> =
                centroids.iter().map(|c| euclidean_similarity(point, c).unwrap()).collect();
            clusters[argmax(&sims).unwrap()].push(point.as_slice());
        }
        let next: Vec<Vec<f64>> = clusters.iter().map(|c| mean(c).unwrap()).collect();
        assert_eq!(next, centroids);
    }
}
