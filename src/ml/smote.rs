//! SMOTE oversampling for imbalanced classification sets.
//!
//! Every class smaller than the majority class is topped up with synthetic
//! rows, each interpolated between a real row and one of its `k` nearest
//! same-class neighbours. Output keeps the original rows first, in order,
//! followed by the synthetic rows.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Oversampling parameters.
#[derive(Debug, Clone)]
pub struct SmoteOptions {
    /// Number of nearest neighbours considered per row.
    pub k_neighbors: usize,
    /// Seed for row and neighbour selection.
    pub seed: u64,
}

impl Default for SmoteOptions {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

/// Resampled feature matrix and labels.
#[derive(Debug, Clone)]
pub struct Resampled {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
    /// Number of synthetic rows appended after the originals.
    pub synthetic: usize,
}

/// Balance all classes up to the majority class size.
pub fn smote_resample(
    x: &[Vec<f64>],
    y: &[usize],
    n_classes: usize,
    options: &SmoteOptions,
) -> Result<Resampled, String> {
    if x.len() != y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    if options.k_neighbors == 0 {
        return Err("k_neighbors must be at least 1".to_string());
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in y.iter().enumerate() {
        let slot = members
            .get_mut(label)
            .ok_or_else(|| format!("Label index {label} out of range"))?;
        slot.push(row);
    }
    let majority = members.iter().map(Vec::len).max().unwrap_or(0);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut out_x = x.to_vec();
    let mut out_y = y.to_vec();
    let mut synthetic = 0usize;

    for (label, rows) in members.iter().enumerate() {
        if rows.is_empty() || rows.len() >= majority {
            continue;
        }
        if rows.len() < 2 {
            return Err(format!(
                "Class index {label} has {} row; SMOTE needs at least 2",
                rows.len()
            ));
        }
        let k = options.k_neighbors.min(rows.len() - 1);
        let neighbours = nearest_neighbours(x, rows, k);
        let needed = majority - rows.len();
        for _ in 0..needed {
            let pick = rng.random_range(0..rows.len());
            let neighbour = neighbours[pick][rng.random_range(0..k)];
            let gap: f64 = rng.random();
            let base = &x[rows[pick]];
            let other = &x[neighbour];
            let row: Vec<f64> = base
                .iter()
                .zip(other)
                .map(|(&a, &b)| a + gap * (b - a))
                .collect();
            out_x.push(row);
            out_y.push(label);
            synthetic += 1;
        }
    }

    Ok(Resampled {
        x: out_x,
        y: out_y,
        synthetic,
    })
}

/// For each row in `rows`, the row ids of its `k` nearest neighbours among `rows`.
fn nearest_neighbours(x: &[Vec<f64>], rows: &[usize], k: usize) -> Vec<Vec<usize>> {
    rows.iter()
        .map(|&row| {
            let mut distances: Vec<(f64, usize)> = rows
                .iter()
                .filter(|&&other| other != row)
                .map(|&other| (squared_distance(&x[row], &x[other]), other))
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, other)| other).collect()
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&p, &q)| (p - q) * (p - q)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            x.push(vec![i as f64, 100.0]);
            y.push(0);
        }
        for i in 0..8 {
            x.push(vec![10.0 + i as f64, 200.0 + i as f64]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn balances_minority_class() {
        let (x, y) = imbalanced();
        let out = smote_resample(&x, &y, 2, &SmoteOptions::default()).unwrap();
        assert_eq!(out.synthetic, 32);
        assert_eq!(out.y.iter().filter(|&&l| l == 0).count(), 40);
        assert_eq!(out.y.iter().filter(|&&l| l == 1).count(), 40);
        assert_eq!(&out.x[..x.len()], &x[..]);
    }

    #[test]
    fn synthetic_rows_stay_within_minority_hull() {
        let (x, y) = imbalanced();
        let out = smote_resample(&x, &y, 2, &SmoteOptions::default()).unwrap();
        for row in &out.x[x.len()..] {
            assert!((10.0..=17.0).contains(&row[0]), "{row:?}");
            assert!((200.0..=207.0).contains(&row[1]), "{row:?}");
        }
    }

    #[test]
    fn same_seed_same_rows() {
        let (x, y) = imbalanced();
        let a = smote_resample(&x, &y, 2, &SmoteOptions::default()).unwrap();
        let b = smote_resample(&x, &y, 2, &SmoteOptions::default()).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn balanced_input_is_untouched() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0, 1];
        let out = smote_resample(&x, &y, 2, &SmoteOptions::default()).unwrap();
        assert_eq!(out.synthetic, 0);
        assert_eq!(out.x, x);
    }

    #[test]
    fn single_minority_row_is_an_error() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![0, 0, 1];
        assert!(smote_resample(&x, &y, 2, &SmoteOptions::default()).is_err());
    }
}
