//! Stratified train/test splitting and k-fold assignment.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices of one train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows into train and test so each class keeps its proportion.
///
/// The test share of every class is `round(class_size * test_size)`. Both
/// index lists come back sorted.
pub fn stratified_train_test_split(
    y: &[usize],
    n_classes: usize,
    test_size: f64,
    seed: u64,
) -> Result<Fold, String> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(format!("test_size must be in (0, 1), got {test_size}"));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut rows in class_members(y, n_classes)? {
        rows.shuffle(&mut rng);
        let n_test = (rows.len() as f64 * test_size).round() as usize;
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }
    if train.is_empty() || test.is_empty() {
        return Err("Split leaves an empty train or test set".to_string());
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok(Fold { train, test })
}

/// Assign rows to `k` folds, dealing each shuffled class round-robin.
pub fn stratified_k_fold(
    y: &[usize],
    n_classes: usize,
    k: usize,
    seed: u64,
) -> Result<Vec<Fold>, String> {
    if k < 2 {
        return Err(format!("Need at least 2 folds, got {k}"));
    }
    if k > y.len() {
        return Err(format!("Cannot build {k} folds from {} rows", y.len()));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; y.len()];
    let mut next_fold = 0usize;
    for mut rows in class_members(y, n_classes)? {
        rows.shuffle(&mut rng);
        for row in rows {
            assignment[row] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }
    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&row| assignment[row] == fold);
            Fold { train, test }
        })
        .collect())
}

fn class_members(y: &[usize], n_classes: usize) -> Result<Vec<Vec<usize>>, String> {
    let mut members = vec![Vec::new(); n_classes];
    for (row, &label) in y.iter().enumerate() {
        members
            .get_mut(label)
            .ok_or_else(|| format!("Label index {label} out of range"))?
            .push(row);
    }
    Ok(members)
}
