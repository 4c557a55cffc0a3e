use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, i.e. equal values
/// keep their original order. NaN values are placed according to IEEE 754 total ordering.
pub fn argsort(x: &[f64], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].total_cmp(&x[b])),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].total_cmp(&x[a])),
    }
    indices
}

/// mean returns the arithmetic mean of the values in x, or 0.0 for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// min_max returns the minimum and maximum value in x, or None for an empty slice.
pub fn min_max(x: &[f64]) -> Option<(f64, f64)> {
    let first = *x.first()?;
    Some(x.iter().skip(1).fold((first, first), |(lo, hi), &val| {
        let lo = if val.total_cmp(&lo) == Ordering::Less { val } else { lo };
        let hi = if val.total_cmp(&hi) == Ordering::Greater { val } else { hi };
        (lo, hi)
    }))
}
