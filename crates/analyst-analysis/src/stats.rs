//! Summary statistics over a dataset.
//!
//! Results are JSON objects keyed by column name, in dataset column order.
//! Statistics that are undefined (for example the standard deviation of a
//! single value) are encoded as `null`.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::{Column, ColumnData, Dataset};

/// Descriptive statistics.
///
/// Numeric columns get count, mean, std, min, quartiles and max. When the
/// dataset has no numeric column, text columns get count, unique, top and
/// freq instead.
pub fn describe(dataset: &Dataset) -> Value {
    let mut result = Map::new();

    let mut numeric = dataset.numeric_columns().peekable();
    if numeric.peek().is_some() {
        for column in numeric {
            if let Some(values) = column.numeric() {
                result.insert(column.name().to_string(), describe_numeric(values));
            }
        }
    } else {
        for column in dataset.columns() {
            if let ColumnData::Text(values) = column.data() {
                result.insert(column.name().to_string(), describe_text(values));
            }
        }
    }

    Value::Object(result)
}

fn describe_numeric(values: &[Option<f64>]) -> Value {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);

    let count = present.len();
    let mean = mean(&present);

    json!({
        "count": count as f64,
        "mean": mean,
        "std": sample_std(&present, mean),
        "min": present.first().copied(),
        "25%": quantile(&present, 0.25),
        "50%": quantile(&present, 0.5),
        "75%": quantile(&present, 0.75),
        "max": present.last().copied(),
    })
}

fn describe_text(values: &[Option<String>]) -> Value {
    let counts = frequencies(values.iter().flatten().cloned());
    let count: usize = counts.iter().map(|(_, n)| n).sum();
    let top = counts.first();

    json!({
        "count": count,
        "unique": counts.len(),
        "top": top.map(|(value, _)| value.clone()),
        "freq": top.map(|(_, n)| *n),
    })
}

/// Pearson correlation matrix over numeric columns.
///
/// Each pair uses the rows where both values are present. A dataset without
/// numeric columns yields an empty object.
pub fn correlation(dataset: &Dataset) -> Value {
    let numeric: Vec<(&str, &[Option<f64>])> = dataset
        .numeric_columns()
        .filter_map(|c| c.numeric().map(|values| (c.name(), values)))
        .collect();

    let mut matrix = Map::new();
    for (name, left) in &numeric {
        let mut row = Map::new();
        for (other, right) in &numeric {
            row.insert(other.to_string(), Value::from(pearson(left, right)));
        }
        matrix.insert(name.to_string(), Value::Object(row));
    }

    Value::Object(matrix)
}

/// Number of missing cells per column.
pub fn missing_values(dataset: &Dataset) -> Value {
    let counts = dataset
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), Value::from(c.missing_count())))
        .collect();

    Value::Object(counts)
}

/// Frequency of each distinct value of one column, most frequent first.
///
/// Ties keep first-appearance order. Missing cells are not counted.
pub fn value_counts(column: &Column) -> Value {
    let labels = (0..column.len()).filter_map(|row| column.label(row));

    let counts = frequencies(labels)
        .into_iter()
        .map(|(value, n)| (value, Value::from(n)))
        .collect();

    Value::Object(counts)
}

/// Distinct values with their counts, sorted by count descending.
fn frequencies(values: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        match index.get(&value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }
    // stable sort keeps first-appearance order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64], mean: Option<f64>) -> Option<f64> {
    let mean = mean?;
    if values.len() < 2 {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn pearson(left: &[Option<f64>], right: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = left
        .iter()
        .zip(right)
        .filter_map(|(l, r)| Some(((*l)?, (*r)?)))
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_l = pairs.iter().map(|(l, _)| l).sum::<f64>() / n;
    let mean_r = pairs.iter().map(|(_, r)| r).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_l = 0.0;
    let mut var_r = 0.0;
    for (l, r) in &pairs {
        cov += (l - mean_l) * (r - mean_r);
        var_l += (l - mean_l).powi(2);
        var_r += (r - mean_r).powi(2);
    }

    // NaN for a constant column, rendered as null
    cov / (var_l * var_r).sqrt()
}
