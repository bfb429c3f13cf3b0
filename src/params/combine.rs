//! Combination Engine
//!
//! Builds the ordered set of assignments for one layer from per-key value
//! lists. The iteration order is part of the contract because the job
//! index of each assignment is what a OneToOne edge pairs across layers.
//!
//! # Ordering
//!
//! - **Product**: odometer order. The first key varies slowest and the last
//!   key varies fastest, like nested loops with the first key outermost.
//! - **Grouped**: each group contributes its values positionally (index `i`
//!   of every key in the group always co-occurs). Groups are combined with
//!   each other in odometer order, free keys likewise, and the two sides are
//!   crossed according to [`OrderPreference`].

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::Deserialize;

use super::assignment::{Key, VariableAssignment, VariableSet};
use super::value::Value;
use crate::error::BuildError;

/// How the keys of a layer are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Full cartesian product of every key
    #[default]
    #[serde(alias = "all", alias = "full_product")]
    Product,
    /// Grouped keys vary in lockstep, free keys independently
    Grouped,
}

/// Which side of a grouped combination stays fixed while the other side
/// is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPreference {
    /// Free combinations are the fast (inner) dimension
    #[default]
    GroupedFirst,
    /// Group selections are the fast (inner) dimension
    FreeFirst,
}

/// Combination settings for one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineConfig {
    pub mode: CombineMode,
    /// Key groups (only used in grouped mode)
    pub groups: Vec<Vec<Key>>,
    pub order: OrderPreference,
}

impl CombineConfig {
    /// Full cartesian product.
    pub fn product() -> Self {
        Self::default()
    }

    /// Grouped combination with the given partition and order.
    pub fn grouped(groups: Vec<Vec<Key>>, order: OrderPreference) -> Self {
        Self {
            mode: CombineMode::Grouped,
            groups,
            order,
        }
    }
}

/// Cartesian product in odometer order: the last dimension varies fastest.
///
/// An empty list of dimensions yields a single empty tuple; any empty
/// dimension yields no tuples.
///
/// # Example
/// ```
/// use dagweaver::params::combine::cartesian;
///
/// let tuples = cartesian(&[vec![1, 2], vec![10, 20]]);
/// assert_eq!(tuples, vec![vec![1, 10], vec![1, 20], vec![2, 10], vec![2, 20]]);
/// ```
pub fn cartesian<T: Clone>(dims: &[Vec<T>]) -> Vec<Vec<T>> {
    if dims.iter().any(|d| d.is_empty()) {
        return Vec::new();
    }

    let total: usize = dims.iter().map(|d| d.len()).product();
    let mut tuples = Vec::with_capacity(total);
    let mut index = vec![0usize; dims.len()];

    loop {
        tuples.push(
            index
                .iter()
                .zip(dims)
                .map(|(&i, dim)| dim[i].clone())
                .collect(),
        );

        // Advance the odometer from the last position.
        let mut pos = dims.len();
        loop {
            if pos == 0 {
                return tuples;
            }
            pos -= 1;
            index[pos] += 1;
            if index[pos] < dims[pos].len() {
                break;
            }
            index[pos] = 0;
        }
    }
}

/// Merges each tuple of partial assignments into one assignment.
fn merge_tuples(tuples: Vec<Vec<VariableAssignment>>) -> Vec<VariableAssignment> {
    tuples
        .into_iter()
        .map(|parts| {
            let mut var = VariableAssignment::new();
            for part in &parts {
                var.merge(part);
            }
            var
        })
        .collect()
}

fn values_for<'a>(
    values_by_key: &'a HashMap<Key, Vec<Value>>,
    key: &str,
) -> Result<&'a Vec<Value>, BuildError> {
    values_by_key
        .get(key)
        .ok_or_else(|| BuildError::MissingValues(key.to_string()))
}

/// Builds the variable set for one layer.
///
/// `keys` is the template key order; every resulting assignment binds each
/// key exactly once, listed in that order.
pub fn build(
    keys: &[Key],
    values_by_key: &HashMap<Key, Vec<Value>>,
    config: &CombineConfig,
) -> Result<VariableSet, BuildError> {
    let vars = match config.mode {
        CombineMode::Product => build_product(keys, values_by_key)?,
        CombineMode::Grouped => build_grouped(keys, values_by_key, &config.groups, config.order)?,
    };

    info!(
        "Generated {} assignments for {} keys ({:?})",
        vars.len(),
        keys.len(),
        config.mode
    );
    Ok(vars)
}

fn build_product(
    keys: &[Key],
    values_by_key: &HashMap<Key, Vec<Value>>,
) -> Result<VariableSet, BuildError> {
    let dims = keys
        .iter()
        .map(|key| values_for(values_by_key, key).map(|v| v.to_vec()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cartesian(&dims)
        .into_iter()
        .map(|tuple| {
            let mut var = VariableAssignment::new();
            for (key, value) in keys.iter().zip(tuple) {
                var.insert(key.clone(), value);
            }
            var
        })
        .collect())
}

/// Checks the group partition against the layer keys.
fn validate_groups(
    keys: &[Key],
    values_by_key: &HashMap<Key, Vec<Value>>,
    groups: &[Vec<Key>],
) -> Result<(), BuildError> {
    let mut grouped: HashSet<&str> = HashSet::new();

    for group in groups {
        if group.len() < 2 {
            return Err(BuildError::EmptyGroup(group.clone()));
        }

        for key in group {
            if !keys.contains(key) {
                return Err(BuildError::UnknownGroupKey(key.clone()));
            }
            if !grouped.insert(key.as_str()) {
                return Err(BuildError::KeyAlreadyGrouped(key.clone()));
            }
        }

        let lengths = group
            .iter()
            .map(|key| values_for(values_by_key, key).map(|v| v.len()))
            .collect::<Result<Vec<_>, _>>()?;

        if lengths.windows(2).any(|w| w[0] != w[1]) {
            return Err(BuildError::GroupSizeMismatch {
                group: group.clone(),
                lengths,
            });
        }
    }

    Ok(())
}

fn build_grouped(
    keys: &[Key],
    values_by_key: &HashMap<Key, Vec<Value>>,
    groups: &[Vec<Key>],
    order: OrderPreference,
) -> Result<VariableSet, BuildError> {
    validate_groups(keys, values_by_key, groups)?;

    // One synchronized list per group: entry i binds index i of every key.
    let mut group_lists: Vec<Vec<VariableAssignment>> = Vec::with_capacity(groups.len());
    for group in groups {
        let columns = group
            .iter()
            .map(|key| values_for(values_by_key, key))
            .collect::<Result<Vec<_>, _>>()?;
        let len = columns.first().map_or(0, |c| c.len());

        let list = (0..len)
            .map(|i| {
                let mut var = VariableAssignment::new();
                for (key, column) in group.iter().zip(&columns) {
                    var.insert(key.clone(), column[i].clone());
                }
                var
            })
            .collect();
        group_lists.push(list);
    }

    let grouped_keys: HashSet<&Key> = groups.iter().flatten().collect();
    let free_keys: Vec<&Key> = keys.iter().filter(|k| !grouped_keys.contains(k)).collect();

    let mut free_lists: Vec<Vec<VariableAssignment>> = Vec::with_capacity(free_keys.len());
    for key in &free_keys {
        let list = values_for(values_by_key, key)?
            .iter()
            .map(|value| {
                let mut var = VariableAssignment::new();
                var.insert((*key).clone(), value.clone());
                var
            })
            .collect();
        free_lists.push(list);
    }

    let grouped_variants = merge_tuples(cartesian(&group_lists));
    let free_variants = merge_tuples(cartesian(&free_lists));

    debug!(
        "{} grouped variants x {} free variants (free keys: {:?}, order: {:?})",
        grouped_variants.len(),
        free_variants.len(),
        free_keys,
        order
    );

    let (outer, inner) = match order {
        OrderPreference::GroupedFirst => (&grouped_variants, &free_variants),
        OrderPreference::FreeFirst => (&free_variants, &grouped_variants),
    };

    let mut vars = Vec::with_capacity(outer.len() * inner.len());
    for slow in outer {
        for fast in inner {
            let mut var = slow.clone();
            var.merge(fast);
            vars.push(var.ordered_by(keys));
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<Key> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ints(pairs: &[(&str, &[i64])]) -> HashMap<Key, Vec<Value>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|&n| Value::Int(n)).collect()))
            .collect()
    }

    fn var(pairs: &[(&str, i64)]) -> VariableAssignment {
        pairs
            .iter()
            .fold(VariableAssignment::new(), |acc, (k, v)| acc.with(*k, Value::Int(*v)))
    }

    #[test]
    fn test_cartesian_empty_dims() {
        let tuples: Vec<Vec<i32>> = cartesian(&[]);
        assert_eq!(tuples, vec![Vec::<i32>::new()]);

        let tuples = cartesian(&[vec![1], vec![]]);
        assert!(tuples.is_empty());
    }

    #[test]
    fn test_product_odometer_order() {
        let values = ints(&[("x", &[1, 2]), ("y", &[10, 20])]);
        let vars = build(&keys(&["x", "y"]), &values, &CombineConfig::product()).unwrap();

        assert_eq!(
            vars,
            vec![
                var(&[("x", 1), ("y", 10)]),
                var(&[("x", 1), ("y", 20)]),
                var(&[("x", 2), ("y", 10)]),
                var(&[("x", 2), ("y", 20)]),
            ]
        );
    }

    #[test]
    fn test_product_count_and_coverage() {
        let values = ints(&[("a", &[1, 2, 3]), ("b", &[4, 5]), ("c", &[6, 7, 8, 9])]);
        let layer_keys = keys(&["a", "b", "c"]);
        let vars = build(&layer_keys, &values, &CombineConfig::product()).unwrap();

        assert_eq!(vars.len(), 3 * 2 * 4);
        for v in &vars {
            let names: Vec<_> = v.keys().cloned().collect();
            assert_eq!(names, layer_keys);
        }
    }

    #[test]
    fn test_product_no_keys_single_empty_job() {
        let vars = build(&[], &HashMap::new(), &CombineConfig::product()).unwrap();
        assert_eq!(vars.len(), 1);
        assert!(vars[0].is_empty());
    }

    #[test]
    fn test_product_missing_values() {
        let values = ints(&[("x", &[1])]);
        let result = build(&keys(&["x", "y"]), &values, &CombineConfig::product());
        assert!(matches!(result, Err(BuildError::MissingValues(k)) if k == "y"));
    }

    #[test]
    fn test_grouped_first_order() {
        let values = ints(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]);
        let config = CombineConfig::grouped(vec![keys(&["a", "b"])], OrderPreference::GroupedFirst);
        let vars = build(&keys(&["a", "b", "c"]), &values, &config).unwrap();

        assert_eq!(
            vars,
            vec![
                var(&[("a", 1), ("b", 3), ("c", 5)]),
                var(&[("a", 1), ("b", 3), ("c", 6)]),
                var(&[("a", 2), ("b", 4), ("c", 5)]),
                var(&[("a", 2), ("b", 4), ("c", 6)]),
            ]
        );
    }

    #[test]
    fn test_free_first_order() {
        let values = ints(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]);
        let config = CombineConfig::grouped(vec![keys(&["a", "b"])], OrderPreference::FreeFirst);
        let vars = build(&keys(&["a", "b", "c"]), &values, &config).unwrap();

        assert_eq!(
            vars,
            vec![
                var(&[("a", 1), ("b", 3), ("c", 5)]),
                var(&[("a", 2), ("b", 4), ("c", 5)]),
                var(&[("a", 1), ("b", 3), ("c", 6)]),
                var(&[("a", 2), ("b", 4), ("c", 6)]),
            ]
        );
    }

    #[test]
    fn test_grouped_keys_in_template_order() {
        // Free key comes first in the template, group keys after it.
        let values = ints(&[("c", &[5]), ("a", &[1, 2]), ("b", &[3, 4])]);
        let config = CombineConfig::grouped(vec![keys(&["b", "a"])], OrderPreference::GroupedFirst);
        let layer_keys = keys(&["c", "a", "b"]);
        let vars = build(&layer_keys, &values, &config).unwrap();

        for v in &vars {
            let names: Vec<_> = v.keys().cloned().collect();
            assert_eq!(names, layer_keys);
        }
    }

    #[test]
    fn test_group_positions_never_mix() {
        let values = ints(&[
            ("a", &[1, 2, 3]),
            ("b", &[10, 20, 30]),
            ("c", &[7, 8]),
            ("d", &[100, 200]),
        ]);
        let config = CombineConfig::grouped(
            vec![keys(&["a", "b"]), keys(&["c", "d"])],
            OrderPreference::GroupedFirst,
        );
        let vars = build(&keys(&["a", "b", "c", "d"]), &values, &config).unwrap();

        assert_eq!(vars.len(), 3 * 2);
        for v in &vars {
            let a = v.get("a").and_then(Value::as_int).unwrap();
            let b = v.get("b").and_then(Value::as_int).unwrap();
            assert_eq!(b, a * 10);
            let c = v.get("c").and_then(Value::as_int).unwrap();
            let d = v.get("d").and_then(Value::as_int).unwrap();
            assert_eq!(d, (c - 6) * 100);
        }
    }

    #[test]
    fn test_grouped_without_groups_is_product() {
        let values = ints(&[("x", &[1, 2]), ("y", &[10, 20])]);
        let layer_keys = keys(&["x", "y"]);
        let grouped = build(
            &layer_keys,
            &values,
            &CombineConfig::grouped(vec![], OrderPreference::GroupedFirst),
        )
        .unwrap();
        let product = build(&layer_keys, &values, &CombineConfig::product()).unwrap();
        assert_eq!(grouped, product);
    }

    #[test]
    fn test_group_size_mismatch() {
        let values = ints(&[("a", &[1, 2]), ("b", &[3])]);
        let config = CombineConfig::grouped(vec![keys(&["a", "b"])], OrderPreference::GroupedFirst);
        let result = build(&keys(&["a", "b"]), &values, &config);

        match result {
            Err(BuildError::GroupSizeMismatch { lengths, .. }) => assert_eq!(lengths, vec![2, 1]),
            other => panic!("Expected GroupSizeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_group_too_small() {
        let values = ints(&[("a", &[1]), ("b", &[2])]);
        let config = CombineConfig::grouped(vec![keys(&["a"])], OrderPreference::GroupedFirst);
        let result = build(&keys(&["a", "b"]), &values, &config);
        assert!(matches!(result, Err(BuildError::EmptyGroup(_))));
    }

    #[test]
    fn test_group_unknown_and_duplicate_keys() {
        let values = ints(&[("a", &[1]), ("b", &[2]), ("c", &[3])]);
        let layer_keys = keys(&["a", "b", "c"]);

        let config = CombineConfig::grouped(vec![keys(&["a", "z"])], OrderPreference::GroupedFirst);
        assert!(matches!(
            build(&layer_keys, &values, &config),
            Err(BuildError::UnknownGroupKey(k)) if k == "z"
        ));

        let config = CombineConfig::grouped(
            vec![keys(&["a", "b"]), keys(&["b", "c"])],
            OrderPreference::GroupedFirst,
        );
        assert!(matches!(
            build(&layer_keys, &values, &config),
            Err(BuildError::KeyAlreadyGrouped(k)) if k == "b"
        ));
    }

    #[test]
    fn test_mode_deserialize_aliases() {
        let mode: CombineMode = serde_yaml::from_str("all").unwrap();
        assert_eq!(mode, CombineMode::Product);
        let order: OrderPreference = serde_yaml::from_str("free_first").unwrap();
        assert_eq!(order, OrderPreference::FreeFirst);
    }
}
