//! Task dependency graph utilities.

use std::collections::{BTreeSet, HashMap};

use crate::error::TaskError;

/// Order `names` so that every task comes after the tasks it depends on.
///
/// Kahn's algorithm, always taking the ready task that appears earliest in
/// `names`, so the input order is kept wherever dependencies allow.
/// Dependencies on names outside `names` are ignored.
///
/// # Errors
///
/// Returns [`TaskError::DependencyCycle`] naming the tasks that could not
/// be ordered.
pub fn stable_topo_sort<F>(names: &[String], deps_of: F) -> Result<Vec<String>, TaskError>
where
    F: Fn(&str) -> Vec<String>,
{
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; names.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for (i, name) in names.iter().enumerate() {
        for dep in deps_of(name) {
            if let Some(&dep_idx) = index.get(dep.as_str())
                && let Some(rd) = dependents.get_mut(dep_idx)
                && let Some(count) = in_degree.get_mut(i)
            {
                rd.push(i);
                *count += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(names.len());

    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        if let Some(next) = dependents.get(idx) {
            for &dep in next {
                if let Some(count) = in_degree.get_mut(dep) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dep);
                    }
                }
            }
        }
    }

    if order.len() != names.len() {
        let stuck: Vec<&str> = names
            .iter()
            .zip(&in_degree)
            .filter(|&(_, &d)| d > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        return Err(TaskError::DependencyCycle(stuck.join(", ")));
    }

    Ok(order
        .into_iter()
        .filter_map(|i| names.get(i).cloned())
        .collect())
}
