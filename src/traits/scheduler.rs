//! Dependency ordering for trait passes.

use std::collections::HashSet;
use tracing::error;

use crate::error::{Error, Result};

/// Anything that can be placed in a dependency order.
pub trait Schedulable {
    fn name(&self) -> &str;
    fn dependencies(&self) -> Vec<&str>;
}

/// Whether `name` can be used as a trait name (and therefore a file name).
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Orders `items` so that each one comes after everything it depends on.
///
/// Works in rounds: every item whose dependencies are already placed joins the
/// order in the same round, sorted by name. A round that places nothing means
/// the remaining items form a cycle.
pub fn topological_order<T: Schedulable>(items: Vec<T>) -> Result<Vec<T>> {
    check_graph(&items).inspect_err(|err| error!(%err, "invalid trait graph"))?;

    let mut placed: HashSet<String> = HashSet::with_capacity(items.len());
    let mut order = Vec::with_capacity(items.len());
    let mut remaining = items;

    while !remaining.is_empty() {
        let (mut ready, blocked): (Vec<T>, Vec<T>) = remaining.into_iter().partition(|item| {
            item.dependencies()
                .iter()
                .all(|dependency| placed.contains(*dependency))
        });

        if ready.is_empty() {
            let mut names: Vec<String> = blocked.iter().map(|item| item.name().to_string()).collect();
            names.sort();
            let err = Error::DependencyCycle(names);
            error!(%err, "invalid trait graph");
            return Err(err);
        }

        ready.sort_by(|a, b| a.name().cmp(b.name()));
        placed.extend(ready.iter().map(|item| item.name().to_string()));
        order.extend(ready);
        remaining = blocked;
    }

    Ok(order)
}

fn check_graph<T: Schedulable>(items: &[T]) -> Result<()> {
    let mut names = HashSet::with_capacity(items.len());
    for item in items {
        if !is_valid_name(item.name()) {
            return Err(Error::InvalidTraitName(item.name().to_string()));
        }
        if !names.insert(item.name()) {
            return Err(Error::DuplicateTrait(item.name().to_string()));
        }
    }

    for item in items {
        if let Some(missing) = item
            .dependencies()
            .into_iter()
            .find(|dependency| !names.contains(dependency))
        {
            return Err(Error::UnknownDependency {
                trait_name: item.name().to_string(),
                dependency: missing.to_string(),
            });
        }
    }
    Ok(())
}
