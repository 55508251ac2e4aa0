use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;

use super::builtin;
use super::context::Checker;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("checker id registered twice: {0}")]
    DuplicateId(String),

    #[error("checker {checker} depends on unknown checker {dependency}")]
    UnknownDependency { checker: String, dependency: String },

    #[error("checker {checker} depends on {dependency}, which runs in a later group")]
    DependencyOrder { checker: String, dependency: String },

    #[error("dependency cycle among checkers: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("unknown checker: {0}")]
    UnknownChecker(String),
}

/// Validated, ordered set of checkers.
pub struct CheckerRegistry {
    checkers: Vec<Arc<dyn Checker>>,
}

impl CheckerRegistry {
    /// Validate ids and dependencies. Registration order is the tie-break
    /// order for execution.
    pub fn new(checkers: Vec<Arc<dyn Checker>>) -> Result<Self, RegistryError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, checker) in checkers.iter().enumerate() {
            if index.insert(checker.id(), i).is_some() {
                return Err(RegistryError::DuplicateId(checker.id().to_string()));
            }
        }

        for checker in &checkers {
            for dep in checker.depends_on() {
                let Some(&d) = index.get(dep) else {
                    return Err(RegistryError::UnknownDependency {
                        checker: checker.id().to_string(),
                        dependency: dep.to_string(),
                    });
                };
                if checkers[d].group() > checker.group() {
                    return Err(RegistryError::DependencyOrder {
                        checker: checker.id().to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        let registry = Self { checkers };
        // A full ordering fails exactly when the graph has a cycle.
        registry.order_indices(&(0..registry.checkers.len()).collect())?;
        Ok(registry)
    }

    /// Registry of the built-in checkers.
    pub fn builtin() -> Self {
        Self {
            checkers: builtin::all(),
        }
    }

    pub fn checkers(&self) -> &[Arc<dyn Checker>] {
        &self.checkers
    }

    /// Enabled checkers in execution order: by group, then a stable
    /// topological order of the registry within each group. An empty
    /// `enabled` list enables every checker.
    pub fn execution_order(&self, enabled: &[String]) -> Result<Vec<Arc<dyn Checker>>, RegistryError> {
        let selected: BTreeSet<usize> = if enabled.is_empty() {
            (0..self.checkers.len()).collect()
        } else {
            enabled
                .iter()
                .map(|id| {
                    self.checkers
                        .iter()
                        .position(|c| c.id() == id)
                        .ok_or_else(|| RegistryError::UnknownChecker(id.clone()))
                })
                .collect::<Result<_, _>>()?
        };
        Ok(self
            .order_indices(&selected)?
            .into_iter()
            .map(|i| Arc::clone(&self.checkers[i]))
            .collect())
    }

    fn order_indices(&self, selected: &BTreeSet<usize>) -> Result<Vec<usize>, RegistryError> {
        let mut order = Vec::with_capacity(selected.len());
        let mut placed: BTreeSet<usize> = BTreeSet::new();
        let mut groups: Vec<_> = selected.iter().map(|&i| self.checkers[i].group()).collect();
        groups.sort();
        groups.dedup();

        for group in groups {
            let mut pending: Vec<usize> = selected
                .iter()
                .copied()
                .filter(|&i| self.checkers[i].group() == group)
                .collect();
            while !pending.is_empty() {
                // Lowest registry index whose selected dependencies are placed.
                let ready = pending.iter().position(|&i| {
                    self.checkers[i].depends_on().iter().all(|dep| {
                        match self.checkers.iter().position(|c| c.id() == *dep) {
                            Some(d) if selected.contains(&d) => placed.contains(&d),
                            // Disabled dependencies do not block.
                            _ => true,
                        }
                    })
                });
                let Some(pos) = ready else {
                    return Err(RegistryError::DependencyCycle(
                        pending
                            .iter()
                            .map(|&i| self.checkers[i].id().to_string())
                            .collect(),
                    ));
                };
                let i = pending.remove(pos);
                placed.insert(i);
                order.push(i);
            }
        }
        Ok(order)
    }
}
