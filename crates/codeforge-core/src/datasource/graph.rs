//! Dependency graph over data sources.
//!
//! Built once per page. Holds a topological order of every source
//! (dependencies first) and, per source, the sources that list it as a
//! dependency. Recomputation after a write walks the downstream closure of the
//! written id in that cached order.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use thiserror::Error;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("data source {source_id} depends on undeclared source {dependency}")]
    UnknownDependency { source_id: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("duplicate data source id: {0}")]
    DuplicateId(String),
}

impl GraphError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::UnknownDependency { source_id, .. } => {
                Diagnostic::error("schema.unknown_dependency", self.to_string())
                    .at(format!("dataSources.{source_id}.dependencies"))
            }
            Self::Cycle(path) => Diagnostic::error("schema.cycle", self.to_string())
                .at(format!("dataSources.{}", path.first().map(String::as_str).unwrap_or(""))),
            Self::DuplicateId(id) => {
                Diagnostic::error("schema.duplicate_source", self.to_string()).at(format!("dataSources.{id}"))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    position: HashMap<String, usize>,
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build from `(id, dependencies)` pairs in declaration order.
    ///
    /// Ties in the topological order keep declaration order, so the result is
    /// deterministic for a given schema.
    pub fn build<'a, I>(nodes: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let nodes: Vec<(&str, &[String])> = nodes.into_iter().collect();
        let mut declared: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (i, (id, _)) in nodes.iter().enumerate() {
            if declared.insert(*id, i).is_some() {
                return Err(GraphError::DuplicateId(id.to_string()));
            }
        }

        let mut indegree = vec![0usize; nodes.len()];
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (i, (id, deps)) in nodes.iter().enumerate() {
            let unique: BTreeSet<&String> = deps.iter().collect();
            for dep in unique {
                if !declared.contains_key(dep.as_str()) {
                    return Err(GraphError::UnknownDependency {
                        source_id: id.to_string(),
                        dependency: dep.clone(),
                    });
                }
                indegree[i] += 1;
                dependents.entry(dep.clone()).or_default().push(id.to_string());
            }
        }

        // Kahn's algorithm; the ready set is ordered by declaration index.
        let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(i) = ready.pop_first() {
            let id = nodes[i].0;
            order.push(id.to_string());
            for d in dependents.get(id).into_iter().flatten() {
                let j = declared[d.as_str()];
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if order.len() < nodes.len() {
            let remaining: BTreeMap<&str, &[String]> = nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, n)| *n)
                .collect();
            return Err(GraphError::Cycle(find_cycle(&remaining)));
        }

        let position = order.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Ok(Self {
            order,
            position,
            dependents,
        })
    }

    /// Every source, dependencies first.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Direct dependents of `id`.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive dependents of the given ids (excluding the ids themselves
    /// unless they depend on one another), in topological order.
    pub fn downstream<'a, I>(&self, changed: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut queue: VecDeque<&str> = changed.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            for d in self.dependents(id) {
                if let Some(&pos) = self.position.get(d) {
                    if seen.insert(pos) {
                        queue.push_back(d.as_str());
                    }
                }
            }
        }
        seen.into_iter().map(|p| self.order[p].clone()).collect()
    }
}

/// Extract one concrete cycle from a subgraph in which every node has a
/// remaining in-edge. Returned as `a -> b -> ... -> a`.
fn find_cycle(remaining: &BTreeMap<&str, &[String]>) -> Vec<String> {
    let Some(start) = remaining.keys().next().copied() else {
        return Vec::new();
    };
    let mut path: Vec<&str> = vec![start];
    let mut cur = start;
    loop {
        let next = remaining
            .get(cur)
            .and_then(|deps| deps.iter().find(|d| remaining.contains_key(d.as_str())));
        let Some(next) = next else {
            return path.into_iter().map(str::to_string).collect();
        };
        if let Some(at) = path.iter().position(|p| *p == next.as_str()) {
            let mut cycle: Vec<String> = path[at..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.clone());
            return cycle;
        }
        path.push(next.as_str());
        cur = next.as_str();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn deps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn graph(spec: &[(&str, Vec<String>)]) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::build(spec.iter().map(|(id, d)| (*id, d.as_slice())))
    }

    #[test]
    fn orders_dependencies_first() {
        let g = graph(&[
            ("summary", deps(&["stats", "todos"])),
            ("stats", deps(&["todos"])),
            ("todos", deps(&[])),
            ("filter", deps(&[])),
        ])
        .unwrap();
        assert_eq!(g.order(), ["todos", "stats", "summary", "filter"]);
    }

    #[test]
    fn downstream_is_transitive_and_ordered() {
        let g = graph(&[
            ("a", deps(&[])),
            ("b", deps(&["a"])),
            ("c", deps(&["b", "a"])),
            ("d", deps(&[])),
        ])
        .unwrap();
        assert_eq!(g.downstream(["a"]), vec!["b", "c"]);
        assert_eq!(g.downstream(["b"]), vec!["c"]);
        assert!(g.downstream(["d"]).is_empty());
    }

    #[test]
    fn diamond_recomputes_each_once() {
        let g = graph(&[
            ("root", deps(&[])),
            ("left", deps(&["root"])),
            ("right", deps(&["root"])),
            ("join", deps(&["left", "right"])),
        ])
        .unwrap();
        assert_eq!(g.downstream(["root"]), vec!["left", "right", "join"]);
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let err = graph(&[
            ("ok", deps(&[])),
            ("a", deps(&["b"])),
            ("b", deps(&["c"])),
            ("c", deps(&["a", "ok"])),
        ])
        .unwrap_err();
        assert_matches!(&err, GraphError::Cycle(path) if path.first() == path.last() && path.len() == 4);
        assert!(err.to_string().starts_with("dependency cycle: "));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        assert_matches!(graph(&[("a", deps(&["a"]))]), Err(GraphError::Cycle(p)) if p == ["a", "a"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        assert_matches!(
            graph(&[("x", deps(&["a"])), ("a", deps(&[])), ("a", deps(&[]))]),
            Err(GraphError::DuplicateId(id)) if id == "a"
        );
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        assert_matches!(
            graph(&[("a", deps(&["ghost"]))]),
            Err(GraphError::UnknownDependency { dependency, .. }) if dependency == "ghost"
        );
    }
}
