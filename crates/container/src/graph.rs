//! Declared-dependency graph validation, used by `verify()`.
//!
//! Works purely on the dependency edges declared at registration time;
//! detects edges pointing at unregistered types and cycles via DFS.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use crate::errors::ContainerError;
use crate::registration::ServiceKey;

#[derive(Default)]
pub(crate) struct DependencyGraph {
    registered: HashSet<TypeId>,
    edges: HashMap<TypeId, Vec<ServiceKey>>,
    names: HashMap<TypeId, &'static str>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, key: ServiceKey, dependencies: &[ServiceKey]) {
        self.registered.insert(key.type_id);
        self.names.insert(key.type_id, key.type_name);
        for dependency in dependencies {
            self.names.insert(dependency.type_id, dependency.type_name);
        }
        self.edges.insert(key.type_id, dependencies.to_vec());
    }

    /// One error per declared edge whose target has no registration.
    pub(crate) fn missing_dependencies(&self) -> Vec<ContainerError> {
        let mut errors = Vec::new();
        for (&from, dependencies) in &self.edges {
            for dependency in dependencies {
                if !self.registered.contains(&dependency.type_id) {
                    errors.push(ContainerError::MissingDependency {
                        dependent: self.names[&from],
                        dependency: dependency.type_name,
                    });
                }
            }
        }
        errors.sort_by_key(|err| err.to_string());
        errors
    }

    /// One error per distinct cycle in the declared graph.
    pub(crate) fn cycle_errors(&self) -> Vec<ContainerError> {
        self.cycles()
            .into_iter()
            .map(|cycle| {
                let names: Vec<&'static str> =
                    cycle.iter().map(|type_id| self.names[type_id]).collect();
                ContainerError::CyclicDependency {
                    type_name: names[0],
                    chain: names.join(" -> "),
                }
            })
            .collect()
    }

    /// DFS cycle detection. Each returned cycle is closed: the first node
    /// is repeated at the end.
    fn cycles(&self) -> Vec<Vec<TypeId>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut current_path = Vec::new();

        let mut roots: Vec<TypeId> = self.edges.keys().copied().collect();
        roots.sort_by_key(|type_id| self.names[type_id]);
        for node in roots {
            if !visited.contains(&node) {
                self.dfs(
                    node,
                    &mut visited,
                    &mut rec_stack,
                    &mut current_path,
                    &mut cycles,
                );
            }
        }

        cycles
    }

    fn dfs(
        &self,
        node: TypeId,
        visited: &mut HashSet<TypeId>,
        rec_stack: &mut HashSet<TypeId>,
        current_path: &mut Vec<TypeId>,
        cycles: &mut Vec<Vec<TypeId>>,
    ) {
        visited.insert(node);
        rec_stack.insert(node);
        current_path.push(node);

        if let Some(neighbors) = self.edges.get(&node) {
            for neighbor in neighbors {
                // Unregistered targets are reported separately.
                if !self.registered.contains(&neighbor.type_id) {
                    continue;
                }
                if !visited.contains(&neighbor.type_id) {
                    self.dfs(neighbor.type_id, visited, rec_stack, current_path, cycles);
                } else if rec_stack.contains(&neighbor.type_id) {
                    if let Some(start) = current_path.iter().position(|&n| n == neighbor.type_id) {
                        let mut cycle = current_path[start..].to_vec();
                        cycle.push(neighbor.type_id);
                        cycles.push(cycle);
                    }
                }
            }
        }

        current_path.pop();
        rec_stack.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ServiceA;
    struct ServiceB;
    struct ServiceC;

    fn key<T: 'static>() -> ServiceKey {
        ServiceKey::of::<T>()
    }

    #[test]
    fn test_linear_graph_is_clean() {
        let mut graph = DependencyGraph::new();
        graph.add_node(key::<ServiceA>(), &[key::<ServiceB>()]);
        graph.add_node(key::<ServiceB>(), &[key::<ServiceC>()]);
        graph.add_node(key::<ServiceC>(), &[]);

        assert!(graph.missing_dependencies().is_empty());
        assert!(graph.cycle_errors().is_empty());
    }

    #[test]
    fn test_missing_dependency_reported_per_edge() {
        let mut graph = DependencyGraph::new();
        graph.add_node(key::<ServiceA>(), &[key::<ServiceB>(), key::<ServiceC>()]);

        let errors = graph.missing_dependencies();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|err| matches!(err, ContainerError::MissingDependency { .. })));
    }

    #[test]
    fn test_three_node_cycle_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_node(key::<ServiceA>(), &[key::<ServiceB>()]);
        graph.add_node(key::<ServiceB>(), &[key::<ServiceC>()]);
        graph.add_node(key::<ServiceC>(), &[key::<ServiceA>()]);

        let errors = graph.cycle_errors();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ContainerError::CyclicDependency { chain, .. } => {
                assert_eq!(chain.matches("ServiceA").count(), 2);
                assert!(chain.contains("ServiceB"));
                assert!(chain.contains("ServiceC"));
            }
            other => panic!("expected CyclicDependency, got {other}"),
        }
    }

    #[test]
    fn test_self_cycle_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_node(key::<ServiceA>(), &[key::<ServiceA>()]);

        let errors = graph.cycle_errors();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unregistered_edge_does_not_count_as_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node(key::<ServiceA>(), &[key::<ServiceB>()]);

        assert_eq!(graph.missing_dependencies().len(), 1);
        assert!(graph.cycle_errors().is_empty());
    }
}
