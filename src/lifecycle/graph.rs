//! Task dependency graph
//!
//! Dependencies between sibling tasks form a DAG. The graph is checked for
//! duplicate nodes, unknown dependencies and cycles when it is built, so a
//! successfully built graph always has a topological order.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

use uuid::Uuid;

use super::error::{LifecycleError, LifecycleResult};
use crate::domain::{EventTask, EventTemplate};

#[derive(Debug, Clone)]
pub struct TaskGraph<K> {
    nodes: Vec<K>,
    index: HashMap<K, usize>,
    depends_on: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl<K> TaskGraph<K>
where
    K: Eq + Hash + Clone + Display,
{
    /// Build a graph from `(node, dependencies)` pairs.
    pub fn build<I>(entries: I) -> LifecycleResult<Self>
    where
        I: IntoIterator<Item = (K, Vec<K>)>,
    {
        let entries: Vec<(K, Vec<K>)> = entries.into_iter().collect();

        let mut nodes = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for (node, _) in &entries {
            if index.insert(node.clone(), nodes.len()).is_some() {
                return Err(LifecycleError::DuplicateTaskKey(node.to_string()));
            }
            nodes.push(node.clone());
        }

        let mut depends_on = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        for (i, (node, deps)) in entries.iter().enumerate() {
            for dep in deps {
                let Some(&j) = index.get(dep) else {
                    return Err(LifecycleError::UnknownDependency {
                        task: node.to_string(),
                        dependency: dep.to_string(),
                    });
                };
                if i == j {
                    return Err(LifecycleError::DependencyCycle(node.to_string()));
                }
                if !depends_on[i].contains(&j) {
                    depends_on[i].push(j);
                    dependents[j].push(i);
                }
            }
        }

        // Kahn's algorithm, seeded in input order so the result is stable.
        let mut remaining: Vec<usize> = depends_on.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &d in &dependents[i] {
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    queue.push_back(d);
                }
            }
        }

        if order.len() < nodes.len() {
            let stuck = (0..nodes.len())
                .find(|&i| remaining[i] > 0)
                .map(|i| nodes[i].to_string())
                .unwrap_or_default();
            return Err(LifecycleError::DependencyCycle(stuck));
        }

        Ok(Self {
            nodes,
            index,
            depends_on,
            dependents,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes ordered so that every node follows all of its dependencies
    pub fn topological_order(&self) -> impl Iterator<Item = &K> {
        self.order.iter().map(|&i| &self.nodes[i])
    }

    pub fn dependencies_of<'a>(&'a self, node: &K) -> impl Iterator<Item = &'a K> + 'a {
        self.neighbours(node, &self.depends_on)
    }

    pub fn dependents_of<'a>(&'a self, node: &K) -> impl Iterator<Item = &'a K> + 'a {
        self.neighbours(node, &self.dependents)
    }

    fn neighbours<'a>(
        &'a self,
        node: &K,
        adjacency: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a K> + 'a {
        let edges: &'a [usize] = match self.index.get(node) {
            Some(&i) => &adjacency[i],
            None => &[],
        };
        edges.iter().map(move |&j| &self.nodes[j])
    }
}

impl TaskGraph<String> {
    pub fn for_template(template: &EventTemplate) -> LifecycleResult<Self> {
        Self::build(
            template
                .tasks
                .iter()
                .map(|t| (t.key.clone(), t.depends_on.clone())),
        )
    }
}

impl TaskGraph<Uuid> {
    pub fn for_tasks(tasks: &[EventTask]) -> LifecycleResult<Self> {
        Self::build(tasks.iter().map(|t| (t.id, t.dependencies.clone())))
    }
}
