// src/depcheck/graph.rs

//! Job ordering graph
//!
//! Nodes are jobs that install something; an edge `a -> b` means the trove
//! installed by `a` requires something provided by the trove installed by
//! `b`, so `b` must be applied first.

use std::collections::{BTreeSet, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct JobGraph {
    edges: Vec<BTreeSet<usize>>,
}

impl JobGraph {
    pub fn new(nodes: usize) -> Self {
        Self {
            edges: vec![BTreeSet::new(); nodes],
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// `from` requires `to`; self edges are ignored
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if from != to && from < self.edges.len() && to < self.edges.len() {
            self.edges[from].insert(to);
        }
    }

    /// Group nodes into application order using Kahn's algorithm
    ///
    /// Dependencies come before dependents. Nodes that cannot be ordered
    /// because of a cycle, together with everything they require, form a
    /// single group placed first.
    pub fn install_order(&self) -> Vec<Vec<usize>> {
        let mut in_degree = vec![0usize; self.edges.len()];
        for edges in &self.edges {
            for &to in edges {
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.edges.len())
            .filter(|&node| in_degree[node] == 0)
            .collect();
        let mut processed = Vec::new();
        let mut done = vec![false; self.edges.len()];

        while let Some(node) = queue.pop_front() {
            processed.push(node);
            done[node] = true;
            for &to in &self.edges[node] {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    queue.push_back(to);
                }
            }
        }

        let mut groups = Vec::new();
        let stuck: Vec<usize> = (0..self.edges.len()).filter(|&n| !done[n]).collect();
        if !stuck.is_empty() {
            groups.push(stuck);
        }

        // Reverse to get installation order (dependencies before dependents)
        groups.extend(processed.into_iter().rev().map(|node| vec![node]));
        groups
    }

    /// Find one dependency cycle, if any
    pub fn detect_cycle(&self) -> Option<Vec<usize>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut cycle = Vec::new();

        for node in 0..self.edges.len() {
            if !visited.contains(&node)
                && self.dfs_cycle_detect(node, &mut visited, &mut rec_stack, &mut cycle)
            {
                cycle.reverse();
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle_detect(
        &self,
        node: usize,
        visited: &mut HashSet<usize>,
        rec_stack: &mut HashSet<usize>,
        cycle: &mut Vec<usize>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);

        for &to in &self.edges[node] {
            if !visited.contains(&to) {
                if self.dfs_cycle_detect(to, visited, rec_stack, cycle) {
                    cycle.push(node);
                    return true;
                }
            } else if rec_stack.contains(&to) {
                cycle.push(to);
                cycle.push(node);
                return true;
            }
        }

        rec_stack.remove(&node);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order() {
        // 0 requires 1 requires 2
        let mut graph = JobGraph::new(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);

        assert_eq!(graph.install_order(), vec![vec![2], vec![1], vec![0]]);
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn test_cycle_collapses_into_first_group() {
        // 0 <-> 1, 2 requires 0, 1 requires 3
        let mut graph = JobGraph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);
        graph.add_edge(2, 0);
        graph.add_edge(1, 3);

        let order = graph.install_order();
        assert_eq!(order[0], vec![0, 1, 3]);
        assert_eq!(order[1], vec![2]);

        let cycle = graph.detect_cycle().unwrap();
        assert!(cycle.contains(&0) && cycle.contains(&1));
    }

    #[test]
    fn test_self_edges_ignored() {
        let mut graph = JobGraph::new(1);
        graph.add_edge(0, 0);
        assert_eq!(graph.install_order(), vec![vec![0]]);
    }
}
