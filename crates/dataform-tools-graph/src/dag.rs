//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency edges between compiled actions for
//! the dependency panel and impact analysis.

use std::collections::{HashMap, HashSet, VecDeque};
use dataform_tools_core::{
    ActionKind, CompiledGraph, Direction, LegendEntry, Target, TreeData, TreeNode,
};

/// Node identifier (`database.schema.name` of the target)
pub type NodeId = String;

/// Legend labels, indexed by type index
const LEGEND: [&str; 8] = [
    "Generated/Pipeline",
    "Table",
    "View",
    "Test",
    "Incremental",
    "Assertion",
    "Operations",
    "Declaration",
];

/// An action, or a dependency target that no action produces
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: NodeId,
    pub target: Target,

    /// Source file, empty for missing nodes
    pub file_name: String,

    pub kind: ActionKind,
    pub tags: Vec<String>,

    /// Referenced as a dependency but not defined in the project
    pub missing: bool,
}

impl GraphNode {
    /// Index into the panel legend; 0 for missing and generated nodes
    pub fn type_index(&self) -> u8 {
        if self.missing {
            return 0;
        }
        match self.kind {
            ActionKind::Table => 1,
            ActionKind::View => 2,
            ActionKind::Test => 3,
            ActionKind::Incremental => 4,
            ActionKind::Assertion => 5,
            ActionKind::Operations => 6,
            ActionKind::Declaration => 7,
            ActionKind::Other => 0,
        }
    }
}

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes in compiled order, missing nodes after the action that first
    /// referenced them
    nodes: Vec<GraphNode>,

    index: HashMap<NodeId, usize>,

    /// Forward edges: node -> nodes it depends on
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Reverse edges: node -> nodes that depend on it
    children: HashMap<NodeId, Vec<NodeId>>,
}

fn node_key(target: &Target) -> NodeId {
    target.fqn()
}

fn push_unique(edges: &mut HashMap<NodeId, Vec<NodeId>>, from: &str, to: &str) {
    let list = edges.entry(from.to_string()).or_default();
    if !list.iter().any(|n| n == to) {
        list.push(to.to_string());
    }
}

impl DependencyGraph {
    /// Build a dependency graph from compiled actions
    pub fn from_compiled(compiled: &CompiledGraph) -> Self {
        let mut graph = Self::default();

        // First pass: one node per action target
        for action in compiled.actions() {
            let id = node_key(&action.target);
            if graph.index.contains_key(&id) {
                continue;
            }
            graph.insert(GraphNode {
                id,
                target: action.target.clone(),
                file_name: action.file_name.clone().unwrap_or_default(),
                kind: action.kind,
                tags: action.tags.clone(),
                missing: false,
            });
        }

        // Second pass: edges, adding targets nobody defines
        for action in compiled.actions() {
            let id = node_key(&action.target);
            for dep in &action.dependency_targets {
                let dep_id = node_key(dep);
                if !graph.index.contains_key(&dep_id) {
                    graph.insert(GraphNode {
                        id: dep_id.clone(),
                        target: dep.clone(),
                        file_name: String::new(),
                        kind: ActionKind::Other,
                        tags: Vec::new(),
                        missing: true,
                    });
                }

                push_unique(&mut graph.parents, &id, &dep_id);
                push_unique(&mut graph.children, &dep_id, &id);
            }
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            missing = graph.missing_nodes().count(),
            "built dependency graph"
        );
        graph
    }

    fn insert(&mut self, node: GraphNode) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// All nodes in graph order
    pub fn all_nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// Dependency targets no action defines
    pub fn missing_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.missing)
    }

    /// Get all downstream nodes (transitive closure of children)
    ///
    /// Everything that has to be rebuilt when this node changes.
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.children, node_id)
    }

    /// Get all upstream nodes (transitive closure of parents)
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.parents, node_id)
    }

    /// Breadth-first walk over `edges` starting from the neighbours of `start`
    fn closure(edges: &HashMap<NodeId, Vec<NodeId>>, start: &str) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&NodeId> = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = edges.get(start) {
            queue.extend(next.iter());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current.clone());

            if let Some(next) = edges.get(current) {
                queue.extend(next.iter().filter(|n| !visited.contains(n)));
            }
        }

        result
    }

    /// Run order: every node comes after its dependencies. `None` when the
    /// graph has a cycle.
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), self.parents.get(&n.id).map_or(0, Vec::len)))
            .collect();

        // Kahn's algorithm, seeded in graph order
        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());

            for child in self.children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Fixed legend shared by every tree payload
    pub fn legend() -> Vec<LegendEntry> {
        LEGEND
            .iter()
            .enumerate()
            .map(|(idx, label)| LegendEntry {
                schema: label.to_string(),
                schema_idx: idx as u8,
            })
            .collect()
    }

    fn tree_node(&self, node: &GraphNode, direction: Direction) -> TreeNode {
        let edges = match direction {
            Direction::Upstream => &self.parents,
            Direction::Downstream => &self.children,
        };

        TreeNode {
            name: node.id.clone(),
            file_name: node.file_name.clone(),
            schema: node.target.schema.clone().unwrap_or_default(),
            schema_idx: node.type_index(),
            tags: node.tags.clone(),
            deps: edges.get(&node.id).filter(|deps| !deps.is_empty()).cloned(),
        }
    }

    /// Tree payload over the whole graph. `_deps` lists dependencies for
    /// upstream trees and dependents for downstream trees.
    pub fn metadata(&self, direction: Direction) -> TreeData {
        TreeData {
            dataform_tree_metadata: self.nodes.iter().map(|n| self.tree_node(n, direction)).collect(),
            declarations_legend_metadata: Self::legend(),
            tree_root: None,
            direction,
        }
    }

    /// Tree payload restricted to `root` and its transitive dependencies
    /// (upstream) or dependents (downstream). `None` when the root is unknown.
    pub fn subtree(&self, root: &str, direction: Direction) -> Option<TreeData> {
        let root_node = self.node(root)?;

        let reachable: HashSet<NodeId> = match direction {
            Direction::Upstream => self.upstream(root),
            Direction::Downstream => self.downstream(root),
        }
        .into_iter()
        .collect();

        let nodes = self
            .nodes
            .iter()
            .filter(|n| n.id == root_node.id || reachable.contains(&n.id))
            .map(|n| self.tree_node(n, direction))
            .collect();

        Some(TreeData {
            dataform_tree_metadata: nodes,
            declarations_legend_metadata: Self::legend(),
            tree_root: Some(root_node.id.clone()),
            direction,
        })
    }
}
