//! Visitor protocol
//!
//! [`walk`] visits a graph depth-first in child order. With
//! `follow_references` it also descends into the targets of resolved
//! identity references; a visited set keyed by [`NodeId`] keeps reference
//! cycles from looping.

use crate::error::GraphError;
use crate::graph::NodeGraph;
use crate::node::{Content, NodeId};
use crate::reference::ReferenceTarget;
use lineage_core::{NodePath, Value};
use std::collections::HashSet;

/// What to do after visiting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    SkipChildren,
    Stop,
}

/// Receives nodes during a walk
pub trait GraphVisitor {
    /// Visit one node at `path`
    fn visit(&mut self, graph: &NodeGraph, node: NodeId, path: &NodePath) -> VisitFlow;
}

impl<F> GraphVisitor for F
where
    F: FnMut(&NodeGraph, NodeId, &NodePath) -> VisitFlow,
{
    fn visit(&mut self, graph: &NodeGraph, node: NodeId, path: &NodePath) -> VisitFlow {
        self(graph, node, path)
    }
}

/// Walk options
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Descend into resolved reference targets
    pub follow_references: bool,
}

/// Depth-first walk from `root`, returning the number of nodes visited
///
/// # Errors
/// Returns `StaleNode` if `root` was destroyed
pub fn walk(
    graph: &NodeGraph,
    root: NodeId,
    visitor: &mut impl GraphVisitor,
    options: WalkOptions,
) -> Result<usize, GraphError> {
    let mut stack = vec![(root, graph.path_of(root)?)];
    let mut visited = HashSet::new();

    while let Some((node, path)) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        let Ok(n) = graph.node(node) else {
            continue;
        };

        match visitor.visit(graph, node, &path) {
            VisitFlow::Stop => break,
            VisitFlow::SkipChildren => continue,
            VisitFlow::Continue => {}
        }

        if options.follow_references {
            if let Content::Leaf(Value::Reference(id)) = n.content() {
                if let Some(target) = graph.find_object(*id) {
                    if !visited.contains(&target) {
                        stack.push((target, graph.path_of(target)?));
                    }
                }
            }
        }

        let children = n.child_ids();
        for child in children.into_iter().rev() {
            if visited.contains(&child) {
                continue;
            }
            let child_path = match graph.node(child)?.kind().item_id() {
                Some(id) => path.item(id),
                None => graph.path_of(child)?,
            };
            stack.push((child, child_path));
        }
    }

    Ok(visited.len())
}

/// Resolved targets reachable from `root` through references
///
/// # Errors
/// Returns `StaleNode` if `root` was destroyed
pub fn reachable_targets(graph: &NodeGraph, root: NodeId) -> Result<Vec<NodeId>, GraphError> {
    let mut targets = Vec::new();
    walk(
        graph,
        root,
        &mut |g: &NodeGraph, node: NodeId, _: &NodePath| {
            if let Some(reference) = g.reference(node) {
                targets.extend(reference.targets().into_iter().filter_map(|t| match t {
                    ReferenceTarget::Resolved(n) => Some(n),
                    _ => None,
                }));
            }
            VisitFlow::Continue
        },
        WalkOptions {
            follow_references: true,
        },
    )?;
    targets.sort_unstable();
    targets.dedup();
    Ok(targets)
}
