//! Strongly connected components and dependency ordering
//!
//! Tarjan's algorithm over an explicit stack, so deep module graphs cannot
//! overflow the call stack. Nodes are interned in discovery order and every
//! traversal follows input order, which makes the output reproducible for a
//! given input iteration order.

use indexmap::IndexSet;
use std::hash::Hash;

/// Strongly connected components of the graph reachable from a root set
#[derive(Debug, Clone)]
pub struct Components<N> {
    nodes: IndexSet<N>,
    edges: Vec<Vec<usize>>,
    /// Components in completion order: every component after those it depends on
    components: Vec<Vec<usize>>,
    component_of: Vec<usize>,
    roots: Vec<usize>,
}

struct Frame {
    node: usize,
    /// Edges of `node` still to visit, consumed from the back
    remaining: usize,
}

impl<N: Clone + Eq + Hash> Components<N> {
    /// Compute the components reachable from `roots`
    ///
    /// `dependencies` is called once per reachable node.
    pub fn compute<R, F, D>(roots: R, mut dependencies: F) -> Self
    where
        R: IntoIterator<Item = N>,
        F: FnMut(&N) -> D,
        D: IntoIterator<Item = N>,
    {
        let mut nodes: IndexSet<N> = IndexSet::new();
        let mut root_ids = Vec::new();
        for root in roots {
            let (id, _) = nodes.insert_full(root);
            if !root_ids.contains(&id) {
                root_ids.push(id);
            }
        }

        let mut edges: Vec<Vec<usize>> = Vec::new();
        let mut index: Vec<Option<usize>> = Vec::new();
        let mut lowlink: Vec<usize> = Vec::new();
        let mut on_stack: Vec<bool> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut counter = 0usize;

        let grow = |len: usize,
                    edges: &mut Vec<Vec<usize>>,
                    index: &mut Vec<Option<usize>>,
                    lowlink: &mut Vec<usize>,
                    on_stack: &mut Vec<bool>| {
            edges.resize_with(len, Vec::new);
            index.resize(len, None);
            lowlink.resize(len, 0);
            on_stack.resize(len, false);
        };
        grow(nodes.len(), &mut edges, &mut index, &mut lowlink, &mut on_stack);

        // Later roots are visited first so that, once completion order is
        // reversed, earlier roots come first.
        for &root in root_ids.iter().rev() {
            if index[root].is_some() {
                continue;
            }

            let mut calls: Vec<Frame> = Vec::new();
            let mut enter = |v: usize,
                             nodes: &mut IndexSet<N>,
                             edges: &mut Vec<Vec<usize>>,
                             index: &mut Vec<Option<usize>>,
                             lowlink: &mut Vec<usize>,
                             on_stack: &mut Vec<bool>,
                             stack: &mut Vec<usize>,
                             counter: &mut usize|
             -> Frame {
                index[v] = Some(*counter);
                lowlink[v] = *counter;
                *counter += 1;
                stack.push(v);
                on_stack[v] = true;

                let node = nodes[v].clone();
                let mut out = Vec::new();
                for dep in dependencies(&node) {
                    let (id, _) = nodes.insert_full(dep);
                    if !out.contains(&id) {
                        out.push(id);
                    }
                }
                grow(nodes.len(), edges, index, lowlink, on_stack);
                let remaining = out.len();
                edges[v] = out;
                Frame { node: v, remaining }
            };

            let frame = enter(
                root,
                &mut nodes,
                &mut edges,
                &mut index,
                &mut lowlink,
                &mut on_stack,
                &mut stack,
                &mut counter,
            );
            calls.push(frame);

            while let Some(top) = calls.last_mut() {
                let v = top.node;
                if top.remaining > 0 {
                    top.remaining -= 1;
                    let w = edges[v][top.remaining];
                    match index[w] {
                        None => {
                            let frame = enter(
                                w,
                                &mut nodes,
                                &mut edges,
                                &mut index,
                                &mut lowlink,
                                &mut on_stack,
                                &mut stack,
                                &mut counter,
                            );
                            calls.push(frame);
                        }
                        Some(w_index) if on_stack[w] => {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if let Some(parent) = calls.last() {
                    lowlink[parent.node] = lowlink[parent.node].min(lowlink[v]);
                }
                if Some(lowlink[v]) == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }

        let mut component_of = vec![0; nodes.len()];
        for (c, members) in components.iter().enumerate() {
            for &m in members {
                component_of[m] = c;
            }
        }

        Components {
            nodes,
            edges,
            components,
            component_of,
            roots: root_ids,
        }
    }

    /// Every reachable node, in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    /// Components in completion order, dependencies before dependents
    pub fn components(&self) -> Vec<Vec<&N>> {
        self.components
            .iter()
            .map(|members| members.iter().map(|&m| &self.nodes[m]).collect())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Index of the component holding `node`
    pub fn component_of(&self, node: &N) -> Option<usize> {
        self.nodes.get_index_of(node).map(|i| self.component_of[i])
    }

    /// Members of a component
    pub fn members(&self, component: usize) -> Vec<&N> {
        self.components
            .get(component)
            .map(|members| members.iter().map(|&m| &self.nodes[m]).collect())
            .unwrap_or_default()
    }

    /// Components the given component has edges to, excluding itself
    pub fn successors(&self, component: usize) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for &m in self.components.get(component).into_iter().flatten() {
            for &w in &self.edges[m] {
                let c = self.component_of[w];
                if c != component && !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Whether some component holds more than one node or a self edge
    pub fn has_cycles(&self) -> bool {
        self.components.iter().any(|members| {
            members.len() > 1 || members.iter().any(|&m| self.edges[m].contains(&m))
        })
    }

    /// Nodes ordered dependents first, each cycle listed once as a unit
    ///
    /// For an edge `a -> b` across components, `a` precedes `b`. On an
    /// acyclic graph this is a topological order.
    pub fn list(&self) -> Vec<&N> {
        self.components
            .iter()
            .rev()
            .flat_map(|members| members.iter().map(|&m| &self.nodes[m]))
            .collect()
    }

    /// Root nodes, deduplicated, in input order
    pub fn roots(&self) -> Vec<&N> {
        self.roots.iter().map(|&r| &self.nodes[r]).collect()
    }
}

/// Order the graph reachable from `roots`, dependents first
pub fn list<N, R, F, D>(roots: R, dependencies: F) -> Vec<N>
where
    N: Clone + Eq + Hash,
    R: IntoIterator<Item = N>,
    F: FnMut(&N) -> D,
    D: IntoIterator<Item = N>,
{
    Components::compute(roots, dependencies)
        .list()
        .into_iter()
        .cloned()
        .collect()
}
