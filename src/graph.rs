//! Adjacency-list graphs over dense node ids.
//!
//! The LALR(1) builder works with several graphs whose nodes are symbols or
//! state-configs: the symbol dependency graph behind FIRST computation and
//! the immediate-predecessor, transition-predecessor, and originator graphs
//! behind lane tracing. They are all plain forward adjacency lists.

/// A directed graph stored as one edge list per node.
pub type NodeGraph = Vec<Vec<usize>>;

/// Creates a graph with `nnodes` nodes and no edges.
pub fn make_graph_with_nnodes(nnodes: usize) -> NodeGraph {
    vec![Vec::new(); nnodes]
}

/// Adds the edge `from -> to`.
pub fn add_edge(graph: &mut NodeGraph, from: usize, to: usize) {
    graph[from].push(to);
}

/// Returns the out-edges of `node`.
pub fn get_edges(graph: &NodeGraph, node: usize) -> &[usize] {
    &graph[node]
}

/// Returns the graph with every edge reversed.
pub fn make_transpose(graph: &NodeGraph) -> NodeGraph {
    let mut out = make_graph_with_nnodes(graph.len());
    for (from, edges) in graph.iter().enumerate() {
        for &to in edges {
            add_edge(&mut out, to, from);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_accumulate_per_node() {
        let mut g = make_graph_with_nnodes(3);
        add_edge(&mut g, 0, 1);
        add_edge(&mut g, 0, 2);
        add_edge(&mut g, 2, 1);
        assert_eq!(get_edges(&g, 0), &[1, 2]);
        assert_eq!(get_edges(&g, 1), &[] as &[usize]);
        assert_eq!(get_edges(&g, 2), &[1]);
    }

    #[test]
    fn transpose_reverses_edges() {
        let mut g = make_graph_with_nnodes(3);
        add_edge(&mut g, 0, 1);
        add_edge(&mut g, 0, 2);
        add_edge(&mut g, 2, 1);
        let t = make_transpose(&g);
        assert_eq!(get_edges(&t, 1), &[0, 2]);
        assert_eq!(get_edges(&t, 2), &[0]);
        assert_eq!(get_edges(&t, 0), &[] as &[usize]);
    }
}
