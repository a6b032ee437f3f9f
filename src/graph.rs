//! Graph-node ledger for visualization and export.
//!
//! When a context is created with graph tracking enabled, every layer
//! appends exactly one node record on its first forward call - an edge
//! from the layer that produced its input to itself. Later forward calls
//! never touch the ledger. The recorded graph can be rendered as DOT or
//! exported as JSON.

use crate::tensor::{Tensor, TensorId};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

/// One layer's entry in the recorded graph.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    /// The layer name.
    pub layer: String,
    /// Shape of the input seen on the first forward call.
    pub input_shape: Vec<usize>,
    /// Shape of the produced output.
    pub output_shape: Vec<usize>,
}

/// Records the producer/consumer structure of a network as it runs.
#[derive(Debug, Default)]
pub struct GraphRecorder {
    graph: DiGraph<NodeRecord, ()>,
    /// Maps a tensor identity to the node that produced it.
    producers: HashMap<TensorId, NodeIndex>,
}

impl GraphRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one node for a layer and, when the input was produced by
    /// an already-recorded layer, the connecting edge.
    ///
    /// A record whose output tensor is already claimed is skipped: that
    /// happens when a composite module finishes a forward pass whose
    /// final tensor was produced (and recorded) by its last child.
    pub(crate) fn record(&mut self, input: &Tensor, output: &Tensor, record: NodeRecord) {
        if self.producers.contains_key(&output.id()) {
            return;
        }
        let idx = self.graph.add_node(record);
        if let Some(&producer) = self.producers.get(&input.id()) {
            self.graph.add_edge(producer, idx, ());
        }
        self.producers.insert(output.id(), idx);
    }

    /// Number of recorded layers.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph.node_indices().map(move |i| &self.graph[i])
    }

    /// Renders the ledger in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph network {\n");
        for idx in self.graph.node_indices() {
            let record = &self.graph[idx];
            let _ = writeln!(
                out,
                "    n{} [label=\"{}\\n{:?} -> {:?}\"];",
                idx.index(),
                record.layer,
                record.input_shape,
                record.output_shape
            );
        }
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                let _ = writeln!(out, "    n{} -> n{};", a.index(), b.index());
            }
        }
        out.push_str("}\n");
        out
    }

    /// Exports the ledger as JSON: a node list plus index-pair edges.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            nodes: Vec<&'a NodeRecord>,
            edges: Vec<(usize, usize)>,
        }

        let nodes = self.graph.node_indices().map(|i| &self.graph[i]).collect();
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (a.index(), b.index()))
            .collect();
        serde_json::to_string_pretty(&Export { nodes, edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_for(layer: &str) -> NodeRecord {
        NodeRecord {
            layer: layer.to_string(),
            input_shape: vec![4, 8],
            output_shape: vec![4, 16],
        }
    }

    #[test]
    fn test_chain_of_two_layers_gets_one_edge() {
        let mut recorder = GraphRecorder::new();
        let input = Tensor::zeros(&[4, 8]);
        let hidden = Tensor::zeros(&[4, 16]);
        let output = Tensor::zeros(&[4, 16]);

        recorder.record(&input, &hidden, record_for("fc1"));
        recorder.record(&hidden, &output, record_for("fc2"));

        assert_eq!(recorder.len(), 2);
        let dot = recorder.to_dot();
        assert!(dot.contains("fc1"));
        assert!(dot.contains("n0 -> n1;"));
    }

    #[test]
    fn test_claimed_output_is_not_rerecorded() {
        let mut recorder = GraphRecorder::new();
        let input = Tensor::zeros(&[4, 8]);
        let output = Tensor::zeros(&[4, 16]);

        recorder.record(&input, &output, record_for("fc1"));
        // A composite wrapping fc1 reports the same output tensor.
        recorder.record(&input, &output, record_for("wrapper"));

        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_json_export_lists_nodes_and_edges() {
        let mut recorder = GraphRecorder::new();
        let input = Tensor::zeros(&[4, 8]);
        let output = Tensor::zeros(&[4, 16]);
        recorder.record(&input, &output, record_for("fc1"));

        let json = recorder.to_json().unwrap();
        assert!(json.contains("\"fc1\""));
        assert!(json.contains("\"edges\""));
    }
}
