//! Block Layout
//!
//! Arranges the nodes of a graph into numbered blocks for a front end:
//! rows by depth, and within a row in traversal order. Block indices are
//! what fetch requests carry.

use serde::Serialize;

use super::dag::Graph;
use super::depth::DepthTable;
use super::node::NodeId;

/// Whether a block takes user input or shows a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Input,
    Output,
}

/// One displayable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub index: usize,
    pub node: NodeId,
    pub label: String,
    pub depth: usize,
    pub kind: BlockKind,
}

/// Depth-ordered blocks for every node of a graph.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    blocks: Vec<Block>,
    rows: Vec<Vec<usize>>,
}

impl Layout {
    /// Build the layout from a resolved depth table.
    pub fn new(graph: &Graph, depths: &DepthTable) -> Self {
        let mut blocks = Vec::with_capacity(depths.len());
        let mut rows = Vec::new();

        for (row, level) in depths.levels().into_iter().enumerate() {
            let mut indices = Vec::with_capacity(level.len());
            for id in level {
                let Some(node) = graph.node(id) else {
                    continue;
                };
                let index = blocks.len();
                blocks.push(Block {
                    index,
                    node: id,
                    label: node.label().to_owned(),
                    depth: row + 1,
                    kind: if node.is_input() {
                        BlockKind::Input
                    } else {
                        BlockKind::Output
                    },
                });
                indices.push(index);
            }
            rows.push(indices);
        }

        Self { blocks, rows }
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Find the block showing a node.
    pub fn block_for(&self, node: NodeId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.node == node)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block indices per depth row, shallowest first.
    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Blocks showing computed values.
    pub fn outputs(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{resolve_depths, GraphBuilder};

    #[test]
    fn blocks_follow_depth_rows() {
        let mut builder = GraphBuilder::new();
        let x = builder.arg(0);
        let key = builder.kwarg("key");
        let f = builder.call("f", &[x]).unwrap();
        let model = builder.call("Model", &[f]).unwrap();
        let run = builder.call("Model.run", &[model, key]).unwrap();
        let graph = builder.build(run).unwrap();
        let depths = resolve_depths(&graph).unwrap();

        let layout = Layout::new(&graph, &depths);

        assert_eq!(layout.blocks().len(), 5);
        assert_eq!(layout.rows(), &[vec![0, 1], vec![2], vec![3], vec![4]]);
        assert_eq!(layout.block(0).unwrap().node, x);
        assert_eq!(layout.block(1).unwrap().node, key);
        assert_eq!(layout.block(1).unwrap().kind, BlockKind::Input);
        assert_eq!(layout.block_for(run).unwrap().depth, 4);
        assert_eq!(layout.block_for(f).unwrap().label, "f");
        assert_eq!(
            layout.outputs().map(|b| b.node).collect::<Vec<_>>(),
            vec![f, model, run]
        );
        assert!(layout.block(5).is_none());
    }
}
