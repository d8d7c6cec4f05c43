// src/tree.rs
use crate::model::{PermissionNode, RoutableNode};

/// `children` を持つ木構造
pub trait TreeNode: Sized {
    fn children(&self) -> &[Self];
}

impl TreeNode for PermissionNode {
    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl TreeNode for RoutableNode {
    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// 森を先行順 (親 → 子) で 1 列に並べる。各ノードはちょうど 1 回ずつ現れる
pub fn flatten<T: TreeNode>(forest: &[T]) -> Vec<&T> {
    let mut out = Vec::new();
    // 深い木でもスタックを使い切らないよう明示的なスタックで辿る
    let mut stack: Vec<&T> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children().iter().rev());
    }
    out
}
