//! Static 3-d tree over points.
//!
//! Built once by median split, cycling the split axis with depth. Queries
//! descend into the half-space containing the query first and only cross a
//! splitting plane when it is within the search bound.

#[derive(Debug)]
struct Node {
    point: [f32; 3],
    /// Index into the slice the tree was built from.
    item: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    pub fn build(points: &[[f32; 3]]) -> Self {
        let mut items: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = build_subtree(points, &mut items, 0, &mut nodes);
        Self { nodes, root }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Visit every item whose point lies within `epsilon` of `query` on each
    /// axis independently.
    pub fn within(&self, query: [f32; 3], epsilon: f32, mut visit: impl FnMut(usize)) {
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if (0..3).all(|axis| (node.point[axis] - query[axis]).abs() <= epsilon) {
                visit(node.item);
            }

            let delta = query[node.axis] - node.point[node.axis];
            let (near, far) = if delta < 0.0 {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };
            // Pushed first so the near side is popped first.
            if delta.abs() <= epsilon {
                stack.extend(far);
            }
            stack.extend(near);
        }
    }
}

fn build_subtree(
    points: &[[f32; 3]],
    items: &mut [usize],
    depth: usize,
    nodes: &mut Vec<Node>,
) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let axis = depth % 3;
    let median = items.len() / 2;
    items.select_nth_unstable_by(median, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));

    let item = items[median];
    let index = nodes.len();
    nodes.push(Node {
        point: points[item],
        item,
        axis,
        left: None,
        right: None,
    });

    let (lower, rest) = items.split_at_mut(median);
    let left = build_subtree(points, lower, depth + 1, nodes);
    let right = build_subtree(points, &mut rest[1..], depth + 1, nodes);
    nodes[index].left = left;
    nodes[index].right = right;
    Some(index)
}
