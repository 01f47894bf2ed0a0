// kdtree.rs — 8-byte KD-tree nodes and the SAH tree builder

use bytemuck::{Pod, Zeroable};

use cubebake_common::q_shared::Vec3;

pub const KDNODE_STATE_XSPLIT: i32 = 0;
pub const KDNODE_STATE_YSPLIT: i32 = 1;
pub const KDNODE_STATE_ZSPLIT: i32 = 2;
pub const KDNODE_STATE_LEAF: i32 = 3;

const COST_OF_TRAVERSAL: f32 = 1.0;
const COST_OF_INTERSECTION: f32 = 4.0;
const NUM_SAH_BINS: usize = 32;
const MIN_TRIS_PER_LEAF: usize = 2;
const MAX_TREE_DEPTH: usize = 40;

/// KD-tree node. Internal nodes store the left child index shifted left by
/// two with the split axis in the low bits; the right child is always the
/// left child plus one. Leaves store the start of their run in the
/// triangle index list the same way and the run length in the bits of
/// `split_value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct CacheOptimizedKDNode {
    pub children: i32,
    pub split_value: f32,
}

impl CacheOptimizedKDNode {
    pub fn internal(left_child: usize, axis: usize, split: f32) -> Self {
        Self {
            children: ((left_child as i32) << 2) | axis as i32,
            split_value: split,
        }
    }

    pub fn leaf(start: usize, count: usize) -> Self {
        Self {
            children: ((start as i32) << 2) | KDNODE_STATE_LEAF,
            split_value: f32::from_bits(count as u32),
        }
    }

    #[inline]
    pub fn node_type(&self) -> i32 {
        self.children & 3
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.node_type() == KDNODE_STATE_LEAF
    }

    #[inline]
    pub fn left_child(&self) -> usize {
        (self.children >> 2) as usize
    }

    #[inline]
    pub fn right_child(&self) -> usize {
        self.left_child() + 1
    }

    #[inline]
    pub fn triangle_index_start(&self) -> usize {
        debug_assert!(self.is_leaf());
        (self.children >> 2) as usize
    }

    #[inline]
    pub fn number_of_triangles_in_leaf(&self) -> usize {
        debug_assert!(self.is_leaf());
        self.split_value.to_bits() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        mins: [f32::INFINITY; 3],
        maxs: [f32::NEG_INFINITY; 3],
    };

    pub fn grow(&mut self, mins: &Vec3, maxs: &Vec3) {
        for a in 0..3 {
            self.mins[a] = self.mins[a].min(mins[a]);
            self.maxs[a] = self.maxs[a].max(maxs[a]);
        }
    }

    pub fn surface_area(&self) -> f32 {
        let d = [
            (self.maxs[0] - self.mins[0]).max(0.0),
            (self.maxs[1] - self.mins[1]).max(0.0),
            (self.maxs[2] - self.mins[2]).max(0.0),
        ];
        2.0 * (d[0] * d[1] + d[1] * d[2] + d[2] * d[0])
    }

    fn split(&self, axis: usize, value: f32) -> (Aabb, Aabb) {
        let mut left = *self;
        let mut right = *self;
        left.maxs[axis] = value;
        right.mins[axis] = value;
        (left, right)
    }
}

/// Output of a tree build: node array (root at 0) plus the triangle index
/// list that leaves point into.
#[derive(Debug, Default)]
pub struct KdTree {
    pub nodes: Vec<CacheOptimizedKDNode>,
    pub tri_index_list: Vec<i32>,
}

struct Builder<'a> {
    bounds: &'a [(Vec3, Vec3)],
    nodes: Vec<CacheOptimizedKDNode>,
    tri_index_list: Vec<i32>,
    max_depth: usize,
}

/// Build a tree over triangles given by their bounding boxes. Triangles
/// straddling a split plane are referenced from both sides.
pub fn build_kd_tree(tri_bounds: &[(Vec3, Vec3)], world: Aabb) -> KdTree {
    let count = tri_bounds.len().max(1);
    let max_depth = (8.0 + 1.3 * (count as f32).log2()).min(MAX_TREE_DEPTH as f32) as usize;

    let mut builder = Builder {
        bounds: tri_bounds,
        nodes: vec![CacheOptimizedKDNode::default()],
        tri_index_list: Vec::with_capacity(tri_bounds.len()),
        max_depth,
    };
    let all: Vec<u32> = (0..tri_bounds.len() as u32).collect();
    builder.build_node(0, all, world, 0);

    log::debug!(
        "kd-tree: {} triangles, {} nodes, {} leaf references, depth limit {}",
        tri_bounds.len(),
        builder.nodes.len(),
        builder.tri_index_list.len(),
        max_depth
    );

    KdTree {
        nodes: builder.nodes,
        tri_index_list: builder.tri_index_list,
    }
}

impl Builder<'_> {
    fn make_leaf(&mut self, node_idx: usize, tris: &[u32]) {
        let start = self.tri_index_list.len();
        self.tri_index_list.extend(tris.iter().map(|&t| t as i32));
        self.nodes[node_idx] = CacheOptimizedKDNode::leaf(start, tris.len());
    }

    fn build_node(&mut self, node_idx: usize, tris: Vec<u32>, bounds: Aabb, depth: usize) {
        if tris.len() <= MIN_TRIS_PER_LEAF || depth >= self.max_depth {
            self.make_leaf(node_idx, &tris);
            return;
        }

        let Some((axis, split)) = self.find_split(&tris, &bounds) else {
            self.make_leaf(node_idx, &tris);
            return;
        };

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &t in &tris {
            let (mins, maxs) = &self.bounds[t as usize];
            // planar triangles lying on the split go left
            if mins[axis] < split || (mins[axis] == split && maxs[axis] == split) {
                left.push(t);
            }
            if maxs[axis] > split {
                right.push(t);
            }
        }

        if left.len() == tris.len() && right.len() == tris.len() {
            self.make_leaf(node_idx, &tris);
            return;
        }

        let left_idx = self.nodes.len();
        self.nodes.push(CacheOptimizedKDNode::default());
        self.nodes.push(CacheOptimizedKDNode::default());
        self.nodes[node_idx] = CacheOptimizedKDNode::internal(left_idx, axis, split);

        let (left_bounds, right_bounds) = bounds.split(axis, split);
        drop(tris);
        self.build_node(left_idx, left, left_bounds, depth + 1);
        self.build_node(left_idx + 1, right, right_bounds, depth + 1);
    }

    /// Binned surface-area heuristic. Returns None when no split beats a leaf.
    fn find_split(&self, tris: &[u32], bounds: &Aabb) -> Option<(usize, f32)> {
        let parent_area = bounds.surface_area();
        if parent_area <= 0.0 {
            return None;
        }
        let leaf_cost = COST_OF_INTERSECTION * tris.len() as f32;
        let mut best: Option<(usize, f32, f32)> = None;

        for axis in 0..3 {
            let lo = bounds.mins[axis];
            let hi = bounds.maxs[axis];
            let extent = hi - lo;
            if extent <= 0.0 {
                continue;
            }

            // count triangle starts and ends per bin
            let mut starts = [0usize; NUM_SAH_BINS];
            let mut ends = [0usize; NUM_SAH_BINS];
            let bin_of = |v: f32| -> usize {
                (((v - lo) / extent * NUM_SAH_BINS as f32) as isize).clamp(0, NUM_SAH_BINS as isize - 1) as usize
            };
            for &t in tris {
                let (mins, maxs) = &self.bounds[t as usize];
                starts[bin_of(mins[axis])] += 1;
                ends[bin_of(maxs[axis])] += 1;
            }

            let mut n_left = 0usize;
            let mut n_ended = 0usize;
            for b in 1..NUM_SAH_BINS {
                n_left += starts[b - 1];
                n_ended += ends[b - 1];
                let n_right = tris.len() - n_ended;
                let split = lo + extent * b as f32 / NUM_SAH_BINS as f32;
                let (lb, rb) = bounds.split(axis, split);
                let cost = COST_OF_TRAVERSAL
                    + COST_OF_INTERSECTION
                        * (lb.surface_area() / parent_area * n_left as f32
                            + rb.surface_area() / parent_area * n_right as f32);
                if best.map_or(true, |(_, _, c)| cost < c) {
                    best = Some((axis, split, cost));
                }
            }
        }

        match best {
            Some((axis, split, cost)) if cost < leaf_cost => Some((axis, split)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<CacheOptimizedKDNode>(), 8);
    }

    #[test]
    fn test_node_encoding() {
        let n = CacheOptimizedKDNode::internal(10, 2, 5.5);
        assert_eq!(n.node_type(), KDNODE_STATE_ZSPLIT);
        assert_eq!(n.left_child(), 10);
        assert_eq!(n.right_child(), 11);
        assert_eq!(n.split_value, 5.5);

        let l = CacheOptimizedKDNode::leaf(123, 4);
        assert!(l.is_leaf());
        assert_eq!(l.triangle_index_start(), 123);
        assert_eq!(l.number_of_triangles_in_leaf(), 4);
    }

    fn grid_bounds(n: usize) -> Vec<(Vec3, Vec3)> {
        (0..n)
            .map(|i| {
                let x = (i % 10) as f32 * 10.0;
                let y = (i / 10) as f32 * 10.0;
                ([x, y, 0.0], [x + 5.0, y + 5.0, 1.0])
            })
            .collect()
    }

    fn check_invariants(tree: &KdTree, num_tris: usize) {
        let mut referenced = vec![false; num_tris];
        for node in &tree.nodes {
            if node.is_leaf() {
                let start = node.triangle_index_start();
                let end = start + node.number_of_triangles_in_leaf();
                assert!(end <= tree.tri_index_list.len());
                for &t in &tree.tri_index_list[start..end] {
                    referenced[t as usize] = true;
                }
            } else {
                assert!(node.right_child() < tree.nodes.len());
                assert_eq!(node.right_child(), node.left_child() + 1);
            }
        }
        assert!(referenced.iter().all(|&r| r), "every triangle reachable");
    }

    #[test]
    fn test_build_grid() {
        let bounds = grid_bounds(100);
        let mut world = Aabb::EMPTY;
        for (mins, maxs) in &bounds {
            world.grow(mins, maxs);
        }
        let tree = build_kd_tree(&bounds, world);
        assert!(tree.nodes.len() > 1);
        assert!(!tree.nodes[0].is_leaf());
        check_invariants(&tree, 100);
    }

    #[test]
    fn test_build_small_is_leaf() {
        let bounds = grid_bounds(2);
        let mut world = Aabb::EMPTY;
        for (mins, maxs) in &bounds {
            world.grow(mins, maxs);
        }
        let tree = build_kd_tree(&bounds, world);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].number_of_triangles_in_leaf(), 2);
    }

    #[test]
    fn test_build_empty() {
        let tree = build_kd_tree(&[], Aabb { mins: [0.0; 3], maxs: [0.0; 3] });
        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].is_leaf());
        assert_eq!(tree.nodes[0].number_of_triangles_in_leaf(), 0);
    }

    #[test]
    fn test_build_overlapping_stack_terminates() {
        // many identical triangles cannot be separated
        let bounds = vec![([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]); 64];
        let tree = build_kd_tree(&bounds, Aabb { mins: [0.0; 3], maxs: [1.0; 3] });
        check_invariants(&tree, 64);
    }
}
