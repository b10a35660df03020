//! A dynamic AABB tree for incremental broad-phase queries.
//!
//! Leaves hold fattened proxy boxes so small movements do not force a
//! reinsert every step. Nodes live in a flat vector with an intrusive free
//! list; proxy ids are indices into that vector and stay stable for the
//! lifetime of the proxy.

use glam::Vec2;

use crate::collision::{Aabb, RayCastInput};
use crate::common::math::cross_sv;
use crate::common::settings::{AABB_EXTENSION, AABB_MULTIPLIER};

pub const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct TreeNode<T> {
    aabb: Aabb,
    user_data: Option<T>,
    /// Parent when allocated, next free index when on the free list.
    parent: usize,
    child1: usize,
    child2: usize,
}

impl<T> TreeNode<T> {
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// The tree itself. `T` is the per-proxy user data returned by queries.
#[derive(Debug)]
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: usize,
    free_list: usize,
    /// Path bits used to pick leaves for incremental rebalancing.
    path: u32,
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        DynamicTree {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
            path: 0,
        }
    }

    /// Create a proxy for a tight-fitting box. The stored box is fattened
    /// by [`AABB_EXTENSION`] on all sides.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> usize {
        let proxy_id = self.allocate_node();
        let r = Vec2::splat(AABB_EXTENSION);
        self.nodes[proxy_id].aabb = Aabb::new(aabb.lower - r, aabb.upper + r);
        self.nodes[proxy_id].user_data = Some(user_data);
        self.insert_leaf(proxy_id);
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Update a proxy after movement. Returns false when the fattened box
    /// still contains the new tight box and no reinsert was needed.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: &Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.nodes[proxy_id].is_leaf());

        if self.nodes[proxy_id].aabb.contains(aabb) {
            return false;
        }

        self.remove_leaf(proxy_id);

        // Fatten, then extend along the direction of travel so fast proxies
        // get a box that covers where they are heading.
        let r = Vec2::splat(AABB_EXTENSION);
        let mut b = Aabb::new(aabb.lower - r, aabb.upper + r);
        let d = AABB_MULTIPLIER * displacement;
        if d.x < 0.0 {
            b.lower.x += d.x;
        } else {
            b.upper.x += d.x;
        }
        if d.y < 0.0 {
            b.lower.y += d.y;
        } else {
            b.upper.y += d.y;
        }
        self.nodes[proxy_id].aabb = b;

        self.insert_leaf(proxy_id);
        true
    }

    pub fn user_data(&self, proxy_id: usize) -> T {
        self.nodes[proxy_id]
            .user_data
            .expect("proxy has no user data")
    }

    /// The fattened box stored in the tree, not the tight shape box.
    pub fn fat_aabb(&self, proxy_id: usize) -> &Aabb {
        &self.nodes[proxy_id].aabb
    }

    /// Visit every proxy whose fat box overlaps `aabb`. The callback
    /// returns false to stop early.
    pub fn query<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(usize) -> bool,
    {
        let mut stack = Vec::with_capacity(32);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Ray cast against the proxies. The callback receives the clipped
    /// input and a proxy id, and returns a new max fraction: 0 to stop,
    /// the input fraction to continue unclipped, or a smaller value to
    /// shorten the ray.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mut callback: F)
    where
        F: FnMut(&RayCastInput, usize) -> f32,
    {
        let p1 = input.p1;
        let p2 = input.p2;
        // A zero-length segment has no direction to cast along.
        if (p2 - p1).length_squared() < f32::EPSILON {
            return;
        }
        let r = (p2 - p1).normalize();

        // Separating-axis direction perpendicular to the segment.
        let v = cross_sv(1.0, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;

        let t = p1 + max_fraction * (p2 - p1);
        let mut segment_aabb = Aabb::new(p1.min(t), p1.max(t));

        let mut stack = Vec::with_capacity(32);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            // Separation of the box from the ray line.
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };
                let value = callback(&sub_input, node_id);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 {
                    max_fraction = value;
                    let t = p1 + max_fraction * (p2 - p1);
                    segment_aabb = Aabb::new(p1.min(t), p1.max(t));
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Remove and reinsert a handful of leaves, walking a different
    /// root-to-leaf path each call.
    pub fn rebalance(&mut self, iterations: usize) {
        if self.root == NULL_NODE {
            return;
        }

        for _ in 0..iterations {
            let mut node = self.root;
            let mut bit = 0;
            while !self.nodes[node].is_leaf() {
                node = if self.path >> bit & 1 == 1 {
                    self.nodes[node].child2
                } else {
                    self.nodes[node].child1
                };
                bit = (bit + 1) & 31;
            }
            self.path = self.path.wrapping_add(1);

            self.remove_leaf(node);
            self.insert_leaf(node);
        }
    }

    fn allocate_node(&mut self) -> usize {
        if self.free_list != NULL_NODE {
            let node_id = self.free_list;
            self.free_list = self.nodes[node_id].parent;
            let node = &mut self.nodes[node_id];
            node.parent = NULL_NODE;
            node.child1 = NULL_NODE;
            node.child2 = NULL_NODE;
            node.user_data = None;
            node_id
        } else {
            self.nodes.push(TreeNode {
                aabb: Aabb::default(),
                user_data: None,
                parent: NULL_NODE,
                child1: NULL_NODE,
                child2: NULL_NODE,
            });
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, node_id: usize) {
        self.nodes[node_id].parent = self.free_list;
        self.nodes[node_id].user_data = None;
        self.free_list = node_id;
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Descend toward the sibling whose center is nearest the new leaf.
        let center = self.nodes[leaf].aabb.center();
        let mut sibling = self.root;
        while !self.nodes[sibling].is_leaf() {
            let child1 = self.nodes[sibling].child1;
            let child2 = self.nodes[sibling].child2;

            let d1 = self.nodes[child1].aabb.center() - center;
            let d2 = self.nodes[child2].aabb.center() - center;
            let norm1 = d1.x.abs() + d1.y.abs();
            let norm2 = d2.x.abs() + d2.y.abs();

            sibling = if norm1 < norm2 { child1 } else { child2 };
        }

        // Splice a fresh parent in above the sibling.
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].aabb =
            Aabb::combine(&self.nodes[leaf].aabb, &self.nodes[sibling].aabb);

        if old_parent != NULL_NODE {
            if self.nodes[old_parent].child1 == sibling {
                self.nodes[old_parent].child1 = new_parent;
            } else {
                self.nodes[old_parent].child2 = new_parent;
            }
        } else {
            self.root = new_parent;
        }

        self.nodes[new_parent].child1 = sibling;
        self.nodes[new_parent].child2 = leaf;
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        // Refit ancestors until one already contains the grown box.
        let mut node2 = new_parent;
        let mut node1 = self.nodes[node2].parent;
        while node1 != NULL_NODE {
            if self.nodes[node1].aabb.contains(&self.nodes[node2].aabb) {
                break;
            }
            let child1 = self.nodes[node1].child1;
            let child2 = self.nodes[node1].child2;
            self.nodes[node1].aabb =
                Aabb::combine(&self.nodes[child1].aabb, &self.nodes[child2].aabb);
            node2 = node1;
            node1 = self.nodes[node1].parent;
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let node2 = self.nodes[leaf].parent;
        let node1 = self.nodes[node2].parent;
        let sibling = if self.nodes[node2].child1 == leaf {
            self.nodes[node2].child2
        } else {
            self.nodes[node2].child1
        };

        if node1 != NULL_NODE {
            // Replace node2 with its surviving child.
            if self.nodes[node1].child1 == node2 {
                self.nodes[node1].child1 = sibling;
            } else {
                self.nodes[node1].child2 = sibling;
            }
            self.nodes[sibling].parent = node1;
            self.free_node(node2);

            // Tighten ancestor boxes until one stops shrinking.
            let mut node1 = node1;
            while node1 != NULL_NODE {
                let old_aabb = self.nodes[node1].aabb;
                let child1 = self.nodes[node1].child1;
                let child2 = self.nodes[node1].child2;
                self.nodes[node1].aabb =
                    Aabb::combine(&self.nodes[child1].aabb, &self.nodes[child2].aabb);
                if old_aabb.contains(&self.nodes[node1].aabb) {
                    break;
                }
                node1 = self.nodes[node1].parent;
            }
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(node2);
        }
    }

    #[cfg(test)]
    fn validate_node(&self, node_id: usize) {
        if node_id == NULL_NODE {
            return;
        }
        let node = &self.nodes[node_id];
        if node.is_leaf() {
            return;
        }
        let combined = Aabb::combine(
            &self.nodes[node.child1].aabb,
            &self.nodes[node.child2].aabb,
        );
        assert!(node.aabb.contains(&combined));
        assert_eq!(self.nodes[node.child1].parent, node_id);
        assert_eq!(self.nodes[node.child2].parent, node_id);
        self.validate_node(node.child1);
        self.validate_node(node.child2);
    }

    /// Internal consistency check used by tests.
    #[cfg(test)]
    pub fn validate(&self) {
        self.validate_node(self.root);
    }
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(lx: f32, ly: f32, ux: f32, uy: f32) -> Aabb {
        Aabb::new(Vec2::new(lx, ly), Vec2::new(ux, uy))
    }

    #[test]
    fn query_finds_overlapping_proxies() {
        let mut tree = DynamicTree::new();
        let a = tree.create_proxy(&aabb(0.0, 0.0, 1.0, 1.0), 'a');
        let _b = tree.create_proxy(&aabb(10.0, 10.0, 11.0, 11.0), 'b');
        let c = tree.create_proxy(&aabb(0.5, 0.5, 1.5, 1.5), 'c');

        let mut hits = Vec::new();
        tree.query(&aabb(0.0, 0.0, 2.0, 2.0), |proxy| {
            hits.push(tree.user_data(proxy));
            true
        });
        hits.sort();
        assert_eq!(hits, vec!['a', 'c']);
        let _ = (a, c);
        tree.validate();
    }

    #[test]
    fn small_moves_stay_inside_fat_aabb() {
        let mut tree = DynamicTree::new();
        let id = tree.create_proxy(&aabb(0.0, 0.0, 1.0, 1.0), 0u32);

        // Within the fattened margin.
        assert!(!tree.move_proxy(id, &aabb(0.05, 0.0, 1.05, 1.0), Vec2::new(0.05, 0.0)));
        // Far outside it.
        assert!(tree.move_proxy(id, &aabb(5.0, 5.0, 6.0, 6.0), Vec2::new(5.0, 5.0)));
        tree.validate();
    }

    #[test]
    fn destroy_then_reuse_slots() {
        let mut tree = DynamicTree::new();
        let ids: Vec<_> = (0..8)
            .map(|i| {
                let x = i as f32 * 3.0;
                tree.create_proxy(&aabb(x, 0.0, x + 1.0, 1.0), i)
            })
            .collect();
        for id in &ids[..4] {
            tree.destroy_proxy(*id);
        }
        tree.validate();

        let mut count = 0;
        tree.query(&aabb(-100.0, -100.0, 100.0, 100.0), |_| {
            count += 1;
            true
        });
        assert_eq!(count, 4);
    }

    #[test]
    fn ray_cast_hits_nearest_first_by_clipping() {
        let mut tree = DynamicTree::new();
        let near = tree.create_proxy(&aabb(2.0, -0.5, 3.0, 0.5), "near");
        let far = tree.create_proxy(&aabb(6.0, -0.5, 7.0, 0.5), "far");
        let _ = (near, far);

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };

        let mut visited = Vec::new();
        tree.ray_cast(&input, |sub, proxy| {
            visited.push(tree.user_data(proxy));
            // Clip the ray at each box's entry so later boxes get pruned.
            let hit = tree.fat_aabb(proxy).ray_cast(sub).unwrap();
            hit.fraction
        });

        assert!(visited.contains(&"near"));
    }

    #[test]
    fn zero_length_ray_reports_nothing() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(&aabb(-1.0, -1.0, 1.0, 1.0), "box");

        let input = RayCastInput {
            p1: Vec2::new(0.5, 0.0),
            p2: Vec2::new(0.5, 0.0),
            max_fraction: 1.0,
        };

        let mut visited = 0;
        tree.ray_cast(&input, |sub, _| {
            visited += 1;
            sub.max_fraction
        });
        assert_eq!(visited, 0);
    }

    #[test]
    fn rebalance_preserves_contents() {
        let mut tree = DynamicTree::new();
        for i in 0..16 {
            let x = i as f32;
            tree.create_proxy(&aabb(x, 0.0, x + 0.5, 0.5), i);
        }
        tree.rebalance(8);
        tree.validate();

        let mut count = 0;
        tree.query(&aabb(-1.0, -1.0, 20.0, 1.0), |_| {
            count += 1;
            true
        });
        assert_eq!(count, 16);
    }
}
