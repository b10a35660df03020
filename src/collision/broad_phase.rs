//! Broad phase: pair management on top of the dynamic tree.
//!
//! Proxies that move get buffered; `update_pairs` then queries the tree
//! once per moved proxy and reports each overlapping pair exactly once per
//! call.

use glam::Vec2;

use crate::collision::dynamic_tree::DynamicTree;
use crate::collision::{Aabb, RayCastInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ProxyPair {
    a: usize,
    b: usize,
}

#[derive(Debug)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    proxy_count: usize,
    move_buffer: Vec<usize>,
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        BroadPhase {
            tree: DynamicTree::new(),
            proxy_count: 0,
            move_buffer: Vec::new(),
        }
    }

    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> usize {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.proxy_count += 1;
        self.buffer_move(proxy_id);
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        self.unbuffer_move(proxy_id);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(proxy_id);
    }

    /// Move a proxy; it only enters the move buffer when the tree actually
    /// had to reinsert it.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: &Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.buffer_move(proxy_id);
        }
    }

    /// Overlap test on the fattened boxes.
    pub fn test_overlap(&self, proxy_a: usize, proxy_b: usize) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .overlaps(self.tree.fat_aabb(proxy_b))
    }

    pub fn user_data(&self, proxy_id: usize) -> T {
        self.tree.user_data(proxy_id)
    }

    pub fn fat_aabb(&self, proxy_id: usize) -> &Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Report every new overlapping pair involving a moved proxy. Pairs are
    /// deduplicated within one call; the callback receives both proxies'
    /// user data.
    pub fn update_pairs<F>(&mut self, mut callback: F)
    where
        F: FnMut(T, T),
    {
        let move_buffer = std::mem::take(&mut self.move_buffer);
        let mut pairs: Vec<ProxyPair> = Vec::new();

        for &query_proxy in &move_buffer {
            let fat_aabb = *self.tree.fat_aabb(query_proxy);
            self.tree.query(&fat_aabb, |proxy| {
                // A proxy never pairs with itself.
                if proxy != query_proxy {
                    pairs.push(ProxyPair {
                        a: proxy.min(query_proxy),
                        b: proxy.max(query_proxy),
                    });
                }
                true
            });
        }

        // Sorting brings duplicates together when both proxies of a pair
        // moved this step.
        pairs.sort_unstable();

        let mut i = 0;
        while i < pairs.len() {
            let pair = pairs[i];
            callback(self.tree.user_data(pair.a), self.tree.user_data(pair.b));

            i += 1;
            while i < pairs.len() && pairs[i] == pair {
                i += 1;
            }
        }
    }

    pub fn query<F>(&self, aabb: &Aabb, callback: F)
    where
        F: FnMut(usize) -> bool,
    {
        self.tree.query(aabb, callback);
    }

    pub fn ray_cast<F>(&self, input: &RayCastInput, callback: F)
    where
        F: FnMut(&RayCastInput, usize) -> f32,
    {
        self.tree.ray_cast(input, callback);
    }

    pub fn rebalance(&mut self, iterations: usize) {
        self.tree.rebalance(iterations);
    }

    fn buffer_move(&mut self, proxy_id: usize) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: usize) {
        self.move_buffer.retain(|&id| id != proxy_id);
    }
}

impl<T: Copy> Default for BroadPhase<T> {
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
    fn new_proxies_report_their_pairs_once() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(&aabb(0.0, 0.0, 1.0, 1.0), 'a');
        bp.create_proxy(&aabb(0.5, 0.5, 1.5, 1.5), 'b');
        bp.create_proxy(&aabb(10.0, 10.0, 11.0, 11.0), 'c');

        let mut found = Vec::new();
        bp.update_pairs(|a, b| {
            let mut pair = [a, b];
            pair.sort();
            found.push((pair[0], pair[1]));
        });
        assert_eq!(found, vec![('a', 'b')]);

        // Nothing moved since, so no pairs are reported again.
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn moving_into_overlap_creates_a_pair() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(&aabb(0.0, 0.0, 1.0, 1.0), 'a');
        bp.create_proxy(&aabb(5.0, 0.0, 6.0, 1.0), 'b');
        bp.update_pairs(|_, _| {});

        bp.move_proxy(a, &aabb(4.5, 0.0, 5.5, 1.0), Vec2::new(4.5, 0.0));
        let mut found = Vec::new();
        bp.update_pairs(|x, y| {
            let mut pair = [x, y];
            pair.sort();
            found.push((pair[0], pair[1]));
        });
        assert_eq!(found, vec![('a', 'b')]);
    }

    #[test]
    fn destroyed_proxy_leaves_the_move_buffer() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(&aabb(0.0, 0.0, 1.0, 1.0), 'a');
        bp.create_proxy(&aabb(0.5, 0.5, 1.5, 1.5), 'b');
        bp.destroy_proxy(a);

        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(bp.proxy_count(), 1);
    }
}
