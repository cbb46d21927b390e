//! Bounding volume hierarchy over world items.
//!
//! Built once from the item bounding boxes by recursive median splits along
//! the longest axis of the box centres. Queries take a closure that performs
//! the exact per-item test, so the hierarchy only ever deals in indices and
//! boxes. The structure is immutable after construction and is shared
//! read-only by all transport workers.

use nalgebra::{Point3, Vector3};

use crate::geom::Aabb;

#[cfg(test)]
mod tests {

    use super::*;

    fn boxes() -> Vec<Aabb> {
        (0..7)
            .map(|i| {
                let x = 3.0 * i as f64;
                Aabb::from_array([x, 0.0, 0.0, x + 1.0, 1.0, 1.0])
            })
            .collect()
    }

    #[test]
    fn nearest_hit_matches_brute_force() {
        let boxes = boxes();
        let bvh = Bvh::build(&boxes);
        let pos = Point3::new(-1.0, 0.5, 0.5);
        let dir = Vector3::x();
        let hit = bvh.nearest(&pos, &dir, |i| boxes[i].ray_boundary(&pos, &dir));
        assert_eq!(hit, Some((0, 1.0)));
        let pos = Point3::new(7.5, 0.5, 0.5);
        let hit = bvh.nearest(&pos, &dir, |i| boxes[i].ray_boundary(&pos, &dir));
        assert_eq!(hit, Some((3, 1.5)));
        let back = -Vector3::x();
        let hit = bvh.nearest(&pos, &back, |i| boxes[i].ray_boundary(&pos, &back));
        assert_eq!(hit, Some((2, 0.5)));
    }

    #[test]
    fn containing_returns_lowest_index() {
        let mut boxes = boxes();
        boxes.push(Aabb::from_array([-100.0, -100.0, -100.0, 100.0, 100.0, 100.0]));
        let bvh = Bvh::build(&boxes);
        let pos = Point3::new(6.5, 0.5, 0.5);
        let found = bvh.first_containing(&pos, |i| Some(i));
        assert_eq!(found, Some(2));
        let found = bvh.first_containing(&Point3::new(50.0, 0.0, 0.0), |i| Some(i));
        assert_eq!(found, Some(7));
        assert!(bvh
            .first_containing(&Point3::new(500.0, 0.0, 0.0), |i| Some(i))
            .is_none());
    }

    #[test]
    fn rebuild_is_identical() {
        let boxes = boxes();
        assert_eq!(Bvh::build(&boxes), Bvh::build(&boxes));
        assert!(Bvh::build(&[]).is_empty());
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf { aabb: Aabb, item: usize },
    Interior { aabb: Aabb, left: usize, right: usize },
}

impl Node {
    fn aabb(&self) -> &Aabb {
        match self {
            Node::Leaf { aabb, .. } | Node::Interior { aabb, .. } => aabb,
        }
    }
}

/// Binary bounding volume hierarchy. Leaves hold one item each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl Bvh {
    pub fn build(boxes: &[Aabb]) -> Self {
        let mut bvh = Self::default();
        let mut indices: Vec<usize> = (0..boxes.len()).collect();
        if !indices.is_empty() {
            bvh.root = Some(bvh.build_node(boxes, &mut indices));
        }
        bvh
    }

    fn build_node(&mut self, boxes: &[Aabb], indices: &mut [usize]) -> usize {
        if let [item] = indices {
            self.nodes.push(Node::Leaf {
                aabb: boxes[*item],
                item: *item,
            });
            return self.nodes.len() - 1;
        }

        let aabb = indices
            .iter()
            .fold(Aabb::empty(), |acc, &i| acc.union(&boxes[i]));
        let centers = indices
            .iter()
            .fold(Aabb::empty(), |acc, &i| {
                let c = boxes[i].center();
                acc.union(&Aabb::new(c, c))
            })
            .extent();
        let axis = centers.imax();

        // ties broken by index keep the build deterministic
        indices.sort_by(|&a, &b| {
            boxes[a].center()[axis]
                .total_cmp(&boxes[b].center()[axis])
                .then(a.cmp(&b))
        });
        let (left, right) = indices.split_at_mut(indices.len() / 2);
        let left = self.build_node(boxes, left);
        let right = self.build_node(boxes, right);
        self.nodes.push(Node::Interior { aabb, left, right });
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Closest hit over all items whose boxes the ray touches. `hit(i)` returns
    /// the exact distance to item `i`. Ties go to the lower index.
    pub fn nearest<F>(&self, pos: &Point3<f64>, dir: &Vector3<f64>, hit: F) -> Option<(usize, f64)>
    where
        F: Fn(usize) -> Option<f64>,
    {
        let mut best: Option<(usize, f64)> = None;
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let Some((t_enter, _)) = node.aabb().ray_interval(pos, dir) else {
                continue;
            };
            if let Some((_, best_t)) = best {
                if t_enter > best_t {
                    continue;
                }
            }
            match node {
                Node::Leaf { item, .. } => {
                    if let Some(t) = hit(*item) {
                        let closer = match best {
                            None => true,
                            Some((best_item, best_t)) => {
                                t < best_t || (t == best_t && *item < best_item)
                            }
                        };
                        if closer {
                            best = Some((*item, t));
                        }
                    }
                }
                Node::Interior { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        best
    }

    /// Result of `test(i)` for the lowest-index item whose box contains `pos`
    /// and for which `test` returns `Some`.
    pub fn first_containing<T, F>(&self, pos: &Point3<f64>, test: F) -> Option<T>
    where
        F: Fn(usize) -> Option<T>,
    {
        let mut best: Option<(usize, T)> = None;
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.aabb().contains(pos) {
                continue;
            }
            match node {
                Node::Leaf { item, .. } => {
                    if best.as_ref().is_some_and(|(b, _)| *b < *item) {
                        continue;
                    }
                    if let Some(value) = test(*item) {
                        best = Some((*item, value));
                    }
                }
                Node::Interior { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        best.map(|(_, value)| value)
    }
}
