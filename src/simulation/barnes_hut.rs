//! # Barnes–Hut Quadtree (2D)
//!
//! Hierarchical approximation of gravitational acceleration: distant
//! groups of particles are treated as a single pseudo-body at their center
//! of mass, replacing the naive `O(N²)` all-pairs sum with `O(N log N)`.
//!
//! - The universe rectangle is recursively subdivided into 4 quadrants.
//! - Each region is a node of the quadtree, stored in a per-step arena
//!   (`Vec<QuadNode>`) and addressed by index.
//! - Leaf nodes hold one particle, or several once subdivision bottoms
//!   out at the side-length floor (coincident particles would otherwise
//!   recurse forever).
//! - Each node stores the total mass and center of mass of its subtree,
//!   plus its bounds.
//!
//! The tree lives for exactly one time step: built once by a single
//! writer, queried read-only (possibly from many threads), then dropped
//! as a whole.

use crate::simulation::states::{NVec2, Particle, Universe, SOFTENING};

/// Nodes stop subdividing once their longer side reaches this floor;
/// further arrivals stack in the leaf bucket instead.
const MIN_NODE_SIDE: f32 = 2.0 * SOFTENING;

/// By-value snapshot of one particle, taken at the start of a Barnes–Hut
/// step. The slot index in the payload slice equals the index of the
/// source particle, which is how the force query skips self-interaction.
#[derive(Debug, Clone, Copy)]
pub struct TreeParticle {
    pub x: NVec2,
    pub m: f32,
}

impl From<&Particle> for TreeParticle {
    fn from(p: &Particle) -> Self {
        Self { x: p.x, m: p.m }
    }
}

/// A single quadtree node covering the rectangle [min, max).
///
/// Either a leaf (`children` is `None`, residents listed in `bodies`) or
/// an internal node (`children` holds the four quadrant indices and
/// `bodies` is empty). `bodies` has more than one entry only at the
/// subdivision floor.
pub struct QuadNode {
    pub mass: f32,
    pub com: NVec2,
    pub min: NVec2,
    pub max: NVec2,
    pub children: Option<[usize; 4]>, // NW, NE, SW, SE indices into QuadTree::nodes
    pub bodies: Vec<usize>,           // payload indices resident in this leaf
}

impl QuadNode {
    fn empty(min: NVec2, max: NVec2) -> Self {
        Self {
            mass: 0.0,
            com: NVec2::zeros(),
            min,
            max,
            children: None,
            bodies: Vec::new(),
        }
    }

    /// Longer side of the node rectangle, the `s` of the opening test.
    pub fn side(&self) -> f32 {
        let ext = self.max - self.min;
        ext.x.max(ext.y)
    }

    /// Half-open containment test.
    pub fn contains(&self, p: NVec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// A complete quadtree built over one snapshot of the particle array.
pub struct QuadTree {
    pub nodes: Vec<QuadNode>,
    pub root: usize,
}

impl QuadTree {
    /// Build a quadtree covering the universe rectangle and insert every
    /// payload, then fill in the per-node aggregates bottom-up.
    ///
    /// Insertion is strictly single-threaded; the finished tree is
    /// immutable and safe to query concurrently.
    pub fn build(payloads: &[TreeParticle], universe: Universe) -> Self {
        let mut tree = QuadTree {
            nodes: vec![QuadNode::empty(
                NVec2::zeros(),
                NVec2::new(universe.size_x, universe.size_y),
            )],
            root: 0,
        };

        for index in 0..payloads.len() {
            tree.insert(index, payloads);
        }

        tree.compute_mass_and_com(tree.root, payloads);
        tree
    }

    /// Insert one payload, starting from the root.
    ///
    /// The point must lie inside the tree bounds; anything else means the
    /// caller handed over a particle that escaped the universe.
    pub fn insert(&mut self, payload_idx: usize, payloads: &[TreeParticle]) {
        let pos = payloads[payload_idx].x;
        assert!(
            self.nodes[self.root].contains(pos),
            "position {:?} outside tree bounds {:?}..{:?}",
            pos,
            self.nodes[self.root].min,
            self.nodes[self.root].max,
        );
        self.insert_at(self.root, payload_idx, payloads);
    }

    /// Net gravitational acceleration on `particle` from the whole tree,
    /// accumulated into `particle.a`. `index` is the particle's slot in
    /// the payload slice, used to skip self-interaction. Never mutates
    /// the tree.
    pub fn apply_acceleration(
        &self,
        particle: &mut Particle,
        index: usize,
        payloads: &[TreeParticle],
        theta: f32,
    ) {
        self.accumulate(self.root, particle, index, payloads, theta);
    }

    // helpers ==============================================================================

    fn insert_at(&mut self, node_idx: usize, payload_idx: usize, payloads: &[TreeParticle]) {
        // Snapshot by value so no borrow is live across the recursion
        let min = self.nodes[node_idx].min;
        let max = self.nodes[node_idx].max;
        let node_children = self.nodes[node_idx].children;
        let pos = payloads[payload_idx].x;

        match node_children {
            None => {
                // Empty leaf: the payload settles here
                if self.nodes[node_idx].bodies.is_empty() {
                    self.nodes[node_idx].bodies.push(payload_idx);
                    return;
                }

                // Occupied leaf at the subdivision floor: stack in the
                // bucket, coincident points can go no deeper
                if self.nodes[node_idx].side() <= MIN_NODE_SIDE {
                    self.nodes[node_idx].bodies.push(payload_idx);
                    return;
                }

                // Occupied leaf with room to split: subdivide, re-insert
                // the residents, then descend with the newcomer
                let residents = std::mem::take(&mut self.nodes[node_idx].bodies);
                let children = self.subdivide(node_idx, min, max);
                for resident in residents {
                    let q = quadrant(payloads[resident].x, (min + max) * 0.5);
                    self.insert_at(children[q], resident, payloads);
                }
                let q = quadrant(pos, (min + max) * 0.5);
                self.insert_at(children[q], payload_idx, payloads);
            }
            Some(children) => {
                // Internal node: descend into the quadrant holding the point
                let q = quadrant(pos, (min + max) * 0.5);
                self.insert_at(children[q], payload_idx, payloads);
            }
        }
    }

    /// Split a node into 4 empty children covering its quadrants and mark
    /// it internal. Returns the child indices in NW, NE, SW, SE order.
    fn subdivide(&mut self, node_idx: usize, min: NVec2, max: NVec2) -> [usize; 4] {
        let mut children = [0usize; 4];
        for (q, child) in children.iter_mut().enumerate() {
            let (cmin, cmax) = child_bounds(min, max, q);
            *child = self.nodes.len();
            self.nodes.push(QuadNode::empty(cmin, cmax));
        }
        self.nodes[node_idx].children = Some(children);
        children
    }

    /// Bottom-up pass filling every node's total mass and mass-weighted
    /// center of mass. Runs once, after all insertions.
    fn compute_mass_and_com(&mut self, node_idx: usize, payloads: &[TreeParticle]) {
        let mut mass = 0.0;
        let mut com = NVec2::zeros();

        // Option<[usize; 4]> is Copy, snapshot it before recursing
        let children = self.nodes[node_idx].children;

        match children {
            None => {
                for &b in &self.nodes[node_idx].bodies {
                    let p = payloads[b];
                    mass += p.m;
                    com += p.x * p.m;
                }
            }
            Some(children) => {
                for child_idx in children {
                    self.compute_mass_and_com(child_idx, payloads);
                    let child = &self.nodes[child_idx];
                    if child.mass > 0.0 {
                        mass += child.mass;
                        com += child.com * child.mass;
                    }
                }
            }
        }

        if mass > 0.0 {
            com /= mass;
        }

        let node = &mut self.nodes[node_idx];
        node.mass = mass;
        node.com = com;
    }

    fn accumulate(
        &self,
        node_idx: usize,
        particle: &mut Particle,
        index: usize,
        payloads: &[TreeParticle],
        theta: f32,
    ) {
        let node = &self.nodes[node_idx];

        // Empty subtree contributes nothing
        if node.mass == 0.0 {
            return;
        }

        match node.children {
            None => {
                // Leaf: exact interaction with every resident except the
                // target itself
                for &b in &node.bodies {
                    if b != index {
                        let p = payloads[b];
                        particle.add_acceleration(p.x, p.m);
                    }
                }
            }
            Some(children) => {
                let r = node.com - particle.x;
                let dist = r.norm();

                // Far enough away: the whole subtree acts as one point
                // mass at its center of mass. A zero distance can never
                // pass the opening test, so it falls through to the
                // children where the softened kernel handles it.
                if dist > 0.0 && node.side() / dist < theta {
                    particle.add_acceleration(node.com, node.mass);
                } else {
                    for child_idx in children {
                        self.accumulate(child_idx, particle, index, payloads, theta);
                    }
                }
            }
        }
    }
}

// helpers ===========================================================================

/// Quadrant of `p` relative to `center`, in NW, NE, SW, SE order with +y
/// pointing south (raster convention). Bit 0 is east, bit 1 is south, so
/// a point on a dividing line lands in the quadrant whose min edge it
/// sits on, matching the half-open bounds test.
fn quadrant(p: NVec2, center: NVec2) -> usize {
    let mut q = 0;
    if p.x >= center.x {
        q |= 1;
    }
    if p.y >= center.y {
        q |= 2;
    }
    q
}

/// Bounds of child quadrant `q` (same encoding as [`quadrant`]) inside
/// the parent rectangle.
fn child_bounds(parent_min: NVec2, parent_max: NVec2, q: usize) -> (NVec2, NVec2) {
    let center = (parent_min + parent_max) * 0.5;

    let mut min = parent_min;
    let mut max = parent_max;

    if q & 1 == 0 {
        max.x = center.x;
    } else {
        min.x = center.x;
    }

    if q & 2 == 0 {
        max.y = center.y;
    } else {
        min.y = center.y;
    }

    (min, max)
}
