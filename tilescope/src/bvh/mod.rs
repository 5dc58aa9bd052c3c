//! Bounding volume hierarchy over the feature corpus.
//!
//! A binary tree built top-down by median split on feature centroids,
//! in the style used by real-time ray tracers. Nodes live in an arena
//! (`Vec<Node>`) and reference a contiguous range of the feature
//! reference array, so the whole tree releases in two deallocations.
//!
//! Construction is deterministic: the per-feature bounding-box pass
//! may run data-parallel, but the tree recursion is serial and the
//! output is identical at any thread count.

use crate::corpus::{FeatureCorpus, FeatureId, FeatureRecord};
use crate::geom::Aabb;
use rayon::prelude::*;

/// Maximum number of feature references in a leaf node.
pub const LEAF_THRESHOLD: usize = 16;

/// Index of a node in the arena.
pub type NodeId = u32;

/// A feature reference: the owning record's corpus offset plus its
/// precomputed bounding box. Produced once after ingest, read-only
/// thereafter.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRef {
    pub id: FeatureId,
    pub aabb: Aabb,
}

/// One BVH node: its box, optional children, and the half-open range
/// `[begin, end)` of the reference array it covers.
///
/// Children are either both present or both absent; a node without
/// children is a leaf and its range holds at most [`LEAF_THRESHOLD`]
/// references.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub aabb: Aabb,
    left: Option<NodeId>,
    right: Option<NodeId>,
    begin: u32,
    end: u32,
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    #[inline]
    pub fn range(&self) -> (usize, usize) {
        (self.begin as usize, self.end as usize)
    }

    #[inline]
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }
}

/// The built hierarchy: node arena, reference array, root slot.
#[derive(Debug, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
    refs: Vec<FeatureRef>,
}

impl Bvh {
    /// Build a tree over every record in the corpus using the rayon
    /// global pool for the bounding-box pass.
    pub fn build(corpus: &FeatureCorpus) -> Self {
        Self::build_with_threads(corpus, rayon::current_num_threads())
    }

    /// Build a tree with an explicit thread count for the per-feature
    /// bounding-box pass. `threads <= 1` runs the pass serially. The
    /// resulting tree is identical either way.
    ///
    /// An empty corpus produces an empty forest (no root).
    pub fn build_with_threads(corpus: &FeatureCorpus, threads: usize) -> Self {
        if corpus.is_empty() {
            return Self::default();
        }

        let ids: Vec<FeatureId> = corpus.iter().map(|rec| rec.id()).collect();

        let mut refs: Vec<FeatureRef> = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .expect("bvh thread pool");
            pool.install(|| {
                ids.par_iter()
                    .map(|&id| make_feature_ref(corpus, id))
                    .collect()
            })
        } else {
            ids.iter().map(|&id| make_feature_ref(corpus, id)).collect()
        };

        let mut nodes = Vec::with_capacity(2 * refs.len());
        build_range(&mut nodes, &mut refs, 0);

        Self { nodes, refs }
    }

    /// The root node, if any features were indexed.
    #[inline]
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Bounding box of the whole forest; invalid when empty.
    pub fn root_aabb(&self) -> Aabb {
        self.root().map(|n| n.aabb).unwrap_or_else(Aabb::empty)
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// The feature reference array in tree order.
    #[inline]
    pub fn refs(&self) -> &[FeatureRef] {
        &self.refs
    }

    /// Collect the ids of all features whose stored box overlaps the
    /// query box. Order is unspecified but deterministic for a fixed
    /// tree.
    pub fn collect_visible(&self, query: &Aabb) -> Vec<FeatureId> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() {
            self.collect_node(0, query, &mut out);
        }
        out
    }

    fn collect_node(&self, id: NodeId, query: &Aabb, out: &mut Vec<FeatureId>) {
        let node = &self.nodes[id as usize];
        if !node.aabb.is_valid() || !node.aabb.overlaps(query) {
            return;
        }

        if let Some((left, right)) = node.children() {
            self.collect_node(left, query, out);
            self.collect_node(right, query, out);
            return;
        }

        let (begin, end) = node.range();
        for r in &self.refs[begin..end] {
            if r.aabb.is_valid() && r.aabb.overlaps(query) {
                out.push(r.id);
            }
        }
    }
}

/// Bounding box of one feature record: min/max over the finite
/// vertices, invalid when no finite vertex exists.
fn record_aabb(rec: &FeatureRecord<'_>) -> Aabb {
    let mut aabb = Aabb::empty();
    for v in rec.vertices() {
        if !v.is_finite() {
            continue;
        }
        aabb.expand(&Aabb::new([v.x, v.y], [v.x, v.y]));
    }
    aabb
}

fn make_feature_ref(corpus: &FeatureCorpus, id: FeatureId) -> FeatureRef {
    let aabb = corpus
        .record_at(id)
        .map(|rec| record_aabb(&rec))
        .unwrap_or_else(Aabb::empty);
    FeatureRef { id, aabb }
}

/// Union of the valid reference boxes in a range; invalid when none.
fn range_bounds(refs: &[FeatureRef]) -> Aabb {
    let mut bounds = Aabb::empty();
    for r in refs {
        if r.aabb.is_valid() {
            bounds.expand(&r.aabb);
        }
    }
    bounds
}

/// Recursive median-split build. `base` is the offset of `refs`
/// within the full reference array so node ranges are absolute.
/// Returns the new node's arena slot; the node is pushed before its
/// children, so slot 0 is always the root.
fn build_range(nodes: &mut Vec<Node>, refs: &mut [FeatureRef], base: usize) -> NodeId {
    let id = nodes.len() as NodeId;
    nodes.push(Node {
        aabb: Aabb::empty(),
        left: None,
        right: None,
        begin: base as u32,
        end: (base + refs.len()) as u32,
    });

    if refs.is_empty() {
        return id;
    }

    nodes[id as usize].aabb = range_bounds(refs);
    if refs.len() <= LEAF_THRESHOLD {
        return id;
    }

    // Centroid extents over the valid boxes choose the split axis;
    // ties go to x. Invalid boxes contribute nothing to the extent
    // but are still partitioned below.
    let mut min_c = [f64::INFINITY; 2];
    let mut max_c = [f64::NEG_INFINITY; 2];
    for r in refs.iter() {
        if !r.aabb.is_valid() {
            continue;
        }
        for axis in 0..2 {
            let c = r.aabb.centroid(axis);
            min_c[axis] = min_c[axis].min(c);
            max_c[axis] = max_c[axis].max(c);
        }
    }
    let extent_x = max_c[0] - min_c[0];
    let extent_y = max_c[1] - min_c[1];
    let axis = if extent_x >= extent_y { 0 } else { 1 };

    let mid = refs.len() / 2;
    refs.select_nth_unstable_by(mid, |a, b| {
        a.aabb.centroid(axis).total_cmp(&b.aabb.centroid(axis))
    });

    let (left_refs, right_refs) = refs.split_at_mut(mid);
    let left = build_range(nodes, left_refs, base);
    let right = build_range(nodes, right_refs, base + mid);

    nodes[id as usize].left = Some(left);
    nodes[id as usize].right = Some(right);
    nodes[id as usize].aabb = Aabb::union(&nodes[left as usize].aabb, &nodes[right as usize].aabb);
    id
}
