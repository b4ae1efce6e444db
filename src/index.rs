use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::Path;

use crc32fast::Hasher;
use rand::prelude::*;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::arena::{NodeArena, NodeId};
use crate::centers::{select_centers, CentersInit};
use crate::dataset::Dataset;
use crate::distance::{Distance, SquaredEuclidean};
use crate::result::ResultSet;
use crate::{HclusterError, PointId};

const PERSIST_MAGIC: [u8; 4] = *b"HCT1";
const PERSIST_VERSION: u32 = 1;

/// Points per rayon work unit in the labeling sweep.
const LABEL_CHUNK_SIZE: usize = 2048;

/// Parameters controlling forest construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Children per internal node; also the split threshold on insert.
    pub branching: usize,
    /// Strategy for picking the initial cluster centers.
    pub centers_init: CentersInit,
    /// Number of independent trees in the forest.
    pub trees: usize,
    /// Maximum points in a terminal node at build time.
    pub leaf_size: usize,
    /// Base seed; each tree derives its own RNG stream from it.
    pub seed: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            branching: 32,
            centers_init: CentersInit::Random,
            trees: 4,
            leaf_size: 100,
            seed: 0,
        }
    }
}

impl IndexParams {
    fn validate(&self) -> Result<(), HclusterError> {
        if self.branching < 2 {
            return Err(HclusterError::BadParameter(
                "branching factor must be at least 2",
            ));
        }
        if self.trees < 1 {
            return Err(HclusterError::BadParameter(
                "at least one tree is required",
            ));
        }
        if self.leaf_size < 1 {
            return Err(HclusterError::BadParameter("leaf size must be positive"));
        }
        Ok(())
    }
}

/// Parameters for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Budget of point-distance evaluations. Negative means unbounded.
    pub checks: i32,
}

impl SearchParams {
    pub fn new(checks: i32) -> Self {
        Self { checks }
    }

    pub fn unbounded() -> Self {
        Self { checks: -1 }
    }

    fn max_checks(&self) -> usize {
        if self.checks < 0 {
            usize::MAX
        } else {
            self.checks as usize
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { checks: 32 }
    }
}

/// Deferred branch in the best-bin-first traversal, keyed by the distance
/// from the query to the branch's pivot.
#[derive(Debug, Clone, Copy)]
struct Branch {
    node: NodeId,
    bound: f32,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.bound.to_bits() == other.bound.to_bits() && self.node == other.node
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    // Reversed so the std max-heap pops the smallest bound first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| other.node.cmp(&self.node))
    }
}

struct SearchState {
    heap: BinaryHeap<Branch>,
    checked: RoaringBitmap,
    checks: usize,
    max_checks: usize,
}

/// Hierarchical clustering index.
///
/// The dataset is partitioned recursively by k-centers clustering into a
/// forest of `trees` independent trees; queries run a best-bin-first descent
/// across all of them under a shared check budget. Points added after the
/// initial build are routed into leaves and split in place until the
/// accumulated growth crosses the rebuild threshold.
#[derive(Debug, Clone)]
pub struct HierarchicalClusteringIndex<D: Distance = SquaredEuclidean> {
    params: IndexParams,
    distance: D,
    dataset: Dataset,
    arena: NodeArena,
    roots: Vec<NodeId>,
    size_at_build: usize,
    removed: RoaringBitmap,
    memory_counter: usize,
    insert_rng: StdRng,
}

impl<D: Distance> HierarchicalClusteringIndex<D> {
    /// Create an index over an empty dataset of `dim`-column vectors.
    /// The forest is not built until [`build`](Self::build) is called.
    pub fn new(dim: usize, params: IndexParams, distance: D) -> Result<Self, HclusterError> {
        Self::with_dataset(Dataset::new(dim)?, params, distance)
    }

    /// Create an index over an existing dataset.
    pub fn with_dataset(
        dataset: Dataset,
        params: IndexParams,
        distance: D,
    ) -> Result<Self, HclusterError> {
        params.validate()?;
        let insert_rng = StdRng::seed_from_u64(params.seed ^ 0x9e37_79b9_7f4a_7c15);
        Ok(Self {
            params,
            distance,
            dataset,
            arena: NodeArena::new(),
            roots: Vec::new(),
            size_at_build: 0,
            removed: RoaringBitmap::new(),
            memory_counter: 0,
            insert_rng,
        })
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Columns per vector.
    pub fn veclen(&self) -> usize {
        self.dataset.dim()
    }

    /// Number of trees currently in the forest (zero before the first build).
    pub fn tree_count(&self) -> usize {
        self.roots.len()
    }

    /// Dataset size recorded at the last build.
    pub fn size_at_build(&self) -> usize {
        self.size_at_build
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Bytes held by the forest: the node arena plus per-node payload
    /// vectors tracked by the internal counter.
    pub fn used_memory(&self) -> usize {
        self.arena.used_bytes() + self.memory_counter
    }

    /// Build the forest from scratch over the current dataset. Any existing
    /// forest is released first.
    pub fn build(&mut self) -> Result<(), HclusterError> {
        self.params.validate()?;
        self.arena.reset();
        self.roots.clear();
        self.memory_counter = 0;

        let size = self.dataset.len();
        let mut indices: Vec<PointId> = Vec::with_capacity(size);
        for tree in 0..self.params.trees {
            let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(tree as u64));
            indices.clear();
            indices.extend(0..size as PointId);
            let root = self.arena.alloc();
            self.roots.push(root);
            self.build_tree(root, &mut indices, &mut rng)?;
        }
        self.size_at_build = size;
        Ok(())
    }

    /// Append rows to the dataset and index them, using the default rebuild
    /// threshold of 2.0.
    pub fn add_points(&mut self, rows: &[Vec<f32>]) -> Result<(), HclusterError> {
        self.add_points_with_threshold(rows, 2.0)
    }

    /// Append rows to the dataset and index them.
    ///
    /// If `rebuild_threshold > 1` and the dataset has grown past
    /// `size_at_build * rebuild_threshold`, the whole forest is rebuilt;
    /// otherwise each new point is routed into every tree individually.
    pub fn add_points_with_threshold(
        &mut self,
        rows: &[Vec<f32>],
        rebuild_threshold: f32,
    ) -> Result<(), HclusterError> {
        let old_size = self.dataset.len();
        self.dataset.extend(rows)?;

        if self.roots.is_empty() {
            return self.build();
        }

        let size = self.dataset.len();
        let crossed = rebuild_threshold > 1.0
            && self.size_at_build > 0
            && (self.size_at_build as f64) * (rebuild_threshold as f64) < size as f64;
        if crossed {
            return self.build();
        }

        let roots = self.roots.clone();
        for offset in 0..rows.len() {
            let pid = (old_size + offset) as PointId;
            for &root in &roots {
                self.insert(root, pid)?;
            }
        }
        Ok(())
    }

    /// Logically delete a point. It stays in the trees but is filtered out
    /// of every future search. Returns false if it was already removed.
    pub fn remove_point(&mut self, id: PointId) -> bool {
        if (id as usize) >= self.dataset.len() {
            return false;
        }
        self.removed.insert(id)
    }

    pub fn is_removed(&self, id: PointId) -> bool {
        self.removed.contains(id)
    }

    pub fn removed_count(&self) -> u64 {
        self.removed.len()
    }

    /// Find approximate nearest neighbors of `query`, feeding scored points
    /// into `result`. Returns the number of point-distance evaluations spent.
    pub fn find_neighbors<R: ResultSet>(
        &self,
        result: &mut R,
        query: &[f32],
        search_params: &SearchParams,
    ) -> Result<usize, HclusterError> {
        if query.len() != self.dataset.dim() {
            return Err(HclusterError::ShapeMismatch {
                expected: self.dataset.dim(),
                got: query.len(),
            });
        }

        let mut state = SearchState {
            heap: BinaryHeap::new(),
            checked: RoaringBitmap::new(),
            checks: 0,
            max_checks: search_params.max_checks(),
        };

        for &root in &self.roots {
            self.descend(root, result, query, &mut state);
        }

        while let Some(branch) = state.heap.pop() {
            if state.checks >= state.max_checks && result.is_full() {
                break;
            }
            self.descend(branch.node, result, query, &mut state);
        }

        Ok(state.checks)
    }

    /// One best-bin-first descent. Terminal nodes are scanned whole (the
    /// check budget is enforced between leaves, not inside one); internal
    /// nodes descend into the nearest-pivot child and park the siblings on
    /// the heap.
    fn descend<R: ResultSet>(
        &self,
        node: NodeId,
        result: &mut R,
        query: &[f32],
        state: &mut SearchState,
    ) {
        let node_ref = self.arena.node(node);
        if node_ref.is_terminal() {
            if state.checks >= state.max_checks && result.is_full() {
                return;
            }
            for &pid in &node_ref.points {
                if state.checked.contains(pid) || self.removed.contains(pid) {
                    continue;
                }
                let dist = self.distance.distance(self.dataset.point(pid), query);
                result.add_point(dist, pid);
                state.checked.insert(pid);
                state.checks += 1;
            }
        } else {
            let bounds: Vec<f32> = node_ref
                .children
                .iter()
                .map(|&child| self.child_bound(child, query))
                .collect();
            let mut best = 0usize;
            for i in 1..bounds.len() {
                if bounds[i] < bounds[best] {
                    best = i;
                }
            }
            for (i, (&child, &bound)) in node_ref.children.iter().zip(bounds.iter()).enumerate() {
                if i != best {
                    state.heap.push(Branch { node: child, bound });
                }
            }
            self.descend(node_ref.children[best], result, query, state);
        }
    }

    fn child_bound(&self, child: NodeId, query: &[f32]) -> f32 {
        let pivot = self
            .arena
            .node(child)
            .pivot
            .expect("child node missing its pivot");
        self.distance.distance(query, self.dataset.point(pivot))
    }

    /// Recursively cluster `indices` under `node`.
    ///
    /// Small subsets become terminal nodes outright; so do subsets whose
    /// center selection degenerates (fewer than `branching` distinct
    /// centers). Otherwise points are labeled by nearest center, partitioned
    /// in place, and each partition is clustered under a fresh child whose
    /// pivot is its center.
    fn build_tree(
        &mut self,
        node: NodeId,
        indices: &mut [PointId],
        rng: &mut StdRng,
    ) -> Result<(), HclusterError> {
        if indices.len() < self.params.leaf_size {
            self.make_terminal(node, indices);
            return Ok(());
        }

        let centers = select_centers(
            self.params.centers_init,
            &self.dataset,
            &self.distance,
            self.params.branching,
            indices,
            rng,
        )?;
        if centers.len() < self.params.branching {
            self.make_terminal(node, indices);
            return Ok(());
        }

        let (mut labels, _cost) = self.label_points(indices, &centers);

        let children: Vec<NodeId> = (0..self.params.branching)
            .map(|_| self.arena.alloc())
            .collect();
        {
            let n = self.arena.node_mut(node);
            n.points.clear();
            n.children = children.clone();
        }
        self.memory_counter += children.len() * mem::size_of::<NodeId>();

        let mut start = 0usize;
        for (label, &child) in children.iter().enumerate() {
            // Two-pointer sweep: gather partition `label` into [start, end).
            let mut end = start;
            for j in start..indices.len() {
                if labels[j] == label {
                    indices.swap(j, end);
                    labels.swap(j, end);
                    end += 1;
                }
            }
            self.arena.node_mut(child).pivot = Some(centers[label]);
            self.build_tree(child, &mut indices[start..end], rng)?;
            start = end;
        }
        Ok(())
    }

    fn make_terminal(&mut self, node: NodeId, indices: &[PointId]) {
        let n = self.arena.node_mut(node);
        n.children.clear();
        n.points.clear();
        n.points.extend_from_slice(indices);
        self.memory_counter += indices.len() * mem::size_of::<PointId>();
    }

    /// Assign every point to its nearest center. Ties go to the lowest
    /// label. Returns the labels and the summed assignment cost.
    fn label_points(&self, indices: &[PointId], centers: &[PointId]) -> (Vec<usize>, f32) {
        let chunks: Vec<(Vec<usize>, f32)> = indices
            .par_chunks(LABEL_CHUNK_SIZE)
            .map(|chunk| {
                let mut labels = Vec::with_capacity(chunk.len());
                let mut cost = 0.0f32;
                for &pid in chunk {
                    let point = self.dataset.point(pid);
                    let mut best = 0usize;
                    let mut best_dist =
                        self.distance.distance(point, self.dataset.point(centers[0]));
                    for (label, &center) in centers.iter().enumerate().skip(1) {
                        let d = self.distance.distance(point, self.dataset.point(center));
                        if d < best_dist {
                            best_dist = d;
                            best = label;
                        }
                    }
                    labels.push(best);
                    cost += best_dist;
                }
                (labels, cost)
            })
            .collect();

        let mut labels = Vec::with_capacity(indices.len());
        let mut cost = 0.0f32;
        for (chunk_labels, chunk_cost) in chunks {
            labels.extend(chunk_labels);
            cost += chunk_cost;
        }
        (labels, cost)
    }

    /// Route one new point into a tree: descend to the nearest-pivot leaf,
    /// append, and recluster the leaf in place once it reaches `branching`
    /// points. The reclustered node may stay terminal if its points are too
    /// degenerate to split.
    fn insert(&mut self, node: NodeId, pid: PointId) -> Result<(), HclusterError> {
        if self.arena.node(node).is_terminal() {
            self.arena.node_mut(node).points.push(pid);
            self.memory_counter += mem::size_of::<PointId>();

            if self.arena.node(node).points.len() >= self.params.branching {
                let mut points = mem::take(&mut self.arena.node_mut(node).points);
                // The recluster re-counts these bytes when it lays the
                // points back down into terminals.
                self.memory_counter -= points.len() * mem::size_of::<PointId>();
                let mut rng = self.insert_rng.clone();
                let outcome = self.build_tree(node, &mut points, &mut rng);
                self.insert_rng = rng;
                outcome?;
            }
            return Ok(());
        }

        let point = self.dataset.point(pid);
        let children = &self.arena.node(node).children;
        let mut closest = children[0];
        let mut closest_dist = self.pivot_distance(closest, point);
        for &child in &children[1..] {
            let d = self.pivot_distance(child, point);
            if d < closest_dist {
                closest_dist = d;
                closest = child;
            }
        }
        self.insert(closest, pid)
    }

    fn pivot_distance(&self, child: NodeId, point: &[f32]) -> f32 {
        let pivot = self
            .arena
            .node(child)
            .pivot
            .expect("child node missing its pivot");
        self.distance.distance(self.dataset.point(pivot), point)
    }

    /// Persist the forest to a file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), HclusterError> {
        let file = File::create(path)?;
        self.save_to_writer(BufWriter::new(file))
    }

    /// Persist the forest topology and parameters. The dataset itself is not
    /// written; loading requires the same dataset to resolve point ids.
    pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<(), HclusterError> {
        let mut writer = BufWriter::new(writer);
        writer.write_all(&PERSIST_MAGIC)?;
        write_u32(&mut writer, PERSIST_VERSION, None)?;

        let mut hasher = Hasher::new();

        let branching = u32::try_from(self.params.branching)
            .map_err(|_| HclusterError::InvalidPersistence("branching exceeds format limits"))?;
        write_u32(&mut writer, branching, Some(&mut hasher))?;

        let init_tag = centers_init_to_tag(self.params.centers_init);
        write_u8(&mut writer, init_tag, Some(&mut hasher))?;

        let trees = u32::try_from(self.roots.len())
            .map_err(|_| HclusterError::InvalidPersistence("tree count exceeds format limits"))?;
        write_u32(&mut writer, trees, Some(&mut hasher))?;

        let leaf_size = u32::try_from(self.params.leaf_size)
            .map_err(|_| HclusterError::InvalidPersistence("leaf size exceeds format limits"))?;
        write_u32(&mut writer, leaf_size, Some(&mut hasher))?;

        write_u64(&mut writer, self.params.seed, Some(&mut hasher))?;
        write_u64(&mut writer, self.memory_counter as u64, Some(&mut hasher))?;
        write_u64(&mut writer, self.size_at_build as u64, Some(&mut hasher))?;
        write_u64(&mut writer, self.dataset.len() as u64, Some(&mut hasher))?;

        let dim = u32::try_from(self.dataset.dim())
            .map_err(|_| HclusterError::InvalidPersistence("dimension exceeds format limits"))?;
        write_u32(&mut writer, dim, Some(&mut hasher))?;

        for &root in &self.roots {
            self.save_tree(&mut writer, &mut hasher, root)?;
        }

        let checksum = hasher.finalize();
        write_u32(&mut writer, checksum, None)?;
        writer.flush()?;
        Ok(())
    }

    fn save_tree<W: Write>(
        &self,
        writer: &mut W,
        hasher: &mut Hasher,
        node: NodeId,
    ) -> Result<(), HclusterError> {
        let node_ref = self.arena.node(node);
        let child_count = u32::try_from(node_ref.children.len())
            .map_err(|_| HclusterError::InvalidPersistence("child count exceeds format limits"))?;
        write_u32(writer, child_count, Some(hasher))?;

        if node_ref.is_terminal() {
            write_u64(writer, node_ref.points.len() as u64, Some(hasher))?;
            for &pid in &node_ref.points {
                write_u32(writer, pid, Some(hasher))?;
            }
        } else {
            for &child in &node_ref.children {
                let pivot = self.arena.node(child).pivot.ok_or(
                    HclusterError::InvalidPersistence("non-root node is missing its pivot"),
                )?;
                write_u32(writer, pivot, Some(hasher))?;
                self.save_tree(writer, hasher, child)?;
            }
        }
        Ok(())
    }

    /// Load a forest persisted with [`save_to_path`](Self::save_to_path),
    /// resolving point ids against `dataset`.
    pub fn load_from_path<P: AsRef<Path>>(
        path: P,
        dataset: Dataset,
        distance: D,
    ) -> Result<Self, HclusterError> {
        let file = File::open(path)?;
        Self::load_from_reader(BufReader::new(file), dataset, distance)
    }

    /// Load a forest from a persisted byte stream. The supplied dataset must
    /// be the one the forest was built over: its dimension and row count are
    /// checked against the stream, and every stored point id must resolve.
    pub fn load_from_reader<R: Read>(
        reader: R,
        dataset: Dataset,
        distance: D,
    ) -> Result<Self, HclusterError> {
        let mut reader = BufReader::new(reader);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != PERSIST_MAGIC {
            return Err(HclusterError::InvalidPersistence("unrecognized file header"));
        }
        let version = read_u32(&mut reader, None)?;
        if version != PERSIST_VERSION {
            return Err(HclusterError::InvalidPersistence(
                "unsupported index format version",
            ));
        }

        let mut hasher = Hasher::new();

        let branching = read_u32(&mut reader, Some(&mut hasher))? as usize;
        let init_tag = read_u8(&mut reader, Some(&mut hasher))?;
        let centers_init = tag_to_centers_init(init_tag)
            .ok_or(HclusterError::InvalidPersistence("unknown centers_init tag"))?;
        let trees = read_u32(&mut reader, Some(&mut hasher))? as usize;
        let leaf_size = read_u32(&mut reader, Some(&mut hasher))? as usize;
        let seed = read_u64(&mut reader, Some(&mut hasher))?;
        let memory_counter = usize_from_u64(read_u64(&mut reader, Some(&mut hasher))?)?;
        let size_at_build = usize_from_u64(read_u64(&mut reader, Some(&mut hasher))?)?;
        let size = usize_from_u64(read_u64(&mut reader, Some(&mut hasher))?)?;
        let dim = read_u32(&mut reader, Some(&mut hasher))? as usize;

        let params = IndexParams {
            branching,
            centers_init,
            trees,
            leaf_size,
            seed,
        };
        params.validate().map_err(|_| {
            HclusterError::InvalidPersistence("persisted parameters are out of range")
        })?;

        if dim != dataset.dim() {
            return Err(HclusterError::InvalidPersistence(
                "dataset dimension does not match the persisted index",
            ));
        }
        if size != dataset.len() {
            return Err(HclusterError::InvalidPersistence(
                "dataset size does not match the persisted index",
            ));
        }

        let mut arena = NodeArena::new();
        let mut roots = Vec::with_capacity(trees);
        for _ in 0..trees {
            let root = load_tree(&mut arena, &mut reader, &mut hasher, branching, size)?;
            roots.push(root);
        }

        let computed = hasher.finalize();
        let stored = read_u32(&mut reader, None)?;
        if computed != stored {
            return Err(HclusterError::InvalidPersistence("checksum mismatch"));
        }

        let insert_rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
        Ok(Self {
            params,
            distance,
            dataset,
            arena,
            roots,
            size_at_build,
            removed: RoaringBitmap::new(),
            memory_counter,
            insert_rng,
        })
    }

    #[cfg(test)]
    pub(crate) fn tree_roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[cfg(test)]
    pub(crate) fn node_arena(&self) -> &NodeArena {
        &self.arena
    }
}

fn load_tree<R: Read>(
    arena: &mut NodeArena,
    reader: &mut R,
    hasher: &mut Hasher,
    branching: usize,
    size: usize,
) -> Result<NodeId, HclusterError> {
    let node = arena.alloc();
    let child_count = read_u32(reader, Some(hasher))? as usize;

    if child_count == 0 {
        let point_count = usize_from_u64(read_u64(reader, Some(hasher))?)?;
        if point_count > size {
            return Err(HclusterError::InvalidPersistence(
                "terminal node claims more points than the dataset holds",
            ));
        }
        let mut points = Vec::with_capacity(point_count);
        for _ in 0..point_count {
            let pid = read_u32(reader, Some(hasher))?;
            if pid as usize >= size {
                return Err(HclusterError::InvalidPersistence(
                    "point id out of dataset range",
                ));
            }
            points.push(pid);
        }
        arena.node_mut(node).points = points;
        return Ok(node);
    }

    if child_count != branching {
        return Err(HclusterError::InvalidPersistence(
            "internal node child count does not match branching factor",
        ));
    }
    let mut children = Vec::with_capacity(child_count);
    for _ in 0..child_count {
        let pivot = read_u32(reader, Some(hasher))?;
        if pivot as usize >= size {
            return Err(HclusterError::InvalidPersistence(
                "pivot id out of dataset range",
            ));
        }
        let child = load_tree(arena, reader, hasher, branching, size)?;
        arena.node_mut(child).pivot = Some(pivot);
        children.push(child);
    }
    arena.node_mut(node).children = children;
    Ok(node)
}

fn centers_init_to_tag(init: CentersInit) -> u8 {
    match init {
        CentersInit::Random => 0,
        CentersInit::Gonzales => 1,
        CentersInit::KmeansPP => 2,
    }
}

fn tag_to_centers_init(tag: u8) -> Option<CentersInit> {
    match tag {
        0 => Some(CentersInit::Random),
        1 => Some(CentersInit::Gonzales),
        2 => Some(CentersInit::KmeansPP),
        _ => None,
    }
}

fn usize_from_u64(value: u64) -> Result<usize, HclusterError> {
    usize::try_from(value)
        .map_err(|_| HclusterError::InvalidPersistence("value exceeds platform limits"))
}

fn write_u8<W: Write>(writer: &mut W, value: u8, hasher: Option<&mut Hasher>) -> io::Result<()> {
    let bytes = [value];
    if let Some(h) = hasher {
        h.update(&bytes);
    }
    writer.write_all(&bytes)
}

fn write_u32<W: Write>(writer: &mut W, value: u32, hasher: Option<&mut Hasher>) -> io::Result<()> {
    let bytes = value.to_le_bytes();
    if let Some(h) = hasher {
        h.update(&bytes);
    }
    writer.write_all(&bytes)
}

fn write_u64<W: Write>(writer: &mut W, value: u64, hasher: Option<&mut Hasher>) -> io::Result<()> {
    let bytes = value.to_le_bytes();
    if let Some(h) = hasher {
        h.update(&bytes);
    }
    writer.write_all(&bytes)
}

fn read_u8<R: Read>(reader: &mut R, hasher: Option<&mut Hasher>) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    if let Some(h) = hasher {
        h.update(&buf);
    }
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R, hasher: Option<&mut Hasher>) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    if let Some(h) = hasher {
        h.update(&buf);
    }
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R, hasher: Option<&mut Hasher>) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    if let Some(h) = hasher {
        h.update(&buf);
    }
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(IndexParams::default().validate().is_ok());
    }

    #[test]
    fn branching_below_two_is_rejected() {
        let params = IndexParams {
            branching: 1,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(HclusterError::BadParameter(_))
        ));
    }

    #[test]
    fn negative_checks_means_unbounded() {
        assert_eq!(SearchParams::unbounded().max_checks(), usize::MAX);
        assert_eq!(SearchParams::new(100).max_checks(), 100);
    }

    #[test]
    fn branch_heap_pops_smallest_bound() {
        let mut heap = BinaryHeap::new();
        heap.push(Branch {
            node: 1,
            bound: 5.0,
        });
        heap.push(Branch {
            node: 2,
            bound: 0.5,
        });
        heap.push(Branch {
            node: 3,
            bound: 2.0,
        });
        let order: Vec<NodeId> = std::iter::from_fn(|| heap.pop().map(|b| b.node)).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn centers_init_tags_round_trip() {
        for init in [
            CentersInit::Random,
            CentersInit::Gonzales,
            CentersInit::KmeansPP,
        ] {
            assert_eq!(tag_to_centers_init(centers_init_to_tag(init)), Some(init));
        }
        assert_eq!(tag_to_centers_init(9), None);
    }
}
