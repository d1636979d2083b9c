//! Local entity numbering built on the equitable partition, and a topology writer
//! recording which global entities a named group refers to.

use anyhow::{anyhow, Context};
use log::{debug, error, info, trace};

use super::{
    compute_range, compute_window, CollectiveChannel, ElementType, EntityDistribution, IoMode,
    MeshTopology, ParallelStore, PartitionError, PartitionRange, ProcessTopology, TopologyWriter,
};

/// Per dimension, this rank owns a contiguous block of global entities (local indices
/// `0..owned`) and keeps ghosts of other ranks' entities after them in ascending global order.
#[derive(Debug, Clone)]
pub struct DistributedEntities {
    topology: ProcessTopology,
    global_counts: Vec<usize>,
    owned: Vec<PartitionRange>,
    ghosts: Vec<Vec<usize>>,
}

impl DistributedEntities {
    /// `global_counts[d]` is the number of entities of dimension `d`; the last entry is the cells
    pub fn new(global_counts: &[usize], topology: ProcessTopology) -> Result<Self, PartitionError> {
        if global_counts.is_empty() {
            return Err(PartitionError::InvalidArgument(
                "at least one entity dimension is required".into(),
            ));
        }
        let owned = global_counts
            .iter()
            .map(|&count| compute_range(count, topology.size(), topology.rank()))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Owned ranges per dimension: {:?}", owned);

        Ok(Self {
            topology,
            global_counts: global_counts.to_vec(),
            ghosts: vec![Vec::new(); global_counts.len()],
            owned,
        })
    }

    /// Vertices and cells of a `tdim` dimensional mesh; intermediate dimensions are empty
    pub fn from_distribution(
        distribution: &EntityDistribution,
        tdim: usize,
    ) -> Result<Self, PartitionError> {
        let mut counts = vec![0; tdim + 1];
        counts[0] = distribution.global_vertices();
        counts[tdim] = distribution.global_cells();
        Self::new(&counts, distribution.topology())
    }

    /// Register ghosts of dimension `dim`, given by global index
    pub fn with_ghosts(mut self, dim: usize, ghosts: &[usize]) -> Result<Self, PartitionError> {
        self.check_dim(dim)?;
        let owned = self.owned[dim];
        let count = self.global_counts[dim];

        let mut sorted = ghosts.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        if let Some(&bad) = sorted.iter().find(|&&g| g >= count) {
            return Err(PartitionError::OutOfRange { index: bad, count });
        }
        if let Some(&bad) = sorted.iter().find(|&&g| owned.contains(g)) {
            return Err(PartitionError::InvalidArgument(format!(
                "entity {} is owned by rank {} and cannot be its ghost",
                bad,
                self.topology.rank()
            )));
        }

        trace!("Rank {} ghosts of dimension {}: {:?}", self.topology.rank(), dim, sorted);
        self.ghosts[dim] = sorted;
        Ok(self)
    }

    pub fn process_topology(&self) -> ProcessTopology {
        self.topology
    }

    pub fn global_count(&self, dim: usize) -> usize {
        self.global_counts.get(dim).copied().unwrap_or(0)
    }

    pub fn owned_range(&self, dim: usize) -> PartitionRange {
        self.owned.get(dim).copied().unwrap_or_default()
    }

    pub fn ghosts(&self, dim: usize) -> &[usize] {
        self.ghosts.get(dim).map(Vec::as_slice).unwrap_or(&[])
    }

    /// owned plus ghost entities of `dim`
    pub fn local_count(&self, dim: usize) -> usize {
        self.owned_range(dim).len() + self.ghosts(dim).len()
    }

    /// Local index of a global entity known to this rank
    pub fn local_index(&self, dim: usize, global: usize) -> Option<usize> {
        let owned = self.owned_range(dim);
        if owned.contains(global) {
            return Some(global - owned.start);
        }
        self.ghosts(dim)
            .binary_search(&global)
            .ok()
            .map(|pos| owned.len() + pos)
    }

    fn check_dim(&self, dim: usize) -> Result<(), PartitionError> {
        if dim >= self.global_counts.len() {
            return Err(PartitionError::InvalidArgument(format!(
                "dimension {} exceeds topological dimension {}",
                dim,
                self.global_counts.len() - 1
            )));
        }
        Ok(())
    }
}

impl MeshTopology for DistributedEntities {
    fn topological_dimension(&self) -> usize {
        self.global_counts.len() - 1
    }

    fn local_owned_count(&self, dim: usize) -> usize {
        self.owned_range(dim).len()
    }

    fn local_to_global(&self, dim: usize, local: usize) -> Option<usize> {
        let owned = self.owned_range(dim);
        if local < owned.len() {
            Some(owned.start + local)
        } else {
            self.ghosts(dim).get(local - owned.len()).copied()
        }
    }
}

/// Writes the global index of every listed local entity to `<prefix>/Topology`,
/// concatenated over ranks in rank order
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityIndexTopologyWriter;

impl EntityIndexTopologyWriter {
    pub const DATASET: &'static str = "Topology";
}

impl TopologyWriter for EntityIndexTopologyWriter {
    fn write_topology<C, S, M>(
        &self,
        channel: &C,
        store: &S,
        path_prefix: &str,
        topology: &M,
        dim: usize,
        local_entities: &[usize],
    ) -> anyhow::Result<()>
    where
        C: CollectiveChannel,
        S: ParallelStore,
        M: MeshTopology,
    {
        let path = format!("{}/{}", path_prefix, Self::DATASET);
        info!(
            "Writing topology of {} entities of dimension {} to {}",
            local_entities.len(),
            dim,
            path
        );

        // resolve everything locally before entering the collectives
        let global_indices = local_entities
            .iter()
            .map(|&local| -> anyhow::Result<i64> {
                let global = topology.local_to_global(dim, local).ok_or_else(|| {
                    let err = anyhow!("local entity {} of dimension {} is unknown", local, dim);
                    error!("{}", err);
                    err
                })?;
                Ok(i64::try_from(global)?)
            })
            .collect::<anyhow::Result<Vec<i64>>>()?;

        let window = compute_window(global_indices.len(), channel)?;
        store
            .create_dataset(&path, [window.global_total, 1], ElementType::Int64)
            .with_context(|| format!("creating {}", path))?;
        store
            .write_at(
                &path,
                window.offset,
                &global_indices,
                IoMode::for_size(channel.size()),
            )
            .with_context(|| format!("writing {}", path))?;

        debug!("Topology written at {:?}", window);
        Ok(())
    }
}
