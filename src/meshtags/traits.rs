use super::{ElementType, StoreError, TagValue};

/// Whether a write is coordinated across all ranks or issued by each rank alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoMode {
    Collective,
    Independent,
}

impl IoMode {
    /// Collective I/O only pays off when there is someone to coordinate with
    pub fn for_size(size: usize) -> Self {
        if size > 1 {
            IoMode::Collective
        } else {
            IoMode::Independent
        }
    }
}

/// Collective reductions needed to place each rank's contribution in a shared array.
///
/// Every rank of the group must make the same sequence of calls, otherwise the
/// participants block forever.
pub trait CollectiveChannel {
    fn rank(&self) -> usize;

    // number of participating processes
    fn size(&self) -> usize;

    /// sum of `local` over every rank
    fn sum_reduce(&self, local: i64) -> anyhow::Result<i64>;

    /// sum of `local` over every rank lower than this one (0 on rank 0)
    fn exclusive_scan(&self, local: i64) -> anyhow::Result<i64>;
}

impl<C: CollectiveChannel + ?Sized> CollectiveChannel for &C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn sum_reduce(&self, local: i64) -> anyhow::Result<i64> {
        (**self).sum_reduce(local)
    }

    fn exclusive_scan(&self, local: i64) -> anyhow::Result<i64> {
        (**self).exclusive_scan(local)
    }
}

/// Storage shared by all ranks. The caller opens and closes it; writers only issue
/// rank-disjoint writes into datasets of shape `[rows, width]`.
pub trait ParallelStore {
    /// Called by every rank with identical arguments
    fn create_dataset(
        &self,
        path: &str,
        shape: [usize; 2],
        element_type: ElementType,
    ) -> Result<(), StoreError>;

    /// Write whole rows starting at row `offset`
    fn write_at<T: TagValue>(
        &self,
        path: &str,
        offset: usize,
        data: &[T],
        mode: IoMode,
    ) -> Result<(), StoreError>;

    fn read<T: TagValue>(&self, path: &str) -> Result<Vec<T>, StoreError>;

    fn shape(&self, path: &str) -> Result<[usize; 2], StoreError>;
}

/// Read only view of the local mesh numbering: per dimension, owned entities take
/// local indices `0..local_owned_count` and ghosts follow
pub trait MeshTopology {
    fn topological_dimension(&self) -> usize;

    fn local_owned_count(&self, dim: usize) -> usize;

    /// global index of a local entity, owned or ghost
    fn local_to_global(&self, dim: usize, local: usize) -> Option<usize>;
}

/// Writes the connectivity half of a named entity group under `path_prefix`
pub trait TopologyWriter {
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
        M: MeshTopology;
}
