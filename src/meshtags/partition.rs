//! Equitable contiguous split of globally numbered entities across processes.
//!
//! Every function here is computable by any process in isolation, so ownership can
//! be resolved before any distributed data structure exists.

use std::ops::Range;

use log::{debug, trace};

use super::PartitionError;

/// (size, rank) of a process in a fixed group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessTopology {
    size: usize,
    rank: usize,
}

impl ProcessTopology {
    pub fn new(size: usize, rank: usize) -> Result<Self, PartitionError> {
        check_topology(size, rank)?;
        Ok(Self { size, rank })
    }

    /// number of processes in the group
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Half open interval `[start, stop)` of global indices owned by one rank
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionRange {
    pub start: usize,
    pub stop: usize,
}

impl PartitionRange {
    // a reversed pair is an empty range
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.stop
    }

    pub fn iter(&self) -> Range<usize> {
        self.start..self.stop
    }

    /// Convert a global index owned by this range into a zero based local index
    pub fn local_index(&self, global: usize) -> Result<usize, PartitionError> {
        if !self.contains(global) {
            return Err(PartitionError::NotOwned {
                index: global,
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(global - self.start)
    }
}

impl From<(usize, usize)> for PartitionRange {
    fn from(value: (usize, usize)) -> Self {
        Self {
            start: value.0,
            stop: value.1,
        }
    }
}

impl From<PartitionRange> for Range<usize> {
    fn from(value: PartitionRange) -> Self {
        value.start..value.stop
    }
}

fn check_topology(size: usize, rank: usize) -> Result<(), PartitionError> {
    if size == 0 {
        return Err(PartitionError::InvalidArgument(
            "process count must be at least 1".into(),
        ));
    }
    if rank >= size {
        return Err(PartitionError::InvalidArgument(format!(
            "rank {} is not in [0, {})",
            rank, size
        )));
    }
    Ok(())
}

/// Range of global indices owned by `rank` when `global_count` entities are split
/// over `size` processes. The first `global_count % size` ranks own one extra entity.
pub fn compute_range(
    global_count: usize,
    size: usize,
    rank: usize,
) -> Result<PartitionRange, PartitionError> {
    check_topology(size, rank)?;

    let per_proc = global_count / size;
    let leftover = global_count % size;

    let range = if rank < leftover {
        let start = rank * (per_proc + 1);
        PartitionRange {
            start,
            stop: start + per_proc + 1,
        }
    } else {
        let start = rank * per_proc + leftover;
        PartitionRange {
            start,
            stop: start + per_proc,
        }
    };

    trace!(
        "Range of rank {} for {} entities over {} processes: {:?}",
        rank,
        global_count,
        size,
        range
    );
    Ok(range)
}

/// Ranges of every rank, in rank order
pub fn compute_ranges(
    global_count: usize,
    size: usize,
) -> Result<Vec<PartitionRange>, PartitionError> {
    (0..size.max(1))
        .map(|rank| compute_range(global_count, size, rank))
        .collect()
}

/// Rank owning `index` in the split computed by [`compute_range`]
pub fn locate_owner(
    index: usize,
    global_count: usize,
    size: usize,
) -> Result<usize, PartitionError> {
    check_topology(size, 0)?;
    if index >= global_count {
        return Err(PartitionError::OutOfRange {
            index,
            count: global_count,
        });
    }

    let per_proc = global_count / size;
    let leftover = global_count % size;
    let breakpoint = leftover * (per_proc + 1);

    // below the breakpoint every rank holds per_proc + 1 entities; above it per_proc > 0
    let owner = if index < breakpoint {
        index / (per_proc + 1)
    } else {
        (index - breakpoint) / per_proc + leftover
    };

    trace!("Owner of index {}: rank {}", index, owner);
    Ok(owner)
}

/// Initial distribution of the vertices and cells of a mesh for one process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDistribution {
    global_vertices: usize,
    global_cells: usize,
    topology: ProcessTopology,
    vertex_range: PartitionRange,
    cell_range: PartitionRange,
}

impl EntityDistribution {
    pub fn new(
        global_vertices: usize,
        global_cells: usize,
        topology: ProcessTopology,
    ) -> Result<Self, PartitionError> {
        let (size, rank) = (topology.size(), topology.rank());
        let vertex_range = compute_range(global_vertices, size, rank)?;
        let cell_range = compute_range(global_cells, size, rank)?;
        debug!(
            "Distributing {} vertices and {} cells over {} processes: rank {} owns {:?} and {:?}",
            global_vertices,
            global_cells,
            size,
            rank,
            vertex_range,
            cell_range
        );
        Ok(Self {
            global_vertices,
            global_cells,
            topology,
            vertex_range,
            cell_range,
        })
    }

    pub fn topology(&self) -> ProcessTopology {
        self.topology
    }

    /// Return the global number of vertices in the mesh
    pub fn global_vertices(&self) -> usize {
        self.global_vertices
    }

    /// Return the global number of cells in the mesh
    pub fn global_cells(&self) -> usize {
        self.global_cells
    }

    pub fn vertex_range(&self) -> PartitionRange {
        self.vertex_range
    }

    pub fn cell_range(&self) -> PartitionRange {
        self.cell_range
    }

    pub fn vertex_owner(&self, vertex: usize) -> Result<usize, PartitionError> {
        locate_owner(vertex, self.global_vertices, self.topology.size())
    }

    pub fn cell_owner(&self, cell: usize) -> Result<usize, PartitionError> {
        locate_owner(cell, self.global_cells, self.topology.size())
    }

    /// Local number of a vertex owned by this process
    pub fn local_vertex_index(&self, vertex: usize) -> Result<usize, PartitionError> {
        self.vertex_range().local_index(vertex)
    }

    /// Local number of a cell owned by this process
    pub fn local_cell_index(&self, cell: usize) -> Result<usize, PartitionError> {
        self.cell_range().local_index(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution(size: usize, global_count: usize) -> Vec<(usize, usize)> {
        compute_ranges(global_count, size)
            .unwrap()
            .into_iter()
            .map(|r| (r.start, r.stop))
            .collect()
    }

    #[test]
    fn test_even_distribution() {
        assert_eq!(
            distribution(4, 100),
            vec![(0, 25), (25, 50), (50, 75), (75, 100)]
        );
    }

    #[test]
    fn test_uneven_distribution() {
        assert_eq!(distribution(3, 10), vec![(0, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn test_zero_entities() {
        assert_eq!(
            distribution(5, 0),
            vec![(0, 0), (0, 0), (0, 0), (0, 0), (0, 0)]
        );
        assert!(compute_range(0, 5, 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_size() {
        assert!(matches!(
            compute_range(10, 0, 0),
            Err(PartitionError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_ranges(10, 0),
            Err(PartitionError::InvalidArgument(_))
        ));
        assert!(matches!(
            locate_owner(0, 10, 0),
            Err(PartitionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rank_outside_topology() {
        assert!(matches!(
            compute_range(10, 3, 3),
            Err(PartitionError::InvalidArgument(_))
        ));
        assert!(ProcessTopology::new(3, 7).is_err());
        assert!(ProcessTopology::new(3, 2).is_ok());
    }

    #[test]
    fn test_owner_out_of_range() {
        assert_eq!(
            locate_owner(10, 10, 3),
            Err(PartitionError::OutOfRange {
                index: 10,
                count: 10
            })
        );
        assert!(locate_owner(0, 0, 1).is_err());
    }

    #[test]
    fn test_rank_ownership() {
        // assume 4 processes
        for (index, expected) in [(0, 0), (5, 0), (9, 0), (20, 2), (25, 2), (29, 2)] {
            assert_eq!(locate_owner(index, 40, 4).unwrap(), expected);
        }

        // 4 processes, uneven: [(0, 3), (3, 6), (6, 8), (8, 10)]
        let expected = [0, 0, 0, 1, 1, 1, 2, 2, 3, 3];
        for (index, owner) in expected.into_iter().enumerate() {
            assert_eq!(locate_owner(index, 10, 4).unwrap(), owner);
        }
    }

    #[test]
    fn test_fewer_entities_than_processes() {
        // 3 entities over 5 ranks: ranks 3 and 4 own nothing
        assert_eq!(
            distribution(5, 3),
            vec![(0, 1), (1, 2), (2, 3), (3, 3), (3, 3)]
        );
        assert_eq!(locate_owner(2, 3, 5).unwrap(), 2);
    }

    #[test]
    fn test_partition_coverage() {
        for global_count in 0..=50 {
            for size in 1..=8 {
                let ranges = compute_ranges(global_count, size).unwrap();
                let mut next = 0;
                for range in &ranges {
                    assert_eq!(range.start, next, "gap or overlap at N={global_count} P={size}");
                    next = range.stop;
                }
                assert_eq!(next, global_count);
                assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), global_count);
            }
        }
    }

    #[test]
    fn test_owner_range_duality() {
        for global_count in 0..=50 {
            for size in 1..=8 {
                let ranges = compute_ranges(global_count, size).unwrap();
                for index in 0..global_count {
                    let owner = locate_owner(index, global_count, size).unwrap();
                    assert!(ranges[owner].contains(index));
                    assert_eq!(
                        ranges.iter().filter(|r| r.contains(index)).count(),
                        1,
                        "index {index} owned more than once"
                    );
                }
            }
        }
    }

    #[test]
    fn test_remainder_fairness() {
        let sizes: Vec<usize> = compute_ranges(10, 3)
            .unwrap()
            .iter()
            .map(|r| r.len())
            .collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        for global_count in 0..=50 {
            for size in 1..=8 {
                let leftover = global_count % size;
                let ranges = compute_ranges(global_count, size).unwrap();
                for (rank, range) in ranges.iter().enumerate() {
                    let extra = if rank < leftover { 1 } else { 0 };
                    assert_eq!(range.len(), global_count / size + extra);
                }
            }
        }
    }

    #[test]
    fn test_local_index() {
        let range = compute_range(10, 3, 1).unwrap();
        assert_eq!(range, PartitionRange::from((4, 7)));
        assert_eq!(range.local_index(4).unwrap(), 0);
        assert_eq!(range.local_index(6).unwrap(), 2);
        assert_eq!(
            range.local_index(7),
            Err(PartitionError::NotOwned {
                index: 7,
                start: 4,
                stop: 7
            })
        );
        assert!(range.local_index(3).is_err());
        assert_eq!(Range::from(range), 4..7);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let range = PartitionRange::from((5, 2));
        assert_eq!(range.len(), 0);
        assert!(range.is_empty());
        assert!(!range.contains(3));
        assert!(range.local_index(5).is_err());
    }

    #[test]
    fn test_entity_distribution() {
        let topology = ProcessTopology::new(3, 2).unwrap();
        let dist = EntityDistribution::new(10, 7, topology).unwrap();

        assert_eq!(dist.vertex_range(), PartitionRange::from((7, 10)));
        assert_eq!(dist.cell_range(), PartitionRange::from((5, 7)));
        assert_eq!(dist.vertex_range(), compute_range(10, 3, 2).unwrap());
        assert_eq!(dist.cell_range(), compute_range(7, 3, 2).unwrap());

        assert_eq!(dist.vertex_owner(3).unwrap(), 0);
        assert_eq!(dist.cell_owner(2).unwrap(), 0);
        assert_eq!(dist.cell_owner(3).unwrap(), 1);
        assert_eq!(dist.cell_owner(6).unwrap(), 2);

        assert_eq!(dist.local_vertex_index(8).unwrap(), 1);
        assert_eq!(dist.local_cell_index(5).unwrap(), 0);
        assert!(dist.local_cell_index(4).is_err());
    }

    #[test]
    fn test_entity_distribution_matches_compute_range() {
        for (vertices, cells) in [(0, 0), (3, 1), (11, 10), (50, 37)] {
            for size in 1..=8 {
                for rank in 0..size {
                    let topology = ProcessTopology::new(size, rank).unwrap();
                    let dist = EntityDistribution::new(vertices, cells, topology).unwrap();
                    assert_eq!(
                        dist.vertex_range(),
                        compute_range(vertices, size, rank).unwrap()
                    );
                    assert_eq!(dist.cell_range(), compute_range(cells, size, rank).unwrap());
                    for cell in dist.cell_range().iter() {
                        assert_eq!(dist.cell_owner(cell).unwrap(), rank);
                    }
                }
            }
        }
    }
}
