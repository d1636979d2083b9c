use log::trace;
use mpi::collective::SystemOperation;
use mpi::topology::{Communicator, SimpleCommunicator};
use mpi::traits::CommunicatorCollectives;

use super::CollectiveChannel;

/// [`CollectiveChannel`] backed by an MPI communicator
pub struct MpiChannel<'mpi> {
    communicator: &'mpi SimpleCommunicator,
}

impl<'mpi> MpiChannel<'mpi> {
    pub fn new(communicator: &'mpi SimpleCommunicator) -> Self {
        Self { communicator }
    }

    pub fn communicator(&self) -> &'mpi SimpleCommunicator {
        self.communicator
    }
}

impl CollectiveChannel for MpiChannel<'_> {
    fn rank(&self) -> usize {
        self.communicator.rank() as usize
    }

    fn size(&self) -> usize {
        self.communicator.size() as usize
    }

    fn sum_reduce(&self, local: i64) -> anyhow::Result<i64> {
        let mut sum = 0i64;
        self.communicator
            .all_reduce_into(&local, &mut sum, SystemOperation::sum());
        trace!("all_reduce(sum) of {}: {}", local, sum);
        Ok(sum)
    }

    fn exclusive_scan(&self, local: i64) -> anyhow::Result<i64> {
        let mut offset = 0i64;
        self.communicator
            .exclusive_scan_into(&local, &mut offset, SystemOperation::sum());

        // MPI leaves the receive buffer of rank 0 undefined
        if self.communicator.rank() == 0 {
            offset = 0;
        }
        trace!("exclusive_scan(sum) of {}: {}", local, offset);
        Ok(offset)
    }
}
