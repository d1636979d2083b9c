//! In-process stand-ins for a communicator: a trivial single rank channel and a
//! group of simulated ranks running as threads of the current process.

use std::sync::{Arc, Barrier, Mutex};

use anyhow::anyhow;
use log::{debug, trace};

use super::{displs_from_counts, CollectiveChannel, PartitionError};

/// Channel for a group of exactly one process
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl CollectiveChannel for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum_reduce(&self, local: i64) -> anyhow::Result<i64> {
        Ok(local)
    }

    fn exclusive_scan(&self, _local: i64) -> anyhow::Result<i64> {
        Ok(0)
    }
}

// one slot per rank, reused by every collective
struct Exchange {
    slots: Mutex<Vec<i64>>,
    barrier: Barrier,
}

/// A fixed group of simulated ranks sharing one process.
///
/// Collectives behave like the real thing: a call blocks until every rank of the
/// group has made the same call.
pub struct SimulatedWorld {
    size: usize,
    shared: Arc<Exchange>,
}

impl SimulatedWorld {
    pub fn new(size: usize) -> Result<Self, PartitionError> {
        if size == 0 {
            return Err(PartitionError::InvalidArgument(
                "a simulated world needs at least one rank".into(),
            ));
        }
        debug!("Creating simulated world with {} ranks", size);
        Ok(Self {
            size,
            shared: Arc::new(Exchange {
                slots: Mutex::new(vec![0; size]),
                barrier: Barrier::new(size),
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// One channel per rank, in rank order
    pub fn channels(&self) -> Vec<SimulatedChannel> {
        (0..self.size)
            .map(|rank| SimulatedChannel {
                rank,
                size: self.size,
                shared: Arc::clone(&self.shared),
            })
            .collect()
    }

    /// Run `f` on every rank in its own thread and collect the results in rank order
    pub fn run<F, R>(&self, f: F) -> Vec<R>
    where
        F: Fn(SimulatedChannel) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .channels()
                .into_iter()
                .map(|channel| scope.spawn(move || f(channel)))
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// One rank's handle into a [`SimulatedWorld`]
#[derive(Clone)]
pub struct SimulatedChannel {
    rank: usize,
    size: usize,
    shared: Arc<Exchange>,
}

impl SimulatedChannel {
    /// Every rank deposits its value, then everyone reads the full table
    fn all_gather(&self, local: i64) -> anyhow::Result<Vec<i64>> {
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| anyhow!("simulated exchange poisoned"))?;
            slots[self.rank] = local;
        }
        self.shared.barrier.wait();

        let gathered = self
            .shared
            .slots
            .lock()
            .map_err(|_| anyhow!("simulated exchange poisoned"))?
            .clone();

        // nobody may overwrite a slot before all ranks have read it
        self.shared.barrier.wait();

        trace!("Rank {} gathered {:?}", self.rank, gathered);
        Ok(gathered)
    }
}

impl CollectiveChannel for SimulatedChannel {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn sum_reduce(&self, local: i64) -> anyhow::Result<i64> {
        Ok(self.all_gather(local)?.iter().sum())
    }

    fn exclusive_scan(&self, local: i64) -> anyhow::Result<i64> {
        let gathered = self.all_gather(local)?;
        Ok(displs_from_counts(&gathered)[self.rank])
    }
}
