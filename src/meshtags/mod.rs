mod config;
mod error;
mod filter;
mod mpicommlayer;
mod offset;
mod partition;
mod simulated;
mod store;
mod topology;
mod traits;
mod writer;
mod xdmf;

pub use traits::*;

pub use config::*;
pub use error::*;
pub use filter::*;
pub use offset::*;
pub use partition::*;
pub use simulated::*;
pub use store::*;
pub use topology::*;
pub use writer::*;
pub use xdmf::*;

// Helper functions

/// Given a list of counts, create a list of displacements
fn displs_from_counts(counts: &[i64]) -> Vec<i64> {
    counts
        .iter()
        .scan(0, |acc, &x| {
            let tmp = *acc;
            *acc += x;
            Some(tmp)
        })
        .collect()
}
