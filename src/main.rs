use distributed_meshtags::{
    DistributedEntities, EntityIndexTopologyWriter, FileStore, MeshTagsWriter, MeshTopology,
    MpiChannel, ParallelStore, ProcessTopology, TaggedEntities, WriterConfig, XdmfGrid,
};

use anyhow::Context;
use log::info;
use mpi::traits::{Communicator, CommunicatorCollectives};

/// Tag value of every listed local cell: ten times its global index
fn cell_values<M: MeshTopology>(mesh: &M, cells: &[usize]) -> anyhow::Result<Vec<i32>> {
    cells
        .iter()
        .map(|&local| -> anyhow::Result<i32> {
            let global = mesh
                .local_to_global(1, local)
                .with_context(|| format!("local cell {} has no global index", local))?;
            i32::try_from(global * 10).context("tag value does not fit in i32")
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let (_universe, world) = distributed_meshtags::init()?;
    let rank = world.rank() as usize;
    let size = world.size() as usize;

    // usage: meshtags [cells] [output dir]
    let mut args = std::env::args().skip(1);
    let global_cells: usize = match args.next() {
        Some(arg) => arg.parse().context("number of cells")?,
        None => 10,
    };
    let out_dir = args.next().unwrap_or_else(|| "meshtags_out".to_string());

    // 1D mesh: cell i joins vertices i and i + 1; keep the neighbouring cells as ghosts
    let topology = ProcessTopology::new(size, rank)?;
    let owned = distributed_meshtags::compute_range(global_cells, size, rank)?;
    let ghosts: Vec<usize> = [owned.start.checked_sub(1), Some(owned.stop)]
        .into_iter()
        .flatten()
        .filter(|&c| c < global_cells && !owned.contains(c))
        .collect();
    let mesh = DistributedEntities::new(&[global_cells + 1, global_cells], topology)?
        .with_ghosts(1, &ghosts)?;

    let entities: Vec<usize> = (0..mesh.local_count(1)).collect();
    let values = cell_values(&mesh, &entities)?;
    info!(
        "Rank {} holds {} cells ({} ghosts)",
        rank,
        entities.len(),
        ghosts.len()
    );

    let channel = MpiChannel::new(&world);
    let store = FileStore::new(&out_dir);
    let writer = MeshTagsWriter::new(
        &channel,
        &store,
        &EntityIndexTopologyWriter,
        WriterConfig::from_env()?,
    );
    let mut grid = XdmfGrid::new("mesh", "mesh.h5");
    let tags = TaggedEntities {
        name: "cell_tags",
        dim: 1,
        entities: &entities,
        values: &values,
    };
    writer.write(&tags, &mesh, &mut grid)?;

    world.barrier();

    if rank == 0 {
        let path = format!("{}/cell_tags/Values", writer.config().root);
        let written = store.read::<i32>(&path)?;
        println!("{}", grid.to_xml());
        println!("{} = {:?}", path, written);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_values() {
        let mesh = DistributedEntities::new(&[7, 6], ProcessTopology::new(2, 1).unwrap())
            .unwrap()
            .with_ghosts(1, &[2])
            .unwrap();
        // owned cells 3..6, then ghost 2
        assert_eq!(cell_values(&mesh, &[0, 2, 3]).unwrap(), vec![30, 50, 20]);
        assert!(cell_values(&mesh, &[4]).is_err());
    }
}
