use anyhow::Context;
use log::{debug, error, info};

use super::{
    compute_window, owned_slices, AttributeRecord, AttributeType, Center, CollectiveChannel,
    DataItem, GlobalWriteWindow, IoMode, MeshTopology, ParallelStore, PartitionError, TagValue,
    TopologyWriter, WriterConfig, XdmfGrid,
};

/// Values attached to a subset of the local entities of one dimension.
///
/// `entities` are local indices, ascending, owned entities before ghosts;
/// `values[i]` belongs to `entities[i]`.
#[derive(Debug, Clone, Copy)]
pub struct TaggedEntities<'a, T> {
    pub name: &'a str,
    pub dim: usize,
    pub entities: &'a [usize],
    pub values: &'a [T],
}

/// Writes tagged entity sets of every rank into one globally ordered dataset
pub struct MeshTagsWriter<'a, C: CollectiveChannel, S: ParallelStore, W: TopologyWriter> {
    channel: &'a C,
    store: &'a S,
    topology_writer: &'a W,
    config: WriterConfig,
}

impl<'a, C: CollectiveChannel, S: ParallelStore, W: TopologyWriter> MeshTagsWriter<'a, C, S, W> {
    pub const VALUES: &'static str = "Values";

    pub fn new(channel: &'a C, store: &'a S, topology_writer: &'a W, config: WriterConfig) -> Self {
        info!(
            "Creating MeshTagsWriter on rank {} of {} below {}",
            channel.rank(),
            channel.size(),
            config.root
        );
        Self {
            channel,
            store,
            topology_writer,
            config,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Collective: every rank of the channel must call this for the same tag set.
    ///
    /// Ghost entries are dropped, the topology of the owned entities and their values are
    /// written at this rank's window, and an attribute record is appended to `grid`.
    pub fn write<T: TagValue, M: MeshTopology>(
        &self,
        tags: &TaggedEntities<'_, T>,
        mesh: &M,
        grid: &mut XdmfGrid,
    ) -> anyhow::Result<GlobalWriteWindow> {
        info!(
            "Writing tag set {} ({} local entities of dimension {})",
            tags.name,
            tags.entities.len(),
            tags.dim
        );

        // everything a single rank can get wrong is checked before the first collective
        Self::check_tags(tags, mesh)?;
        let local_owned_count = mesh.local_owned_count(tags.dim);
        let (owned_entities, owned_values) = owned_slices(
            tags.entities,
            tags.values,
            local_owned_count,
            self.config.validate_input,
        )
        .with_context(|| format!("filtering ghosts of tag set {}", tags.name))?;
        debug!(
            "{} of {} tagged entities are owned (local owned count {})",
            owned_entities.len(),
            tags.entities.len(),
            local_owned_count
        );

        let path_prefix = self.config.path_prefix(tags.name);
        self.topology_writer
            .write_topology(
                self.channel,
                self.store,
                &path_prefix,
                mesh,
                tags.dim,
                owned_entities,
            )
            .with_context(|| format!("writing topology of tag set {}", tags.name))?;

        let window = compute_window(owned_values.len(), self.channel)?;

        let path = format!("{}/{}", path_prefix, Self::VALUES);
        let shape = [window.global_total, 1];
        let mode = IoMode::for_size(self.channel.size());
        self.store
            .create_dataset(&path, shape, T::ELEMENT_TYPE)
            .with_context(|| format!("creating {}", path))?;
        self.store
            .write_at(&path, window.offset, owned_values, mode)
            .with_context(|| format!("writing {}", path))?;
        debug!("Values written to {} at {:?} ({:?})", path, window, mode);

        grid.push(AttributeRecord {
            name: tags.name.to_string(),
            attribute_type: AttributeType::Scalar,
            center: Center::Cell,
            data_item: DataItem {
                path,
                offset: window.offset,
                shape,
                element_type: T::ELEMENT_TYPE,
            },
        });

        info!("Tag set {} written: {:?}", tags.name, window);
        Ok(window)
    }

    fn check_tags<T, M: MeshTopology>(
        tags: &TaggedEntities<'_, T>,
        mesh: &M,
    ) -> anyhow::Result<()> {
        if tags.name.is_empty() || tags.name.contains('/') {
            let err = PartitionError::InvalidArgument(format!(
                "tag set name {:?} must be non empty and contain no '/'",
                tags.name
            ));
            error!("{}", err);
            return Err(err.into());
        }

        let tdim = mesh.topological_dimension();
        if tags.dim > tdim {
            let err = PartitionError::InvalidArgument(format!(
                "dimension {} exceeds topological dimension {}",
                tags.dim, tdim
            ));
            error!("{}", err);
            return Err(err.into());
        }
        Ok(())
    }
}

/// Write one tag set with a throwaway [`MeshTagsWriter`]
#[allow(clippy::too_many_arguments)]
pub fn write_tagged_entities<T, C, S, M, W>(
    entities: &[usize],
    values: &[T],
    dim: usize,
    name: &str,
    mesh: &M,
    topology_writer: &W,
    store: &S,
    channel: &C,
    config: WriterConfig,
    grid: &mut XdmfGrid,
) -> anyhow::Result<GlobalWriteWindow>
where
    T: TagValue,
    C: CollectiveChannel,
    S: ParallelStore,
    M: MeshTopology,
    W: TopologyWriter,
{
    let tags = TaggedEntities {
        name,
        dim,
        entities,
        values,
    };
    MeshTagsWriter::new(channel, store, topology_writer, config).write(&tags, mesh, grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DistributedEntities, ElementType, EntityIndexTopologyWriter, MemoryStore, ProcessTopology,
        SingleProcess,
    };

    fn serial_mesh() -> DistributedEntities {
        DistributedEntities::new(&[6, 4], ProcessTopology::new(1, 0).unwrap()).unwrap()
    }

    #[test]
    fn test_serial_write() {
        let mesh = serial_mesh();
        let store = MemoryStore::new();
        let mut grid = XdmfGrid::new("mesh", "mesh.h5");

        let window = write_tagged_entities(
            &[0, 2, 3],
            &[10i32, 20, 30],
            1,
            "material",
            &mesh,
            &EntityIndexTopologyWriter,
            &store,
            &SingleProcess,
            WriterConfig::default(),
            &mut grid,
        )
        .unwrap();

        assert_eq!(
            window,
            GlobalWriteWindow {
                offset: 0,
                len: 3,
                global_total: 3
            }
        );
        assert_eq!(
            store.read::<i32>("/MeshTags/material/Values").unwrap(),
            vec![10, 20, 30]
        );
        assert_eq!(
            store.read::<i64>("/MeshTags/material/Topology").unwrap(),
            vec![0, 2, 3]
        );
        assert_eq!(
            store.last_mode("/MeshTags/material/Values"),
            Some(IoMode::Independent)
        );
        assert_eq!(
            store.last_mode("/MeshTags/material/Topology"),
            Some(IoMode::Independent)
        );

        let record = grid.attribute("material").unwrap();
        assert_eq!(record.center, Center::Cell);
        assert_eq!(record.attribute_type, AttributeType::Scalar);
        assert_eq!(
            record.data_item,
            DataItem {
                path: "/MeshTags/material/Values".into(),
                offset: 0,
                shape: [3, 1],
                element_type: ElementType::Int32,
            }
        );
    }

    #[test]
    fn test_vertex_tags_are_cell_centered() {
        let mesh = serial_mesh();
        let store = MemoryStore::new();
        let mut grid = XdmfGrid::new("mesh", "mesh.h5");
        let writer = MeshTagsWriter::new(
            &SingleProcess,
            &store,
            &EntityIndexTopologyWriter,
            WriterConfig::default().with_root("/Tags").unwrap(),
        );

        writer
            .write(
                &TaggedEntities {
                    name: "boundary",
                    dim: 0,
                    entities: &[1, 5],
                    values: &[0.5f64, 1.5],
                },
                &mesh,
                &mut grid,
            )
            .unwrap();

        // one value per tagged vertex, not per mesh point
        let record = grid.attribute("boundary").unwrap();
        assert_eq!(record.center, Center::Cell);
        assert!(grid.to_xml().contains("Center=\"Cell\""));
        assert!(!grid.to_xml().contains("Center=\"Node\""));
        assert_eq!(
            store.read::<f64>("/Tags/boundary/Values").unwrap(),
            vec![0.5, 1.5]
        );
    }

    #[test]
    fn test_ghosts_are_dropped() {
        // local indices 4 and 5 are ghosts of cells owned elsewhere
        let mesh = DistributedEntities::new(&[6, 8], ProcessTopology::new(2, 0).unwrap())
            .unwrap()
            .with_ghosts(1, &[4, 7])
            .unwrap();
        assert_eq!(mesh.local_owned_count(1), 4);

        let store = MemoryStore::new();
        let mut grid = XdmfGrid::new("mesh", "mesh.h5");
        let tags = TaggedEntities {
            name: "t",
            dim: 1,
            entities: &[1, 3, 4, 5],
            values: &[1i64, 3, 4, 5],
        };
        let writer = MeshTagsWriter::new(
            &SingleProcess,
            &store,
            &EntityIndexTopologyWriter,
            WriterConfig::default(),
        );
        let window = writer.write(&tags, &mesh, &mut grid).unwrap();

        assert_eq!(window.len, 2);
        assert_eq!(store.read::<i64>("/MeshTags/t/Values").unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_bad_input_fails_before_any_write() {
        let mesh = serial_mesh();
        let store = MemoryStore::new();
        let mut grid = XdmfGrid::new("mesh", "mesh.h5");
        let config = WriterConfig::default().with_validation(true);

        // unsorted
        assert!(write_tagged_entities(
            &[2, 0],
            &[1i32, 2],
            1,
            "x",
            &mesh,
            &EntityIndexTopologyWriter,
            &store,
            &SingleProcess,
            config.clone(),
            &mut grid,
        )
        .is_err());

        // dimension beyond the mesh
        assert!(write_tagged_entities(
            &[0],
            &[1i32],
            2,
            "x",
            &mesh,
            &EntityIndexTopologyWriter,
            &store,
            &SingleProcess,
            config.clone(),
            &mut grid,
        )
        .is_err());

        // nested name
        assert!(write_tagged_entities(
            &[0],
            &[1i32],
            1,
            "a/b",
            &mesh,
            &EntityIndexTopologyWriter,
            &store,
            &SingleProcess,
            config,
            &mut grid,
        )
        .is_err());

        assert!(store.paths().is_empty());
        assert!(grid.attributes().is_empty());
    }
}
