//! Parallel store backends: a thread-shared in-memory store for simulated ranks and a
//! raw file store written with positioned writes for real multi-process runs.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use log::{debug, error, info, trace};

use super::{IoMode, ParallelStore, StoreError};

/// Numeric type of the elements of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int32,
    Int64,
    Float64,
}

impl ElementType {
    /// bytes per element
    pub fn size(&self) -> usize {
        match self {
            ElementType::Int32 => 4,
            ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    /// XDMF `NumberType`
    pub fn number_type(&self) -> &'static str {
        match self {
            ElementType::Int32 | ElementType::Int64 => "Int",
            ElementType::Float64 => "Float",
        }
    }

    fn code(&self) -> u64 {
        match self {
            ElementType::Int32 => 1,
            ElementType::Int64 => 2,
            ElementType::Float64 => 3,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(ElementType::Int32),
            2 => Some(ElementType::Int64),
            3 => Some(ElementType::Float64),
            _ => None,
        }
    }
}

/// Scalar that can be stored in a dataset, little endian on disk
pub trait TagValue: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;

    fn encode(&self, out: &mut Vec<u8>);

    /// `bytes` holds exactly one element
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_tag_value {
    ($t:ty, $element:expr) => {
        impl TagValue for $t {
            const ELEMENT_TYPE: ElementType = $element;

            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_tag_value!(i32, ElementType::Int32);
impl_tag_value!(i64, ElementType::Int64);
impl_tag_value!(f64, ElementType::Float64);

fn encode_all<T: TagValue>(data: &[T]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * T::ELEMENT_TYPE.size());
    data.iter().for_each(|v| v.encode(&mut bytes));
    bytes
}

fn decode_all<T: TagValue>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::ELEMENT_TYPE.size())
        .map(T::decode)
        .collect()
}

fn check_element_type<T: TagValue>(path: &str, existing: ElementType) -> Result<(), StoreError> {
    if existing != T::ELEMENT_TYPE {
        return Err(StoreError::ElementTypeMismatch {
            path: path.to_string(),
            existing,
            requested: T::ELEMENT_TYPE,
        });
    }
    Ok(())
}

/// Number of whole rows in `len` elements, and the check that they fit at `offset`
fn rows_in_window(
    path: &str,
    shape: [usize; 2],
    offset: usize,
    len: usize,
) -> Result<usize, StoreError> {
    let width = shape[1].max(1);
    let rows = len / width;
    if len % width != 0 || offset + rows > shape[0] {
        let err = StoreError::OutOfBounds {
            path: path.to_string(),
            offset,
            len: rows + usize::from(len % width != 0),
            rows: shape[0],
        };
        error!("{}", err);
        return Err(err);
    }
    Ok(rows)
}

#[derive(Debug)]
struct Dataset {
    shape: [usize; 2],
    element_type: ElementType,
    bytes: Vec<u8>,
    last_mode: Option<IoMode>,
}

/// In-memory store shared by the threads of a simulated world
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: Mutex<IndexMap<String, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// dataset paths, in creation order
    pub fn paths(&self) -> Vec<String> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// I/O mode of the most recent write to `path`, `None` if it was never written
    pub fn last_mode(&self, path: &str) -> Option<IoMode> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .and_then(|d| d.last_mode)
    }
}

impl ParallelStore for MemoryStore {
    fn create_dataset(
        &self,
        path: &str,
        shape: [usize; 2],
        element_type: ElementType,
    ) -> Result<(), StoreError> {
        let mut datasets = self.datasets.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = datasets.get(path) {
            if existing.shape != shape {
                return Err(StoreError::ShapeMismatch {
                    path: path.to_string(),
                    existing: existing.shape,
                    requested: shape,
                });
            }
            if existing.element_type != element_type {
                return Err(StoreError::ElementTypeMismatch {
                    path: path.to_string(),
                    existing: existing.element_type,
                    requested: element_type,
                });
            }
            trace!("Dataset {} already created", path);
            return Ok(());
        }

        debug!("Creating dataset {} with shape {:?}", path, shape);
        datasets.insert(
            path.to_string(),
            Dataset {
                shape,
                element_type,
                bytes: vec![0; shape[0] * shape[1] * element_type.size()],
                last_mode: None,
            },
        );
        Ok(())
    }

    fn write_at<T: TagValue>(
        &self,
        path: &str,
        offset: usize,
        data: &[T],
        mode: IoMode,
    ) -> Result<(), StoreError> {
        let mut datasets = self.datasets.lock().unwrap_or_else(|e| e.into_inner());
        let dataset = datasets
            .get_mut(path)
            .ok_or_else(|| StoreError::DatasetNotFound(path.to_string()))?;
        check_element_type::<T>(path, dataset.element_type)?;
        rows_in_window(path, dataset.shape, offset, data.len())?;

        let start = offset * dataset.shape[1] * T::ELEMENT_TYPE.size();
        let bytes = encode_all(data);
        dataset.bytes[start..start + bytes.len()].copy_from_slice(&bytes);
        dataset.last_mode = Some(mode);
        trace!(
            "Wrote {} elements to {} at row {} ({:?})",
            data.len(),
            path,
            offset,
            mode
        );
        Ok(())
    }

    fn read<T: TagValue>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        let datasets = self.datasets.lock().unwrap_or_else(|e| e.into_inner());
        let dataset = datasets
            .get(path)
            .ok_or_else(|| StoreError::DatasetNotFound(path.to_string()))?;
        check_element_type::<T>(path, dataset.element_type)?;
        Ok(decode_all(&dataset.bytes))
    }

    fn shape(&self, path: &str) -> Result<[usize; 2], StoreError> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .map(|d| d.shape)
            .ok_or_else(|| StoreError::DatasetNotFound(path.to_string()))
    }
}

// type code, rows, width
const HEADER_LEN: u64 = 24;

/// One raw file per dataset below `root`, with a fixed header followed by the
/// little endian elements. Ranks write disjoint byte ranges with positioned writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `/MeshTags/a/Values` maps to `<root>/MeshTags/a/Values.bin`
    fn file_path(&self, path: &str) -> PathBuf {
        let mut file = self.root.clone();
        file.extend(path.split('/').filter(|part| !part.is_empty()));
        file.set_extension("bin");
        file
    }

    fn open_existing(&self, path: &str, write: bool) -> Result<File, StoreError> {
        let file_path = self.file_path(path);
        OpenOptions::new()
            .read(true)
            .write(write)
            .open(&file_path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::DatasetNotFound(path.to_string()),
                _ => StoreError::Io(e),
            })
    }

    fn read_header(
        path: &str,
        file: &File,
    ) -> Result<Option<([usize; 2], ElementType)>, StoreError> {
        if file.metadata()?.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact_at(&mut header, 0)?;

        let field = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&header[i * 8..(i + 1) * 8]);
            u64::from_le_bytes(buf)
        };
        // a zeroed header belongs to a file another rank is still creating
        if field(0) == 0 {
            return Ok(None);
        }
        let element_type = ElementType::from_code(field(0)).ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} has an unknown element type", path),
            ))
        })?;
        Ok(Some(([field(1) as usize, field(2) as usize], element_type)))
    }

    fn header_of(&self, path: &str, file: &File) -> Result<([usize; 2], ElementType), StoreError> {
        Self::read_header(path, file)?.ok_or_else(|| StoreError::DatasetNotFound(path.to_string()))
    }
}

impl ParallelStore for FileStore {
    fn create_dataset(
        &self,
        path: &str,
        shape: [usize; 2],
        element_type: ElementType,
    ) -> Result<(), StoreError> {
        let file_path = self.file_path(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // every rank runs this, so never truncate
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&file_path)?;

        if let Some((existing, existing_type)) = Self::read_header(path, &file)? {
            if existing != shape {
                return Err(StoreError::ShapeMismatch {
                    path: path.to_string(),
                    existing,
                    requested: shape,
                });
            }
            if existing_type != element_type {
                return Err(StoreError::ElementTypeMismatch {
                    path: path.to_string(),
                    existing: existing_type,
                    requested: element_type,
                });
            }
        }

        let header: Vec<u8> = [element_type.code(), shape[0] as u64, shape[1] as u64]
            .iter()
            .flat_map(|field| field.to_le_bytes())
            .collect();
        file.write_all_at(&header, 0)?;
        file.set_len(HEADER_LEN + (shape[0] * shape[1] * element_type.size()) as u64)?;
        debug!(
            "Created dataset {} at {} with shape {:?}",
            path,
            file_path.display(),
            shape
        );
        Ok(())
    }

    fn write_at<T: TagValue>(
        &self,
        path: &str,
        offset: usize,
        data: &[T],
        mode: IoMode,
    ) -> Result<(), StoreError> {
        let file = self.open_existing(path, true)?;
        let (shape, element_type) = self.header_of(path, &file)?;
        check_element_type::<T>(path, element_type)?;
        rows_in_window(path, shape, offset, data.len())?;

        let position = HEADER_LEN + (offset * shape[1] * element_type.size()) as u64;
        file.write_all_at(&encode_all(data), position)?;
        if mode == IoMode::Collective {
            // peers read back only after the next collective, make the bytes visible
            file.sync_data()?;
        }
        info!(
            "Wrote {} elements to {} at row {} ({:?})",
            data.len(),
            path,
            offset,
            mode
        );
        Ok(())
    }

    fn read<T: TagValue>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        let file = self.open_existing(path, false)?;
        let (shape, element_type) = self.header_of(path, &file)?;
        check_element_type::<T>(path, element_type)?;

        let mut bytes = vec![0u8; shape[0] * shape[1] * element_type.size()];
        file.read_exact_at(&mut bytes, HEADER_LEN)?;
        Ok(decode_all(&bytes))
    }

    fn shape(&self, path: &str) -> Result<[usize; 2], StoreError> {
        let file = self.open_existing(path, false)?;
        Ok(self.header_of(path, &file)?.0)
    }
}
