use crate::accessor::DatasetAccessor;
use crate::error::GridMetaError;
use crate::metadata::*;
use anyhow::{Context, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A Zarr v2 store on the local filesystem.
pub struct ZarrStore {
    path: PathBuf,
}

impl ZarrStore {
    /// Create a new ZarrStore from a directory path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Zarr store path '{}' does not exist",
                path.display()
            ));
        }

        if !path.is_dir() {
            return Err(anyhow::anyhow!(
                "Path '{}' is not a directory. Zarr stores must be directories containing .zarray, .zgroup, or .zmetadata files.",
                path.display()
            ));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load metadata from the Zarr store, attempting consolidated read first
    pub async fn load_metadata(&self) -> Result<ZarrMetadata> {
        match self.load_consolidated_metadata().await {
            Ok(metadata) => {
                debug!(store = %self.path.display(), "loaded consolidated metadata");
                Ok(metadata)
            }
            Err(e) => {
                debug!(error = %e, "no usable consolidated metadata, scanning arrays");
                self.load_hierarchical_metadata().await
            }
        }
    }

    async fn load_consolidated_metadata(&self) -> Result<ZarrMetadata> {
        let zmetadata_path = self.path.join(".zmetadata");

        let data = tokio::fs::read(&zmetadata_path)
            .await
            .with_context(|| format!("No consolidated metadata at '{}'", zmetadata_path.display()))?;

        let consolidated: ConsolidatedMetadata = serde_json::from_slice(&data).with_context(|| {
            format!(
                "Invalid consolidated metadata JSON at '{}'",
                zmetadata_path.display()
            )
        })?;

        Self::parse_consolidated_metadata(consolidated)
    }

    /// Every top-level array of the store becomes a variable; nested groups
    /// are not part of a gridded dataset and are ignored.
    fn parse_consolidated_metadata(consolidated: ConsolidatedMetadata) -> Result<ZarrMetadata> {
        let mut metadata = ZarrMetadata::new();
        metadata.consolidated = true;

        if let Some(root) = consolidated.metadata.get(".zattrs") {
            metadata.global_attributes = serde_json::from_value(root.clone())
                .context("Failed to parse root .zattrs in consolidated metadata")?;
        }

        for (key, value) in &consolidated.metadata {
            let Some(name) = key.strip_suffix("/.zarray") else {
                continue;
            };
            if name.contains('/') {
                debug!(array = %name, "skipping nested array");
                continue;
            }

            let zarray: ZArrayMetadata = serde_json::from_value(value.clone())
                .with_context(|| format!("Failed to parse .zarray for '{}'", name))?;
            let attributes = consolidated
                .metadata
                .get(&format!("{}/.zattrs", name))
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()
                .with_context(|| format!("Failed to parse .zattrs for '{}'", name))?
                .unwrap_or_default();

            metadata
                .variables
                .insert(name.to_string(), Self::variable_from_zarray(name, zarray, attributes));
        }

        metadata.resolve_dimensions();
        Ok(metadata)
    }

    async fn load_hierarchical_metadata(&self) -> Result<ZarrMetadata> {
        let mut metadata = ZarrMetadata::new();

        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .with_context(|| format!("Failed to read directory: {}", self.path.display()))?;

        let mut array_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') && entry.path().join(".zarray").is_file() {
                array_names.push(name);
            }
        }

        for name in array_names {
            let variable = self.load_array_metadata(&name).await?;
            metadata.variables.insert(name, variable);
        }

        metadata.global_attributes = read_attributes(&self.path.join(".zattrs")).await?;

        if metadata.variables.is_empty() && !self.path.join(".zgroup").is_file() {
            return Err(anyhow::anyhow!(
                "No Zarr arrays or groups found in '{}'. The directory must contain .zarray, .zgroup, or .zmetadata files to be a valid Zarr store.",
                self.path.display()
            ));
        }

        metadata.resolve_dimensions();
        Ok(metadata)
    }

    async fn load_array_metadata(&self, name: &str) -> Result<Variable> {
        let zarray_path = self.path.join(name).join(".zarray");

        let array_data = tokio::fs::read(&zarray_path)
            .await
            .with_context(|| format!("Missing .zarray file for variable '{}'", name))?;

        let zarray: ZArrayMetadata = serde_json::from_slice(&array_data).with_context(|| {
            format!(
                "Invalid .zarray JSON format for variable '{}' at '{}'",
                name,
                zarray_path.display()
            )
        })?;

        let attributes = read_attributes(&self.path.join(name).join(".zattrs")).await?;
        Ok(Self::variable_from_zarray(name, zarray, attributes))
    }

    fn variable_from_zarray(name: &str, zarray: ZArrayMetadata, attributes: AttributeMap) -> Variable {
        let compressor = zarray
            .compressor
            .as_ref()
            .and_then(|c| c.get("id"))
            .and_then(|id| id.as_str())
            .map(|s| s.to_string());

        let has_filters = zarray.filters.as_ref().is_some_and(|f| !f.is_empty());
        if has_filters {
            debug!(array = %name, "array uses filters");
        }

        Variable {
            name: name.to_string(),
            path: name.to_string(),
            dtype: zarray.dtype,
            shape: zarray.shape,
            chunks: zarray.chunks,
            compressor: compressor.or_else(|| has_filters.then(|| "filters".to_string())),
            order: zarray.order,
            dimension_separator: zarray.dimension_separator.unwrap_or_else(|| ".".to_string()),
            attributes,
            dimensions: vec![],
        }
    }

    /// Read a whole array as f64, row-major.
    pub fn read_array_f64(&self, variable: &Variable) -> Result<Vec<f64>> {
        self.read_with_zarrs(variable).or_else(|err| {
            debug!(array = %variable.name, error = %err, "zarrs read failed, trying raw chunk");
            self.read_uncompressed_chunk(variable)
        })
    }

    fn read_with_zarrs(&self, variable: &Variable) -> Result<Vec<f64>> {
        use zarrs::array::{Array, ArrayBytes};
        use zarrs::array_subset::ArraySubset;
        use zarrs::storage::store::FilesystemStore;

        let store = FilesystemStore::new(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to create zarrs FilesystemStore: {}", e))?;

        let array_path = format!("/{}", variable.path);
        let array = Array::open(std::sync::Arc::new(store), &array_path)
            .map_err(|e| anyhow::anyhow!("Failed to open array '{}': {}", array_path, e))?;

        let subset = ArraySubset::new_with_shape(array.shape().to_vec());
        let array_bytes = array
            .retrieve_array_subset(&subset)
            .map_err(|e| anyhow::anyhow!("Failed to read array data: {}", e))?;

        let bytes: &[u8] = match &array_bytes {
            ArrayBytes::Variable(data, _offsets) => data.as_ref(),
            ArrayBytes::Fixed(data) => data.as_ref(),
        };

        // zarrs hands back decoded elements in native byte order
        decode_values(bytes, &native_dtype(&variable.dtype))
    }

    /// Read an array stored as one uncompressed, unfiltered, C-ordered chunk.
    fn read_uncompressed_chunk(&self, variable: &Variable) -> Result<Vec<f64>> {
        if let Some(compressor) = &variable.compressor {
            return Err(anyhow::anyhow!(
                "Variable '{}' uses compression ('{}') that could not be decoded",
                variable.name,
                compressor
            ));
        }
        if variable.chunks != variable.shape {
            return Err(anyhow::anyhow!(
                "Variable '{}' spans several chunks; only single-chunk arrays can be read without zarrs",
                variable.name
            ));
        }
        if variable.rank() > 1 && variable.order != "C" {
            return Err(anyhow::anyhow!(
                "Variable '{}' uses '{}' order; only C order can be read without zarrs",
                variable.name,
                variable.order
            ));
        }

        let key = if variable.rank() == 0 {
            "0".to_string()
        } else {
            vec!["0"; variable.rank()].join(&variable.dimension_separator)
        };
        let chunk_path = self.path.join(&variable.path).join(key);

        let buffer = std::fs::read(&chunk_path)
            .with_context(|| format!("Failed to read chunk file: {}", chunk_path.display()))?;

        let expected: usize = variable.shape.iter().product::<u64>() as usize;
        let mut values = decode_values(&buffer, &variable.dtype)?;
        if values.len() < expected {
            return Err(anyhow::anyhow!(
                "Chunk '{}' holds {} values, expected {}",
                chunk_path.display(),
                values.len(),
                expected
            ));
        }
        values.truncate(expected);
        Ok(values)
    }

    /// Merge `attributes` into the root `.zattrs`, and into the consolidated
    /// copy when the store has one. Unrelated keys are kept.
    pub async fn write_root_attributes(
        &self,
        attributes: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let zattrs_path = self.path.join(".zattrs");
        let mut root = read_json_object(&zattrs_path).await?;
        root.extend(attributes.clone());
        write_json(&zattrs_path, &serde_json::Value::Object(root)).await?;
        info!(path = %zattrs_path.display(), "wrote root attributes");

        let zmetadata_path = self.path.join(".zmetadata");
        if zmetadata_path.is_file() {
            let data = tokio::fs::read(&zmetadata_path)
                .await
                .with_context(|| format!("Failed to read {}", zmetadata_path.display()))?;
            let mut consolidated: ConsolidatedMetadata = serde_json::from_slice(&data)
                .with_context(|| format!("Invalid consolidated metadata at {}", zmetadata_path.display()))?;

            let entry = consolidated
                .metadata
                .entry(".zattrs".to_string())
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            match entry {
                serde_json::Value::Object(map) => map.extend(attributes.clone()),
                other => *other = serde_json::Value::Object(attributes.clone()),
            }

            write_json(&zmetadata_path, &serde_json::to_value(&consolidated)?).await?;
            info!(path = %zmetadata_path.display(), "updated consolidated metadata");
        }

        Ok(())
    }
}

async fn read_attributes(path: &Path) -> Result<AttributeMap> {
    match tokio::fs::read(path).await {
        Ok(data) => serde_json::from_slice(&data)
            .with_context(|| format!("Invalid attributes JSON at '{}'", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AttributeMap::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn read_json_object(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    match tokio::fs::read(path).await {
        Ok(data) => serde_json::from_slice(&data)
            .with_context(|| format!("'{}' is not a JSON object", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Default::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// The same dtype with its byte-order marker set to this machine's order.
fn native_dtype(dtype: &str) -> String {
    let kind = dtype.trim_start_matches(['<', '>', '|', '=']);
    if cfg!(target_endian = "big") {
        format!(">{}", kind)
    } else {
        format!("<{}", kind)
    }
}

/// Decode raw numeric Zarr v2 elements (`<f8`, `>i2`, `|u1`, ...) to f64.
pub fn decode_values(bytes: &[u8], dtype: &str) -> Result<Vec<f64>> {
    match dtype.chars().next() {
        Some('>') => decode_with::<BigEndian>(bytes, &dtype[1..]),
        Some('<') | Some('|') | Some('=') => decode_with::<LittleEndian>(bytes, &dtype[1..]),
        _ => decode_with::<LittleEndian>(bytes, dtype),
    }
}

fn decode_with<B: ByteOrder>(bytes: &[u8], kind: &str) -> Result<Vec<f64>> {
    let width = match kind {
        "f8" | "i8" | "u8" => 8,
        "f4" | "i4" | "u4" => 4,
        "i2" | "u2" => 2,
        "i1" | "u1" | "b1" => 1,
        _ => return Err(anyhow::anyhow!("Unsupported dtype for numeric data: {}", kind)),
    };

    let count = bytes.len() / width;
    let mut reader = Cursor::new(bytes);
    let mut values = Vec::with_capacity(count);

    for _ in 0..count {
        let value = match kind {
            "f8" => reader.read_f64::<B>()?,
            "f4" => reader.read_f32::<B>()? as f64,
            "i8" => reader.read_i64::<B>()? as f64,
            "u8" => reader.read_u64::<B>()? as f64,
            "i4" => reader.read_i32::<B>()? as f64,
            "u4" => reader.read_u32::<B>()? as f64,
            "i2" => reader.read_i16::<B>()? as f64,
            "u2" => reader.read_u16::<B>()? as f64,
            "i1" => reader.read_i8()? as f64,
            _ => reader.read_u8()? as f64,
        };
        values.push(value);
    }

    Ok(values)
}

/// A Zarr store seen through [`DatasetAccessor`].
///
/// Coordinates are 1-D arrays named after their own dimension, scalar arrays,
/// and anything listed in a `coordinates` attribute. Arrays referenced by
/// `grid_mapping` or `bounds` are neither coordinates nor data variables.
/// Coordinate values are read once when the dataset is opened.
pub struct ZarrDataset {
    store: ZarrStore,
    metadata: ZarrMetadata,
    coordinates: BTreeSet<String>,
    auxiliary: BTreeSet<String>,
    coordinate_values: HashMap<String, Vec<f64>>,
}

impl ZarrDataset {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = ZarrStore::new(path)?;
        let metadata = store
            .load_metadata()
            .await
            .with_context(|| format!("Failed to load Zarr store from '{}'", store.path().display()))?;
        Self::from_parts(store, metadata)
    }

    pub fn from_parts(store: ZarrStore, metadata: ZarrMetadata) -> Result<Self> {
        let (coordinates, auxiliary) = partition_variables(&metadata);

        let mut coordinate_values = HashMap::new();
        for name in &coordinates {
            let variable = &metadata.variables[name];
            let values = store
                .read_array_f64(variable)
                .with_context(|| format!("Failed to read coordinate '{}'", name))?;
            coordinate_values.insert(name.clone(), values);
        }

        info!(
            variables = metadata.variables.len(),
            coordinates = coordinates.len(),
            consolidated = metadata.consolidated,
            "opened dataset"
        );

        Ok(Self {
            store,
            metadata,
            coordinates,
            auxiliary,
            coordinate_values,
        })
    }

    pub fn store(&self) -> &ZarrStore {
        &self.store
    }

    pub fn metadata(&self) -> &ZarrMetadata {
        &self.metadata
    }

    fn variable(&self, name: &str) -> crate::Result<&Variable> {
        self.metadata
            .variables
            .get(name)
            .ok_or_else(|| GridMetaError::accessor(format!("variable '{}' not found", name)))
    }
}

fn partition_variables(metadata: &ZarrMetadata) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut listed: BTreeSet<String> = attr_str(&metadata.global_attributes, "coordinates")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let mut auxiliary = BTreeSet::new();

    for variable in metadata.variables.values() {
        listed.extend(variable.coordinates_attr());
        for key in ["grid_mapping", "bounds"] {
            if let Some(name) = attr_str(&variable.attributes, key) {
                auxiliary.insert(name.to_string());
            }
        }
    }

    let coordinates = metadata
        .variables
        .values()
        .filter(|v| {
            let dimension_coordinate = v.rank() == 1 && v.dimensions[0] == v.name;
            (dimension_coordinate || v.rank() == 0 || listed.contains(&v.name))
                && !auxiliary.contains(&v.name)
        })
        .map(|v| v.name.clone())
        .collect();

    for name in listed.difference(&metadata.variables.keys().cloned().collect()) {
        warn!(coordinate = %name, "listed coordinate is not an array in the store");
    }

    (coordinates, auxiliary)
}

impl DatasetAccessor for ZarrDataset {
    fn coordinate_names(&self) -> Vec<String> {
        self.coordinates.iter().cloned().collect()
    }

    fn data_variable_names(&self) -> Vec<String> {
        self.metadata
            .variables
            .keys()
            .filter(|name| !self.coordinates.contains(*name) && !self.auxiliary.contains(*name))
            .cloned()
            .collect()
    }

    fn dimensions(&self, name: &str) -> crate::Result<Vec<String>> {
        Ok(self.variable(name)?.dimensions.clone())
    }

    fn shape(&self, name: &str) -> crate::Result<Vec<usize>> {
        Ok(self.variable(name)?.shape.iter().map(|&s| s as usize).collect())
    }

    fn attributes(&self, name: &str) -> crate::Result<&AttributeMap> {
        Ok(&self.variable(name)?.attributes)
    }

    fn values(&self, name: &str) -> crate::Result<Vec<f64>> {
        if let Some(values) = self.coordinate_values.get(name) {
            return Ok(values.clone());
        }
        let variable = self.variable(name)?;
        self.store
            .read_array_f64(variable)
            .map_err(|e| GridMetaError::accessor(format!("{:#}", e)))
    }

    fn global_attributes(&self) -> &AttributeMap {
        &self.metadata.global_attributes
    }
}
