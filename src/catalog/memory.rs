//! In-memory raster catalog.
//!
//! Holds named coverages in their native grids and serves windowed reads
//! by walking the target grid's pixel centers back through the source
//! grid (inverse mapping, nearest neighbor). Reads are cached in a
//! byte-bounded LRU keyed by (name, target geometry), so repeated
//! evaluations against the same grid do not resample twice.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use lru::LruCache;
use ndarray::Array3;
use tracing::debug;

use crate::catalog::{CoverageDescriptor, RasterCatalog};
use crate::error::{AlgebraError, Result};
use crate::geometry::GridGeometry;
use crate::raster::RasterCoverage;
use crate::warp::resample_grid;

const CACHE_CAPACITY_BYTES: usize = 256 * 1024 * 1024; // 256 MB upper bound

/// Cache key: coverage name plus the exact target geometry.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ReadKey {
    name: String,
    width: usize,
    height: usize,
    crs: i32,
    scale_x: u64,
    scale_y: u64,
    translate_x: u64,
    translate_y: u64,
}

impl ReadKey {
    fn new(name: &str, target: &GridGeometry) -> Self {
        ReadKey {
            name: name.to_string(),
            width: target.range.width,
            height: target.range.height,
            crs: target.crs,
            scale_x: target.transform.scale_x.to_bits(),
            scale_y: target.transform.scale_y.to_bits(),
            translate_x: target.transform.translate_x.to_bits(),
            translate_y: target.transform.translate_y.to_bits(),
        }
    }
}

struct ReadCache {
    current_bytes: usize,
    capacity_bytes: usize,
    entries: LruCache<ReadKey, Arc<Array3<f64>>>,
}

impl ReadCache {
    fn new(capacity_bytes: usize) -> Self {
        ReadCache {
            current_bytes: 0,
            capacity_bytes,
            entries: LruCache::unbounded(),
        }
    }

    fn get(&mut self, key: &ReadKey) -> Option<Arc<Array3<f64>>> {
        self.entries.get(key).map(Arc::clone)
    }

    fn insert(&mut self, key: ReadKey, data: Arc<Array3<f64>>) {
        let size_bytes = data.len() * std::mem::size_of::<f64>();
        if size_bytes > self.capacity_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.current_bytes = self
                .current_bytes
                .saturating_sub(old.len() * std::mem::size_of::<f64>());
        }

        while self.current_bytes + size_bytes > self.capacity_bytes {
            if let Some((_key, entry)) = self.entries.pop_lru() {
                self.current_bytes = self
                    .current_bytes
                    .saturating_sub(entry.len() * std::mem::size_of::<f64>());
            } else {
                break;
            }
        }

        self.current_bytes = self.current_bytes.saturating_add(size_bytes);
        self.entries.put(key, data);
    }
}

/// Catalog backed by coverages held in memory.
pub struct MemoryCatalog {
    coverages: AHashMap<String, RasterCoverage>,
    cache: Mutex<ReadCache>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Create an empty catalog with the default read-cache capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_capacity(CACHE_CAPACITY_BYTES)
    }

    /// Create an empty catalog with an explicit read-cache capacity in
    /// bytes.
    #[must_use]
    pub fn with_cache_capacity(capacity_bytes: usize) -> Self {
        Self {
            coverages: AHashMap::new(),
            cache: Mutex::new(ReadCache::new(capacity_bytes)),
        }
    }

    /// Register a coverage under its own name, replacing any previous
    /// coverage with the same name.
    pub fn insert(&mut self, coverage: RasterCoverage) {
        self.coverages.insert(coverage.name.clone(), coverage);
    }

    /// Number of registered coverages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coverages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coverages.is_empty()
    }

    fn source(&self, name: &str) -> Result<&RasterCoverage> {
        self.coverages
            .get(name)
            .ok_or_else(|| AlgebraError::UnknownCoverage(name.to_string()))
    }
}

impl RasterCatalog for MemoryCatalog {
    fn resolve(&self, name: &str) -> Result<CoverageDescriptor> {
        let source = self.source(name)?;
        Ok(CoverageDescriptor {
            name: source.name.clone(),
            grid: source.grid,
            envelope: source.grid.envelope(),
            nodata: source.nodata,
            bands: source.bands(),
        })
    }

    fn read(
        &self,
        name: &str,
        target: &GridGeometry,
        suggested_tile_size: (usize, usize),
    ) -> Result<RasterCoverage> {
        let source = self.source(name)?;

        let key = ReadKey::new(name, target);
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            debug!(name, "windowed read served from cache");
            return RasterCoverage::new(source.name.clone(), *target, source.nodata, (*hit).clone());
        }

        debug!(
            name,
            width = target.range.width,
            height = target.range.height,
            tile_w = suggested_tile_size.0,
            tile_h = suggested_tile_size.1,
            "windowed read"
        );

        let data = resample_grid(source, target)?;
        let shared = Arc::new(data);
        self.cache.lock().unwrap().insert(key, Arc::clone(&shared));

        RasterCoverage::new(source.name.clone(), *target, source.nodata, (*shared).clone())
    }
}
