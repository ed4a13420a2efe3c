//! Surface persistence
//!
//! Surfaces are stored per (year, stage). Only the final, masked surface is
//! needed for summarizing; the spline and corrected stages are kept on
//! request for inspection.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use coralsurf_core::io::{read_geotiff, write_geotiff};
use coralsurf_core::{Error, Result, Surface};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Point in the per-year chain a surface was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceStage {
    /// Raw spline over the full extent
    Spline,
    /// Spline with values raised to the lower bound
    Corrected,
    /// Corrected surface masked to the support boundary
    Final,
}

impl SurfaceStage {
    pub const ALL: [SurfaceStage; 3] = [SurfaceStage::Spline, SurfaceStage::Corrected, SurfaceStage::Final];

    /// File name prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceStage::Spline => "spline",
            SurfaceStage::Corrected => "corrected",
            SurfaceStage::Final => "clipped",
        }
    }
}

impl std::fmt::Display for SurfaceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage for built surfaces
pub trait SurfaceStore: Send + Sync {
    fn save(&self, year: i32, stage: SurfaceStage, surface: &Surface) -> Result<()>;

    /// `Ok(None)` when nothing was stored for (`year`, `stage`)
    fn load(&self, year: i32, stage: SurfaceStage) -> Result<Option<Surface>>;

    /// Drop a stored surface; removing an absent one is not an error
    fn remove(&self, year: i32, stage: SurfaceStage) -> Result<()>;
}

/// GeoTIFF files in one directory, named `<stage>_<year>.tif`
#[derive(Debug, Clone)]
pub struct GeoTiffSurfaceStore {
    dir: PathBuf,
}

impl GeoTiffSurfaceStore {
    /// Store rooted at `dir`; the directory is created if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self::open(dir))
    }

    /// Store rooted at an existing `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, year: i32, stage: SurfaceStage) -> PathBuf {
        self.dir.join(format!("{}_{}.tif", stage.as_str(), year))
    }
}

impl SurfaceStore for GeoTiffSurfaceStore {
    fn save(&self, year: i32, stage: SurfaceStage, surface: &Surface) -> Result<()> {
        let path = self.path_for(year, stage);
        write_geotiff(surface, &path)?;
        debug!(year, %stage, path = ?path, "Saved surface");
        Ok(())
    }

    fn load(&self, year: i32, stage: SurfaceStage) -> Result<Option<Surface>> {
        let path = self.path_for(year, stage);
        if !path.exists() {
            return Ok(None);
        }
        read_geotiff::<f64, _>(&path).map(Some)
    }

    fn remove(&self, year: i32, stage: SurfaceStage) -> Result<()> {
        match fs::remove_file(self.path_for(year, stage)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Surfaces kept in memory
#[derive(Debug, Default)]
pub struct MemorySurfaceStore {
    surfaces: RwLock<BTreeMap<(i32, SurfaceStage), Surface>>,
}

impl MemorySurfaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored (year, stage) keys, ascending
    pub fn keys(&self) -> Result<Vec<(i32, SurfaceStage)>> {
        Ok(self.read()?.keys().copied().collect())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<(i32, SurfaceStage), Surface>>> {
        self.surfaces
            .read()
            .map_err(|_| Error::Other("surface store lock poisoned".into()))
    }
}

impl SurfaceStore for MemorySurfaceStore {
    fn save(&self, year: i32, stage: SurfaceStage, surface: &Surface) -> Result<()> {
        self.surfaces
            .write()
            .map_err(|_| Error::Other("surface store lock poisoned".into()))?
            .insert((year, stage), surface.clone());
        Ok(())
    }

    fn load(&self, year: i32, stage: SurfaceStage) -> Result<Option<Surface>> {
        Ok(self.read()?.get(&(year, stage)).cloned())
    }

    fn remove(&self, year: i32, stage: SurfaceStage) -> Result<()> {
        self.surfaces
            .write()
            .map_err(|_| Error::Other("surface store lock poisoned".into()))?
            .remove(&(year, stage));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coralsurf_core::{GeoTransform, Raster, CRS};

    fn surface() -> Surface {
        let mut s = Raster::from_vec(vec![1.0, f64::NAN, 3.0, 4.5], 2, 2).unwrap();
        s.set_transform(GeoTransform::new(151.0, -23.0, 0.05, -0.05));
        s.set_crs(Some(CRS::wgs84()));
        s.set_nodata(Some(f64::NAN));
        s
    }

    #[test]
    fn test_geotiff_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeoTiffSurfaceStore::create(dir.path().join("out")).unwrap();
        store.save(2005, SurfaceStage::Final, &surface()).unwrap();

        assert!(store.path_for(2005, SurfaceStage::Final).ends_with("clipped_2005.tif"));
        let loaded = store.load(2005, SurfaceStage::Final).unwrap().unwrap();
        assert_eq!(loaded.shape(), (2, 2));
        assert_eq!(loaded.get(1, 1).unwrap(), 4.5);
        assert!(loaded.get(0, 1).unwrap().is_nan());
        assert_eq!(loaded.crs().and_then(|c| c.epsg()), Some(4326));
        assert_eq!(loaded.transform(), surface().transform());

        store.remove(2005, SurfaceStage::Final).unwrap();
        assert!(store.load(2005, SurfaceStage::Final).unwrap().is_none());
        store.remove(2005, SurfaceStage::Final).unwrap();
    }

    #[test]
    fn test_absent_surface_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeoTiffSurfaceStore::open(dir.path());
        assert!(store.load(1999, SurfaceStage::Final).unwrap().is_none());
        assert!(MemorySurfaceStore::new().load(1999, SurfaceStage::Final).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeoTiffSurfaceStore::open(dir.path());
        std::fs::write(store.path_for(2003, SurfaceStage::Final), b"not a tiff").unwrap();
        let err = store.load(2003, SurfaceStage::Final).unwrap_err();
        assert_eq!(err.reason(), coralsurf_core::NoDataReason::StorageFailure);
    }

    #[test]
    fn test_memory_store_keys_by_stage() {
        let store = MemorySurfaceStore::new();
        store.save(2010, SurfaceStage::Spline, &surface()).unwrap();
        store.save(2010, SurfaceStage::Final, &surface()).unwrap();
        assert_eq!(
            store.keys().unwrap(),
            vec![(2010, SurfaceStage::Spline), (2010, SurfaceStage::Final)]
        );
        assert!(store.load(2010, SurfaceStage::Corrected).unwrap().is_none());

        store.remove(2010, SurfaceStage::Spline).unwrap();
        store.remove(2010, SurfaceStage::Spline).unwrap();
        assert_eq!(store.keys().unwrap(), vec![(2010, SurfaceStage::Final)]);
    }
}
