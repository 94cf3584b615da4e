use crate::absorption::AbsorptionWeightingType;
use crate::detectors::DetectorContext;
use crate::error::{Result, TurbidError};
use crate::optical_properties::OpticalProperties;
use crate::photon::{CollisionInfo, Photon, SubRegionCollisionInfo};
use crate::settings::DatabaseType;
use crate::tissue::Tissue;
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const DATABASE_FORMAT_VERSION: u32 = 1;

/// Bytes per exit record: eight little-endian f64.
const RECORD_BYTES: usize = 64;
/// One f64 path length and one i32 collision count
const COLLISION_BYTES_PER_REGION: u64 = 12;

/// Exit state of one photon, the first of the two paired streams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonDatabaseRecord {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub weight: f64,
    pub time: f64,
}

impl PhotonDatabaseRecord {
    pub fn from_photon(photon: &Photon) -> Self {
        Self {
            position: photon.position,
            direction: photon.direction,
            weight: photon.weight,
            time: photon.time,
        }
    }

    fn to_bytes(&self) -> [u8; RECORD_BYTES] {
        let values = [
            self.position.x,
            self.position.y,
            self.position.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.weight,
            self.time,
        ];
        let mut bytes = [0u8; RECORD_BYTES];
        for (chunk, v) in bytes.chunks_exact_mut(8).zip(values) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    fn from_bytes(bytes: &[u8; RECORD_BYTES]) -> Self {
        let mut values = [0.0; 8];
        for (v, chunk) in values.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *v = f64::from_le_bytes(raw);
        }
        Self {
            position: Vector3::new(values[0], values[1], values[2]),
            direction: Vector3::new(values[3], values[4], values[5]),
            weight: values[6],
            time: values[7],
        }
    }
}

/// JSON sidecar describing the two binary streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHeader {
    pub version: u32,
    pub database_type: DatabaseType,
    pub record_count: u64,
    pub region_count: usize,
    pub layer_count: usize,
    /// Reference optical properties, indexed by tissue region
    pub optical_properties: Vec<OpticalProperties>,
    pub photons_launched: u64,
    pub absorption_weighting_type: AbsorptionWeightingType,
}

/// Exit records paired index-for-index with per-region collision info.
///
/// On disk a database `<name>` is three files in one directory: `<name>`
/// holds the exit records, `<name>CollisionInfo` holds for every record the
/// path length (f64) and then the collision count (i32) of each region, and
/// `<name>.json` is the [`DatabaseHeader`]. All numbers are little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonDatabase {
    header: DatabaseHeader,
    records: Vec<PhotonDatabaseRecord>,
    collision_info: Vec<CollisionInfo>,
}

impl PhotonDatabase {
    /// Empty database for photons leaving `tissue`.
    pub fn new(database_type: DatabaseType, tissue: &Tissue, awt: AbsorptionWeightingType) -> Self {
        Self {
            header: DatabaseHeader {
                version: DATABASE_FORMAT_VERSION,
                database_type,
                record_count: 0,
                region_count: tissue.num_regions(),
                layer_count: tissue.layer_count(),
                optical_properties: tissue.optical_properties(),
                photons_launched: 0,
                absorption_weighting_type: awt,
            },
            records: Vec::new(),
            collision_info: Vec::new(),
        }
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn database_type(&self) -> DatabaseType {
        self.header.database_type
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PhotonDatabaseRecord] {
        &self.records
    }

    pub fn collision_info(&self) -> &[CollisionInfo] {
        &self.collision_info
    }

    /// Record pairs in write order.
    pub fn iter(&self) -> impl Iterator<Item = (&PhotonDatabaseRecord, &CollisionInfo)> {
        self.records.iter().zip(&self.collision_info)
    }

    pub fn push(&mut self, photon: &Photon) {
        self.records.push(PhotonDatabaseRecord::from_photon(photon));
        self.collision_info.push(photon.collision_info.clone());
        self.header.record_count += 1;
    }

    /// Append another worker's records after this one's.
    pub fn append(&mut self, other: PhotonDatabase) {
        self.header.record_count += other.header.record_count;
        self.records.extend(other.records);
        self.collision_info.extend(other.collision_info);
    }

    pub fn set_photons_launched(&mut self, photons_launched: u64) {
        self.header.photons_launched = photons_launched;
    }

    /// Tissue facts needed to re-tally the records.
    pub fn detector_context(&self) -> DetectorContext {
        let ops = &self.header.optical_properties;
        let n = |i: usize| ops.get(i).map(|o| o.n).unwrap_or(1.0);
        DetectorContext {
            optical_properties: ops.clone(),
            top_ambient_n: n(0),
            bottom_ambient_n: n(self.header.layer_count.saturating_sub(1)),
            absorption_weighting_type: self.header.absorption_weighting_type,
        }
    }

    /// Paths of the exit stream, collision stream and header.
    pub fn paths(dir: &Path, database_type: DatabaseType) -> (PathBuf, PathBuf, PathBuf) {
        let stem = database_type.file_stem();
        (
            dir.join(stem),
            dir.join(format!("{}CollisionInfo", stem)),
            dir.join(format!("{}.json", stem)),
        )
    }

    /// Write the three database files into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let (exit_path, info_path, header_path) = Self::paths(dir, self.header.database_type);

        let mut exits = BufWriter::new(File::create(&exit_path)?);
        for record in &self.records {
            exits
                .write_all(&record.to_bytes())
                .map_err(|e| TurbidError::Database(format!("write exit record: {e}")))?;
        }
        exits.flush()?;

        let mut infos = BufWriter::new(File::create(&info_path)?);
        for info in &self.collision_info {
            for sub in &info.regions {
                infos
                    .write_all(&sub.path_length.to_le_bytes())
                    .map_err(|e| TurbidError::Database(format!("write path length: {e}")))?;
            }
            for sub in &info.regions {
                let count = i32::try_from(sub.collision_count).map_err(|_| {
                    TurbidError::Database(format!("collision count {} does not fit in 32 bits", sub.collision_count))
                })?;
                infos
                    .write_all(&count.to_le_bytes())
                    .map_err(|e| TurbidError::Database(format!("write collision count: {e}")))?;
            }
        }
        infos.flush()?;

        std::fs::write(&header_path, serde_json::to_string_pretty(&self.header)?)?;
        debug!(
            "wrote {} records to {}",
            self.records.len(),
            exit_path.display()
        );
        Ok(())
    }

    /// Read a database previously written to `dir`.
    pub fn read(dir: &Path, database_type: DatabaseType) -> Result<Self> {
        let (exit_path, info_path, header_path) = Self::paths(dir, database_type);
        let header: DatabaseHeader = serde_json::from_str(&std::fs::read_to_string(&header_path)?)?;
        if header.version != DATABASE_FORMAT_VERSION {
            return Err(TurbidError::Database(format!(
                "unsupported database version {} (expected {})",
                header.version, DATABASE_FORMAT_VERSION
            )));
        }
        if header.database_type != database_type {
            return Err(TurbidError::Database(format!(
                "{} holds a {:?} database, not {:?}",
                header_path.display(),
                header.database_type,
                database_type
            )));
        }
        if header.optical_properties.len() != header.region_count {
            return Err(TurbidError::Database(format!(
                "header lists {} optical properties for {} regions",
                header.optical_properties.len(),
                header.region_count
            )));
        }
        let count = usize::try_from(header.record_count)
            .map_err(|_| TurbidError::Database(format!("record count {} too large", header.record_count)))?;

        let exit_file = File::open(&exit_path)?;
        let info_file = File::open(&info_path)?;
        // sizes are checked before anything is allocated from the header
        expect_len(&exit_file, &exit_path, header.record_count, RECORD_BYTES as u64)?;
        let info_bytes = (header.region_count as u64).saturating_mul(COLLISION_BYTES_PER_REGION);
        expect_len(&info_file, &info_path, header.record_count, info_bytes)?;

        let mut exits = BufReader::new(exit_file);
        let mut records = Vec::with_capacity(count);
        let mut buf = [0u8; RECORD_BYTES];
        for i in 0..count {
            exits
                .read_exact(&mut buf)
                .map_err(|e| TurbidError::Database(format!("exit record {i} of {count}: {e}")))?;
            records.push(PhotonDatabaseRecord::from_bytes(&buf));
        }
        expect_end(&mut exits, &exit_path)?;

        let mut infos = BufReader::new(info_file);
        let mut collision_info = Vec::with_capacity(count);
        let mut f64_buf = [0u8; 8];
        let mut i32_buf = [0u8; 4];
        for i in 0..count {
            let mut info = CollisionInfo::new(header.region_count);
            for sub in info.regions.iter_mut() {
                infos
                    .read_exact(&mut f64_buf)
                    .map_err(|e| TurbidError::Database(format!("collision record {i} of {count}: {e}")))?;
                sub.path_length = f64::from_le_bytes(f64_buf);
            }
            for sub in info.regions.iter_mut() {
                infos
                    .read_exact(&mut i32_buf)
                    .map_err(|e| TurbidError::Database(format!("collision record {i} of {count}: {e}")))?;
                *sub = SubRegionCollisionInfo {
                    path_length: sub.path_length,
                    collision_count: i64::from(i32::from_le_bytes(i32_buf)),
                };
            }
            collision_info.push(info);
        }
        expect_end(&mut infos, &info_path)?;

        debug!("read {} records from {}", count, exit_path.display());
        Ok(Self {
            header,
            records,
            collision_info,
        })
    }
}

/// A stream file must be exactly `count` records of `record_bytes` long.
fn expect_len(file: &File, path: &Path, count: u64, record_bytes: u64) -> Result<()> {
    let len = file.metadata()?.len();
    match count.checked_mul(record_bytes) {
        Some(expected) if expected == len => Ok(()),
        _ => Err(TurbidError::Database(format!(
            "{} is {} bytes but the header announces {} records of {} bytes",
            path.display(),
            len,
            count,
            record_bytes
        ))),
    }
}

/// Both streams must hold exactly the records the header announces.
fn expect_end(reader: &mut impl Read, path: &Path) -> Result<()> {
    let mut extra = [0u8; 1];
    match reader.read(&mut extra)? {
        0 => Ok(()),
        _ => Err(TurbidError::Database(format!(
            "{} holds more data than its header announces",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tissue::TissueInput;
    use tempfile::TempDir;

    fn tissue() -> Tissue {
        TissueInput::single_layer(OpticalProperties::new(0.01, 1.0, 0.8, 1.4), 10.0)
            .build()
            .unwrap()
    }

    fn photon(x: f64, collisions: i64) -> Photon {
        let mut photon = Photon::new(
            Vector3::new(x, 0.25, 0.0),
            Vector3::new(0.0, 0.6, -0.8),
            0.75,
            1,
            3,
            false,
        );
        photon.time = 0.012;
        photon.collision_info.regions[1] = SubRegionCollisionInfo {
            path_length: 3.5,
            collision_count: collisions,
        };
        photon
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let mut db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.push(&photon(1.0, 4));
        db.push(&photon(-2.0, 9));
        db.set_photons_launched(10);
        db.write(dir.path()).unwrap();

        assert!(dir.path().join("DiffuseReflectanceDatabase").exists());
        assert!(dir.path().join("DiffuseReflectanceDatabaseCollisionInfo").exists());
        let read = PhotonDatabase::read(dir.path(), DatabaseType::DiffuseReflectance).unwrap();
        assert_eq!(read, db);
        assert_eq!(read.header().photons_launched, 10);
        assert_eq!(read.collision_info()[1].regions[1].collision_count, 9);
    }

    #[test]
    fn test_stream_sizes() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let mut db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.push(&photon(1.0, 4));
        db.write(dir.path()).unwrap();
        let (exit_path, info_path, _) = PhotonDatabase::paths(dir.path(), DatabaseType::DiffuseReflectance);
        assert_eq!(std::fs::metadata(exit_path).unwrap().len(), 64);
        assert_eq!(std::fs::metadata(info_path).unwrap().len(), 3 * 12);
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let mut db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.push(&photon(1.0, 4));
        db.push(&photon(2.0, 4));
        db.write(dir.path()).unwrap();
        let (exit_path, _, _) = PhotonDatabase::paths(dir.path(), DatabaseType::DiffuseReflectance);
        let bytes = std::fs::read(&exit_path).unwrap();
        std::fs::write(&exit_path, &bytes[..100]).unwrap();
        assert!(matches!(
            PhotonDatabase::read(dir.path(), DatabaseType::DiffuseReflectance),
            Err(TurbidError::Database(_))
        ));
    }

    #[test]
    fn test_header_count_must_match_stream_length() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let mut db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.push(&photon(1.0, 4));
        db.write(dir.path()).unwrap();
        let (_, _, header_path) = PhotonDatabase::paths(dir.path(), DatabaseType::DiffuseReflectance);
        for bogus in [u64::MAX / 2, 1 << 40, 2] {
            let mut header = db.header().clone();
            header.record_count = bogus;
            std::fs::write(&header_path, serde_json::to_string(&header).unwrap()).unwrap();
            let err = PhotonDatabase::read(dir.path(), DatabaseType::DiffuseReflectance).unwrap_err();
            assert!(matches!(err, TurbidError::Database(ref m) if m.contains("header announces")), "{}", err);
        }
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.write(dir.path()).unwrap();
        assert!(PhotonDatabase::read(dir.path(), DatabaseType::DiffuseTransmittance).is_err());
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tissue = tissue();
        let mut db = PhotonDatabase::new(DatabaseType::DiffuseReflectance, &tissue, AbsorptionWeightingType::Discrete);
        db.push(&photon(1.0, i64::from(i32::MAX) + 1));
        assert!(matches!(db.write(dir.path()), Err(TurbidError::Database(_))));
    }
}
