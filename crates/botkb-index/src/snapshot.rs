//! Two-file snapshot persistence for a [`KnowledgeBase`].
//!
//! Layout inside a tenant directory:
//!
//! - `vectors.idx`: little-endian binary. Header is magic `BKBI`, format
//!   version `u32`, metric tag `u8`, dimension `u32`, count `u64`,
//!   generation `u64`; then `count * dimension` `f32` values in id order.
//! - `metadata.json`: `{"version", "generation", "tenant", "records"}`.
//!
//! Each file is written to a sibling temp file, fsynced and renamed into
//! place, index first. Both carry the same generation, so a crash between
//! the two renames shows up on the next load as a generation mismatch.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::errors::{IndexError, Result};
use crate::flat::FlatIndex;
use crate::knowledge::{KnowledgeBase, Staged};
use crate::metadata::{MetadataRecord, MetadataStore};
use crate::metric::Metric;

/// File name of the vector half.
pub const INDEX_FILE: &str = "vectors.idx";
/// File name of the metadata half.
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC: &[u8; 4] = b"BKBI";
const FORMAT_VERSION: u32 = 1;
const METADATA_VERSION: u32 = 1;
// magic + version + metric + dims + count + generation
const HEADER_LEN: usize = 4 + 4 + 1 + 4 + 8 + 8;

/// Where a tenant's snapshot lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotPaths {
    /// Path of `vectors.idx`.
    pub index: PathBuf,
    /// Path of `metadata.json`.
    pub metadata: PathBuf,
}

impl SnapshotPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index: dir.join(INDEX_FILE),
            metadata: dir.join(METADATA_FILE),
        }
    }
}

/// What to do when a snapshot fails validation on load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Move both files aside and start empty.
    #[default]
    Quarantine,
    /// Refuse to open the tenant.
    Fail,
}

/// Outcome of [`load`].
#[derive(Debug)]
pub enum Loaded {
    /// No complete snapshot on disk.
    Fresh,
    /// Snapshot read back intact.
    Warm(KnowledgeBase),
    /// Snapshot was corrupt and has been quarantined.
    Recovered {
        /// Why validation failed.
        reason: String,
        /// New locations of the moved files.
        quarantined: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    version: u32,
    generation: u64,
    tenant: &'a str,
    records: Vec<&'a MetadataRecord>,
}

#[derive(Deserialize)]
struct MetadataFile {
    version: u32,
    generation: u64,
    tenant: String,
    records: Vec<MetadataRecord>,
}

struct Header {
    metric: Metric,
    dims: usize,
    count: usize,
    generation: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Load
// ─────────────────────────────────────────────────────────────────────────────

/// Read a tenant's snapshot.
///
/// Both files missing, or only one present, yields [`Loaded::Fresh`]. A
/// snapshot that fails validation is handled per `policy`. Plain I/O errors
/// (permissions, unreadable directory) are returned as-is.
pub fn load(paths: &SnapshotPaths, tenant: &str, policy: CorruptionPolicy) -> Result<Loaded> {
    let has_index = paths.index.exists();
    let has_metadata = paths.metadata.exists();

    match (has_index, has_metadata) {
        (false, false) => {
            debug!(tenant, "no snapshot on disk");
            return Ok(Loaded::Fresh);
        }
        (true, false) | (false, true) => {
            warn!(
                tenant,
                index = %paths.index.display(),
                has_index,
                has_metadata,
                "incomplete snapshot, starting fresh"
            );
            return Ok(Loaded::Fresh);
        }
        (true, true) => {}
    }

    match read(paths, tenant) {
        Ok(kb) => {
            info!(
                tenant,
                count = kb.len(),
                dims = kb.dims(),
                generation = kb.generation(),
                "snapshot loaded"
            );
            Ok(Loaded::Warm(kb))
        }
        Err(IndexError::CorruptSnapshot { path, reason }) => match policy {
            CorruptionPolicy::Fail => {
                error!(tenant, path = %path.display(), %reason, "corrupt snapshot");
                Err(IndexError::CorruptSnapshot { path, reason })
            }
            CorruptionPolicy::Quarantine => {
                let quarantined = quarantine(paths)?;
                error!(
                    tenant,
                    path = %path.display(),
                    %reason,
                    quarantined = ?quarantined,
                    "corrupt snapshot quarantined, starting fresh"
                );
                Ok(Loaded::Recovered {
                    reason,
                    quarantined,
                })
            }
        },
        Err(e) => Err(e),
    }
}

fn read(paths: &SnapshotPaths, tenant: &str) -> Result<KnowledgeBase> {
    let corrupt = |path: &Path, reason: String| IndexError::CorruptSnapshot {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(&paths.index)?;
    let (header, data) = decode_index(&bytes).map_err(|r| corrupt(&paths.index, r))?;

    let raw = fs::read(&paths.metadata)?;
    let meta: MetadataFile = serde_json::from_slice(&raw)
        .map_err(|e| corrupt(&paths.metadata, format!("invalid metadata: {e}")))?;

    if meta.version != METADATA_VERSION {
        return Err(corrupt(
            &paths.metadata,
            format!("unsupported metadata version {}", meta.version),
        ));
    }
    if meta.tenant != tenant {
        return Err(corrupt(
            &paths.metadata,
            format!("snapshot belongs to tenant {:?}", meta.tenant),
        ));
    }
    if meta.generation != header.generation {
        return Err(corrupt(
            &paths.metadata,
            format!(
                "generation mismatch: index {}, metadata {}",
                header.generation, meta.generation
            ),
        ));
    }
    if meta.records.len() != header.count {
        return Err(corrupt(
            &paths.metadata,
            format!(
                "count mismatch: {} vectors, {} records",
                header.count,
                meta.records.len()
            ),
        ));
    }

    let index = FlatIndex::from_raw(header.dims, header.metric, data)
        .map_err(|e| corrupt(&paths.index, e.to_string()))?;
    KnowledgeBase::from_parts(
        tenant,
        index,
        MetadataStore::from_records(meta.records),
        header.generation,
    )
    .map_err(|e| corrupt(&paths.metadata, e.to_string()))
}

fn decode_index(bytes: &[u8]) -> std::result::Result<(Header, Vec<f32>), String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file too short ({} bytes)", bytes.len()));
    }
    let (head, body) = bytes.split_at(HEADER_LEN);
    if &head[0..4] != MAGIC {
        return Err("bad magic".into());
    }
    let version = u32::from_le_bytes(le_array(&head[4..8]));
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let metric = Metric::from_tag(head[8]).ok_or_else(|| format!("unknown metric tag {}", head[8]))?;
    let dims = u32::from_le_bytes(le_array(&head[9..13]));
    let count = u64::from_le_bytes(le_array(&head[13..21]));
    let generation = u64::from_le_bytes(le_array(&head[21..29]));

    if dims == 0 {
        return Err("zero dimension".into());
    }
    let dims = usize::try_from(dims).map_err(|_| format!("dimension {dims} too large"))?;
    let count = usize::try_from(count).map_err(|_| format!("count {count} too large"))?;
    let expected = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "size overflow".to_string())?;
    if body.len() != expected {
        return Err(format!(
            "size mismatch: header says {expected} data bytes, file has {}",
            body.len()
        ));
    }

    let data = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(le_array(c)))
        .collect();
    Ok((
        Header {
            metric,
            dims,
            count,
            generation,
        },
        data,
    ))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn quarantine(paths: &SnapshotPaths) -> Result<Vec<PathBuf>> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let mut moved = Vec::new();
    for path in [&paths.index, &paths.metadata] {
        if !path.exists() {
            continue;
        }
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{stamp}"));
        let target = path.with_file_name(name);
        fs::rename(path, &target)?;
        moved.push(target);
    }
    Ok(moved)
}

// ─────────────────────────────────────────────────────────────────────────────
// Save
// ─────────────────────────────────────────────────────────────────────────────

/// Persist `kb` as-is.
pub fn save(paths: &SnapshotPaths, kb: &KnowledgeBase) -> Result<()> {
    write_snapshot(
        paths,
        kb.tenant(),
        kb.metric(),
        kb.dims(),
        kb.generation(),
        kb.len(),
        kb.index().vectors(),
        kb.metadata().iter(),
    )
}

/// Persist the state `kb` will have once `staged` is committed.
///
/// `kb` itself is not touched, so a failed write leaves memory and disk at
/// the previous generation.
pub fn save_staged(paths: &SnapshotPaths, kb: &KnowledgeBase, staged: &Staged) -> Result<()> {
    write_snapshot(
        paths,
        kb.tenant(),
        kb.metric(),
        kb.dims(),
        staged.generation(),
        kb.len() + staged.len(),
        kb.index().vectors().chain(staged.vectors()),
        kb.metadata().iter().chain(staged.records()),
    )
}

#[allow(clippy::too_many_arguments)]
fn write_snapshot<'a>(
    paths: &SnapshotPaths,
    tenant: &str,
    metric: Metric,
    dims: usize,
    generation: u64,
    count: usize,
    vectors: impl Iterator<Item = &'a [f32]>,
    records: impl Iterator<Item = &'a MetadataRecord>,
) -> Result<()> {
    let dims32 = u32::try_from(dims).map_err(io::Error::other)?;
    let count64 = u64::try_from(count).map_err(io::Error::other)?;

    write_atomic(&paths.index, |w| {
        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        w.write_all(&[metric.tag()])?;
        w.write_all(&dims32.to_le_bytes())?;
        w.write_all(&count64.to_le_bytes())?;
        w.write_all(&generation.to_le_bytes())?;
        for v in vectors {
            for x in v {
                w.write_all(&x.to_le_bytes())?;
            }
        }
        Ok(())
    })?;

    let file = MetadataFileRef {
        version: METADATA_VERSION,
        generation,
        tenant,
        records: records.collect(),
    };
    write_atomic(&paths.metadata, |w| {
        serde_json::to_writer(&mut *w, &file)?;
        Ok(())
    })?;

    debug!(tenant, count, generation, "snapshot saved");
    Ok(())
}

/// Write `path` through a temp file in the same directory, then rename.
fn write_atomic(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(&mut tmp);
        body(&mut w)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    let _ = tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Entry;
    use botkb_logging::capture_logs;
    use tempfile::TempDir;
    use tracing::Level;

    fn entry(n: usize, vector: Vec<f32>) -> Entry {
        Entry {
            vector,
            record: MetadataRecord::new(format!("doc_{n}"), format!("text {n}"), "acme"),
        }
    }

    fn sample() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("acme", 3, Metric::InnerProduct).unwrap();
        let _ = kb
            .append(vec![
                entry(0, vec![0.1, -0.0, f32::MIN_POSITIVE]),
                entry(1, vec![1.0e-38, f32::MAX, -3.25]),
                entry(2, vec![f32::from_bits(0x7fc0_1234), 0.5, 1.0 / 3.0]),
            ])
            .unwrap();
        kb
    }

    fn setup() -> (TempDir, SnapshotPaths) {
        let dir = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(&dir.path().join("acme"));
        (dir, paths)
    }

    fn warm(loaded: Loaded) -> KnowledgeBase {
        match loaded {
            Loaded::Warm(kb) => kb,
            other => panic!("expected warm snapshot, got {other:?}"),
        }
    }

    // ── round trip ──────────────────────────────────────────────────

    #[test]
    fn round_trip_is_bit_exact() {
        let (_dir, paths) = setup();
        let kb = sample();
        save(&paths, &kb).unwrap();

        let back = warm(load(&paths, "acme", CorruptionPolicy::Fail).unwrap());
        assert_eq!(back.len(), 3);
        assert_eq!(back.dims(), 3);
        assert_eq!(back.metric(), Metric::InnerProduct);
        assert_eq!(back.generation(), kb.generation());
        let bits = |k: &KnowledgeBase| -> Vec<u32> {
            k.index().as_slice().iter().map(|x| x.to_bits()).collect()
        };
        assert_eq!(bits(&back), bits(&kb));
        assert_eq!(back.metadata(), kb.metadata());
    }

    #[test]
    fn empty_base_round_trips() {
        let (_dir, paths) = setup();
        let kb = KnowledgeBase::new("acme", 384, Metric::L2).unwrap();
        save(&paths, &kb).unwrap();
        let back = warm(load(&paths, "acme", CorruptionPolicy::Fail).unwrap());
        assert!(back.is_empty());
        assert_eq!(back.dims(), 384);
        assert_eq!(back.metric(), Metric::L2);
    }

    #[test]
    fn save_staged_matches_committed_state() {
        let (_dir, paths) = setup();
        let mut kb = sample();
        let staged = kb.stage(vec![entry(3, vec![9.0, 8.0, 7.0])]).unwrap();
        save_staged(&paths, &kb, &staged).unwrap();
        assert_eq!(kb.len(), 3);

        let _ = kb.commit(staged).unwrap();
        let back = warm(load(&paths, "acme", CorruptionPolicy::Fail).unwrap());
        assert_eq!(back.len(), 4);
        assert_eq!(back.generation(), kb.generation());
        assert_eq!(back.metadata().get(3).unwrap().source, "doc_3");
        assert_eq!(back.index().vector(3), Some(&[9.0, 8.0, 7.0][..]));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        save(&paths, &sample()).unwrap();
        let dir = paths.index.parent().unwrap();
        let names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    }

    // ── fresh ───────────────────────────────────────────────────────

    #[test]
    fn missing_files_are_fresh() {
        let (_dir, paths) = setup();
        assert!(matches!(
            load(&paths, "acme", CorruptionPolicy::Fail).unwrap(),
            Loaded::Fresh
        ));
    }

    #[test]
    fn lone_index_file_is_fresh_with_warning() {
        let (logs, _guard) = capture_logs();
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        fs::remove_file(&paths.metadata).unwrap();

        assert!(matches!(
            load(&paths, "acme", CorruptionPolicy::Fail).unwrap(),
            Loaded::Fresh
        ));
        assert!(logs.has_event(Level::WARN, "incomplete snapshot"));
    }

    // ── corruption ──────────────────────────────────────────────────

    #[test]
    fn bad_magic_quarantined() {
        let (logs, _guard) = capture_logs();
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        let mut bytes = fs::read(&paths.index).unwrap();
        bytes[0] = b'X';
        fs::write(&paths.index, bytes).unwrap();

        match load(&paths, "acme", CorruptionPolicy::Quarantine).unwrap() {
            Loaded::Recovered {
                reason,
                quarantined,
            } => {
                assert_eq!(reason, "bad magic");
                assert_eq!(quarantined.len(), 2);
                assert!(quarantined.iter().all(|p| p.exists()));
            }
            other => panic!("expected recovery, got {other:?}"),
        }
        assert!(!paths.index.exists());
        assert!(!paths.metadata.exists());
        assert!(logs.has_event(Level::ERROR, "corrupt snapshot quarantined"));

        // A second load sees an empty directory.
        assert!(matches!(
            load(&paths, "acme", CorruptionPolicy::Quarantine).unwrap(),
            Loaded::Fresh
        ));
    }

    #[test]
    fn truncated_index_fails_under_fail_policy() {
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        let bytes = fs::read(&paths.index).unwrap();
        fs::write(&paths.index, &bytes[..bytes.len() - 3]).unwrap();

        let err = load(&paths, "acme", CorruptionPolicy::Fail).unwrap_err();
        match err {
            IndexError::CorruptSnapshot { path, reason } => {
                assert_eq!(path, paths.index);
                assert!(reason.contains("size mismatch"), "{reason}");
            }
            other => panic!("expected CorruptSnapshot, got {other:?}"),
        }
        assert!(paths.index.exists(), "fail policy must not move files");
    }

    #[test]
    fn generation_mismatch_detected() {
        // Simulates a crash after the index rename but before the metadata one.
        let (_dir, paths) = setup();
        let mut kb = sample();
        save(&paths, &kb).unwrap();
        let old_metadata = fs::read(&paths.metadata).unwrap();

        let _ = kb.append(vec![entry(3, vec![1.0, 1.0, 1.0])]).unwrap();
        save(&paths, &kb).unwrap();
        fs::write(&paths.metadata, old_metadata).unwrap();

        let err = load(&paths, "acme", CorruptionPolicy::Fail).unwrap_err();
        assert!(
            matches!(&err, IndexError::CorruptSnapshot { reason, .. } if reason.contains("generation mismatch")),
            "{err}"
        );
    }

    #[test]
    fn garbage_metadata_is_corrupt() {
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        fs::write(&paths.metadata, b"\x80\x04not json").unwrap();

        let err = load(&paths, "acme", CorruptionPolicy::Fail).unwrap_err();
        assert!(matches!(err, IndexError::CorruptSnapshot { path, .. } if path == paths.metadata));
    }

    #[test]
    fn foreign_tenant_snapshot_is_corrupt() {
        let (_dir, paths) = setup();
        save(&paths, &sample()).unwrap();
        let err = load(&paths, "globex", CorruptionPolicy::Fail).unwrap_err();
        assert!(matches!(err, IndexError::CorruptSnapshot { .. }));
    }
}
