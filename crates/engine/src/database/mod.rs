//! Database struct and open/close logic
//!
//! This module provides the main Database struct that orchestrates:
//! - Table initialization from `skytrace.toml`
//! - WAL opening
//! - Automatic recovery on startup
//! - The write path: log to WAL, then apply in memory
//!
//! ## Write path
//!
//! Each mutation hands the storage layer a log hook. The hook runs once the
//! affected index buckets or keys are locked, and appends the WAL entry. If
//! the append fails the mutation is abandoned and no table changes, so the
//! in-memory state never runs ahead of the log.
//!
//! Reads go straight to the tables (`traces()`, `catalog()`, ...).

pub mod config;
mod recovery;
mod registry;

pub use config::{SkytraceConfig, CONFIG_FILE_NAME};
pub use recovery::RecoveryStats;
pub use registry::OPEN_DATABASES;

use recovery::Tables;
use serde_json::Value;
use skytrace_core::{
    AircraftModel, AircraftRegistration, Error, IcaoAddress, RecordId, Result, TraceRecord,
};
use skytrace_durability::{DurabilityMode, Wal, WalEntry};
use skytrace_storage::{CatalogTables, MetadataTable, TagTables, TraceTables};
use parking_lot::Mutex as ParkingMutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// WAL directory inside the data directory
pub const WAL_DIR_NAME: &str = "wal";
/// WAL file name inside the WAL directory
pub const WAL_FILE_NAME: &str = "skytrace.wal";

/// Main database handle
///
/// Owns every in-memory table and the WAL. Create one with
/// [`Database::open`] or [`Database::ephemeral`], then hand the `Arc` to the
/// component facades.
///
/// # Example
///
/// ```text
/// use skytrace_engine::Database;
///
/// let db = Database::open("/path/to/data")?;
/// db.append_trace(record)?;
/// db.shutdown()?;
/// ```
pub struct Database {
    /// Data directory path (empty for ephemeral databases)
    data_dir: PathBuf,

    /// Active configuration
    config: SkytraceConfig,

    traces: TraceTables,
    catalog: CatalogTables,
    tags: TagTables,
    metadata: MetadataTable,

    /// None for ephemeral databases (no disk I/O)
    wal: Option<Arc<Wal>>,

    /// Tells the background WAL flush thread to exit
    flush_shutdown: Arc<AtomicBool>,

    /// Background thread syncing a quiet batched WAL
    flush_handle: ParkingMutex<Option<JoinHandle<()>>>,

    /// Cleared by `shutdown`; every later mutation is rejected
    accepting_writes: AtomicBool,

    /// Counters from the replay done at open
    recovery: RecoveryStats,

    /// Exclusive lock on `<data_dir>/.lock`, held for the handle's lifetime
    _lock_file: Option<File>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.data_dir)
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Open database at the given path, reading `skytrace.toml`
    ///
    /// A default `skytrace.toml` is written on first open. If the path is
    /// already open in this process, the existing instance is returned.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        SkytraceConfig::write_default_if_missing(&config_path)?;
        let cfg = SkytraceConfig::from_file(&config_path)?;

        Self::open_inner(data_dir, cfg, false)
    }

    /// Open database at the given path with an explicit configuration
    ///
    /// The config is written to `skytrace.toml` once this call owns the
    /// data directory, so later `open` calls pick up the same settings. If
    /// the path is already open in this process with a different config,
    /// this fails with `InvalidConfig` and the file is left alone.
    pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: SkytraceConfig) -> Result<Arc<Self>> {
        cfg.validate()?;
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        Self::open_inner(data_dir, cfg, true)
    }

    fn open_inner(data_dir: PathBuf, cfg: SkytraceConfig, persist: bool) -> Result<Arc<Self>> {
        let mode = cfg.durability_mode()?;
        let settings = cfg.index_settings()?;
        let canonical_path = data_dir.canonicalize()?;

        // Hold the registry lock for the whole open so two threads cannot
        // both create an instance for the same path
        let mut registry = OPEN_DATABASES.lock();
        if let Some(db) = registry.get(&canonical_path).and_then(|weak| weak.upgrade()) {
            if persist && db.config != cfg {
                warn!(target: "skytrace::db", path = ?canonical_path, "open rejected: already open with a different config");
                return Err(Error::InvalidConfig(format!(
                    "database at '{}' is already open with a different configuration",
                    canonical_path.display()
                )));
            }
            info!(target: "skytrace::db", path = ?canonical_path, "Returning existing database instance");
            return Ok(db);
        }

        let lock_file = lock_data_dir(&canonical_path)?;
        if persist {
            cfg.write_to_file(&canonical_path.join(CONFIG_FILE_NAME))?;
        }

        let wal = Wal::open(
            canonical_path.join(WAL_DIR_NAME).join(WAL_FILE_NAME),
            mode,
        )?;
        let replay = wal.read_all()?;
        if replay.torn_bytes > 0 {
            wal.truncate(replay.valid_len)?;
        }

        let mut db = Self {
            data_dir: canonical_path.clone(),
            config: cfg,
            traces: TraceTables::new(settings),
            catalog: CatalogTables::new(),
            tags: TagTables::new(),
            metadata: MetadataTable::new(),
            wal: None,
            flush_shutdown: Arc::new(AtomicBool::new(false)),
            flush_handle: ParkingMutex::new(None),
            accepting_writes: AtomicBool::new(true),
            recovery: RecoveryStats::default(),
            _lock_file: Some(lock_file),
        };
        let mut stats = RecoveryStats {
            torn_bytes: replay.torn_bytes,
            ..RecoveryStats::default()
        };
        recovery::replay(db.tables(), replay.entries, &mut stats)?;
        db.recovery = stats;

        let wal = Arc::new(wal);
        if let DurabilityMode::Batched { interval_ms, .. } = mode {
            let handle = spawn_flush_thread(
                Arc::clone(&wal),
                Arc::clone(&db.flush_shutdown),
                Duration::from_millis(interval_ms),
            )?;
            *db.flush_handle.lock() = Some(handle);
        }
        db.wal = Some(wal);

        info!(
            target: "skytrace::db",
            path = ?canonical_path,
            durability = ?mode,
            traces = db.recovery.traces,
            registrations = db.recovery.registrations,
            models = db.recovery.models,
            tags_added = db.recovery.tags_added,
            tags_removed = db.recovery.tags_removed,
            metadata = db.recovery.metadata,
            torn_bytes = db.recovery.torn_bytes,
            "Recovery complete"
        );

        let db = Arc::new(db);
        registry.insert(canonical_path, Arc::downgrade(&db));
        Ok(db)
    }

    /// In-memory database with default settings and no files
    pub fn ephemeral() -> Arc<Self> {
        Arc::new(Self::in_memory(
            SkytraceConfig::default(),
            skytrace_storage::IndexSettings::default(),
        ))
    }

    /// In-memory database with explicit settings
    ///
    /// Only the index settings apply; durability is ignored without a WAL.
    pub fn ephemeral_with_config(cfg: SkytraceConfig) -> Result<Arc<Self>> {
        cfg.validate()?;
        let settings = cfg.index_settings()?;
        Ok(Arc::new(Self::in_memory(cfg, settings)))
    }

    fn in_memory(config: SkytraceConfig, settings: skytrace_storage::IndexSettings) -> Self {
        Self {
            data_dir: PathBuf::new(),
            config,
            traces: TraceTables::new(settings),
            catalog: CatalogTables::new(),
            tags: TagTables::new(),
            metadata: MetadataTable::new(),
            wal: None,
            flush_shutdown: Arc::new(AtomicBool::new(false)),
            flush_handle: ParkingMutex::new(None),
            accepting_writes: AtomicBool::new(true),
            recovery: RecoveryStats::default(),
            _lock_file: None,
        }
    }

    fn tables(&self) -> Tables<'_> {
        Tables {
            traces: &self.traces,
            catalog: &self.catalog,
            tags: &self.tags,
            metadata: &self.metadata,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Trace arena and indexes
    pub fn traces(&self) -> &TraceTables {
        &self.traces
    }

    /// Registration and model tables
    pub fn catalog(&self) -> &CatalogTables {
        &self.catalog
    }

    /// Identity ↔ tag relation
    pub fn tags(&self) -> &TagTables {
        &self.tags
    }

    /// Metadata table
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Data directory (empty for ephemeral databases)
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Active configuration
    pub fn config(&self) -> &SkytraceConfig {
        &self.config
    }

    /// Whether this database has no files
    pub fn is_ephemeral(&self) -> bool {
        self.wal.is_none()
    }

    /// Durability mode of the WAL, if any
    pub fn durability_mode(&self) -> Option<DurabilityMode> {
        self.wal.as_ref().map(|wal| wal.durability_mode())
    }

    /// Counters from the WAL replay done at open
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery
    }

    /// Check if the database is open and accepting writes
    pub fn is_open(&self) -> bool {
        self.accepting_writes.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Write path
    // ========================================================================

    fn check_accepting(&self) -> Result<()> {
        if !self.is_open() {
            warn!(target: "skytrace::db", "write rejected: database is closed");
            return Err(Error::StorageFailure("database is closed".to_string()));
        }
        Ok(())
    }

    /// Log hook shared by every mutation
    fn log(&self, entry: WalEntry) -> Result<()> {
        self.check_accepting()?;
        if let Some(wal) = &self.wal {
            wal.append(&entry)?;
        }
        Ok(())
    }

    /// Append one trace record
    pub fn append_trace(&self, record: TraceRecord) -> Result<RecordId> {
        self.check_accepting()?;
        self.traces.append_with(record, |record| {
            self.log(WalEntry::TraceAppend {
                record: record.clone(),
            })
        })
    }

    /// Insert or overwrite a registration row
    pub fn upsert_registration(&self, row: AircraftRegistration) -> Result<()> {
        self.check_accepting()?;
        self.catalog.upsert_registration_with(row, |row| {
            self.log(WalEntry::RegistrationUpsert { row: row.clone() })
        })
    }

    /// Insert or overwrite a model row
    pub fn upsert_model(&self, model: AircraftModel) -> Result<()> {
        self.check_accepting()?;
        self.catalog.upsert_model_with(model, |model| {
            self.log(WalEntry::ModelUpsert {
                model: model.clone(),
            })
        })
    }

    /// Add a tag pair; `DuplicateTag` if present
    pub fn add_tag(&self, icao_address: IcaoAddress, tag: &str) -> Result<()> {
        self.check_accepting()?;
        self.tags.add_with(icao_address, tag, || {
            self.log(WalEntry::TagAdd {
                icao_address,
                tag: tag.to_string(),
            })
        })
    }

    /// Remove a tag pair; `Ok(false)` if it was absent
    pub fn remove_tag(&self, icao_address: IcaoAddress, tag: &str) -> Result<bool> {
        self.check_accepting()?;
        self.tags.remove_with(icao_address, tag, || {
            self.log(WalEntry::TagRemove {
                icao_address,
                tag: tag.to_string(),
            })
        })
    }

    /// Replace a metadata value
    pub fn set_metadata(&self, key: &str, value: Value) -> Result<()> {
        self.check_accepting()?;
        self.metadata
            .set_with(key, value, |key, value| self.log(WalEntry::metadata_set(key, value)?))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Flush and fsync the WAL
    pub fn flush(&self) -> Result<()> {
        match &self.wal {
            Some(wal) => wal.fsync(),
            None => Ok(()),
        }
    }

    /// Stop accepting writes and make everything logged so far durable
    ///
    /// Reads keep working. Later mutations fail with `StorageFailure`.
    pub fn shutdown(&self) -> Result<()> {
        let was_open = self.accepting_writes.swap(false, Ordering::SeqCst);
        self.stop_flush_thread();
        self.flush()?;
        if was_open {
            info!(
                target: "skytrace::db",
                path = ?self.data_dir,
                records = self.traces.len(),
                "Database shut down"
            );
        } else {
            debug!(target: "skytrace::db", "shutdown called on closed database");
        }
        Ok(())
    }

    /// Signal the background flush thread and wait for it to exit
    fn stop_flush_thread(&self) {
        self.flush_shutdown.store(true, Ordering::SeqCst);
        let handle = self.flush_handle.lock().take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!(target: "skytrace::db", "WAL flush thread panicked");
            }
        }
    }

    #[cfg(test)]
    fn has_flush_thread(&self) -> bool {
        self.flush_handle.lock().is_some()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.stop_flush_thread();
    }
}

/// Start the thread that syncs a batched WAL once its interval has passed
///
/// Without it the last entries before an idle period would stay buffered
/// until the next append or shutdown.
fn spawn_flush_thread(
    wal: Arc<Wal>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("skytrace-wal-flush".into())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                std::thread::park_timeout(interval);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = wal.sync_if_overdue() {
                    warn!(target: "skytrace::db", error = %e, "Background WAL sync failed");
                }
            }
        })
        .map_err(|e| Error::StorageFailure(format!("failed to spawn WAL flush thread: {}", e)))
}

/// Take an exclusive lock on the data directory
///
/// Protects against a second process appending to the same WAL.
fn lock_data_dir(dir: &Path) -> Result<File> {
    let lock_path = dir.join(".lock");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::StorageFailure(format!("failed to open lock file: {}", e)))?;
    fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
        Error::StorageFailure(format!(
            "database at '{}' is already in use by another process",
            dir.display()
        ))
    })?;
    Ok(lock_file)
}
