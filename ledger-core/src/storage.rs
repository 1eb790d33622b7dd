//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `trips` - Trip records (key: trip_id)
//! - `ledgers` - Driver ledger snapshots (key: driver_id)
//! - `records` - Append-only transaction records (key: record_id)
//! - `indices` - Secondary indices for driver-scoped scans
//!
//! # Index layout
//!
//! Index keys start with `len(driver_id) as u32 BE || driver_id`, so a
//! driver id that contains a separator byte (or prefixes another id)
//! cannot alias a different driver's scan range.
//!
//! - `driver_prefix || '|' || record_id`: transaction records per driver.
//!   Record ids are UUIDv7, so the scan returns creation order.
//! - `driver_prefix || '#' || completed_at_nanos_be || trip_id`: completed
//!   trips per driver in completion order.

use crate::{
    error::{Error, Result},
    types::{DriverId, DriverLedger, TransactionRecord, Trip},
    Config,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_TRIPS: &str = "trips";
const CF_LEDGERS: &str = "ledgers";
const CF_RECORDS: &str = "records";
const CF_INDICES: &str = "indices";

/// Separator between driver id and record id in the record index
const IDX_RECORD_SEP: u8 = b'|';
/// Separator between driver id and completion key in the trip index
const IDX_TRIP_SEP: u8 = b'#';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Serializes version-checked commits within this process
    commit_lock: Mutex<()>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy record log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRIPS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_LEDGERS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_RECORDS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
        })
    }

    // Column family options

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Snapshots are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Trip operations

    /// Put trip (create or replace)
    pub fn put_trip(&self, trip: &Trip) -> Result<()> {
        let cf = self.cf_handle(CF_TRIPS)?;
        let value = bincode::serialize(trip)?;
        self.db.put_cf(cf, trip.trip_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get trip by ID
    pub fn get_trip(&self, trip_id: Uuid) -> Result<Trip> {
        self.get_trip_opt(trip_id)?
            .ok_or_else(|| Error::TripNotFound(trip_id.to_string()))
    }

    /// Get trip by ID if it exists
    pub fn get_trip_opt(&self, trip_id: Uuid) -> Result<Option<Trip>> {
        let cf = self.cf_handle(CF_TRIPS)?;
        match self.db.get_cf(cf, trip_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Ledger operations

    /// Get ledger snapshot, or the lazy zero state if the driver has none
    pub fn get_ledger(&self, driver_id: &DriverId, today: NaiveDate) -> Result<DriverLedger> {
        Ok(self
            .get_ledger_opt(driver_id)?
            .unwrap_or_else(|| DriverLedger::new(driver_id.clone(), today)))
    }

    fn get_ledger_opt(&self, driver_id: &DriverId) -> Result<Option<DriverLedger>> {
        let cf = self.cf_handle(CF_LEDGERS)?;
        match self.db.get_cf(cf, driver_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Record operations

    /// Get record by ID
    pub fn get_record(&self, record_id: Uuid) -> Result<TransactionRecord> {
        let cf = self.cf_handle(CF_RECORDS)?;
        let value = self
            .db
            .get_cf(cf, record_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Record not found: {}", record_id)))?;
        let record: TransactionRecord = bincode::deserialize(&value)?;
        Ok(record)
    }

    /// Get all transaction records for a driver, in creation order
    pub fn get_driver_records(&self, driver_id: &DriverId) -> Result<Vec<TransactionRecord>> {
        let prefix = Self::index_prefix(driver_id, IDX_RECORD_SEP);
        let mut records = Vec::new();

        for key in self.scan_index(&prefix)? {
            // record_id is the trailing 16 bytes
            if key.len() >= prefix.len() + 16 {
                let record_id_bytes: [u8; 16] =
                    key[key.len() - 16..].try_into().expect("length checked");
                records.push(self.get_record(Uuid::from_bytes(record_id_bytes))?);
            }
        }

        Ok(records)
    }

    /// Get all completed trips for a driver, ordered by completion time
    pub fn get_completed_trips(&self, driver_id: &DriverId) -> Result<Vec<Trip>> {
        let prefix = Self::index_prefix(driver_id, IDX_TRIP_SEP);
        let mut trips = Vec::new();

        for key in self.scan_index(&prefix)? {
            if key.len() >= prefix.len() + 16 {
                let trip_id_bytes: [u8; 16] =
                    key[key.len() - 16..].try_into().expect("length checked");
                trips.push(self.get_trip(Uuid::from_bytes(trip_id_bytes))?);
            }
        }

        Ok(trips)
    }

    // Atomic commits

    /// Commit a settlement: trip update, ledger snapshot, and all records
    /// in one write batch, guarded by the ledger snapshot version
    pub fn commit_settlement(
        &self,
        trip: &Trip,
        ledger: &DriverLedger,
        records: &[TransactionRecord],
        expected_version: u64,
    ) -> Result<()> {
        let completed_at = trip
            .completed_at
            .ok_or_else(|| Error::InvalidTrip("settled trip has no completion time".to_string()))?;

        let _guard = self.commit_lock.lock();
        self.check_version(&ledger.driver_id, expected_version)?;

        // Settlement fields are written at most once; a commit against a
        // trip that already carries settled_at is a double apply
        if let Some(stored) = self.get_trip_opt(trip.trip_id)? {
            if stored.is_settled() {
                return Err(Error::AlreadySettled(trip.trip_id.to_string()));
            }
        }

        let mut batch = WriteBatch::default();

        // 1. Trip with fee/gross/settled_at recorded
        let cf_trips = self.cf_handle(CF_TRIPS)?;
        batch.put_cf(cf_trips, trip.trip_id.as_bytes(), bincode::serialize(trip)?);

        // 2. Completed-trip index entry
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_trip = Self::index_key_completed_trip(
            &ledger.driver_id,
            completed_at.timestamp_nanos_opt().unwrap_or(0),
            trip.trip_id,
        );
        batch.put_cf(cf_indices, &idx_trip, []);

        // 3. Ledger snapshot and records
        self.stage_ledger_update(&mut batch, ledger, expected_version, records)?;

        self.db.write(batch)?;

        tracing::debug!(
            trip_id = %trip.trip_id,
            driver_id = %ledger.driver_id,
            records = records.len(),
            version = expected_version + 1,
            "Settlement committed"
        );

        Ok(())
    }

    /// Commit a ledger mutation without a trip (payouts, reconcile apply)
    pub fn commit_ledger_update(
        &self,
        ledger: &DriverLedger,
        records: &[TransactionRecord],
        expected_version: u64,
    ) -> Result<()> {
        let _guard = self.commit_lock.lock();
        self.check_version(&ledger.driver_id, expected_version)?;

        let mut batch = WriteBatch::default();
        self.stage_ledger_update(&mut batch, ledger, expected_version, records)?;
        self.db.write(batch)?;

        Ok(())
    }

    /// Stage ledger snapshot (version bumped) and records into a batch
    fn stage_ledger_update(
        &self,
        batch: &mut WriteBatch,
        ledger: &DriverLedger,
        expected_version: u64,
        records: &[TransactionRecord],
    ) -> Result<()> {
        ledger.check_invariants()?;

        let cf_ledgers = self.cf_handle(CF_LEDGERS)?;
        let cf_records = self.cf_handle(CF_RECORDS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut snapshot = ledger.clone();
        snapshot.version = expected_version + 1;
        batch.put_cf(
            cf_ledgers,
            snapshot.driver_id.as_str().as_bytes(),
            bincode::serialize(&snapshot)?,
        );

        for record in records {
            batch.put_cf(cf_records, record.record_id.as_bytes(), bincode::serialize(record)?);

            let idx = Self::index_key_record(&record.driver_id, record.record_id);
            batch.put_cf(cf_indices, &idx, []);
        }

        Ok(())
    }

    /// Verify the stored ledger version matches what the writer read
    fn check_version(&self, driver_id: &DriverId, expected: u64) -> Result<()> {
        let found = self.get_ledger_opt(driver_id)?.map(|l| l.version).unwrap_or(0);
        if found != expected {
            return Err(Error::LedgerConflict {
                driver_id: driver_id.as_str().to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    // Index key helpers

    fn index_prefix(driver_id: &DriverId, sep: u8) -> Vec<u8> {
        let id = driver_id.as_str().as_bytes();
        let mut key = Vec::with_capacity(4 + id.len() + 1);
        key.extend_from_slice(&(id.len() as u32).to_be_bytes());
        key.extend_from_slice(id);
        key.push(sep);
        key
    }

    fn index_key_record(driver_id: &DriverId, record_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix(driver_id, IDX_RECORD_SEP);
        key.extend_from_slice(record_id.as_bytes());
        key
    }

    fn index_key_completed_trip(
        driver_id: &DriverId,
        completed_at_nanos: i64,
        trip_id: Uuid,
    ) -> Vec<u8> {
        let mut key = Self::index_prefix(driver_id, IDX_TRIP_SEP);
        key.extend_from_slice(&completed_at_nanos.to_be_bytes());
        key.extend_from_slice(trip_id.as_bytes());
        key
    }

    /// Scan index keys with the given prefix, in key order
    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }

        Ok(keys)
    }

    // Statistics

    /// Get storage statistics (approximate)
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_trips: self.approximate_count(CF_TRIPS)?,
            total_records: self.approximate_count(CF_RECORDS)?,
            total_drivers: self.approximate_count(CF_LEDGERS)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate trip count
    pub total_trips: u64,
    /// Approximate transaction record count
    pub total_records: u64,
    /// Approximate driver ledger count
    pub total_drivers: u64,
}
