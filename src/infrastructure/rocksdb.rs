use crate::domain::actor::ActorId;
use crate::domain::commission::{Commission, CommissionId, CommissionStatus};
use crate::domain::ports::{CommissionStore, RuleStore};
use crate::domain::rule::{CommissionRule, RuleId};
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for commission records.
pub const CF_COMMISSIONS: &str = "commissions";
/// Column Family for commission rules.
pub const CF_RULES: &str = "rules";

/// A persistent store implementation using RocksDB.
///
/// Commissions and rules live in separate Column Families, keyed by their
/// internal ids and stored as JSON. Sequence codes continue across process
/// restarts because `count_in_period` scans the persisted records.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// both column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_commissions = ColumnFamilyDescriptor::new(CF_COMMISSIONS, Options::default());
        let cf_rules = ColumnFamilyDescriptor::new(CF_RULES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_commissions, cf_rules])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CommissionError::Storage(format!("column family {name} not found")))
    }

    fn put_json<T: serde::Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &str,
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_commissions(&self) -> Result<Vec<Commission>> {
        let cf = self.cf(CF_COMMISSIONS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

fn ordered(mut records: Vec<Commission>) -> Vec<Commission> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.code.cmp(&b.code)));
    records
}

#[async_trait]
impl CommissionStore for RocksDbStore {
    async fn insert(&self, commission: Commission) -> Result<()> {
        self.put_json(CF_COMMISSIONS, &commission.id.0, &commission)
    }

    async fn get(&self, id: &CommissionId) -> Result<Option<Commission>> {
        self.get_json(CF_COMMISSIONS, &id.0)
    }

    async fn update(&self, commission: Commission) -> Result<()> {
        if self
            .get_json::<Commission>(CF_COMMISSIONS, &commission.id.0)?
            .is_none()
        {
            return Err(CommissionError::NotFound {
                kind: "commission",
                id: commission.id.to_string(),
            });
        }
        self.put_json(CF_COMMISSIONS, &commission.id.0, &commission)
    }

    async fn count_in_period(&self, year: i32) -> Result<u64> {
        Ok(self
            .scan_commissions()?
            .iter()
            .filter(|c| c.period() == year)
            .count() as u64)
    }

    async fn list_by_period(&self, year: i32) -> Result<Vec<Commission>> {
        let records = self.scan_commissions()?;
        Ok(ordered(
            records.into_iter().filter(|c| c.period() == year).collect(),
        ))
    }

    async fn list_by_owner(&self, owner: &ActorId) -> Result<Vec<Commission>> {
        let records = self.scan_commissions()?;
        Ok(ordered(
            records.into_iter().filter(|c| &c.owner == owner).collect(),
        ))
    }

    async fn list_by_status(&self, status: CommissionStatus) -> Result<Vec<Commission>> {
        let records = self.scan_commissions()?;
        Ok(ordered(
            records.into_iter().filter(|c| c.status == status).collect(),
        ))
    }
}

#[async_trait]
impl RuleStore for RocksDbStore {
    async fn insert(&self, rule: CommissionRule) -> Result<()> {
        self.put_json(CF_RULES, &rule.id.0, &rule)
    }

    async fn get(&self, id: &RuleId) -> Result<Option<CommissionRule>> {
        self.get_json(CF_RULES, &id.0)
    }

    async fn update(&self, rule: CommissionRule) -> Result<()> {
        if self.get_json::<CommissionRule>(CF_RULES, &rule.id.0)?.is_none() {
            return Err(CommissionError::NotFound {
                kind: "commission rule",
                id: rule.id.to_string(),
            });
        }
        self.put_json(CF_RULES, &rule.id.0, &rule)
    }
}
