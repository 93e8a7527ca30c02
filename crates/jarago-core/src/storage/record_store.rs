//! Durable list of completed sleep records.
//!
//! Loaded once when the store is opened and written through on every
//! mutation: each append, review update and delete re-serializes the whole
//! list under [`RECORDS_KEY`] before returning.

use std::rc::Rc;

use uuid::Uuid;

use super::Database;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::record::SleepRecord;

pub const RECORDS_KEY: &str = "sleepRecords";

pub struct RecordStore {
    db: Rc<Database>,
    records: Vec<SleepRecord>,
}

impl RecordStore {
    /// Load the persisted list, most recent date first.
    ///
    /// Missing or undecodable data yields an empty store; only a failing
    /// database read is an error.
    pub fn load(db: Rc<Database>) -> Result<Self> {
        let mut records = match db.kv_get(RECORDS_KEY)? {
            Some(json) => serde_json::from_str::<Vec<SleepRecord>>(&json).unwrap_or_else(|e| {
                tracing::warn!("discarding undecodable sleep records: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        records.sort_by(|a, b| b.date.cmp(&a.date));
        tracing::debug!(count = records.len(), "loaded sleep records");
        Ok(Self { db, records })
    }

    pub fn records(&self) -> &[SleepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&SleepRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn append(&mut self, record: SleepRecord) -> Result<()> {
        self.append_with(record, Vec::new())
    }

    /// Append `record` and write `extra` keys in the same transaction.
    ///
    /// Nothing changes, in memory or on disk, if the write fails.
    pub fn append_with(
        &mut self,
        record: SleepRecord,
        extra: Vec<(&'static str, String)>,
    ) -> Result<()> {
        let mut next = self.records.clone();
        next.push(record);
        self.commit(next, extra)
    }

    /// Overwrite the review of one record.
    pub fn set_review(&mut self, id: Uuid, review: &str) -> Result<Outcome> {
        let mut next = self.records.clone();
        let Some(record) = next.iter_mut().find(|r| r.id == id) else {
            return Ok(Outcome::NotFound);
        };
        record.sleep_review = review.to_string();
        self.commit(next, Vec::new())?;
        Ok(Outcome::Applied(()))
    }

    /// Remove one record, keeping the others in their relative order.
    pub fn delete(&mut self, id: Uuid) -> Result<Outcome<SleepRecord>> {
        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            return Ok(Outcome::NotFound);
        };
        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(next, Vec::new())?;
        Ok(Outcome::Applied(removed))
    }

    /// Remove everything. Returns how many records were dropped.
    pub fn clear(&mut self) -> Result<usize> {
        self.clear_with(Vec::new())
    }

    /// Remove everything and write `extra` keys in the same transaction.
    pub fn clear_with(&mut self, extra: Vec<(&'static str, String)>) -> Result<usize> {
        let count = self.records.len();
        self.commit(Vec::new(), extra)?;
        Ok(count)
    }

    fn commit(&mut self, next: Vec<SleepRecord>, extra: Vec<(&'static str, String)>) -> Result<()> {
        let mut entries = vec![(RECORDS_KEY, serde_json::to_string(&next)?)];
        entries.extend(extra);
        self.db.kv_set_many(&entries)?;
        self.records = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(day: u32) -> SleepRecord {
        let bed = Utc.with_ymd_and_hms(2025, 8, day, 12, 0, 0).unwrap();
        SleepRecord::new(bed, bed + Duration::hours(7), 3, "", Vec::new()).unwrap()
    }

    fn reload(db: &Rc<Database>) -> RecordStore {
        RecordStore::load(Rc::clone(db)).unwrap()
    }

    #[test]
    fn empty_database_loads_empty_store() {
        let db = Rc::new(Database::open_memory().unwrap());
        assert!(reload(&db).is_empty());
    }

    #[test]
    fn undecodable_data_loads_empty_store() {
        let db = Rc::new(Database::open_memory().unwrap());
        db.kv_set(RECORDS_KEY, "{not json").unwrap();
        assert!(reload(&db).is_empty());
    }

    #[test]
    fn append_writes_through_and_load_sorts_descending() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        let (third, seventh, fifth) = (record(3), record(7), record(5));
        let expected = vec![seventh.id, fifth.id, third.id];
        for r in [third, seventh, fifth] {
            store.append(r).unwrap();
        }

        let loaded: Vec<_> = reload(&db).records().iter().map(|r| r.id).collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn review_overwrites_and_persists() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        let r = record(4);
        let id = r.id;
        store.append(r).unwrap();

        assert!(store.set_review(id, "rested").unwrap().is_applied());
        assert!(store.set_review(id, "groggy").unwrap().is_applied());
        assert_eq!(reload(&db).get(id).unwrap().sleep_review, "groggy");
    }

    #[test]
    fn review_of_unknown_id_is_not_found() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        store.append(record(4)).unwrap();
        let before = store.records().to_vec();

        assert_eq!(store.set_review(Uuid::new_v4(), "x").unwrap(), Outcome::NotFound);
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn delete_keeps_relative_order() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        let (a, b, c) = (record(1), record(2), record(3));
        let ids = [a.id, b.id, c.id];
        for r in [a, b, c] {
            store.append(r).unwrap();
        }

        let removed = store.delete(ids[1]).unwrap().applied().unwrap();
        assert_eq!(removed.id, ids[1]);
        let remaining: Vec<_> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);
        assert_eq!(reload(&db).len(), 2);
        assert_eq!(store.delete(ids[1]).unwrap(), Outcome::NotFound);
    }

    #[test]
    fn failed_write_leaves_store_untouched() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        let kept = record(1);
        let kept_id = kept.id;
        store.append(kept).unwrap();

        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_writes BEFORE INSERT ON kv
                 BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )
            .unwrap();
        assert!(store
            .append_with(record(2), vec![("isSleeping", "false".into())])
            .is_err());
        assert!(store.delete(kept_id).is_err());
        assert!(store.clear().is_err());

        assert_eq!(store.len(), 1);
        assert_eq!(reload(&db).len(), 1);
        assert!(db.kv_get("isSleeping").unwrap().is_none());
    }

    #[test]
    fn extra_keys_are_written_with_the_list() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        store
            .append_with(record(1), vec![("isSleeping", "false".into())])
            .unwrap();
        assert_eq!(db.kv_get("isSleeping").unwrap().as_deref(), Some("false"));
        assert_eq!(store.clear_with(vec![("sleepGoal", "8.0".into())]).unwrap(), 1);
        assert_eq!(db.kv_get("sleepGoal").unwrap().as_deref(), Some("8.0"));
    }

    #[test]
    fn clear_empties_persisted_list() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut store = reload(&db);
        store.append(record(1)).unwrap();
        store.append(record(2)).unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(reload(&db).is_empty());
    }
}
