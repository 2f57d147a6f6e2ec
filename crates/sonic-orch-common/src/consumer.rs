//! Change-stream queue for one table.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Operation type of a change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Set operation (add or update)
    #[serde(rename = "SET")]
    Set,
    /// Delete operation
    #[serde(rename = "DEL")]
    Del,
}

impl Operation {
    /// Returns true if this is a Set operation.
    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set)
    }

    /// Returns true if this is a Del operation.
    pub fn is_del(&self) -> bool {
        matches!(self, Operation::Del)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "SET",
            Operation::Del => "DEL",
        }
    }
}

/// A field-value pair of a change entry.
pub type FieldValue = (String, String);

/// Key, operation, and field-values tuple.
///
/// This is the fundamental unit of desired-state change consumed by orchs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOpFieldsValues {
    /// The key (e.g., "Vnet1", "eni0:10.0.0.0/24")
    pub key: String,
    /// The operation (Set or Del)
    pub op: Operation,
    /// Field-value pairs (empty for Del operations)
    #[serde(default)]
    pub fvs: Vec<FieldValue>,
}

impl KeyOpFieldsValues {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, op: Operation, fvs: Vec<FieldValue>) -> Self {
        Self {
            key: key.into(),
            op,
            fvs,
        }
    }

    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: Vec<FieldValue>) -> Self {
        Self::new(key, Operation::Set, fvs)
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self::new(key, Operation::Del, vec![])
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this entry has the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fvs.iter().any(|(f, _)| f == field)
    }
}

/// Configuration for a Consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Table name (e.g., "DASH_VNET_TABLE")
    pub table_name: String,
    /// Priority (lower = higher priority)
    pub priority: i32,
    /// Pop batch size
    pub batch_size: usize,
}

impl ConsumerConfig {
    /// Creates a new consumer config.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            priority: 0,
            batch_size: 128,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Pending changes of one table.
///
/// # Collapsing
///
/// At most one entry per key is pending. A newer entry for a key replaces the
/// pending one, whatever the operations, and takes the newer arrival
/// position. Earlier entries are discarded without side effects, so a batch
/// holding `SET a`, `SET a` stages only the second.
///
/// Entries handed back with [`Consumer::requeue`] go in front of everything
/// still pending, in their original relative order, unless a newer change for
/// the same key arrived in the meantime.
#[derive(Debug)]
pub struct Consumer {
    config: ConsumerConfig,
    queue: BTreeMap<i64, KeyOpFieldsValues>,
    index: HashMap<String, i64>,
    next_back: i64,
    next_front: i64,
}

impl Consumer {
    /// Creates a new consumer with the given configuration.
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_back: 0,
            next_front: -1,
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    /// Returns the priority.
    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Returns true if there are pending entries.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Returns the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Adds new changes in arrival order, collapsing per key.
    pub fn add_to_sync(&mut self, entries: Vec<KeyOpFieldsValues>) {
        for entry in entries {
            if let Some(old) = self.index.remove(&entry.key) {
                self.queue.remove(&old);
            }
            let seq = self.next_back;
            self.next_back += 1;
            self.index.insert(entry.key.clone(), seq);
            self.queue.insert(seq, entry);
        }
    }

    /// Puts unfinished entries back at the front of the queue.
    ///
    /// An entry whose key already has a pending (newer) change is discarded.
    pub fn requeue(&mut self, entries: Vec<KeyOpFieldsValues>) {
        for entry in entries.into_iter().rev() {
            if self.index.contains_key(&entry.key) {
                continue;
            }
            let seq = self.next_front;
            self.next_front -= 1;
            self.index.insert(entry.key.clone(), seq);
            self.queue.insert(seq, entry);
        }
    }

    /// Removes and returns up to `batch_size` entries in queue order.
    pub fn pop_batch(&mut self) -> Vec<KeyOpFieldsValues> {
        let mut batch = Vec::with_capacity(self.config.batch_size.min(self.queue.len()));
        while batch.len() < self.config.batch_size {
            let Some((_, entry)) = self.queue.pop_first() else {
                break;
            };
            self.index.remove(&entry.key);
            batch.push(entry);
        }
        batch
    }

    /// Drains all pending entries in queue order.
    pub fn drain(&mut self) -> Vec<KeyOpFieldsValues> {
        self.index.clear();
        std::mem::take(&mut self.queue).into_values().collect()
    }

    /// Peeks at pending entries without removing them.
    pub fn peek(&self) -> impl Iterator<Item = &KeyOpFieldsValues> {
        self.queue.values()
    }

    /// Clears all pending entries.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    /// Dumps pending entries for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.queue
            .values()
            .map(|e| format!("{}|{}: {} {:?}", self.config.table_name, e.key, e.op.as_str(), e.fvs))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fv(f: &str, v: &str) -> FieldValue {
        (f.to_string(), v.to_string())
    }

    fn keys(entries: &[KeyOpFieldsValues]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn test_key_op_fields_values() {
        let entry = KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "100")]);

        assert_eq!(entry.key, "Vnet1");
        assert!(entry.op.is_set());
        assert_eq!(entry.get_field("vni"), Some("100"));
        assert!(entry.has_field("vni"));
        assert!(!entry.has_field("guid"));
    }

    #[test]
    fn test_consumer_basic() {
        let mut consumer = Consumer::new(ConsumerConfig::new("DASH_VNET_TABLE"));

        assert_eq!(consumer.table_name(), "DASH_VNET_TABLE");
        assert!(!consumer.has_pending());

        consumer.add_to_sync(vec![KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "100")])]);

        assert!(consumer.has_pending());
        assert_eq!(consumer.pending_count(), 1);
    }

    #[test]
    fn test_latest_set_wins() {
        let mut consumer = Consumer::new(ConsumerConfig::new("DASH_VNET_TABLE"));
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "100"), fv("guid", "g1")]),
            KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "200")]),
        ]);

        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get_field("vni"), Some("200"));
        // No field merging: the earlier entry is discarded whole
        assert_eq!(entries[0].get_field("guid"), None);
    }

    #[test]
    fn test_del_then_set_keeps_set() {
        let mut consumer = Consumer::new(ConsumerConfig::new("DASH_VNET_TABLE"));
        consumer.add_to_sync(vec![KeyOpFieldsValues::del("Vnet1")]);
        consumer.add_to_sync(vec![KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "1")])]);

        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].op.is_set());
    }

    #[test]
    fn test_collapse_moves_key_to_latest_position() {
        let mut consumer = Consumer::new(ConsumerConfig::new("T"));
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::set("a", vec![]),
            KeyOpFieldsValues::set("b", vec![]),
            KeyOpFieldsValues::del("a"),
        ]);

        assert_eq!(keys(&consumer.drain()), vec!["b", "a"]);
    }

    #[test]
    fn test_pop_batch_respects_batch_size() {
        let mut consumer = Consumer::new(ConsumerConfig::new("T").with_batch_size(2));
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::set("a", vec![]),
            KeyOpFieldsValues::set("b", vec![]),
            KeyOpFieldsValues::set("c", vec![]),
        ]);

        assert_eq!(keys(&consumer.pop_batch()), vec!["a", "b"]);
        assert_eq!(consumer.pending_count(), 1);
        assert_eq!(keys(&consumer.pop_batch()), vec!["c"]);
        assert!(consumer.pop_batch().is_empty());
    }

    #[test]
    fn test_requeue_goes_to_front_in_order() {
        let mut consumer = Consumer::new(ConsumerConfig::new("T"));
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::set("a", vec![]),
            KeyOpFieldsValues::set("b", vec![]),
        ]);
        let batch = consumer.drain();
        consumer.add_to_sync(vec![KeyOpFieldsValues::set("c", vec![])]);
        consumer.requeue(batch);

        assert_eq!(keys(&consumer.drain()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_requeue_never_overwrites_newer_change() {
        let mut consumer = Consumer::new(ConsumerConfig::new("T"));
        consumer.add_to_sync(vec![KeyOpFieldsValues::set("a", vec![fv("v", "old")])]);
        let batch = consumer.drain();
        consumer.add_to_sync(vec![KeyOpFieldsValues::del("a")]);
        consumer.requeue(batch);

        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].op.is_del());
    }

    #[test]
    fn test_replay_json_format() {
        let json = r#"{"key":"Vnet1","op":"SET","fvs":[["vni","100"]]}"#;
        let entry: KeyOpFieldsValues = serde_json::from_str(json).unwrap();
        assert_eq!(entry, KeyOpFieldsValues::set("Vnet1", vec![fv("vni", "100")]));

        let del: KeyOpFieldsValues = serde_json::from_str(r#"{"key":"Vnet1","op":"DEL"}"#).unwrap();
        assert!(del.op.is_del());
    }
}
