use crate::dds::{
    key::KeyHash,
    qos::policy::{History, HistoryQosKind, ResourceLimits, LENGTH_UNLIMITED},
    InstanceStateKind, SampleStateKind,
};
use crate::structure::{SequenceNumber, SerializedPayload, Timestamp, GUID};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::{BTreeMap, BTreeSet};

#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ChangeKind {
    Alive = 0,
    NotAliveDisposed = 1,
    NotAliveUnregistered = 2,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct CacheChange {
    pub kind: ChangeKind,
    pub writer_guid: GUID,
    pub sequence_number: SequenceNumber,
    pub source_timestamp: Timestamp,
    // In DDS, the value of the fields labeled as ‘key’ within the data
    // uniquely identify each data-object.
    pub instance_handle: KeyHash,
    data_value: Option<SerializedPayload>,
    pub sample_state: SampleStateKind,
}

impl CacheChange {
    pub fn new(
        kind: ChangeKind,
        writer_guid: GUID,
        sequence_number: SequenceNumber,
        source_timestamp: Timestamp,
        data_value: Option<SerializedPayload>,
        instance_handle: KeyHash,
    ) -> Self {
        Self {
            kind,
            writer_guid,
            sequence_number,
            source_timestamp,
            instance_handle,
            data_value,
            sample_state: SampleStateKind::NotRead,
        }
    }

    pub fn data_value(&self) -> Option<&SerializedPayload> {
        self.data_value.as_ref()
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct HCKey {
    pub guid: GUID,
    pub seq_num: SequenceNumber,
}
impl HCKey {
    pub fn new(guid: GUID, seq_num: SequenceNumber) -> Self {
        Self { guid, seq_num }
    }
}
impl PartialOrd for HCKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HCKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq_num
            .cmp(&other.seq_num)
            .then_with(|| self.guid.cmp(&other.guid))
    }
}

/// Writers registered for an instance and the instance state seen by a DataReader.
#[derive(Clone, Debug)]
struct InstanceRecord {
    state: InstanceStateKind,
    writers: BTreeSet<GUID>,
}

impl InstanceRecord {
    fn update(&mut self, kind: ChangeKind, writer: GUID) {
        match kind {
            ChangeKind::Alive => {
                self.state = InstanceStateKind::Alive;
                self.writers.insert(writer);
            }
            ChangeKind::NotAliveDisposed => {
                self.state = InstanceStateKind::NotAliveDisposed;
                self.writers.insert(writer);
            }
            ChangeKind::NotAliveUnregistered => {
                self.writers.remove(&writer);
                // disposed stays disposed
                if self.writers.is_empty() && self.state == InstanceStateKind::Alive {
                    self.state = InstanceStateKind::NotAliveNoWriters;
                }
            }
        }
    }
}

/// Changes kept by a DataWriter (for late joiners) or a DataReader (until taken),
/// bounded by the History and ResourceLimits QoS.
pub struct HistoryCache {
    changes: BTreeMap<HCKey, CacheChange>,
    instances: BTreeMap<KeyHash, InstanceRecord>,
    history: History,
    resource_limits: ResourceLimits,
}

impl HistoryCache {
    pub fn new(history: History, resource_limits: ResourceLimits) -> Self {
        Self {
            changes: BTreeMap::new(),
            instances: BTreeMap::new(),
            history,
            resource_limits,
        }
    }

    /// Nothing is removed from the cache when the change is rejected.
    pub fn add_change(&mut self, change: CacheChange) -> Result<(), String> {
        let key = HCKey::new(change.writer_guid, change.sequence_number);
        if self.changes.contains_key(&key) {
            return Err(format!(
                "change seq_num: {} from {} is already in HistoryCache",
                key.seq_num.0, key.guid
            ));
        }

        let instance = change.instance_handle;
        let is_new_instance = !self.instances().contains(&instance);
        let limits = self.resource_limits;
        if is_new_instance
            && limits.max_instances != LENGTH_UNLIMITED
            && self.instances().len() as i32 >= limits.max_instances
        {
            return Err(format!("max_instances {} reached", limits.max_instances));
        }

        let evicted = match self.history.kind {
            HistoryQosKind::KeepLast => {
                if change.data_value.is_some() {
                    // the oldest samples of the instance make room
                    let samples = self.instance_keys(instance, |c| c.data_value.is_some());
                    let keep = self.history.depth.max(1) as usize - 1;
                    let excess = samples.len().saturating_sub(keep);
                    samples.into_iter().take(excess).collect()
                } else {
                    // a state change only replaces the previous state change of its kind
                    self.instance_keys(instance, |c| {
                        c.data_value.is_none() && c.kind == change.kind
                    })
                }
            }
            HistoryQosKind::KeepAll => {
                let in_instance = self.instance_keys(instance, |_| true).len();
                if limits.max_samples_per_instance != LENGTH_UNLIMITED
                    && in_instance as i32 >= limits.max_samples_per_instance
                {
                    return Err(format!(
                        "max_samples_per_instance {} reached",
                        limits.max_samples_per_instance
                    ));
                }
                Vec::new()
            }
        };
        if limits.max_samples != LENGTH_UNLIMITED
            && (self.changes.len() - evicted.len()) as i32 >= limits.max_samples
        {
            return Err(format!("max_samples {} reached", limits.max_samples));
        }

        for k in evicted {
            self.changes.remove(&k);
        }
        self.instances
            .entry(instance)
            .or_insert_with(|| InstanceRecord {
                state: InstanceStateKind::Alive,
                writers: BTreeSet::new(),
            })
            .update(change.kind, change.writer_guid);
        self.changes.insert(key, change);
        Ok(())
    }

    pub fn get_changes(&self) -> Vec<CacheChange> {
        self.changes.values().cloned().collect()
    }

    /// Returns every change, marking them as read.
    pub fn read_all(&mut self) -> Vec<CacheChange> {
        let changes = self.get_changes();
        for c in self.changes.values_mut() {
            c.sample_state = SampleStateKind::Read;
        }
        changes
    }

    /// Removes and returns every change.
    pub fn take_all(&mut self) -> Vec<CacheChange> {
        let changes = std::mem::take(&mut self.changes);
        self.forget_finished_instances();
        changes.into_values().collect()
    }

    /// Removes and returns the oldest change not read yet.
    pub fn take_next(&mut self) -> Option<CacheChange> {
        let key = self
            .changes
            .iter()
            .find(|(_, c)| c.sample_state == SampleStateKind::NotRead)
            .map(|(k, _)| *k)?;
        let change = self.changes.remove(&key);
        self.forget_finished_instances();
        change
    }

    /// State of the instance, `Alive` for an unknown instance.
    pub fn instance_state(&self, instance: KeyHash) -> InstanceStateKind {
        self.instances
            .get(&instance)
            .map(|r| r.state)
            .unwrap_or(InstanceStateKind::Alive)
    }

    /// Instances that have changes in the cache.
    pub fn instances(&self) -> BTreeSet<KeyHash> {
        self.changes.values().map(|c| c.instance_handle).collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn instance_keys(&self, instance: KeyHash, filter: impl Fn(&CacheChange) -> bool) -> Vec<HCKey> {
        self.changes
            .iter()
            .filter(|(_, c)| c.instance_handle == instance && filter(c))
            .map(|(k, _)| *k)
            .collect()
    }

    // an instance without writers and without changes is gone
    fn forget_finished_instances(&mut self) {
        let in_use = self.instances();
        self.instances
            .retain(|handle, record| !record.writers.is_empty() || in_use.contains(handle));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::structure::{EntityId, EntityKind, GuidPrefix, TopicKind};
    use bytes::Bytes;

    fn writer_guid() -> GUID {
        GUID::new(
            GuidPrefix {
                guid_prefix: [1; 12],
            },
            EntityId::new([0, 3, 0], EntityKind::writer(TopicKind::WithKey)),
        )
    }

    fn change(seq: i64, instance: u8) -> CacheChange {
        let mut key = [0u8; 16];
        key[3] = instance;
        CacheChange::new(
            ChangeKind::Alive,
            writer_guid(),
            SequenceNumber(seq),
            Timestamp::now(),
            Some(SerializedPayload::from_bytes(Bytes::from(vec![
                0, 1, 0, 0, seq as u8,
            ]))),
            KeyHash::new(&key),
        )
    }

    #[test]
    fn test_keep_last() {
        let mut hc = HistoryCache::new(
            History {
                kind: HistoryQosKind::KeepLast,
                depth: 2,
            },
            ResourceLimits::default(),
        );
        for seq in 1..=3 {
            hc.add_change(change(seq, 1)).unwrap();
        }
        hc.add_change(change(4, 2)).unwrap();
        let seqs: Vec<i64> = hc
            .get_changes()
            .iter()
            .map(|c| c.sequence_number.0)
            .collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(hc.instances().len(), 2);
        assert!(hc.add_change(change(4, 2)).is_err());
    }

    fn state_change(writer: GUID, seq: i64, instance: u8, kind: ChangeKind) -> CacheChange {
        let mut key = [0u8; 16];
        key[3] = instance;
        CacheChange::new(
            kind,
            writer,
            SequenceNumber(seq),
            Timestamp::now(),
            None,
            KeyHash::new(&key),
        )
    }

    fn other_writer_guid() -> GUID {
        GUID::new(
            GuidPrefix {
                guid_prefix: [2; 12],
            },
            EntityId::new([0, 3, 0], EntityKind::writer(TopicKind::WithKey)),
        )
    }

    #[test]
    fn test_state_change_keeps_data() {
        let mut hc = HistoryCache::new(History::default(), ResourceLimits::default());
        hc.add_change(change(1, 1)).unwrap();
        hc.add_change(state_change(writer_guid(), 2, 1, ChangeKind::NotAliveDisposed))
            .unwrap();
        hc.add_change(state_change(writer_guid(), 3, 1, ChangeKind::NotAliveUnregistered))
            .unwrap();

        let changes = hc.get_changes();
        assert_eq!(changes.len(), 3);
        assert!(changes[0].data_value().is_some());
        assert_eq!(changes[1].kind, ChangeKind::NotAliveDisposed);
        assert_eq!(changes[2].kind, ChangeKind::NotAliveUnregistered);
        let instance = changes[0].instance_handle;
        assert_eq!(hc.instance_state(instance), InstanceStateKind::NotAliveDisposed);

        // a second unregister replaces the first one only
        hc.add_change(state_change(writer_guid(), 4, 1, ChangeKind::NotAliveUnregistered))
            .unwrap();
        let seqs: Vec<i64> = hc
            .get_changes()
            .iter()
            .map(|c| c.sequence_number.0)
            .collect();
        assert_eq!(seqs, vec![1, 2, 4]);

        hc.take_all();
        assert_eq!(hc.instance_state(instance), InstanceStateKind::Alive);
        hc.add_change(change(5, 1)).unwrap();
        assert_eq!(hc.instance_state(instance), InstanceStateKind::Alive);
    }

    #[test]
    fn test_no_writers_after_last_unregister() {
        let mut hc = HistoryCache::new(History::default(), ResourceLimits::default());
        hc.add_change(change(1, 1)).unwrap();
        let mut other = change(1, 1);
        other.writer_guid = other_writer_guid();
        hc.add_change(other).unwrap();
        let instance = hc.get_changes()[0].instance_handle;

        hc.add_change(state_change(writer_guid(), 2, 1, ChangeKind::NotAliveUnregistered))
            .unwrap();
        assert_eq!(hc.instance_state(instance), InstanceStateKind::Alive);

        // the record outlives the taken samples while a writer is registered
        hc.take_all();
        hc.add_change(state_change(
            other_writer_guid(),
            2,
            1,
            ChangeKind::NotAliveUnregistered,
        ))
        .unwrap();
        assert_eq!(hc.instance_state(instance), InstanceStateKind::NotAliveNoWriters);
    }

    #[test]
    fn test_rejected_change_keeps_cache() {
        let mut hc = HistoryCache::new(
            History {
                kind: HistoryQosKind::KeepLast,
                depth: 1,
            },
            ResourceLimits {
                max_samples: 2,
                max_instances: LENGTH_UNLIMITED,
                max_samples_per_instance: LENGTH_UNLIMITED,
            },
        );
        hc.add_change(change(1, 1)).unwrap();
        hc.add_change(change(2, 2)).unwrap();
        assert!(hc.add_change(change(3, 3)).is_err());
        // replacing the sample of a full instance is still possible
        hc.add_change(change(4, 1)).unwrap();
        let seqs: Vec<i64> = hc
            .get_changes()
            .iter()
            .map(|c| c.sequence_number.0)
            .collect();
        assert_eq!(seqs, vec![2, 4]);
    }

    #[test]
    fn test_keep_all_limits() {
        let mut hc = HistoryCache::new(
            History {
                kind: HistoryQosKind::KeepAll,
                depth: 1,
            },
            ResourceLimits {
                max_samples: 2,
                max_instances: LENGTH_UNLIMITED,
                max_samples_per_instance: LENGTH_UNLIMITED,
            },
        );
        hc.add_change(change(1, 1)).unwrap();
        hc.add_change(change(2, 1)).unwrap();
        assert!(hc.add_change(change(3, 2)).is_err());
        assert_eq!(hc.len(), 2);
    }

    #[test]
    fn test_read_and_take() {
        let mut hc = HistoryCache::new(
            History {
                kind: HistoryQosKind::KeepAll,
                depth: 1,
            },
            ResourceLimits::default(),
        );
        hc.add_change(change(1, 1)).unwrap();
        hc.add_change(change(2, 2)).unwrap();

        let read = hc.read_all();
        assert_eq!(read.len(), 2);
        assert!(read.iter().all(|c| c.sample_state == SampleStateKind::NotRead));
        assert!(hc
            .get_changes()
            .iter()
            .all(|c| c.sample_state == SampleStateKind::Read));
        assert!(hc.take_next().is_none());

        hc.add_change(change(3, 3)).unwrap();
        assert_eq!(hc.take_next().unwrap().sequence_number, SequenceNumber(3));
        assert_eq!(hc.take_all().len(), 2);
        assert!(hc.is_empty());
    }
}
