use crate::dds::{
    qos::{policy::Partition, DataReaderQosPolicies, DataWriterQosPolicies},
    status::{
        DataReaderStatusChanged, DataWriterStatusChanged, PublicationMatchedStatus, StatusMask,
        SubscriptionMatchedStatus,
    },
};
use crate::delivery::cache::{CacheChange, HistoryCache};
use crate::error::{DdsError, DdsResult};
use crate::structure::{DomainId, GuidPrefix, GUID};
use log::{debug, info, warn};
use mio_extras::channel as mio_channel;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};

/// Endpoint description shared by local DataWriters and writers heard on the network.
#[derive(Clone)]
pub(crate) struct EndpointInfo {
    pub guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub partition: Partition,
}

impl EndpointInfo {
    fn is_same_topic(&self, other: &Self) -> bool {
        if self.topic_name != other.topic_name {
            return false;
        }
        if self.type_name != other.type_name {
            warn!(
                "inconsistent topic '{}': type '{}' of {} differs from type '{}' of {}",
                self.topic_name, self.type_name, self.guid, other.type_name, other.guid
            );
            return false;
        }
        true
    }
}

pub(crate) struct WriterEntry {
    info: EndpointInfo,
    qos: DataWriterQosPolicies,
    history: HistoryCache,
    status_mask: StatusMask,
    writer_state_notifier: mio_channel::Sender<DataWriterStatusChanged>,
    matched_readers: BTreeSet<GUID>,
    total_matched_readers: BTreeSet<GUID>,
}

impl WriterEntry {
    pub fn new(
        info: EndpointInfo,
        qos: DataWriterQosPolicies,
        writer_state_notifier: mio_channel::Sender<DataWriterStatusChanged>,
    ) -> Self {
        let history = HistoryCache::new(qos.history(), qos.resource_limits());
        Self {
            info,
            qos,
            history,
            status_mask: StatusMask::all(),
            writer_state_notifier,
            matched_readers: BTreeSet::new(),
            total_matched_readers: BTreeSet::new(),
        }
    }

    fn notify(&self, status: DataWriterStatusChanged) {
        if !self.status_mask.contains(status.kind()) {
            return;
        }
        if self.writer_state_notifier.send(status).is_err() {
            debug!("status receiver of Writer {} is gone", self.info.guid);
        }
    }
}

pub(crate) struct ReaderEntry {
    info: EndpointInfo,
    qos: DataReaderQosPolicies,
    rhc: Arc<RwLock<HistoryCache>>,
    status_mask: StatusMask,
    reader_state_notifier: mio_channel::Sender<DataReaderStatusChanged>,
    matched_writers: BTreeSet<GUID>,
    total_matched_writers: BTreeSet<GUID>,
    incompatible_remote_writers: BTreeSet<GUID>,
}

impl ReaderEntry {
    pub fn new(
        info: EndpointInfo,
        qos: DataReaderQosPolicies,
        rhc: Arc<RwLock<HistoryCache>>,
        reader_state_notifier: mio_channel::Sender<DataReaderStatusChanged>,
    ) -> Self {
        Self {
            info,
            qos,
            rhc,
            status_mask: StatusMask::all(),
            reader_state_notifier,
            matched_writers: BTreeSet::new(),
            total_matched_writers: BTreeSet::new(),
            incompatible_remote_writers: BTreeSet::new(),
        }
    }

    fn notify(&self, status: DataReaderStatusChanged) {
        if !self.status_mask.contains(status.kind()) {
            return;
        }
        if self.reader_state_notifier.send(status).is_err() {
            debug!("status receiver of Reader {} is gone", self.info.guid);
        }
    }

    fn add_matched_writer(&mut self, writer_guid: GUID) {
        self.matched_writers.insert(writer_guid);
        self.total_matched_writers.insert(writer_guid);
        self.notify(DataReaderStatusChanged::SubscriptionMatched(
            SubscriptionMatchedStatus::new(
                self.total_matched_writers.len() as i32,
                1,
                self.matched_writers.len() as i32,
                1,
                writer_guid,
            ),
        ));
    }

    fn remove_matched_writer(&mut self, writer_guid: GUID) {
        if self.matched_writers.remove(&writer_guid) {
            self.notify(DataReaderStatusChanged::SubscriptionMatched(
                SubscriptionMatchedStatus::new(
                    self.total_matched_writers.len() as i32,
                    0,
                    self.matched_writers.len() as i32,
                    -1,
                    writer_guid,
                ),
            ));
        }
    }

    fn receive(&self, change: CacheChange) {
        let result = self
            .rhc
            .write()
            .expect("couldn't write lock ReaderHistoryCache")
            .add_change(change);
        match result {
            Ok(()) => self.notify(DataReaderStatusChanged::DataAvailable),
            Err(e) => {
                debug!("Reader {} rejected a change: {}", self.info.guid, e);
                self.notify(DataReaderStatusChanged::SampleRejected(e));
            }
        }
    }
}

struct InnerBus {
    local_participants: BTreeSet<GuidPrefix>,
    writers: BTreeMap<GUID, WriterEntry>,
    readers: BTreeMap<GUID, ReaderEntry>,
}

/// Connects the DataWriters and DataReaders of one domain inside this process.
///
/// Writers and readers are matched on topic name, type name, partition and QoS.
/// Every change a writer publishes is copied into the HistoryCache of its matched readers.
#[derive(Clone)]
pub(crate) struct DomainBus {
    domain_id: DomainId,
    inner: Arc<Mutex<InnerBus>>,
}

impl DomainBus {
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            inner: Arc::new(Mutex::new(InnerBus {
                local_participants: BTreeSet::new(),
                writers: BTreeMap::new(),
                readers: BTreeMap::new(),
            })),
        }
    }

    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InnerBus> {
        self.inner.lock().expect("couldn't lock DomainBus")
    }

    pub fn add_participant(&self, guid_prefix: GuidPrefix) {
        self.lock().local_participants.insert(guid_prefix);
    }

    pub fn remove_participant(&self, guid_prefix: GuidPrefix) {
        self.lock().local_participants.remove(&guid_prefix);
    }

    pub fn is_local_participant(&self, guid_prefix: GuidPrefix) -> bool {
        self.lock().local_participants.contains(&guid_prefix)
    }

    pub fn add_writer(&self, writer: WriterEntry) {
        let mut inner = self.lock();
        let InnerBus {
            writers, readers, ..
        } = &mut *inner;
        let writer = writers.entry(writer.info.guid).or_insert(writer);
        info!(
            "Writer {} joined topic '{}' on domain {}",
            writer.info.guid, writer.info.topic_name, self.domain_id
        );
        for reader in readers.values_mut() {
            match_endpoints(writer, reader);
        }
    }

    pub fn add_reader(&self, reader: ReaderEntry) {
        let mut inner = self.lock();
        let InnerBus {
            writers, readers, ..
        } = &mut *inner;
        let reader = readers.entry(reader.info.guid).or_insert(reader);
        info!(
            "Reader {} joined topic '{}' on domain {}",
            reader.info.guid, reader.info.topic_name, self.domain_id
        );
        for writer in writers.values_mut() {
            match_endpoints(writer, reader);
        }
    }

    pub fn remove_writer(&self, guid: GUID) {
        let mut inner = self.lock();
        let InnerBus {
            writers, readers, ..
        } = &mut *inner;
        if let Some(writer) = writers.remove(&guid) {
            for reader_guid in &writer.matched_readers {
                if let Some(reader) = readers.get_mut(reader_guid) {
                    reader.remove_matched_writer(guid);
                }
            }
            info!("Writer {} left domain {}", guid, self.domain_id);
        }
    }

    pub fn remove_reader(&self, guid: GUID) {
        let mut inner = self.lock();
        let InnerBus {
            writers, readers, ..
        } = &mut *inner;
        if let Some(reader) = readers.remove(&guid) {
            for writer_guid in &reader.matched_writers {
                if let Some(writer) = writers.get_mut(writer_guid) {
                    if writer.matched_readers.remove(&guid) {
                        let status = PublicationMatchedStatus::new(
                            writer.total_matched_readers.len() as i32,
                            0,
                            writer.matched_readers.len() as i32,
                            -1,
                            guid,
                        );
                        writer.notify(DataWriterStatusChanged::PublicationMatched(status));
                    }
                }
            }
            info!("Reader {} left domain {}", guid, self.domain_id);
        }
    }

    pub fn set_writer_status_mask(&self, guid: GUID, mask: StatusMask) {
        if let Some(writer) = self.lock().writers.get_mut(&guid) {
            writer.status_mask = mask;
        }
    }

    pub fn set_reader_status_mask(&self, guid: GUID, mask: StatusMask) {
        if let Some(reader) = self.lock().readers.get_mut(&guid) {
            reader.status_mask = mask;
        }
    }

    pub fn matched_subscriptions(&self, writer_guid: GUID) -> Vec<GUID> {
        self.lock()
            .writers
            .get(&writer_guid)
            .map(|w| w.matched_readers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn matched_publications(&self, reader_guid: GUID) -> Vec<GUID> {
        self.lock()
            .readers
            .get(&reader_guid)
            .map(|r| r.matched_writers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Hands the change to every matched reader.
    ///
    /// Writers whose durability keeps history also store it for readers matched later.
    pub fn publish(&self, writer_guid: GUID, change: CacheChange) -> DdsResult<()> {
        let mut inner = self.lock();
        let InnerBus {
            writers, readers, ..
        } = &mut *inner;
        let writer = writers.get_mut(&writer_guid).ok_or_else(|| {
            DdsError::AlreadyDeleted(format!("Writer {} is not on the bus", writer_guid))
        })?;
        // only kept for late joiners
        if writer.qos.durability().keeps_history() {
            writer
                .history
                .add_change(change.clone())
                .map_err(DdsError::OutOfResources)?;
        }
        debug!(
            "Writer {} publish seq_num: {} to {} Reader(s)",
            writer_guid,
            change.sequence_number.0,
            writer.matched_readers.len()
        );
        for reader_guid in &writer.matched_readers {
            if let Some(reader) = readers.get_mut(reader_guid) {
                reader.receive(change.clone());
            }
        }
        Ok(())
    }

    /// Delivers a change published by a writer of another process
    /// to the readers of the local participant `receiver`.
    ///
    /// Remote writers are not matched: they never show up in the matched
    /// publications or the SubscriptionMatched status of a reader.
    pub fn deliver_remote(
        &self,
        receiver: GuidPrefix,
        writer: &EndpointInfo,
        writer_qos: &DataWriterQosPolicies,
        change: CacheChange,
    ) {
        let mut inner = self.lock();
        for reader in inner
            .readers
            .values_mut()
            .filter(|r| r.info.guid.guid_prefix == receiver)
        {
            if reader.incompatible_remote_writers.contains(&writer.guid)
                || !writer.is_same_topic(&reader.info)
                || !writer.partition.is_match(&reader.info.partition)
            {
                continue;
            }
            if let Err(e) = reader.qos.is_compatible(writer_qos) {
                warn!(
                    "Reader requested incompatible qos from remote Writer\n\tReader: {}\n\tWriter: {}\n\terror: {}",
                    reader.info.guid, writer.guid, e
                );
                reader.incompatible_remote_writers.insert(writer.guid);
                reader.notify(DataReaderStatusChanged::RequestedIncompatibleQos(e));
                continue;
            }
            reader.receive(change.clone());
        }
    }
}

fn match_endpoints(writer: &mut WriterEntry, reader: &mut ReaderEntry) {
    if writer.matched_readers.contains(&reader.info.guid) || !writer.info.is_same_topic(&reader.info)
    {
        return;
    }
    if !writer.info.partition.is_match(&reader.info.partition) {
        debug!(
            "partition mismatch\n\tWriter: {} {:?}\n\tReader: {} {:?}",
            writer.info.guid, writer.info.partition.name, reader.info.guid, reader.info.partition.name
        );
        return;
    }
    if let Err(e) = writer.qos.is_compatible(&reader.qos) {
        warn!(
            "Writer offered incompatible qos to Reader\n\tWriter: {}\n\tReader: {}\n\terror: {}",
            writer.info.guid, reader.info.guid, e
        );
        writer.notify(DataWriterStatusChanged::OfferedIncompatibleQos(e.clone()));
        reader.notify(DataReaderStatusChanged::RequestedIncompatibleQos(e));
        return;
    }

    info!(
        "Writer matched Reader\n\tWriter: {}\n\tReader: {}",
        writer.info.guid, reader.info.guid
    );
    writer.matched_readers.insert(reader.info.guid);
    writer.total_matched_readers.insert(reader.info.guid);
    writer.notify(DataWriterStatusChanged::PublicationMatched(
        PublicationMatchedStatus::new(
            writer.total_matched_readers.len() as i32,
            1,
            writer.matched_readers.len() as i32,
            1,
            reader.info.guid,
        ),
    ));
    reader.add_matched_writer(writer.info.guid);

    // late joiner gets what the writer kept
    if writer.qos.durability().keeps_history() && reader.qos.durability().keeps_history() {
        for change in writer.history.get_changes() {
            reader.receive(change);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dds::{
        key::KeyHash,
        qos::{policy, DataReaderQosBuilder, DataWriterQosBuilder},
    };
    use crate::delivery::cache::ChangeKind;
    use crate::structure::{
        EntityId, EntityKind, SequenceNumber, SerializedPayload, Timestamp, TopicKind,
    };
    use bytes::Bytes;

    fn guid(prefix: u8, key: u8, kind: EntityKind) -> GUID {
        GUID::new(
            GuidPrefix {
                guid_prefix: [prefix; 12],
            },
            EntityId::new([0, 3, key], kind),
        )
    }

    fn info(guid: GUID, partition: &str) -> EndpointInfo {
        EndpointInfo {
            guid,
            topic_name: String::from("HelloWorldData_Msg"),
            type_name: String::from("HelloWorldData::Msg"),
            partition: policy::Partition::new(partition),
        }
    }

    fn change(writer: GUID, seq: i64) -> CacheChange {
        CacheChange::new(
            ChangeKind::Alive,
            writer,
            SequenceNumber(seq),
            Timestamp::now(),
            Some(SerializedPayload::from_bytes(Bytes::from(vec![0, 1, 0, 0]))),
            KeyHash::new(&[seq as u8; 16]),
        )
    }

    fn reader(
        guid: GUID,
        partition: &str,
        qos: DataReaderQosPolicies,
    ) -> (
        ReaderEntry,
        Arc<RwLock<HistoryCache>>,
        mio_channel::Receiver<DataReaderStatusChanged>,
    ) {
        let rhc = Arc::new(RwLock::new(HistoryCache::new(
            qos.history(),
            qos.resource_limits(),
        )));
        let (sender, receiver) = mio_channel::channel();
        (
            ReaderEntry::new(info(guid, partition), qos, rhc.clone(), sender),
            rhc,
            receiver,
        )
    }

    #[test]
    fn test_match_and_publish() {
        let bus = DomainBus::new(0);
        let w_guid = guid(1, 1, EntityKind::writer(TopicKind::WithKey));
        let r_guid = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (w_sender, w_receiver) = mio_channel::channel();
        bus.add_writer(WriterEntry::new(
            info(w_guid, "HelloWorld Partition"),
            DataWriterQosBuilder::new().build(),
            w_sender,
        ));
        let (entry, rhc, r_receiver) = reader(
            r_guid,
            "HelloWorld Partition",
            DataReaderQosBuilder::new().build(),
        );
        bus.add_reader(entry);

        match w_receiver.try_recv() {
            Ok(DataWriterStatusChanged::PublicationMatched(s)) => {
                assert_eq!(s.current_count, 1);
                assert_eq!(s.guid, r_guid);
            }
            _ => panic!("PublicationMatched expected"),
        }
        assert!(matches!(
            r_receiver.try_recv(),
            Ok(DataReaderStatusChanged::SubscriptionMatched(_))
        ));

        bus.publish(w_guid, change(w_guid, 1)).unwrap();
        assert_eq!(rhc.read().unwrap().len(), 1);
        assert!(matches!(
            r_receiver.try_recv(),
            Ok(DataReaderStatusChanged::DataAvailable)
        ));
        assert_eq!(bus.matched_subscriptions(w_guid), vec![r_guid]);

        bus.remove_writer(w_guid);
        match r_receiver.try_recv() {
            Ok(DataReaderStatusChanged::SubscriptionMatched(s)) => {
                assert_eq!(s.current_count, 0);
                assert_eq!(s.current_count_change, -1);
            }
            _ => panic!("SubscriptionMatched expected"),
        }
        assert!(matches!(
            bus.publish(w_guid, change(w_guid, 2)),
            Err(DdsError::AlreadyDeleted(_))
        ));
    }

    #[test]
    fn test_partition_and_qos_mismatch() {
        let bus = DomainBus::new(1);
        let w_guid = guid(1, 1, EntityKind::writer(TopicKind::WithKey));
        let (w_sender, w_receiver) = mio_channel::channel();
        bus.add_writer(WriterEntry::new(
            info(w_guid, "HelloWorld Partition"),
            DataWriterQosBuilder::new()
                .reliability(policy::Reliability::default_besteffort())
                .build(),
            w_sender,
        ));

        let other_partition = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (entry, _rhc, _r) = reader(
            other_partition,
            "HelloWorld example",
            DataReaderQosBuilder::new().build(),
        );
        bus.add_reader(entry);
        assert!(bus.matched_publications(other_partition).is_empty());

        let reliable_reader = guid(2, 2, EntityKind::reader(TopicKind::WithKey));
        let (entry, _rhc, r_receiver) = reader(
            reliable_reader,
            "HelloWorld Partition",
            DataReaderQosBuilder::new()
                .reliability(policy::Reliability::default_reliable())
                .build(),
        );
        bus.add_reader(entry);
        assert!(bus.matched_publications(reliable_reader).is_empty());
        assert!(matches!(
            w_receiver.try_recv(),
            Ok(DataWriterStatusChanged::OfferedIncompatibleQos(_))
        ));
        assert!(matches!(
            r_receiver.try_recv(),
            Ok(DataReaderStatusChanged::RequestedIncompatibleQos(_))
        ));
    }

    #[test]
    fn test_late_joiner_replay() {
        let bus = DomainBus::new(2);
        let w_guid = guid(1, 1, EntityKind::writer(TopicKind::WithKey));
        let (w_sender, _w_receiver) = mio_channel::channel();
        bus.add_writer(WriterEntry::new(
            info(w_guid, ""),
            DataWriterQosBuilder::new()
                .durability(policy::Durability::Transient)
                .build(),
            w_sender,
        ));
        for seq in 1..=3 {
            bus.publish(w_guid, change(w_guid, seq)).unwrap();
        }

        let volatile = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (entry, volatile_rhc, _r) = reader(volatile, "", DataReaderQosBuilder::new().build());
        bus.add_reader(entry);
        assert!(volatile_rhc.read().unwrap().is_empty());

        let transient = guid(2, 2, EntityKind::reader(TopicKind::WithKey));
        let (entry, transient_rhc, _r) = reader(
            transient,
            "",
            DataReaderQosBuilder::new()
                .durability(policy::Durability::TransientLocal)
                .build(),
        );
        bus.add_reader(entry);
        assert_eq!(transient_rhc.read().unwrap().len(), 3);
    }

    #[test]
    fn test_remote_delivery() {
        let bus = DomainBus::new(3);
        let r_guid = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (entry, rhc, r_receiver) = reader(r_guid, "", DataReaderQosBuilder::new().build());
        bus.add_reader(entry);

        let remote = guid(9, 1, EntityKind::writer(TopicKind::WithKey));
        let remote_qos = DataWriterQosBuilder::new().build();
        for seq in 1..=2 {
            bus.deliver_remote(
                r_guid.guid_prefix,
                &info(remote, ""),
                &remote_qos,
                change(remote, seq),
            );
        }
        assert_eq!(rhc.read().unwrap().len(), 2);

        // a frame received by another local participant is not for this reader
        let other = guid(3, 1, EntityKind::reader(TopicKind::WithKey));
        bus.deliver_remote(
            other.guid_prefix,
            &info(remote, ""),
            &remote_qos,
            change(remote, 3),
        );
        assert_eq!(rhc.read().unwrap().len(), 2);

        assert!(bus.matched_publications(r_guid).is_empty());
        assert!(matches!(
            r_receiver.try_recv(),
            Ok(DataReaderStatusChanged::DataAvailable)
        ));
    }

    #[test]
    fn test_incompatible_remote_writer_reported_once() {
        let bus = DomainBus::new(4);
        let r_guid = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (entry, rhc, r_receiver) = reader(
            r_guid,
            "",
            DataReaderQosBuilder::new()
                .reliability(policy::Reliability::default_reliable())
                .build(),
        );
        bus.add_reader(entry);

        let remote = guid(9, 1, EntityKind::writer(TopicKind::WithKey));
        let remote_qos = DataWriterQosBuilder::new()
            .reliability(policy::Reliability::default_besteffort())
            .build();
        for seq in 1..=3 {
            bus.deliver_remote(
                r_guid.guid_prefix,
                &info(remote, ""),
                &remote_qos,
                change(remote, seq),
            );
        }
        assert!(rhc.read().unwrap().is_empty());
        assert!(matches!(
            r_receiver.try_recv(),
            Ok(DataReaderStatusChanged::RequestedIncompatibleQos(_))
        ));
        assert!(r_receiver.try_recv().is_err());
    }

    #[test]
    fn test_volatile_writer_keeps_no_history() {
        let bus = DomainBus::new(5);
        let w_guid = guid(1, 1, EntityKind::writer(TopicKind::WithKey));
        let (w_sender, _w_receiver) = mio_channel::channel();
        bus.add_writer(WriterEntry::new(
            info(w_guid, ""),
            DataWriterQosBuilder::new()
                .history(policy::History {
                    kind: policy::HistoryQosKind::KeepAll,
                    depth: 1,
                })
                .resource_limits(policy::ResourceLimits {
                    max_samples: 2,
                    max_instances: policy::LENGTH_UNLIMITED,
                    max_samples_per_instance: policy::LENGTH_UNLIMITED,
                })
                .build(),
            w_sender,
        ));
        let r_guid = guid(2, 1, EntityKind::reader(TopicKind::WithKey));
        let (entry, rhc, _r) = reader(r_guid, "", DataReaderQosBuilder::new().build());
        bus.add_reader(entry);

        for seq in 1..=5 {
            bus.publish(w_guid, change(w_guid, seq)).unwrap();
            assert_eq!(rhc.write().unwrap().take_all().len(), 1);
        }

        assert!(bus.lock().writers[&w_guid].history.is_empty());
    }
}
