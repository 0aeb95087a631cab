use crate::dds::{
    publisher::Publisher,
    qos::{
        DomainParticipantQosPolicies, PublisherQos, PublisherQosBuilder, PublisherQosPolicies,
        SubscriberQos, SubscriberQosBuilder, SubscriberQosPolicies, TopicQos, TopicQosBuilder,
        TopicQosPolicies,
    },
    subscriber::Subscriber,
    topic::Topic,
};
use crate::delivery::DomainBus;
use crate::error::{DdsError, DdsResult};
use crate::network::transport::UdpTransport;
use crate::structure::{DomainId, Duration, EntityId, EntityKind, GuidPrefix, TopicKind, GUID};
use core::any::TypeId;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const FIND_TOPIC_PERIOD: std::time::Duration = std::time::Duration::from_millis(10);

/// DDS DomainParticipant
///
/// factory for the Publisher, Subscriber and Topic.
#[derive(Clone)]
pub struct DomainParticipant {
    inner: Arc<Mutex<InnerParticipant>>,
}

#[derive(Clone, Copy)]
struct RegisteredType {
    type_id: TypeId,
    kind: TopicKind,
}

struct InnerParticipant {
    guid: GUID,
    domain_id: DomainId,
    qos: DomainParticipantQosPolicies,
    bus: DomainBus,
    transport: Option<UdpTransport>,
    entity_key_generator: AtomicU32,
    registered_types: BTreeMap<String, RegisteredType>,
    topics: BTreeMap<String, Topic>,
    publishers: BTreeMap<GUID, Publisher>,
    subscribers: BTreeMap<GUID, Subscriber>,
    default_publisher_qos: PublisherQosPolicies,
    default_subscriber_qos: SubscriberQosPolicies,
    default_topic_qos: TopicQosPolicies,
    deleted: bool,
}

impl DomainParticipant {
    pub(crate) fn new(
        guid: GUID,
        domain_id: DomainId,
        qos: DomainParticipantQosPolicies,
        bus: DomainBus,
        transport: Option<UdpTransport>,
    ) -> Self {
        bus.add_participant(guid.guid_prefix);
        Self {
            inner: Arc::new(Mutex::new(InnerParticipant {
                guid,
                domain_id,
                qos,
                bus,
                transport,
                // entity_key of user defined entity start {00, 03, 00}
                entity_key_generator: AtomicU32::new(0x0300),
                registered_types: BTreeMap::new(),
                topics: BTreeMap::new(),
                publishers: BTreeMap::new(),
                subscribers: BTreeMap::new(),
                default_publisher_qos: PublisherQosBuilder::new().build(),
                default_subscriber_qos: SubscriberQosBuilder::new().build(),
                default_topic_qos: TopicQosBuilder::new().build(),
                deleted: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InnerParticipant> {
        self.inner
            .lock()
            .expect("couldn't lock InnerParticipant")
    }

    /// Locks the participant, failing when it has been deleted.
    fn lock_enabled(&self) -> DdsResult<MutexGuard<'_, InnerParticipant>> {
        let inner = self.lock();
        if inner.deleted {
            return Err(DdsError::AlreadyDeleted(format!(
                "DomainParticipant {}",
                inner.guid
            )));
        }
        Ok(inner)
    }

    pub(crate) fn register_type(
        &self,
        type_name: &str,
        type_id: TypeId,
        kind: TopicKind,
    ) -> DdsResult<()> {
        if type_name.is_empty() {
            return Err(DdsError::BadParameter(
                "type name must not be empty".to_string(),
            ));
        }
        let mut inner = self.lock_enabled()?;
        match inner.registered_types.get(type_name) {
            Some(registered) if registered.type_id != type_id => {
                Err(DdsError::PreconditionNotMet(format!(
                    "type name '{}' is registered with another type",
                    type_name
                )))
            }
            Some(_) => Ok(()),
            None => {
                inner
                    .registered_types
                    .insert(type_name.to_string(), RegisteredType { type_id, kind });
                debug!("registered type '{}' to {}", type_name, inner.guid);
                Ok(())
            }
        }
    }

    /// TypeId and TopicKind registered under `type_name`.
    pub(crate) fn lookup_type(&self, type_name: &str) -> Option<(TypeId, TopicKind)> {
        self.lock()
            .registered_types
            .get(type_name)
            .map(|r| (r.type_id, r.kind))
    }

    pub fn create_topic(&self, name: &str, type_name: &str, qos: TopicQos) -> DdsResult<Topic> {
        if name.is_empty() {
            return Err(DdsError::BadParameter(
                "topic name must not be empty".to_string(),
            ));
        }
        let mut inner = self.lock_enabled()?;
        let registered = inner.registered_types.get(type_name).copied().ok_or_else(|| {
            DdsError::PreconditionNotMet(format!("type '{}' is not registered", type_name))
        })?;
        if inner.topics.contains_key(name) {
            return Err(DdsError::PreconditionNotMet(format!(
                "topic '{}' already exists",
                name
            )));
        }
        let qos = match qos {
            TopicQos::Default => inner.default_topic_qos.clone(),
            TopicQos::Policies(q) => *q,
        };
        qos.is_consistent()?;

        let guid = GUID::new(
            inner.guid.guid_prefix,
            EntityId::new(inner.gen_entity_key(), EntityKind::TOPIC),
        );
        let topic = Topic::new(
            guid,
            inner.guid,
            name.to_string(),
            type_name.to_string(),
            registered.kind,
            qos,
        );
        inner.topics.insert(name.to_string(), topic.clone());
        info!("created Topic '{}' of type '{}'", name, type_name);
        Ok(topic)
    }

    /// Waits up to `timeout` for a Topic named `name` to be created on this participant.
    pub fn find_topic(&self, name: &str, timeout: Duration) -> DdsResult<Topic> {
        let start = Instant::now();
        loop {
            if let Some(topic) = self.lock_enabled()?.topics.get(name) {
                return Ok(topic.clone());
            }
            if let Some(timeout) = timeout.to_core() {
                if start.elapsed() >= timeout {
                    return Err(DdsError::Timeout(format!("topic '{}' not found", name)));
                }
            }
            std::thread::sleep(FIND_TOPIC_PERIOD);
        }
    }

    pub fn lookup_topicdescription(&self, name: &str) -> Option<Topic> {
        self.lock().topics.get(name).cloned()
    }

    /// Fails with `PreconditionNotMet` while DataWriters or DataReaders use the Topic.
    pub fn delete_topic(&self, topic: &Topic) -> DdsResult<()> {
        if topic.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!("Topic '{}'", topic.name())));
        }
        let mut inner = self.lock_enabled()?;
        if topic.participant_guid() != inner.guid {
            return Err(DdsError::PreconditionNotMet(format!(
                "Topic '{}' belongs to another DomainParticipant",
                topic.name()
            )));
        }
        if topic.endpoint_count() > 0 {
            return Err(DdsError::PreconditionNotMet(format!(
                "Topic '{}' is used by {} DataWriter(s)/DataReader(s)",
                topic.name(),
                topic.endpoint_count()
            )));
        }
        inner.topics.remove(&topic.name());
        topic.mark_deleted();
        info!("deleted Topic '{}'", topic.name());
        Ok(())
    }

    pub fn create_publisher(&self, qos: PublisherQos) -> DdsResult<Publisher> {
        let mut inner = self.lock_enabled()?;
        let guid = GUID::new(
            inner.guid.guid_prefix,
            EntityId::new(inner.gen_entity_key(), EntityKind::PUBLISHER),
        );
        let qos = match qos {
            PublisherQos::Default => inner.default_publisher_qos.clone(),
            PublisherQos::Policies(q) => *q,
        };
        let publisher = Publisher::new(guid, qos, self.clone());
        inner.publishers.insert(guid, publisher.clone());
        info!("created Publisher {}", guid);
        Ok(publisher)
    }

    /// Fails with `PreconditionNotMet` while the Publisher still has DataWriters.
    pub fn delete_publisher(&self, publisher: &Publisher) -> DdsResult<()> {
        let guid = publisher.guid();
        let writer_count = publisher.writer_count()?;
        let mut inner = self.lock_enabled()?;
        if !inner.publishers.contains_key(&guid) {
            return Err(DdsError::PreconditionNotMet(format!(
                "Publisher {} belongs to another DomainParticipant",
                guid
            )));
        }
        if writer_count > 0 {
            return Err(DdsError::PreconditionNotMet(format!(
                "Publisher {} still has {} DataWriter(s)",
                guid, writer_count
            )));
        }
        inner.publishers.remove(&guid);
        drop(inner);
        publisher.mark_deleted();
        info!("deleted Publisher {}", guid);
        Ok(())
    }

    pub fn create_subscriber(&self, qos: SubscriberQos) -> DdsResult<Subscriber> {
        let mut inner = self.lock_enabled()?;
        let guid = GUID::new(
            inner.guid.guid_prefix,
            EntityId::new(inner.gen_entity_key(), EntityKind::SUBSCRIBER),
        );
        let qos = match qos {
            SubscriberQos::Default => inner.default_subscriber_qos.clone(),
            SubscriberQos::Policies(q) => *q,
        };
        let subscriber = Subscriber::new(guid, qos, self.clone());
        inner.subscribers.insert(guid, subscriber.clone());
        info!("created Subscriber {}", guid);
        Ok(subscriber)
    }

    /// Fails with `PreconditionNotMet` while the Subscriber still has DataReaders.
    pub fn delete_subscriber(&self, subscriber: &Subscriber) -> DdsResult<()> {
        let guid = subscriber.guid();
        let reader_count = subscriber.reader_count()?;
        let mut inner = self.lock_enabled()?;
        if !inner.subscribers.contains_key(&guid) {
            return Err(DdsError::PreconditionNotMet(format!(
                "Subscriber {} belongs to another DomainParticipant",
                guid
            )));
        }
        if reader_count > 0 {
            return Err(DdsError::PreconditionNotMet(format!(
                "Subscriber {} still has {} DataReader(s)",
                guid, reader_count
            )));
        }
        inner.subscribers.remove(&guid);
        drop(inner);
        subscriber.mark_deleted();
        info!("deleted Subscriber {}", guid);
        Ok(())
    }

    /// Whether `handle` is a Topic, Publisher, Subscriber, DataWriter or DataReader
    /// created from this participant.
    pub fn contains_entity(&self, handle: GUID) -> bool {
        let (publishers, subscribers) = {
            let inner = self.lock();
            if inner.topics.values().any(|t| t.guid() == handle)
                || inner.publishers.contains_key(&handle)
                || inner.subscribers.contains_key(&handle)
            {
                return true;
            }
            (
                inner.publishers.values().cloned().collect::<Vec<_>>(),
                inner.subscribers.values().cloned().collect::<Vec<_>>(),
            )
        };
        publishers.iter().any(|p| p.contains_datawriter(handle))
            || subscribers.iter().any(|s| s.contains_datareader(handle))
    }

    pub(crate) fn has_entities(&self) -> bool {
        let inner = self.lock();
        !(inner.topics.is_empty() && inner.publishers.is_empty() && inner.subscribers.is_empty())
    }

    /// Stops the transport and leaves the domain.
    pub(crate) fn shutdown(&self) {
        let mut inner = self.lock();
        inner.deleted = true;
        if let Some(transport) = inner.transport.take() {
            transport.shutdown();
        }
        inner.bus.remove_participant(inner.guid.guid_prefix);
    }

    pub fn is_deleted(&self) -> bool {
        self.lock().deleted
    }

    pub fn domain_id(&self) -> DomainId {
        self.lock().domain_id
    }
    pub fn guid(&self) -> GUID {
        self.lock().guid
    }
    pub fn guid_prefix(&self) -> GuidPrefix {
        self.lock().guid.guid_prefix
    }
    pub fn get_qos(&self) -> DomainParticipantQosPolicies {
        self.lock().qos.clone()
    }
    pub fn set_qos(&self, qos: DomainParticipantQosPolicies) {
        self.lock().qos = qos;
    }

    pub(crate) fn gen_entity_key(&self) -> [u8; 3] {
        self.lock().gen_entity_key()
    }
    pub(crate) fn bus(&self) -> DomainBus {
        self.lock().bus.clone()
    }
    pub(crate) fn transport(&self) -> Option<UdpTransport> {
        self.lock().transport.clone()
    }

    pub fn get_default_publisher_qos(&self) -> PublisherQosPolicies {
        self.lock().default_publisher_qos.clone()
    }
    pub fn set_default_publisher_qos(&self, qos: PublisherQosPolicies) {
        self.lock().default_publisher_qos = qos;
    }
    pub fn get_default_subscriber_qos(&self) -> SubscriberQosPolicies {
        self.lock().default_subscriber_qos.clone()
    }
    pub fn set_default_subscriber_qos(&self, qos: SubscriberQosPolicies) {
        self.lock().default_subscriber_qos = qos;
    }
    pub fn get_default_topic_qos(&self) -> TopicQosPolicies {
        self.lock().default_topic_qos.clone()
    }
    pub fn set_default_topic_qos(&self, qos: TopicQosPolicies) -> DdsResult<()> {
        qos.is_consistent()?;
        self.lock().default_topic_qos = qos;
        Ok(())
    }
}

impl InnerParticipant {
    fn gen_entity_key(&self) -> [u8; 3] {
        // rtps 2.3 spec, 9.3.1.2 Mapping of the EntityId_t
        // the entityKey only has to be unique within the Participant.
        let [_, a, b, c] = self
            .entity_key_generator
            .fetch_add(1, Ordering::Relaxed)
            .to_be_bytes();
        [a, b, c]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::UnionDdsConfiguration;
    use crate::dds::{
        participant_factory::DomainParticipantFactory,
        qos::{policy, DataWriterQos, DomainParticipantQos},
        TypeSupport,
    };
    use crate::hello_world_data::Msg;
    use crate::DdsData;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, DdsData)]
    #[dds_data(type_name = "HelloWorldData::Msg")]
    struct Impostor {
        msg_id: i32,
    }

    fn participant(factory: &DomainParticipantFactory) -> DomainParticipant {
        factory
            .create_participant(20, DomainParticipantQos::Default)
            .unwrap()
    }

    #[test]
    fn test_register_type() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = participant(&factory);
        let msg_ts = TypeSupport::<Msg>::new();
        msg_ts.register_type(&dp, "HelloWorldData::Msg").unwrap();
        msg_ts.register_type(&dp, "HelloWorldData::Msg").unwrap();
        msg_ts.register_type(&dp, "Alias").unwrap();
        assert!(matches!(
            TypeSupport::<Impostor>::new().register_type(&dp, "HelloWorldData::Msg"),
            Err(DdsError::PreconditionNotMet(_))
        ));
        assert!(matches!(
            msg_ts.register_type(&dp, ""),
            Err(DdsError::BadParameter(_))
        ));
        assert_eq!(
            dp.lookup_type("Alias"),
            Some((TypeId::of::<Msg>(), TopicKind::WithKey))
        );
    }

    #[test]
    fn test_topic_lifecycle() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = participant(&factory);
        assert!(matches!(
            dp.create_topic("HelloWorldData_Msg", "HelloWorldData::Msg", TopicQos::Default),
            Err(DdsError::PreconditionNotMet(_))
        ));
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();

        let mut tqos = dp.get_default_topic_qos();
        tqos.set_reliability(policy::Reliability::default_reliable());
        tqos.set_durability(policy::Durability::Transient);
        let topic = dp
            .create_topic(
                "HelloWorldData_Msg",
                "HelloWorldData::Msg",
                TopicQos::Policies(Box::new(tqos)),
            )
            .unwrap();
        assert_eq!(topic.get_type_name(), "HelloWorldData::Msg");
        assert_eq!(topic.kind(), TopicKind::WithKey);
        assert_eq!(topic.get_qos().durability(), policy::Durability::Transient);
        assert!(dp.contains_entity(topic.guid()));
        assert!(matches!(
            dp.create_topic("HelloWorldData_Msg", "HelloWorldData::Msg", TopicQos::Default),
            Err(DdsError::PreconditionNotMet(_))
        ));
        assert!(matches!(
            dp.create_topic("", "HelloWorldData::Msg", TopicQos::Default),
            Err(DdsError::BadParameter(_))
        ));

        let found = dp
            .find_topic("HelloWorldData_Msg", Duration::from_millis(50))
            .unwrap();
        assert_eq!(found.guid(), topic.guid());
        assert!(matches!(
            dp.find_topic("Missing", Duration::from_millis(30)),
            Err(DdsError::Timeout(_))
        ));

        let publisher = dp.create_publisher(PublisherQos::Default).unwrap();
        let writer = publisher
            .create_datawriter::<Msg>(DataWriterQos::Default, topic.clone())
            .unwrap();
        assert!(dp.contains_entity(writer.guid()));
        assert!(matches!(
            dp.delete_topic(&topic),
            Err(DdsError::PreconditionNotMet(_))
        ));
        assert!(matches!(
            dp.delete_publisher(&publisher),
            Err(DdsError::PreconditionNotMet(_))
        ));
        publisher.delete_datawriter(&writer).unwrap();
        dp.delete_publisher(&publisher).unwrap();
        dp.delete_topic(&topic).unwrap();
        assert!(matches!(
            dp.delete_topic(&topic),
            Err(DdsError::AlreadyDeleted(_))
        ));
        assert!(!dp.has_entities());
        factory.delete_participant(&dp).unwrap();
    }

    #[test]
    fn test_inconsistent_topic_qos() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = participant(&factory);
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();
        let mut tqos = dp.get_default_topic_qos();
        tqos.set_durability(policy::Durability::Persistent);
        assert!(matches!(
            dp.create_topic(
                "HelloWorldData_Msg",
                "HelloWorldData::Msg",
                TopicQos::Policies(Box::new(tqos.clone()))
            ),
            Err(DdsError::Unsupported(_))
        ));
        assert!(dp.set_default_topic_qos(tqos).is_err());
    }
}
