use crate::dds::{
    datareader::DataReader,
    key::DdsData,
    participant::DomainParticipant,
    qos::{
        DataReaderQos, DataReaderQosBuilder, DataReaderQosPolicies, SubscriberQosPolicies,
        TopicQosPolicies,
    },
    topic::Topic,
};
use crate::delivery::{cache::HistoryCache, EndpointInfo, ReaderEntry};
use crate::error::{DdsError, DdsResult};
use crate::structure::{EntityId, EntityKind, GUID};
use core::any::TypeId;
use log::info;
use mio_extras::channel as mio_channel;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// DDS Subscriber
///
/// factory of DataReader
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<RwLock<InnerSubscriber>>,
}

struct InnerSubscriber {
    guid: GUID,
    qos: SubscriberQosPolicies,
    default_dr_qos: DataReaderQosPolicies,
    dp: DomainParticipant,
    readers: BTreeSet<GUID>,
    deleted: bool,
}

impl Subscriber {
    pub(crate) fn new(guid: GUID, qos: SubscriberQosPolicies, dp: DomainParticipant) -> Self {
        let default_dr_qos = DataReaderQosBuilder::new().build();
        Self {
            inner: Arc::new(RwLock::new(InnerSubscriber {
                guid,
                qos,
                default_dr_qos,
                dp,
                readers: BTreeSet::new(),
                deleted: false,
            })),
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, InnerSubscriber> {
        self.inner
            .read()
            .expect("couldn't read lock InnerSubscriber")
    }

    fn read_enabled(&self) -> DdsResult<RwLockReadGuard<'_, InnerSubscriber>> {
        let inner = self.read_lock();
        if inner.deleted {
            return Err(DdsError::AlreadyDeleted(format!(
                "Subscriber {}",
                inner.guid
            )));
        }
        Ok(inner)
    }

    fn write_enabled(&self) -> DdsResult<RwLockWriteGuard<'_, InnerSubscriber>> {
        let inner = self
            .inner
            .write()
            .expect("couldn't write lock InnerSubscriber");
        if inner.deleted {
            return Err(DdsError::AlreadyDeleted(format!(
                "Subscriber {}",
                inner.guid
            )));
        }
        Ok(inner)
    }

    /// Creates a DataReader typed with `D`.
    ///
    /// `D` must be the type registered under the type name of `topic`,
    /// otherwise `PreconditionNotMet` is returned.
    pub fn create_datareader<D: for<'de> Deserialize<'de> + DdsData + 'static>(
        &self,
        qos: DataReaderQos,
        topic: Topic,
    ) -> DdsResult<DataReader<D>> {
        let (guid, dp, partition, dr_qos) = {
            let inner = self.read_enabled()?;
            let dr_qos = match qos {
                DataReaderQos::Default => inner.default_dr_qos.clone(),
                DataReaderQos::Policies(q) => *q,
            };
            (inner.guid, inner.dp.clone(), inner.qos.partition(), dr_qos)
        };
        if topic.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!("Topic '{}'", topic.name())));
        }
        if topic.participant_guid() != dp.guid() {
            return Err(DdsError::PreconditionNotMet(format!(
                "Topic '{}' belongs to another DomainParticipant",
                topic.name()
            )));
        }
        match dp.lookup_type(&topic.get_type_name()) {
            Some((type_id, _)) if type_id == TypeId::of::<D>() => (),
            _ => {
                return Err(DdsError::PreconditionNotMet(format!(
                    "{} is not the type registered as '{}'",
                    core::any::type_name::<D>(),
                    topic.get_type_name()
                )))
            }
        }
        dr_qos.is_consistent()?;

        let reader_guid = GUID::new(
            dp.guid_prefix(),
            EntityId::new(dp.gen_entity_key(), EntityKind::reader(topic.kind())),
        );
        let info = EndpointInfo {
            guid: reader_guid,
            topic_name: topic.name(),
            type_name: topic.get_type_name(),
            partition,
        };
        self.write_enabled()?.readers.insert(reader_guid);

        let rhc = Arc::new(RwLock::new(HistoryCache::new(
            dr_qos.history(),
            dr_qos.resource_limits(),
        )));
        let (reader_state_notifier, reader_state_receiver) = mio_channel::channel();
        let bus = dp.bus();
        topic.add_endpoint();
        bus.add_reader(ReaderEntry::new(
            info,
            dr_qos.clone(),
            rhc.clone(),
            reader_state_notifier,
        ));
        info!(
            "created DataReader {} on Topic '{}' of Subscriber {}",
            reader_guid,
            topic.name(),
            guid
        );
        Ok(DataReader::new(
            reader_guid,
            dr_qos,
            topic,
            self.clone(),
            rhc,
            bus,
            reader_state_receiver,
        ))
    }

    pub fn delete_datareader<D: for<'de> Deserialize<'de> + DdsData>(
        &self,
        data_reader: &DataReader<D>,
    ) -> DdsResult<()> {
        let reader_guid = data_reader.guid();
        if data_reader.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!(
                "DataReader {}",
                reader_guid
            )));
        }
        if !self.read_enabled()?.readers.contains(&reader_guid) {
            return Err(DdsError::PreconditionNotMet(format!(
                "DataReader {} belongs to another Subscriber",
                reader_guid
            )));
        }
        data_reader.shutdown();
        self.write_enabled()?.readers.remove(&reader_guid);
        info!("deleted DataReader {}", reader_guid);
        Ok(())
    }

    /// DDS v1.4 spec, 2.2.2.5.2.17 copy_from_topic_qos
    pub fn copy_from_topic_qos(
        &self,
        dr_qos: &mut DataReaderQosPolicies,
        topic_qos: &TopicQosPolicies,
    ) -> DdsResult<()> {
        self.read_enabled()?;
        dr_qos.copy_from_topic_qos(topic_qos);
        Ok(())
    }

    pub fn get_qos(&self) -> SubscriberQosPolicies {
        self.read_lock().qos.clone()
    }
    pub fn set_qos(&self, qos: SubscriberQosPolicies) -> DdsResult<()> {
        self.write_enabled()?.qos = qos;
        Ok(())
    }
    pub fn get_participant(&self) -> DomainParticipant {
        self.read_lock().dp.clone()
    }
    pub fn get_default_datareader_qos(&self) -> DataReaderQosPolicies {
        self.read_lock().default_dr_qos.clone()
    }
    pub fn set_default_datareader_qos(&self, qos: DataReaderQosPolicies) -> DdsResult<()> {
        qos.is_consistent()?;
        self.write_enabled()?.default_dr_qos = qos;
        Ok(())
    }

    pub fn guid(&self) -> GUID {
        self.read_lock().guid
    }

    pub(crate) fn reader_count(&self) -> DdsResult<usize> {
        Ok(self.read_enabled()?.readers.len())
    }
    pub(crate) fn contains_datareader(&self, guid: GUID) -> bool {
        self.read_lock().readers.contains(&guid)
    }
    pub(crate) fn mark_deleted(&self) {
        self.inner
            .write()
            .expect("couldn't write lock InnerSubscriber")
            .deleted = true;
    }
}

#[cfg(test)]
mod test {
    use crate::config::UnionDdsConfiguration;
    use crate::dds::{
        participant_factory::DomainParticipantFactory,
        qos::{policy, DataReaderQos, DomainParticipantQos, SubscriberQos, TopicQos},
        TypeSupport,
    };
    use crate::error::DdsError;
    use crate::hello_world_data::Msg;

    #[test]
    fn test_subscriber_lifecycle() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(26, DomainParticipantQos::Default)
            .unwrap();
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();
        let mut tqos = dp.get_default_topic_qos();
        tqos.set_reliability(policy::Reliability::default_reliable());
        let topic = dp
            .create_topic(
                "HelloWorldData_Msg",
                "HelloWorldData::Msg",
                TopicQos::Policies(Box::new(tqos.clone())),
            )
            .unwrap();
        let mut sqos = dp.get_default_subscriber_qos();
        sqos.set_partition(policy::Partition::new("HelloWorld Partition"));
        let subscriber = dp
            .create_subscriber(SubscriberQos::Policies(Box::new(sqos)))
            .unwrap();

        let mut rqos = subscriber.get_default_datareader_qos();
        subscriber.copy_from_topic_qos(&mut rqos, &tqos).unwrap();
        let reader = subscriber
            .create_datareader::<Msg>(DataReaderQos::Policies(Box::new(rqos)), topic.clone())
            .unwrap();
        assert_eq!(
            reader.get_qos().reliability().kind,
            policy::ReliabilityQosKind::Reliable
        );
        assert!(dp.contains_entity(reader.guid()));
        assert!(matches!(
            dp.delete_subscriber(&subscriber),
            Err(DdsError::PreconditionNotMet(_))
        ));
        assert!(matches!(reader.take_next_sample(), Err(DdsError::NoData)));

        subscriber.delete_datareader(&reader).unwrap();
        assert!(matches!(reader.take(), Err(DdsError::AlreadyDeleted(_))));
        dp.delete_subscriber(&subscriber).unwrap();
        assert!(matches!(
            dp.delete_subscriber(&subscriber),
            Err(DdsError::AlreadyDeleted(_))
        ));
        dp.delete_topic(&topic).unwrap();
        factory.delete_participant(&dp).unwrap();
    }
}
