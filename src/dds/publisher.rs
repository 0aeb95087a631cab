use crate::dds::{
    datawriter::DataWriter,
    key::DdsData,
    participant::DomainParticipant,
    qos::{
        DataWriterQos, DataWriterQosBuilder, DataWriterQosPolicies, PublisherQosPolicies,
        TopicQosPolicies,
    },
    topic::Topic,
};
use crate::delivery::{EndpointInfo, WriterEntry};
use crate::error::{DdsError, DdsResult};
use crate::structure::{EntityId, EntityKind, GUID};
use core::any::TypeId;
use log::info;
use mio_extras::channel as mio_channel;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// DDS Publisher
///
/// factory of DataWriter
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<RwLock<InnerPublisher>>,
}

struct InnerPublisher {
    guid: GUID,
    qos: PublisherQosPolicies,
    default_dw_qos: DataWriterQosPolicies,
    dp: DomainParticipant,
    writers: BTreeSet<GUID>,
    deleted: bool,
}

impl Publisher {
    pub(crate) fn new(guid: GUID, qos: PublisherQosPolicies, dp: DomainParticipant) -> Self {
        let default_dw_qos = DataWriterQosBuilder::new().build();
        Self {
            inner: Arc::new(RwLock::new(InnerPublisher {
                guid,
                qos,
                default_dw_qos,
                dp,
                writers: BTreeSet::new(),
                deleted: false,
            })),
        }
    }

    fn read_enabled(&self) -> DdsResult<std::sync::RwLockReadGuard<'_, InnerPublisher>> {
        let inner = self
            .inner
            .read()
            .expect("couldn't read lock InnerPublisher");
        if inner.deleted {
            return Err(DdsError::AlreadyDeleted(format!("Publisher {}", inner.guid)));
        }
        Ok(inner)
    }

    fn write_enabled(&self) -> DdsResult<std::sync::RwLockWriteGuard<'_, InnerPublisher>> {
        let inner = self
            .inner
            .write()
            .expect("couldn't write lock InnerPublisher");
        if inner.deleted {
            return Err(DdsError::AlreadyDeleted(format!("Publisher {}", inner.guid)));
        }
        Ok(inner)
    }

    /// Creates a DataWriter typed with `D`.
    ///
    /// `D` must be the type registered under the type name of `topic`,
    /// otherwise `PreconditionNotMet` is returned.
    pub fn create_datawriter<D: Serialize + DdsData + 'static>(
        &self,
        qos: DataWriterQos,
        topic: Topic,
    ) -> DdsResult<DataWriter<D>> {
        // the participant is queried with the publisher unlocked
        let (guid, dp, partition, dw_qos) = {
            let inner = self.read_enabled()?;
            let dw_qos = match qos {
                DataWriterQos::Default => inner.default_dw_qos.clone(),
                DataWriterQos::Policies(q) => *q,
            };
            (inner.guid, inner.dp.clone(), inner.qos.partition(), dw_qos)
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
        dw_qos.is_consistent()?;

        let writer_guid = GUID::new(
            dp.guid_prefix(),
            EntityId::new(dp.gen_entity_key(), EntityKind::writer(topic.kind())),
        );
        let info = EndpointInfo {
            guid: writer_guid,
            topic_name: topic.name(),
            type_name: topic.get_type_name(),
            partition,
        };
        self.write_enabled()?.writers.insert(writer_guid);

        let (writer_state_notifier, writer_state_receiver) = mio_channel::channel();
        let bus = dp.bus();
        topic.add_endpoint();
        bus.add_writer(WriterEntry::new(
            info.clone(),
            dw_qos.clone(),
            writer_state_notifier,
        ));
        info!(
            "created DataWriter {} on Topic '{}' of Publisher {}",
            writer_guid,
            topic.name(),
            guid
        );
        Ok(DataWriter::new(
            info,
            dw_qos,
            topic,
            self.clone(),
            bus,
            dp.transport(),
            writer_state_receiver,
        ))
    }

    /// Deletes a DataWriter of this Publisher.
    pub fn delete_datawriter<D: Serialize + DdsData>(
        &self,
        data_writer: &DataWriter<D>,
    ) -> DdsResult<()> {
        let writer_guid = data_writer.guid();
        if data_writer.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!(
                "DataWriter {}",
                writer_guid
            )));
        }
        if !self.read_enabled()?.writers.contains(&writer_guid) {
            return Err(DdsError::PreconditionNotMet(format!(
                "DataWriter {} belongs to another Publisher",
                writer_guid
            )));
        }
        data_writer.shutdown()?;
        self.write_enabled()?.writers.remove(&writer_guid);
        info!("deleted DataWriter {}", writer_guid);
        Ok(())
    }

    /// DDS v1.4 spec, 2.2.2.4.1.15 copy_from_topic_qos
    pub fn copy_from_topic_qos(
        &self,
        dw_qos: &mut DataWriterQosPolicies,
        topic_qos: &TopicQosPolicies,
    ) -> DdsResult<()> {
        self.read_enabled()?;
        dw_qos.copy_from_topic_qos(topic_qos);
        Ok(())
    }

    pub fn get_qos(&self) -> PublisherQosPolicies {
        self.inner
            .read()
            .expect("couldn't read lock InnerPublisher")
            .qos
            .clone()
    }
    /// Partition changes apply to DataWriters created afterwards.
    pub fn set_qos(&self, qos: PublisherQosPolicies) -> DdsResult<()> {
        self.write_enabled()?.qos = qos;
        Ok(())
    }

    pub fn get_participant(&self) -> DomainParticipant {
        self.inner
            .read()
            .expect("couldn't read lock InnerPublisher")
            .dp
            .clone()
    }
    pub fn get_default_datawriter_qos(&self) -> DataWriterQosPolicies {
        self.inner
            .read()
            .expect("couldn't read lock InnerPublisher")
            .default_dw_qos
            .clone()
    }
    pub fn set_default_datawriter_qos(&self, qos: DataWriterQosPolicies) -> DdsResult<()> {
        qos.is_consistent()?;
        self.write_enabled()?.default_dw_qos = qos;
        Ok(())
    }

    pub fn guid(&self) -> GUID {
        self.inner
            .read()
            .expect("couldn't read lock InnerPublisher")
            .guid
    }

    pub(crate) fn writer_count(&self) -> DdsResult<usize> {
        Ok(self.read_enabled()?.writers.len())
    }
    pub(crate) fn contains_datawriter(&self, guid: GUID) -> bool {
        self.inner
            .read()
            .expect("couldn't read lock InnerPublisher")
            .writers
            .contains(&guid)
    }
    pub(crate) fn mark_deleted(&self) {
        self.inner
            .write()
            .expect("couldn't write lock InnerPublisher")
            .deleted = true;
    }
}
