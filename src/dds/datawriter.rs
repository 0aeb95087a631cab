use crate::dds::{
    key::DdsData,
    publisher::Publisher,
    qos::DataWriterQosPolicies,
    status::{DataWriterStatusChanged, StatusMask},
    topic::Topic,
    InstanceHandle, HANDLE_NIL,
};
use crate::delivery::{
    cache::{CacheChange, ChangeKind},
    DomainBus, EndpointInfo,
};
use crate::error::{DdsError, DdsResult};
use crate::network::transport::UdpTransport;
use crate::structure::{
    RepresentationIdentifier, SequenceNumber, SerializedPayload, Timestamp, GUID,
};
use core::marker::PhantomData;
use log::debug;
use mio_extras::channel as mio_channel;
use mio_v06::{event::Evented, Poll, PollOpt, Ready, Token};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::sync::Mutex;

/// DDS DataWriter
///
/// Created by `Publisher::create_datawriter`, which also checks that `D`
/// is the type registered for the Topic.
pub struct DataWriter<D: Serialize + DdsData> {
    data_phantom: PhantomData<D>,
    info: EndpointInfo,
    qos: DataWriterQosPolicies,
    topic: Topic,
    publisher: Publisher,
    bus: DomainBus,
    transport: Option<UdpTransport>,
    state: Mutex<WriterState>,
    writer_state_receiver: mio_channel::Receiver<DataWriterStatusChanged>,
}

struct WriterState {
    last_sequence_number: SequenceNumber,
    instances: BTreeSet<InstanceHandle>,
    deleted: bool,
}

impl<D: Serialize + DdsData> DataWriter<D> {
    pub(crate) fn new(
        info: EndpointInfo,
        qos: DataWriterQosPolicies,
        topic: Topic,
        publisher: Publisher,
        bus: DomainBus,
        transport: Option<UdpTransport>,
        writer_state_receiver: mio_channel::Receiver<DataWriterStatusChanged>,
    ) -> Self {
        Self {
            data_phantom: PhantomData::<D>,
            info,
            qos,
            topic,
            publisher,
            bus,
            transport,
            state: Mutex::new(WriterState {
                last_sequence_number: SequenceNumber(0),
                instances: BTreeSet::new(),
                deleted: false,
            }),
            writer_state_receiver,
        }
    }

    fn lock_state(&self) -> DdsResult<std::sync::MutexGuard<'_, WriterState>> {
        let state = self.state.lock().expect("couldn't lock WriterState");
        if state.deleted {
            return Err(DdsError::AlreadyDeleted(format!(
                "DataWriter {}",
                self.info.guid
            )));
        }
        Ok(state)
    }

    pub fn guid(&self) -> GUID {
        self.info.guid
    }
    pub fn get_qos(&self) -> DataWriterQosPolicies {
        self.qos.clone()
    }
    pub fn get_topic(&self) -> Topic {
        self.topic.clone()
    }
    pub fn get_publisher(&self) -> Publisher {
        self.publisher.clone()
    }
    pub fn is_deleted(&self) -> bool {
        self.state
            .lock()
            .expect("couldn't lock WriterState")
            .deleted
    }

    /// Selects which statuses `try_recv` delivers.
    pub fn set_status_mask(&self, mask: StatusMask) {
        self.bus.set_writer_status_mask(self.info.guid, mask);
    }

    /// GUIDs of the DataReaders currently matched.
    pub fn get_matched_subscriptions(&self) -> Vec<GUID> {
        self.bus.matched_subscriptions(self.info.guid)
    }

    /// publish data for matching DataReader
    ///
    /// `handle` is either `None`, `HANDLE_NIL` or the handle of the instance of `data`.
    pub fn write(&self, data: &D, handle: Option<InstanceHandle>) -> DdsResult<()> {
        let key = instance_key(data, handle)?;
        let payload = SerializedPayload::new_from_cdr_data(data, RepresentationIdentifier::CDR_LE)?;
        let mut state = self.lock_state()?;
        state.instances.insert(key);
        self.publish(&mut state, ChangeKind::Alive, key, Some(payload))
    }

    /// Announces the instance of `data` without publishing a sample.
    pub fn register_instance(&self, data: &D) -> DdsResult<InstanceHandle> {
        let key = data.gen_key();
        self.lock_state()?.instances.insert(key);
        debug!("Writer {} registered instance {:?}", self.info.guid, key);
        Ok(key)
    }

    /// Stops updating the instance of `data`.
    ///
    /// When `autodispose_unregistered_instances` is set the instance is disposed first.
    pub fn unregister_instance(&self, data: &D, handle: Option<InstanceHandle>) -> DdsResult<()> {
        let key = instance_key(data, handle)?;
        let mut state = self.lock_state()?;
        if !state.instances.contains(&key) {
            return Err(DdsError::PreconditionNotMet(format!(
                "instance {:?} is not registered",
                key
            )));
        }
        self.unregister(&mut state, key)
    }

    /// Deletes the instance of `data` for every DataReader.
    pub fn dispose(&self, data: &D, handle: Option<InstanceHandle>) -> DdsResult<()> {
        let key = instance_key(data, handle)?;
        let mut state = self.lock_state()?;
        state.instances.insert(key);
        self.publish(&mut state, ChangeKind::NotAliveDisposed, key, None)
    }

    /// get DataWriterStatusChanged
    ///
    /// This method is non_blocking, so if there is no DataWriterStatusChanged, this method returns Err.
    /// DataWriter implement mio::Evented, so you can register DataWriter to mio v0.6's Poll.
    pub fn try_recv(&self) -> Result<DataWriterStatusChanged, std::sync::mpsc::TryRecvError> {
        self.writer_state_receiver.try_recv()
    }

    /// Unregisters every instance and leaves the domain.
    pub(crate) fn shutdown(&self) -> DdsResult<()> {
        let mut state = self.lock_state()?;
        let instances: Vec<InstanceHandle> = state.instances.iter().copied().collect();
        for key in instances {
            self.unregister(&mut state, key)?;
        }
        self.bus.remove_writer(self.info.guid);
        self.topic.remove_endpoint();
        state.deleted = true;
        Ok(())
    }

    fn unregister(&self, state: &mut WriterState, key: InstanceHandle) -> DdsResult<()> {
        if self
            .qos
            .writer_data_lifecycle()
            .autodispose_unregistered_instances
        {
            self.publish(state, ChangeKind::NotAliveDisposed, key, None)?;
        }
        self.publish(state, ChangeKind::NotAliveUnregistered, key, None)?;
        state.instances.remove(&key);
        Ok(())
    }

    fn publish(
        &self,
        state: &mut WriterState,
        kind: ChangeKind,
        key: InstanceHandle,
        payload: Option<SerializedPayload>,
    ) -> DdsResult<()> {
        let sequence_number = state.last_sequence_number.next();
        let change = CacheChange::new(
            kind,
            self.info.guid,
            sequence_number,
            Timestamp::now(),
            payload,
            key,
        );
        self.bus.publish(self.info.guid, change.clone())?;
        if let Some(transport) = &self.transport {
            transport.send_change(&self.info, &self.qos, &change);
        }
        state.last_sequence_number = sequence_number;
        Ok(())
    }
}

fn instance_key<D: DdsData>(data: &D, handle: Option<InstanceHandle>) -> DdsResult<InstanceHandle> {
    let key = data.gen_key();
    match handle {
        Some(h) if h != HANDLE_NIL && h != key => Err(DdsError::PreconditionNotMet(format!(
            "handle {:?} doesn't match the instance {:?}",
            h, key
        ))),
        _ => Ok(key),
    }
}

impl<D: Serialize + DdsData> Evented for DataWriter<D> {
    fn register(
        &self,
        poll: &Poll,
        token: Token,
        interests: Ready,
        opts: PollOpt,
    ) -> io::Result<()> {
        self.writer_state_receiver
            .register(poll, token, interests, opts)
    }
    fn reregister(
        &self,
        poll: &Poll,
        token: Token,
        interests: Ready,
        opts: PollOpt,
    ) -> io::Result<()> {
        self.writer_state_receiver
            .reregister(poll, token, interests, opts)
    }
    fn deregister(&self, poll: &Poll) -> io::Result<()> {
        self.writer_state_receiver.deregister(poll)
    }
}

#[cfg(test)]
mod test {
    use crate::config::UnionDdsConfiguration;
    use crate::dds::{
        participant_factory::DomainParticipantFactory,
        qos::{
            policy, DataReaderQos, DataReaderQosBuilder, DataWriterQos, DomainParticipantQos,
            PublisherQos, SubscriberQos, TopicQos,
        },
        DataReader, DataWriter, DomainParticipant, InstanceStateKind, StatusKind, TypeSupport,
        HANDLE_NIL,
    };
    use crate::error::DdsError;
    use crate::hello_world_data::{MessageUnion, Msg, SystemErrorType};
    use crate::DdsData;

    fn msg(id: i32) -> Msg {
        Msg {
            msg_id: id,
            msg: MessageUnion::Msg2(SystemErrorType { error_code: id * 10 }),
        }
    }

    fn endpoints(
        dp: &DomainParticipant,
        autodispose: bool,
    ) -> (DataWriter<Msg>, DataReader<Msg>) {
        TypeSupport::<Msg>::new()
            .register_type(dp, "HelloWorldData::Msg")
            .unwrap();
        let topic = dp
            .create_topic("HelloWorldData_Msg", "HelloWorldData::Msg", TopicQos::Default)
            .unwrap();
        let publisher = dp.create_publisher(PublisherQos::Default).unwrap();
        let mut wqos = publisher.get_default_datawriter_qos();
        wqos.set_writer_data_lifecycle(policy::WriterDataLifecycle {
            autodispose_unregistered_instances: autodispose,
        });
        let writer = publisher
            .create_datawriter::<Msg>(DataWriterQos::Policies(Box::new(wqos)), topic.clone())
            .unwrap();
        let subscriber = dp.create_subscriber(SubscriberQos::Default).unwrap();
        let rqos = DataReaderQosBuilder::new()
            .history(policy::History {
                kind: policy::HistoryQosKind::KeepAll,
                depth: 1,
            })
            .build();
        let reader = subscriber
            .create_datareader::<Msg>(DataReaderQos::Policies(Box::new(rqos)), topic)
            .unwrap();
        (writer, reader)
    }

    #[test]
    fn test_write_with_handle() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(23, DomainParticipantQos::Default)
            .unwrap();
        let (writer, reader) = endpoints(&dp, true);

        let handle = writer.register_instance(&msg(1)).unwrap();
        assert_eq!(handle, msg(1).gen_key());
        writer.write(&msg(1), Some(handle)).unwrap();
        writer.write(&msg(2), Some(HANDLE_NIL)).unwrap();
        writer.write(&msg(3), None).unwrap();
        assert!(matches!(
            writer.write(&msg(4), Some(handle)),
            Err(DdsError::PreconditionNotMet(_))
        ));
        assert_eq!(reader.take().unwrap(), vec![msg(1), msg(2), msg(3)]);
    }

    #[test]
    fn test_unregister_and_dispose() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(24, DomainParticipantQos::Default)
            .unwrap();
        let (writer, reader) = endpoints(&dp, true);

        assert!(matches!(
            writer.unregister_instance(&msg(5), None),
            Err(DdsError::PreconditionNotMet(_))
        ));
        writer.write(&msg(5), None).unwrap();
        writer.write(&msg(6), None).unwrap();
        writer.dispose(&msg(6), None).unwrap();
        writer.unregister_instance(&msg(5), None).unwrap();

        let samples = reader.take_samples().unwrap();
        // 5: data, disposed, unregistered. 6: data, disposed
        assert_eq!(samples.len(), 5);
        let valid: Vec<&Msg> = samples.iter().filter_map(|s| s.data.as_ref()).collect();
        assert_eq!(valid, vec![&msg(5), &msg(6)]);
        assert!(samples
            .iter()
            .filter(|s| s.info.instance_handle == msg(6).gen_key())
            .all(|s| s.info.instance_state == InstanceStateKind::NotAliveDisposed));
        // autodispose: disposed before unregistered, and it stays disposed
        assert!(samples
            .iter()
            .filter(|s| s.info.instance_handle == msg(5).gen_key())
            .all(|s| s.info.instance_state == InstanceStateKind::NotAliveDisposed));
    }

    #[test]
    fn test_autodispose_with_default_reader() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(29, DomainParticipantQos::Default)
            .unwrap();
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();
        let topic = dp
            .create_topic("HelloWorldData_Msg", "HelloWorldData::Msg", TopicQos::Default)
            .unwrap();
        let publisher = dp.create_publisher(PublisherQos::Default).unwrap();
        let writer = publisher
            .create_datawriter::<Msg>(DataWriterQos::Default, topic.clone())
            .unwrap();
        assert!(writer.get_qos().writer_data_lifecycle().autodispose_unregistered_instances);
        let subscriber = dp.create_subscriber(SubscriberQos::Default).unwrap();
        let reader = subscriber
            .create_datareader::<Msg>(DataReaderQos::Default, topic)
            .unwrap();

        writer.write(&msg(1), None).unwrap();
        writer.unregister_instance(&msg(1), None).unwrap();

        let samples = reader.take_samples().unwrap();
        let kinds: Vec<(bool, InstanceStateKind)> = samples
            .iter()
            .map(|s| (s.info.valid_data, s.info.instance_state))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (true, InstanceStateKind::NotAliveDisposed),
                (false, InstanceStateKind::NotAliveDisposed),
                (false, InstanceStateKind::NotAliveDisposed),
            ]
        );
    }

    #[test]
    fn test_instance_alive_while_another_writer_remains() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(30, DomainParticipantQos::Default)
            .unwrap();
        let (writer_a, reader) = endpoints(&dp, false);
        let publisher = writer_a.get_publisher();
        let writer_b = publisher
            .create_datawriter::<Msg>(
                DataWriterQos::Policies(Box::new(writer_a.get_qos())),
                writer_a.get_topic(),
            )
            .unwrap();

        writer_a.write(&msg(1), None).unwrap();
        writer_b.write(&msg(1), None).unwrap();
        publisher.delete_datawriter(&writer_a).unwrap();

        let samples = reader.take_samples().unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples
            .iter()
            .all(|s| s.info.instance_state == InstanceStateKind::Alive));

        publisher.delete_datawriter(&writer_b).unwrap();
        let samples = reader.take_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].info.valid_data);
        assert_eq!(
            samples[0].info.instance_state,
            InstanceStateKind::NotAliveNoWriters
        );
    }

    #[test]
    fn test_delete_without_autodispose() {
        let factory = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let dp = factory
            .create_participant(25, DomainParticipantQos::Default)
            .unwrap();
        let (writer, reader) = endpoints(&dp, false);
        writer.set_status_mask(StatusKind::OfferedIncompatibleQos.into());
        writer.write(&msg(7), None).unwrap();
        writer.get_publisher().delete_datawriter(&writer).unwrap();
        assert!(matches!(
            writer.write(&msg(8), None),
            Err(DdsError::AlreadyDeleted(_))
        ));

        let samples = reader.take_samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].data, Some(msg(7)));
        assert!(!samples[1].info.valid_data);
        assert_eq!(
            samples[1].info.instance_state,
            InstanceStateKind::NotAliveNoWriters
        );
        assert!(reader.get_matched_publications().is_empty());
    }
}
