use crate::dds::{
    key::DdsData,
    qos::DataReaderQosPolicies,
    sample_info::{InstanceStateKind, Sample, SampleInfo},
    status::{DataReaderStatusChanged, StatusMask},
    subscriber::Subscriber,
    topic::Topic,
    InstanceHandle,
};
use crate::delivery::{cache::CacheChange, cache::HistoryCache, DomainBus};
use crate::error::{DdsError, DdsResult};
use crate::structure::GUID;
use core::marker::PhantomData;
use log::error;
use mio_extras::channel as mio_channel;
use mio_v06::{event::Evented, Poll, PollOpt, Ready, Token};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

/// DDS DataReader
pub struct DataReader<D: for<'de> Deserialize<'de> + DdsData> {
    data_phantom: PhantomData<D>,
    guid: GUID,
    qos: DataReaderQosPolicies,
    topic: Topic,
    subscriber: Subscriber,
    rhc: Arc<RwLock<HistoryCache>>,
    bus: DomainBus,
    deleted: AtomicBool,
    reader_state_receiver: mio_channel::Receiver<DataReaderStatusChanged>,
}

impl<D: for<'de> Deserialize<'de> + DdsData> DataReader<D> {
    pub(crate) fn new(
        guid: GUID,
        qos: DataReaderQosPolicies,
        topic: Topic,
        subscriber: Subscriber,
        rhc: Arc<RwLock<HistoryCache>>,
        bus: DomainBus,
        reader_state_receiver: mio_channel::Receiver<DataReaderStatusChanged>,
    ) -> Self {
        DataReader {
            data_phantom: PhantomData::<D>,
            guid,
            qos,
            topic,
            subscriber,
            rhc,
            bus,
            deleted: AtomicBool::new(false),
            reader_state_receiver,
        }
    }

    fn rhc_enabled(&self) -> DdsResult<RwLockWriteGuard<'_, HistoryCache>> {
        if self.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!(
                "DataReader {}",
                self.guid
            )));
        }
        Ok(self
            .rhc
            .write()
            .expect("couldn't write lock ReaderHistoryCache"))
    }

    /// get available data received from DataWriter
    ///
    /// this function may return empty Vec.
    /// DataReader implement mio::Evented, so you can register DataReader to mio v0.6's Poll.
    /// poll DataReader, to ensure taking data.
    /// Changes that only carry an instance state are consumed too.
    pub fn take(&self) -> DdsResult<Vec<D>> {
        let changes = self.rhc_enabled()?.take_all();
        Ok(changes
            .iter()
            .filter_map(|c| c.data_value())
            .filter_map(|payload| match payload.deserialize::<D>() {
                Ok(data) => Some(data),
                Err(e) => {
                    error!("DataReader {} dropped a sample: {}", self.guid, e);
                    None
                }
            })
            .collect())
    }

    /// Removes and returns every sample with its SampleInfo.
    ///
    /// Returns `NoData` when nothing is available.
    pub fn take_samples(&self) -> DdsResult<Vec<Sample<D>>> {
        let mut rhc = self.rhc_enabled()?;
        let states = instance_states(&rhc);
        let changes = rhc.take_all();
        drop(rhc);
        self.to_samples(changes, &states)
    }

    /// Like `take_samples` but leaves the samples in the DataReader, marked as read.
    pub fn read_samples(&self) -> DdsResult<Vec<Sample<D>>> {
        let mut rhc = self.rhc_enabled()?;
        let states = instance_states(&rhc);
        let changes = rhc.read_all();
        drop(rhc);
        self.to_samples(changes, &states)
    }

    /// Removes and returns the oldest sample not read yet.
    pub fn take_next_sample(&self) -> DdsResult<Sample<D>> {
        let mut rhc = self.rhc_enabled()?;
        let states = instance_states(&rhc);
        let change = rhc.take_next().ok_or(DdsError::NoData)?;
        drop(rhc);
        self.to_samples(vec![change], &states)?
            .pop()
            .ok_or(DdsError::NoData)
    }

    fn to_samples(
        &self,
        changes: Vec<CacheChange>,
        states: &BTreeMap<InstanceHandle, InstanceStateKind>,
    ) -> DdsResult<Vec<Sample<D>>> {
        let mut samples = Vec::with_capacity(changes.len());
        for change in &changes {
            let data = match change.data_value() {
                Some(payload) => match payload.deserialize::<D>() {
                    Ok(data) => Some(data),
                    Err(e) => {
                        error!("DataReader {} dropped a sample: {}", self.guid, e);
                        continue;
                    }
                },
                None => None,
            };
            let instance_state = states
                .get(&change.instance_handle)
                .copied()
                .unwrap_or(InstanceStateKind::Alive);
            samples.push(Sample {
                data,
                info: SampleInfo::new(change, instance_state),
            });
        }
        if samples.is_empty() {
            return Err(DdsError::NoData);
        }
        Ok(samples)
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }
    pub fn get_qos(&self) -> DataReaderQosPolicies {
        self.qos.clone()
    }
    pub fn get_topic(&self) -> Topic {
        self.topic.clone()
    }
    pub fn get_subscriber(&self) -> Subscriber {
        self.subscriber.clone()
    }
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Selects which statuses `try_recv` delivers.
    pub fn set_status_mask(&self, mask: StatusMask) {
        self.bus.set_reader_status_mask(self.guid, mask);
    }

    /// GUIDs of the DataWriters currently matched.
    pub fn get_matched_publications(&self) -> Vec<GUID> {
        self.bus.matched_publications(self.guid)
    }

    /// get DataReaderStatusChanged
    ///
    /// This method is non_blocking, so if there is no DataReaderStatusChanged, this method returns Err.
    pub fn try_recv(&self) -> Result<DataReaderStatusChanged, std::sync::mpsc::TryRecvError> {
        self.reader_state_receiver.try_recv()
    }

    pub(crate) fn shutdown(&self) {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.bus.remove_reader(self.guid);
        self.topic.remove_endpoint();
    }
}

fn instance_states(rhc: &HistoryCache) -> BTreeMap<InstanceHandle, InstanceStateKind> {
    rhc.instances()
        .into_iter()
        .map(|i| (i, rhc.instance_state(i)))
        .collect()
}

impl<D: for<'de> Deserialize<'de> + DdsData> Evented for DataReader<D> {
    fn register(
        &self,
        poll: &Poll,
        token: Token,
        interests: Ready,
        opts: PollOpt,
    ) -> io::Result<()> {
        self.reader_state_receiver
            .register(poll, token, interests, opts)
    }
    fn reregister(
        &self,
        poll: &Poll,
        token: Token,
        interests: Ready,
        opts: PollOpt,
    ) -> io::Result<()> {
        self.reader_state_receiver
            .reregister(poll, token, interests, opts)
    }
    fn deregister(&self, poll: &Poll) -> io::Result<()> {
        self.reader_state_receiver.deregister(poll)
    }
}
