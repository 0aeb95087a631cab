use crate::dds::qos::TopicQosPolicies;
use crate::structure::{TopicKind, GUID};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// DDS Topic
///
/// The Topic does not refer back to its DomainParticipant;
/// `participant_guid` identifies the owner.
#[derive(Clone)]
pub struct Topic {
    inner: Arc<InnerTopic>,
}

impl Topic {
    pub(crate) fn new(
        guid: GUID,
        participant_guid: GUID,
        name: String,
        type_name: String,
        kind: TopicKind,
        qos: TopicQosPolicies,
    ) -> Self {
        Self {
            inner: Arc::new(InnerTopic {
                guid,
                participant_guid,
                name,
                type_name,
                kind,
                qos,
                endpoint_count: AtomicUsize::new(0),
                deleted: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }
    pub fn get_type_name(&self) -> String {
        self.inner.type_name.clone()
    }
    pub fn kind(&self) -> TopicKind {
        self.inner.kind
    }
    pub fn get_qos(&self) -> TopicQosPolicies {
        self.inner.qos.clone()
    }
    pub fn guid(&self) -> GUID {
        self.inner.guid
    }
    pub fn participant_guid(&self) -> GUID {
        self.inner.participant_guid
    }

    /// Number of DataWriters and DataReaders created on this Topic and not deleted yet.
    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoint_count.load(Ordering::SeqCst)
    }
    pub(crate) fn add_endpoint(&self) {
        self.inner.endpoint_count.fetch_add(1, Ordering::SeqCst);
    }
    pub(crate) fn remove_endpoint(&self) {
        self.inner.endpoint_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::SeqCst)
    }
    pub(crate) fn mark_deleted(&self) {
        self.inner.deleted.store(true, Ordering::SeqCst);
    }
}

struct InnerTopic {
    guid: GUID,
    participant_guid: GUID,
    name: String,
    type_name: String,
    kind: TopicKind,
    qos: TopicQosPolicies,
    endpoint_count: AtomicUsize,
    deleted: AtomicBool,
}
