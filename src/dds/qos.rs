//! set of DDS QoS policies for each Entity and its builder

// DDS 1.4 spec: 2.3.3 DCPS PSM : IDL

use crate::error::{DdsError, DdsResult};
use policy::*;

/// Declares `$policies` together with its builder `$builder`.
macro_rules! qos_policies {
    (
        $(#[$meta:meta])*
        $policies:ident, $builder:ident {
            $($name:ident / $setter:ident : $policy_type:ident = $default:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $policies {
            $($name: $policy_type,)*
        }

        impl $policies {
            $(
                pub fn $name(&self) -> $policy_type {
                    self.$name.clone()
                }
                pub fn $setter(&mut self, $name: $policy_type) {
                    self.$name = $name;
                }
            )*
        }

        impl Default for $policies {
            fn default() -> Self {
                $builder::new().build()
            }
        }

        #[doc = concat!("Builder of ", stringify!($policies))]
        #[derive(Default)]
        pub struct $builder {
            $($name: Option<$policy_type>,)*
        }

        impl $builder {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                pub fn $name(mut self, $name: $policy_type) -> Self {
                    self.$name = Some($name);
                    self
                }
            )*

            pub fn build(self) -> $policies {
                $policies {
                    $($name: self.$name.unwrap_or_else(|| $default),)*
                }
            }
        }
    };
}

/// for setting QoS on a DomainParticipant
#[derive(Clone)]
pub enum DomainParticipantQos {
    /// represent default QoS of DomainParticipant.
    Default,
    Policies(Box<DomainParticipantQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a DomainParticipant
    DomainParticipantQosPolicies, DomainParticipantQosBuilder {
        user_data / set_user_data: UserData = UserData::default(),
        entity_factory / set_entity_factory: EntityFactory = EntityFactory::default(),
    }
}

/// for setting QoS on a Topic
#[derive(Clone)]
pub enum TopicQos {
    /// represent default QoS of Topic.
    ///
    /// it can get `DomainParticipant::get_default_topic_qos()` and
    /// change `DomainParticipant::set_default_topic_qos()`
    Default,
    Policies(Box<TopicQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a Topic
    TopicQosPolicies, TopicQosBuilder {
        topic_data / set_topic_data: TopicData = TopicData::default(),
        durability / set_durability: Durability = Durability::default(),
        durability_service / set_durability_service: DurabilityService = DurabilityService::default(),
        deadline / set_deadline: Deadline = Deadline::default(),
        latency_budget / set_latency_budget: LatencyBudget = LatencyBudget::default(),
        liveliness / set_liveliness: Liveliness = Liveliness::default(),
        reliability / set_reliability: Reliability = Reliability::default_besteffort(),
        destination_order / set_destination_order: DestinationOrder = DestinationOrder::default(),
        history / set_history: History = History::default(),
        resource_limits / set_resource_limits: ResourceLimits = ResourceLimits::default(),
        transport_priority / set_transport_priority: TransportPriority = TransportPriority::default(),
        lifespan / set_lifespan: Lifespan = Lifespan::default(),
        ownership / set_ownership: Ownership = Ownership::default(),
    }
}

impl TopicQosPolicies {
    pub fn is_consistent(&self) -> DdsResult<()> {
        check_durability_supported(self.durability)?;
        check_history_consistency(self.history, self.resource_limits)
    }
}

/// for setting QoS on a DataWriter
#[derive(Clone)]
pub enum DataWriterQos {
    /// represent default QoS of DataWriter.
    ///
    /// it can get `Publisher::get_default_datawriter_qos()` and
    /// change `Publisher::set_default_datawriter_qos()`
    Default,
    Policies(Box<DataWriterQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a DataWriter
    DataWriterQosPolicies, DataWriterQosBuilder {
        durability / set_durability: Durability = Durability::default(),
        durability_service / set_durability_service: DurabilityService = DurabilityService::default(),
        deadline / set_deadline: Deadline = Deadline::default(),
        latency_budget / set_latency_budget: LatencyBudget = LatencyBudget::default(),
        liveliness / set_liveliness: Liveliness = Liveliness::default(),
        reliability / set_reliability: Reliability = Reliability::default_reliable(),
        destination_order / set_destination_order: DestinationOrder = DestinationOrder::default(),
        history / set_history: History = History::default(),
        resource_limits / set_resource_limits: ResourceLimits = ResourceLimits::default(),
        transport_priority / set_transport_priority: TransportPriority = TransportPriority::default(),
        lifespan / set_lifespan: Lifespan = Lifespan::default(),
        user_data / set_user_data: UserData = UserData::default(),
        ownership / set_ownership: Ownership = Ownership::default(),
        ownership_strength / set_ownership_strength: OwnershipStrength = OwnershipStrength::default(),
        writer_data_lifecycle / set_writer_data_lifecycle: WriterDataLifecycle = WriterDataLifecycle::default(),
    }
}

impl DataWriterQosPolicies {
    /// DDS v1.4 spec, 2.2.2.4.1.15 copy_from_topic_qos
    ///
    /// Every policy the Topic QoS carries replaces the one in self.
    pub fn copy_from_topic_qos(&mut self, topic_qos: &TopicQosPolicies) {
        self.durability = topic_qos.durability;
        self.durability_service = topic_qos.durability_service;
        self.deadline = topic_qos.deadline;
        self.latency_budget = topic_qos.latency_budget;
        self.liveliness = topic_qos.liveliness;
        self.reliability = topic_qos.reliability;
        self.destination_order = topic_qos.destination_order;
        self.history = topic_qos.history;
        self.resource_limits = topic_qos.resource_limits;
        self.transport_priority = topic_qos.transport_priority;
        self.lifespan = topic_qos.lifespan;
        self.ownership = topic_qos.ownership;
    }

    pub fn is_consistent(&self) -> DdsResult<()> {
        check_durability_supported(self.durability)?;
        check_history_consistency(self.history, self.resource_limits)
    }

    /// self is the offered side
    pub fn is_compatible(&self, qos: &DataReaderQosPolicies) -> Result<(), String> {
        check_compatibility(self, qos)
    }
}

/// for setting QoS on a Publisher
#[derive(Clone)]
pub enum PublisherQos {
    /// represent default QoS of Publisher.
    ///
    /// it can get `DomainParticipant::get_default_publisher_qos()` and
    /// change `DomainParticipant::set_default_publisher_qos()`
    Default,
    Policies(Box<PublisherQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a Publisher
    PublisherQosPolicies, PublisherQosBuilder {
        presentation / set_presentation: Presentation = Presentation::default(),
        partition / set_partition: Partition = Partition::default(),
        group_data / set_group_data: GroupData = GroupData::default(),
        entity_factory / set_entity_factory: EntityFactory = EntityFactory::default(),
    }
}

/// for setting QoS on a DataReader
#[derive(Clone)]
pub enum DataReaderQos {
    /// represent default QoS of DataReader.
    ///
    /// it can get `Subscriber::get_default_datareader_qos()` and
    /// change `Subscriber::set_default_datareader_qos()`
    Default,
    Policies(Box<DataReaderQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a DataReader
    DataReaderQosPolicies, DataReaderQosBuilder {
        durability / set_durability: Durability = Durability::default(),
        deadline / set_deadline: Deadline = Deadline::default(),
        latency_budget / set_latency_budget: LatencyBudget = LatencyBudget::default(),
        liveliness / set_liveliness: Liveliness = Liveliness::default(),
        reliability / set_reliability: Reliability = Reliability::default_besteffort(),
        destination_order / set_destination_order: DestinationOrder = DestinationOrder::default(),
        history / set_history: History = History::default(),
        resource_limits / set_resource_limits: ResourceLimits = ResourceLimits::default(),
        user_data / set_user_data: UserData = UserData::default(),
        ownership / set_ownership: Ownership = Ownership::default(),
        time_based_filter / set_time_based_filter: TimeBasedFilter = TimeBasedFilter::default(),
        reader_data_lifecycle / set_reader_data_lifecycle: ReaderDataLifecycle = ReaderDataLifecycle::default(),
    }
}

impl DataReaderQosPolicies {
    /// DDS v1.4 spec, 2.2.2.5.2.17 copy_from_topic_qos
    pub fn copy_from_topic_qos(&mut self, topic_qos: &TopicQosPolicies) {
        self.durability = topic_qos.durability;
        self.deadline = topic_qos.deadline;
        self.latency_budget = topic_qos.latency_budget;
        self.liveliness = topic_qos.liveliness;
        self.reliability = topic_qos.reliability;
        self.destination_order = topic_qos.destination_order;
        self.history = topic_qos.history;
        self.resource_limits = topic_qos.resource_limits;
        self.ownership = topic_qos.ownership;
    }

    pub fn is_consistent(&self) -> DdsResult<()> {
        check_durability_supported(self.durability)?;
        check_history_consistency(self.history, self.resource_limits)
    }

    /// self is the requested side
    pub fn is_compatible(&self, qos: &DataWriterQosPolicies) -> Result<(), String> {
        check_compatibility(qos, self)
    }
}

/// for setting QoS on a Subscriber
#[derive(Clone)]
pub enum SubscriberQos {
    /// represent default QoS of Subscriber.
    ///
    /// it can get `DomainParticipant::get_default_subscriber_qos()` and
    /// change `DomainParticipant::set_default_subscriber_qos()`
    Default,
    Policies(Box<SubscriberQosPolicies>),
}

qos_policies! {
    /// A collection of QoS policies for configuring the behavior of a Subscriber
    SubscriberQosPolicies, SubscriberQosBuilder {
        presentation / set_presentation: Presentation = Presentation::default(),
        partition / set_partition: Partition = Partition::default(),
        group_data / set_group_data: GroupData = GroupData::default(),
        entity_factory / set_entity_factory: EntityFactory = EntityFactory::default(),
    }
}

fn check_compatibility(
    offered: &DataWriterQosPolicies,
    requested: &DataReaderQosPolicies,
) -> Result<(), String> {
    let mut incompatible = Vec::new();
    macro_rules! check_policy {
        ($name:ident, $policy_type:ident) => {
            if !$policy_type::is_compatible(offered.$name, requested.$name) {
                incompatible.push(format!(
                    "{{ {} is not compatible. offered: {:?}, requested: {:?} }}",
                    stringify!($name),
                    offered.$name,
                    requested.$name
                ));
            }
        };
    }
    check_policy!(durability, Durability);
    check_policy!(deadline, Deadline);
    check_policy!(latency_budget, LatencyBudget);
    check_policy!(ownership, Ownership);
    check_policy!(liveliness, Liveliness);
    check_policy!(reliability, Reliability);
    check_policy!(destination_order, DestinationOrder);
    if incompatible.is_empty() {
        Ok(())
    } else {
        Err(format!("{{ {} }}", incompatible.join(", ")))
    }
}

fn check_durability_supported(durability: Durability) -> DdsResult<()> {
    match durability {
        Durability::Persistent => Err(DdsError::Unsupported(
            "Durability Persistent needs a durability service".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_history_consistency(history: History, limits: ResourceLimits) -> DdsResult<()> {
    if history.kind == HistoryQosKind::KeepLast {
        if history.depth <= 0 {
            return Err(DdsError::InconsistentPolicy(format!(
                "History depth must be positive, got {}",
                history.depth
            )));
        }
        if limits.max_samples_per_instance != LENGTH_UNLIMITED
            && history.depth > limits.max_samples_per_instance
        {
            return Err(DdsError::InconsistentPolicy(format!(
                "History depth {} exceeds max_samples_per_instance {}",
                history.depth, limits.max_samples_per_instance
            )));
        }
    }
    Ok(())
}

pub mod policy {
    //! DDS QoS policies
    //!
    //! For more details on each QoS policy, please refer to the DDS specification.
    //! DDS v1.4 spec, 2.2.3 Supported QoS (<https://www.omg.org/spec/DDS/1.4/PDF#G5.1034386>)
    use crate::structure::Duration;
    use fnmatch_regex::glob_to_regex;
    use log::warn;
    use serde::{Deserialize, Serialize};
    use serde_repr::{Deserialize_repr, Serialize_repr};

    pub const LENGTH_UNLIMITED: i32 = -1;

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct DurabilityService {
        pub service_cleanup_delay: Duration,
        pub history_kind: HistoryQosKind,
        pub history_depth: i32,
        pub max_samples: i32,
        pub max_instances: i32,
        pub max_samples_per_instance: i32,
    }
    impl Default for DurabilityService {
        fn default() -> Self {
            Self {
                service_cleanup_delay: Duration::ZERO,
                history_kind: HistoryQosKind::KeepLast,
                history_depth: 1,
                max_samples: LENGTH_UNLIMITED,
                max_instances: LENGTH_UNLIMITED,
                max_samples_per_instance: LENGTH_UNLIMITED,
            }
        }
    }

    /// Durability QoS policy
    ///
    /// Transient is served from the history of the DataWriter itself,
    /// so samples survive as long as the DataWriter does.
    /// Persistent would need a durability service and is rejected.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum Durability {
        Volatile = 0,
        TransientLocal = 1,
        Transient = 2,
        Persistent = 3,
    }
    impl Durability {
        /// offered is Publisher side QoS value
        /// requested is Subscriber side QoS value
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered as i32 >= requested as i32
        }

        /// whether late-joining readers get the history of the DataWriter
        pub fn keeps_history(&self) -> bool {
            *self >= Self::TransientLocal
        }
    }
    impl Default for Durability {
        fn default() -> Self {
            Self::Volatile
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Presentation {
        pub access_scope: PresentationQosAccessScopeKind,
        pub coherent_access: bool,
        pub ordered_access: bool,
    }
    #[allow(clippy::derivable_impls)]
    impl Default for Presentation {
        fn default() -> Self {
            Self {
                access_scope: PresentationQosAccessScopeKind::default(),
                coherent_access: false,
                ordered_access: false,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum PresentationQosAccessScopeKind {
        Instance = 0,
        Topic = 1,
        Group = 2,
    }
    impl Default for PresentationQosAccessScopeKind {
        fn default() -> Self {
            Self::Instance
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Deadline {
        pub period: Duration,
    }
    impl Deadline {
        /// offered is Publisher side QoS value
        /// requested is Subscriber side QoS value
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered.period <= requested.period
        }
    }
    impl Default for Deadline {
        fn default() -> Self {
            Self {
                period: Duration::INFINITE,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct LatencyBudget(pub Duration);
    impl LatencyBudget {
        /// offered is Publisher side QoS value
        /// requested is Subscriber side QoS value
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered.0 <= requested.0
        }
    }
    impl Default for LatencyBudget {
        fn default() -> Self {
            Self(Duration::ZERO)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum Ownership {
        Shared = 0,
        Exclusive = 1,
    }
    impl Ownership {
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered == requested
        }
    }
    impl Default for Ownership {
        fn default() -> Self {
            Self::Shared
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct OwnershipStrength(pub i32);

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Liveliness {
        pub kind: LivelinessQosKind,
        pub lease_duration: Duration,
    }
    impl Liveliness {
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered.kind as i32 >= requested.kind as i32
                && offered.lease_duration <= requested.lease_duration
        }
    }
    impl Default for Liveliness {
        fn default() -> Self {
            Self {
                kind: LivelinessQosKind::Automatic,
                lease_duration: Duration::INFINITE,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum LivelinessQosKind {
        Automatic = 0,
        ManualByParticipant = 1,
        ManualByTopic = 2,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TimeBasedFilter {
        pub minimum_separation: Duration,
    }
    impl Default for TimeBasedFilter {
        fn default() -> Self {
            Self {
                minimum_separation: Duration::ZERO,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Reliability {
        pub kind: ReliabilityQosKind,
        pub max_blocking_time: Duration,
    }
    impl Reliability {
        // DDS v1.4 spec, 2.2.3 Supported QoS:
        // default max_blocking_time is 100ms
        pub fn default_besteffort() -> Self {
            Self {
                kind: ReliabilityQosKind::BestEffort,
                max_blocking_time: Duration::from_millis(100),
            }
        }
        pub fn default_reliable() -> Self {
            Self {
                kind: ReliabilityQosKind::Reliable,
                max_blocking_time: Duration::from_millis(100),
            }
        }

        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered.kind as i32 >= requested.kind as i32
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum ReliabilityQosKind {
        Reliable = 2,
        BestEffort = 1,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum DestinationOrder {
        ByReceptionTimestamp = 0,
        BySourceTimestamp = 1,
    }
    impl DestinationOrder {
        pub(crate) fn is_compatible(offered: Self, requested: Self) -> bool {
            offered as i32 >= requested as i32
        }
    }
    impl Default for DestinationOrder {
        fn default() -> Self {
            Self::ByReceptionTimestamp
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct History {
        pub kind: HistoryQosKind,
        pub depth: i32,
    }
    impl Default for History {
        fn default() -> Self {
            Self {
                kind: HistoryQosKind::KeepLast,
                depth: 1,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
    #[repr(i32)]
    pub enum HistoryQosKind {
        KeepLast = 0,
        KeepAll = 1,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ResourceLimits {
        pub max_samples: i32,
        pub max_instances: i32,
        pub max_samples_per_instance: i32,
    }
    impl Default for ResourceLimits {
        fn default() -> Self {
            Self {
                max_samples: LENGTH_UNLIMITED,
                max_instances: LENGTH_UNLIMITED,
                max_samples_per_instance: LENGTH_UNLIMITED,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Lifespan(pub Duration);
    impl Default for Lifespan {
        fn default() -> Self {
            Self(Duration::INFINITE)
        }
    }

    /// Partition QoS policy
    ///
    /// An empty name list stands for the default partition `""`.
    /// Names may be fnmatch style expressions such as `"HelloWorld*"`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Partition {
        pub name: Vec<String>,
    }
    impl Partition {
        pub fn new(name: &str) -> Self {
            Self {
                name: vec![name.to_string()],
            }
        }

        fn names(&self) -> Vec<&str> {
            if self.name.is_empty() {
                vec![""]
            } else {
                self.name.iter().map(String::as_str).collect()
            }
        }

        /// Two partition policies match when they share a name,
        /// or when an expression on either side matches a name on the other.
        pub fn is_match(&self, other: &Self) -> bool {
            let theirs = other.names();
            self.names().iter().any(|mine| {
                theirs.iter().any(|their| {
                    mine == their || glob_matches(mine, their) || glob_matches(their, mine)
                })
            })
        }
    }
    impl Default for Partition {
        fn default() -> Self {
            Self {
                name: vec![String::new()],
            }
        }
    }

    fn glob_matches(expression: &str, name: &str) -> bool {
        if !expression.contains(['*', '?', '[']) {
            return false;
        }
        match glob_to_regex(expression) {
            Ok(regex) => regex.is_match(name),
            Err(_) => {
                warn!("invalid partition expression '{}'", expression);
                false
            }
        }
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct UserData {
        pub value: Vec<u8>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct TopicData {
        pub value: Vec<u8>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct GroupData {
        pub value: Vec<u8>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct WriterDataLifecycle {
        pub autodispose_unregistered_instances: bool,
    }
    impl Default for WriterDataLifecycle {
        fn default() -> Self {
            Self {
                autodispose_unregistered_instances: true,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ReaderDataLifecycle {
        pub autopurge_nowriter_samples_delay: Duration,
        pub autopurge_disposed_samples_delay: Duration,
    }
    impl Default for ReaderDataLifecycle {
        fn default() -> Self {
            Self {
                autopurge_disposed_samples_delay: Duration::INFINITE,
                autopurge_nowriter_samples_delay: Duration::INFINITE,
            }
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct TransportPriority {
        pub value: i32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
    pub struct EntityFactory {
        pub autoenable_created_entities: bool,
    }
    impl Default for EntityFactory {
        fn default() -> Self {
            Self {
                autoenable_created_entities: true,
            }
        }
    }
}
