use crate::config::{TransportKind, UnionDdsConfiguration, MAX_DOMAIN_ID};
use crate::dds::{
    participant::DomainParticipant,
    qos::{DomainParticipantQos, DomainParticipantQosBuilder, DomainParticipantQosPolicies},
    DOMAIN_ID_DEFAULT,
};
use crate::delivery::DomainBus;
use crate::error::{DdsError, DdsResult};
use crate::network::transport::UdpTransport;
use crate::structure::{DomainId, GUID};
use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static FACTORY: OnceLock<DomainParticipantFactory> = OnceLock::new();

/// DDS DomainParticipantFactory
///
/// The process wide entry point creating and deleting DomainParticipants.
pub struct DomainParticipantFactory {
    inner: Mutex<InnerFactory>,
}

struct InnerFactory {
    configuration: UnionDdsConfiguration,
    default_participant_qos: DomainParticipantQosPolicies,
    participants: BTreeMap<GUID, DomainParticipant>,
    buses: BTreeMap<DomainId, DomainBus>,
    small_rng: SmallRng,
}

impl DomainParticipantFactory {
    /// The singleton, configured from `UNION_DDS_CONFIGURATION` on first use.
    pub fn get_instance() -> &'static Self {
        FACTORY.get_or_init(|| Self::new(UnionDdsConfiguration::from_env()))
    }

    pub(crate) fn new(configuration: UnionDdsConfiguration) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            inner: Mutex::new(InnerFactory {
                configuration,
                default_participant_qos: DomainParticipantQosBuilder::new().build(),
                participants: BTreeMap::new(),
                buses: BTreeMap::new(),
                small_rng: SmallRng::seed_from_u64(seed),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InnerFactory> {
        self.inner
            .lock()
            .expect("couldn't lock DomainParticipantFactory")
    }

    /// `DOMAIN_ID_DEFAULT` joins the default domain of the configuration.
    pub fn create_participant(
        &self,
        domain_id: DomainId,
        qos: DomainParticipantQos,
    ) -> DdsResult<DomainParticipant> {
        let mut inner = self.lock();
        let domain_id = if domain_id == DOMAIN_ID_DEFAULT {
            inner.configuration.default_domain_id()
        } else {
            domain_id
        };
        if domain_id > MAX_DOMAIN_ID {
            return Err(DdsError::BadParameter(format!(
                "domain id {} exceeds {}",
                domain_id, MAX_DOMAIN_ID
            )));
        }
        let qos = match qos {
            DomainParticipantQos::Default => inner.default_participant_qos.clone(),
            DomainParticipantQos::Policies(q) => *q,
        };

        let bus = inner
            .buses
            .entry(domain_id)
            .or_insert_with(|| DomainBus::new(domain_id))
            .clone();
        let guid = GUID::new_participant_guid(&mut inner.small_rng);
        let transport = match inner.configuration.transport() {
            TransportKind::IntraProcess => None,
            TransportKind::Udp => Some(UdpTransport::new(
                domain_id,
                guid.guid_prefix,
                &inner.configuration,
                bus.clone(),
            )?),
        };

        let dp = DomainParticipant::new(guid, domain_id, qos, bus, transport);
        inner.participants.insert(guid, dp.clone());
        info!(
            "created DomainParticipant {} on domain {}",
            guid.guid_prefix, domain_id
        );
        Ok(dp)
    }

    /// Fails with `PreconditionNotMet` while the participant still has Topics,
    /// Publishers or Subscribers.
    pub fn delete_participant(&self, participant: &DomainParticipant) -> DdsResult<()> {
        if participant.is_deleted() {
            return Err(DdsError::AlreadyDeleted(format!(
                "DomainParticipant {}",
                participant.guid()
            )));
        }
        let mut inner = self.lock();
        let guid = participant.guid();
        if !inner.participants.contains_key(&guid) {
            return Err(DdsError::PreconditionNotMet(format!(
                "DomainParticipant {} was not created by this factory",
                guid
            )));
        }
        if participant.has_entities() {
            return Err(DdsError::PreconditionNotMet(format!(
                "DomainParticipant {} still contains entities",
                guid
            )));
        }
        participant.shutdown();
        inner.participants.remove(&guid);
        info!("deleted DomainParticipant {}", guid.guid_prefix);
        Ok(())
    }

    /// Returns one of the participants joined to `domain_id`, if any.
    pub fn lookup_participant(&self, domain_id: DomainId) -> Option<DomainParticipant> {
        let inner = self.lock();
        let domain_id = if domain_id == DOMAIN_ID_DEFAULT {
            inner.configuration.default_domain_id()
        } else {
            domain_id
        };
        inner
            .participants
            .values()
            .find(|dp| dp.domain_id() == domain_id)
            .cloned()
    }

    pub fn get_default_participant_qos(&self) -> DomainParticipantQosPolicies {
        self.lock().default_participant_qos.clone()
    }
    pub fn set_default_participant_qos(&self, qos: DomainParticipantQosPolicies) {
        self.lock().default_participant_qos = qos;
    }

    pub fn get_configuration(&self) -> UnionDdsConfiguration {
        self.lock().configuration.clone()
    }
    /// Applies to participants created afterwards.
    pub fn set_configuration(&self, configuration: UnionDdsConfiguration) -> DdsResult<()> {
        configuration.validate()?;
        self.lock().configuration = configuration;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::UnionDdsConfigurationBuilder;
    use crate::dds::qos::{PublisherQos, TopicQos};
    use crate::dds::TypeSupport;
    use crate::hello_world_data::Msg;

    fn factory(default_domain_id: DomainId) -> DomainParticipantFactory {
        DomainParticipantFactory::new(
            UnionDdsConfigurationBuilder::new()
                .default_domain_id(default_domain_id)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_singleton() {
        let a = DomainParticipantFactory::get_instance();
        let b = DomainParticipantFactory::get_instance();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_default_domain() {
        let factory = factory(5);
        let dp = factory
            .create_participant(DOMAIN_ID_DEFAULT, DomainParticipantQos::Default)
            .unwrap();
        assert_eq!(dp.domain_id(), 5);
        assert_eq!(
            factory.lookup_participant(5).map(|p| p.guid()),
            Some(dp.guid())
        );
        assert!(factory.lookup_participant(6).is_none());
        assert!(matches!(
            factory.create_participant(233, DomainParticipantQos::Default),
            Err(DdsError::BadParameter(_))
        ));
        factory.delete_participant(&dp).unwrap();
        assert!(factory.lookup_participant(5).is_none());
    }

    #[test]
    fn test_delete_participant() {
        let factory = factory(0);
        let dp = factory
            .create_participant(11, DomainParticipantQos::Default)
            .unwrap();
        let type_support = TypeSupport::<Msg>::new();
        type_support
            .register_type(&dp, &type_support.get_type_name())
            .unwrap();
        let topic = dp
            .create_topic("HelloWorldData_Msg", "HelloWorldData::Msg", TopicQos::Default)
            .unwrap();
        let publisher = dp.create_publisher(PublisherQos::Default).unwrap();

        assert!(matches!(
            factory.delete_participant(&dp),
            Err(DdsError::PreconditionNotMet(_))
        ));
        dp.delete_publisher(&publisher).unwrap();
        dp.delete_topic(&topic).unwrap();
        factory.delete_participant(&dp).unwrap();
        assert!(matches!(
            factory.delete_participant(&dp),
            Err(DdsError::AlreadyDeleted(_))
        ));
        assert!(matches!(
            dp.create_publisher(PublisherQos::Default),
            Err(DdsError::AlreadyDeleted(_))
        ));

        let other = DomainParticipantFactory::new(UnionDdsConfiguration::default());
        let foreign = other
            .create_participant(11, DomainParticipantQos::Default)
            .unwrap();
        assert!(matches!(
            factory.delete_participant(&foreign),
            Err(DdsError::PreconditionNotMet(_))
        ));
        other.delete_participant(&foreign).unwrap();
    }

    #[test]
    fn test_configuration() {
        let factory = factory(0);
        let configuration = UnionDdsConfigurationBuilder::new()
            .default_domain_id(9)
            .build()
            .unwrap();
        factory.set_configuration(configuration.clone()).unwrap();
        assert_eq!(factory.get_configuration(), configuration);
        let dp = factory
            .create_participant(DOMAIN_ID_DEFAULT, DomainParticipantQos::Default)
            .unwrap();
        assert_eq!(dp.domain_id(), 9);
        factory.delete_participant(&dp).unwrap();
    }
}
