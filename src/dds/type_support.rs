use crate::dds::{key::DdsData, participant::DomainParticipant};
use crate::error::DdsResult;
use crate::structure::TopicKind;
use core::any::TypeId;
use core::marker::PhantomData;

/// Registers a data type with a DomainParticipant.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use union_dds::dds::{DomainParticipantFactory, TypeSupport, DOMAIN_ID_DEFAULT};
/// use union_dds::dds::qos::DomainParticipantQos;
/// use union_dds::DdsData;
///
/// #[derive(Serialize, Deserialize, DdsData)]
/// #[dds_data(type_name = "Example::Counter")]
/// struct Counter {
///     #[key]
///     id: u32,
///     value: i64,
/// }
///
/// let factory = DomainParticipantFactory::get_instance();
/// let participant = factory
///     .create_participant(DOMAIN_ID_DEFAULT, DomainParticipantQos::Default)
///     .unwrap();
/// let type_support = TypeSupport::<Counter>::new();
/// assert_eq!(type_support.get_type_name(), "Example::Counter");
/// type_support
///     .register_type(&participant, &type_support.get_type_name())
///     .unwrap();
/// factory.delete_participant(&participant).unwrap();
/// ```
pub struct TypeSupport<D: DdsData> {
    type_name: String,
    data_phantom: PhantomData<D>,
}

impl<D: DdsData + 'static> TypeSupport<D> {
    pub fn new() -> Self {
        Self {
            type_name: D::type_name(),
            data_phantom: PhantomData,
        }
    }

    /// The IDL name of the type.
    pub fn get_type_name(&self) -> String {
        self.type_name.clone()
    }

    /// Makes `D` usable by Topics of `participant` under `type_name`.
    ///
    /// Registering the same pair again succeeds. A name already bound to another
    /// type fails with `PreconditionNotMet`, an empty name with `BadParameter`.
    pub fn register_type(&self, participant: &DomainParticipant, type_name: &str) -> DdsResult<()> {
        participant.register_type(
            type_name,
            TypeId::of::<D>(),
            TopicKind::from_with_key(D::is_with_key()),
        )
    }
}

impl<D: DdsData + 'static> Default for TypeSupport<D> {
    fn default() -> Self {
        Self::new()
    }
}
