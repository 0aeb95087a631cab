//! The HelloWorldData publisher and subscriber programs.
//!
//! Both programs walk the entity hierarchy the same way: factory, participant,
//! type, topic and then a publisher or a subscriber. Every failing step ends the
//! program with an `ExampleError`.

pub mod publisher;
pub mod subscriber;

use crate::config::{TransportKind, UnionDdsConfigurationBuilder};
use crate::dds::{
    qos::{policy, TopicQos, TopicQosPolicies},
    DomainParticipant, DomainParticipantFactory, Topic,
};
use crate::error::{check_handle, check_status, ExampleError};
use crate::hello_world_data::MsgTypeSupport;
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Deserializers, Root},
    encode::pattern::PatternEncoder,
    init_config, init_file,
};

pub const TOPIC_NAME: &str = "HelloWorldData_Msg";
pub const PARTITION_NAME: &str = "HelloWorld Partition";
pub const LOGGING_CONFIG: &str = "union_dds_logging.yml";

/// Initializes log4rs from `path`, or logs warnings to stderr when the file can't be used.
pub fn init_logging(path: &str) {
    if let Err(e) = init_file(path, Deserializers::default()) {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(
                "[{l}] [{d(%s%.f)}] [{t}]: {m}{n}",
            )))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(Root::builder().appender("stderr").build(LevelFilter::Warn));
        match config {
            Ok(config) => {
                if init_config(config).is_ok() {
                    log::debug!("{} not used: {}", path, e);
                }
            }
            Err(e) => eprintln!("couldn't configure logging: {}", e),
        }
    }
}

/// Overrides the transport of the factory configuration, if asked to.
pub fn select_transport(
    factory: &DomainParticipantFactory,
    transport: Option<TransportKind>,
) -> Result<(), ExampleError> {
    let Some(transport) = transport else {
        return Ok(());
    };
    let configuration = check_handle(
        UnionDdsConfigurationBuilder::from(factory.get_configuration())
            .transport(transport)
            .build(),
        "UnionDdsConfigurationBuilder::build() failed",
    )?;
    check_status(
        factory.set_configuration(configuration),
        "set_configuration() failed",
    )
}

/// Registers `Msg` and creates the reliable, transient HelloWorldData topic.
///
/// Returns the topic with the QoS it was created with.
pub(crate) fn create_msg_topic(
    participant: &DomainParticipant,
) -> Result<(Topic, TopicQosPolicies), ExampleError> {
    let type_support = MsgTypeSupport::new();
    let type_name = type_support.get_type_name();
    check_status(
        type_support.register_type(participant, &type_name),
        "register_type() failed",
    )?;

    let mut topic_qos = participant.get_default_topic_qos();
    topic_qos.set_reliability(policy::Reliability::default_reliable());
    topic_qos.set_durability(policy::Durability::Transient);
    let topic = check_handle(
        participant.create_topic(
            TOPIC_NAME,
            &type_name,
            TopicQos::Policies(Box::new(topic_qos.clone())),
        ),
        "create_topic() failed",
    )?;
    Ok((topic, topic_qos))
}
