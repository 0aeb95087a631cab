use crate::app::{create_msg_topic, PARTITION_NAME};
use crate::dds::{
    qos::{policy, DataWriterQos, DomainParticipantQos, PublisherQos},
    DomainParticipantFactory, DOMAIN_ID_DEFAULT, HANDLE_NIL,
};
use crate::error::{check_handle, check_status, ExampleError};
use crate::hello_world_data::{sample_messages, Msg};
use crate::structure::DomainId;
use log::info;
use std::io::Write;
use std::thread;
use std::time::Duration;

pub struct PublisherSettings {
    pub domain_id: DomainId,
    /// pause after each write
    pub delay: Duration,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            domain_id: DOMAIN_ID_DEFAULT,
            delay: Duration::from_secs(1),
        }
    }
}

/// Publishes one message of each union case, then deletes every entity it created.
pub fn run<W: Write>(settings: &PublisherSettings, out: &mut W) -> Result<(), ExampleError> {
    let factory = DomainParticipantFactory::get_instance();
    let participant = check_handle(
        factory.create_participant(settings.domain_id, DomainParticipantQos::Default),
        "create_participant() failed",
    )?;
    let (topic, topic_qos) = create_msg_topic(&participant)?;

    let mut publisher_qos = participant.get_default_publisher_qos();
    publisher_qos.set_partition(policy::Partition::new(PARTITION_NAME));
    let publisher = check_handle(
        participant.create_publisher(PublisherQos::Policies(Box::new(publisher_qos))),
        "create_publisher() failed",
    )?;

    let mut writer_qos = publisher.get_default_datawriter_qos();
    check_status(
        publisher.copy_from_topic_qos(&mut writer_qos, &topic_qos),
        "copy_from_topic_qos() failed",
    )?;
    // with autodispose the subscriber would have to start first
    writer_qos.set_writer_data_lifecycle(policy::WriterDataLifecycle {
        autodispose_unregistered_instances: false,
    });
    let writer = check_handle(
        publisher.create_datawriter::<Msg>(
            DataWriterQos::Policies(Box::new(writer_qos)),
            topic.clone(),
        ),
        "create_datawriter() failed",
    )?;
    info!("HelloWorldData writer {} ready", writer.guid());

    for message in sample_messages() {
        writeln!(out, "=== [Publisher] message sent :")?;
        for line in message.describe() {
            writeln!(out, "{}", line)?;
        }
        check_status(writer.write(&message, Some(HANDLE_NIL)), "write() failed")?;
        thread::sleep(settings.delay);
    }

    check_status(
        publisher.delete_datawriter(&writer),
        "delete_datawriter() failed",
    )?;
    check_status(
        participant.delete_publisher(&publisher),
        "delete_publisher() failed",
    )?;
    check_status(participant.delete_topic(&topic), "delete_topic() failed")?;
    check_status(
        factory.delete_participant(&participant),
        "delete_participant() failed",
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::TOPIC_NAME;
    use crate::dds::{
        qos::{DataReaderQos, DataReaderQosBuilder, SubscriberQos, TopicQos},
        TypeSupport,
    };

    #[test]
    fn test_publish_three_messages() {
        let factory = DomainParticipantFactory::get_instance();
        let dp = factory
            .create_participant(41, DomainParticipantQos::Default)
            .unwrap();
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();
        let topic = dp
            .create_topic(TOPIC_NAME, "HelloWorldData::Msg", TopicQos::Default)
            .unwrap();
        let mut sqos = dp.get_default_subscriber_qos();
        sqos.set_partition(policy::Partition::new(PARTITION_NAME));
        let subscriber = dp
            .create_subscriber(SubscriberQos::Policies(Box::new(sqos)))
            .unwrap();
        let reader = subscriber
            .create_datareader::<Msg>(
                DataReaderQos::Policies(Box::new(
                    DataReaderQosBuilder::new()
                        .reliability(policy::Reliability::default_reliable())
                        .durability(policy::Durability::Transient)
                        .build(),
                )),
                topic.clone(),
            )
            .unwrap();

        let mut out = Vec::new();
        run(
            &PublisherSettings {
                domain_id: 41,
                delay: Duration::ZERO,
            },
            &mut out,
        )
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("=== [Publisher] message sent :").count(), 3);
        assert!(out.contains("    Message_Type: BUS_MESSAGE\n"));
        assert!(out.contains("    Error Code  : 1321\n"));
        // unregistering on delete keeps the samples
        assert_eq!(reader.take().unwrap(), sample_messages().to_vec());

        subscriber.delete_datareader(&reader).unwrap();
        dp.delete_subscriber(&subscriber).unwrap();
        dp.delete_topic(&topic).unwrap();
        factory.delete_participant(&dp).unwrap();
    }

    #[test]
    fn test_partition_mismatch() {
        let factory = DomainParticipantFactory::get_instance();
        let dp = factory
            .create_participant(43, DomainParticipantQos::Default)
            .unwrap();
        TypeSupport::<Msg>::new()
            .register_type(&dp, "HelloWorldData::Msg")
            .unwrap();
        let topic = dp
            .create_topic(TOPIC_NAME, "HelloWorldData::Msg", TopicQos::Default)
            .unwrap();
        let subscriber = dp.create_subscriber(SubscriberQos::Default).unwrap();
        let reader = subscriber
            .create_datareader::<Msg>(DataReaderQos::Default, topic.clone())
            .unwrap();

        run(
            &PublisherSettings {
                domain_id: 43,
                delay: Duration::ZERO,
            },
            &mut std::io::sink(),
        )
        .unwrap();
        assert!(reader.take().unwrap().is_empty());

        subscriber.delete_datareader(&reader).unwrap();
        dp.delete_subscriber(&subscriber).unwrap();
        dp.delete_topic(&topic).unwrap();
        factory.delete_participant(&dp).unwrap();
    }
}
