use crate::app::{create_msg_topic, PARTITION_NAME};
use crate::dds::{
    qos::{policy, DataReaderQos, DomainParticipantQos, SubscriberQos},
    DomainParticipantFactory, DOMAIN_ID_DEFAULT,
};
use crate::error::{check_handle, check_status, DdsError, ExampleError};
use crate::hello_world_data::Msg;
use crate::structure::DomainId;
use log::{debug, info};
use std::io::Write;
use std::thread;
use std::time::Duration;

pub struct SubscriberSettings {
    pub domain_id: DomainId,
    pub poll_period: Duration,
    /// the subscriber gives up after this many polls
    pub max_polls: usize,
    pub expected_messages: usize,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            domain_id: DOMAIN_ID_DEFAULT,
            poll_period: Duration::from_millis(200),
            max_polls: 1500,
            expected_messages: 3,
        }
    }
}

/// Prints the HelloWorldData messages taken from the topic until
/// `expected_messages` arrived or `max_polls` polls found nothing more.
///
/// Returns the number of messages received.
pub fn run<W: Write>(settings: &SubscriberSettings, out: &mut W) -> Result<usize, ExampleError> {
    let factory = DomainParticipantFactory::get_instance();
    let participant = check_handle(
        factory.create_participant(settings.domain_id, DomainParticipantQos::Default),
        "create_participant() failed",
    )?;
    let (topic, topic_qos) = create_msg_topic(&participant)?;

    let mut subscriber_qos = participant.get_default_subscriber_qos();
    subscriber_qos.set_partition(policy::Partition::new(PARTITION_NAME));
    let subscriber = check_handle(
        participant.create_subscriber(SubscriberQos::Policies(Box::new(subscriber_qos))),
        "create_subscriber() failed",
    )?;

    let mut reader_qos = subscriber.get_default_datareader_qos();
    check_status(
        subscriber.copy_from_topic_qos(&mut reader_qos, &topic_qos),
        "copy_from_topic_qos() failed",
    )?;
    let reader = check_handle(
        subscriber.create_datareader::<Msg>(
            DataReaderQos::Policies(Box::new(reader_qos)),
            topic.clone(),
        ),
        "create_datareader() failed",
    )?;

    writeln!(out, "=== [Subscriber] Ready ...")?;
    let mut received = 0;
    for poll in 0..settings.max_polls {
        let samples = match reader.take_samples() {
            Ok(samples) => samples,
            Err(DdsError::NoData) => Vec::new(),
            Err(e) => {
                return Err(ExampleError::Status {
                    info: "take() failed".to_string(),
                    code: e.return_code(),
                })
            }
        };
        for sample in samples {
            let Some(message) = sample.data else {
                debug!(
                    "instance {:?} is {:?}",
                    sample.info.instance_handle, sample.info.instance_state
                );
                continue;
            };
            received += 1;
            writeln!(out, "=== [Subscriber] message received :")?;
            for line in message.describe() {
                writeln!(out, "{}", line)?;
            }
        }
        if received >= settings.expected_messages {
            info!("received {} messages after {} polls", received, poll + 1);
            break;
        }
        thread::sleep(settings.poll_period);
    }

    check_status(
        subscriber.delete_datareader(&reader),
        "delete_datareader() failed",
    )?;
    check_status(
        participant.delete_subscriber(&subscriber),
        "delete_subscriber() failed",
    )?;
    check_status(participant.delete_topic(&topic), "delete_topic() failed")?;
    check_status(
        factory.delete_participant(&participant),
        "delete_participant() failed",
    )?;
    Ok(received)
}
