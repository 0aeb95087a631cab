use crate::config::UnionDdsConfiguration;
use crate::dds::qos::DataWriterQosPolicies;
use crate::delivery::{cache::CacheChange, DomainBus, EndpointInfo};
use crate::network::{
    frame::SampleFrame,
    net_util::{get_local_interfaces, usertraffic_multicast_port},
    udp_listening_socket::new_multicast,
    udp_sender::UdpSender,
};
use crate::structure::{DomainId, GuidPrefix};
use log::{debug, error, info, trace, warn};
use mio_extras::channel as mio_channel;
use mio_v06::{net::UdpSocket, Events, Poll, PollOpt, Ready, Token};
use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

const USERTRAFFIC_MULTI_TOKEN: Token = Token(0);
const STOP_TOKEN: Token = Token(1);
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Best effort multicast of samples between processes.
///
/// Every change written by a local DataWriter is sent as one `SampleFrame`.
/// A receive thread injects the frames of other processes into the readers
/// of the owning participant.
#[derive(Clone)]
pub(crate) struct UdpTransport {
    inner: Arc<InnerTransport>,
}

struct InnerTransport {
    domain_id: DomainId,
    sender: UdpSender,
    multicast_group: Ipv4Addr,
    port: u16,
    stop_sender: Mutex<Option<mio_channel::Sender<()>>>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    pub fn new(
        domain_id: DomainId,
        participant: GuidPrefix,
        configuration: &UnionDdsConfiguration,
        bus: DomainBus,
    ) -> io::Result<Self> {
        let interfaces = get_local_interfaces(configuration)?;
        let multicast_group = configuration.multicast_group();
        let port = usertraffic_multicast_port(domain_id);
        let socket = new_multicast(port, multicast_group, &interfaces)?;
        let sender = UdpSender::new(&interfaces)?;

        let (stop_sender, stop_receiver) = mio_channel::channel::<()>();
        let poll = Poll::new()?;
        poll.register(
            &socket,
            USERTRAFFIC_MULTI_TOKEN,
            Ready::readable(),
            PollOpt::edge(),
        )?;
        poll.register(&stop_receiver, STOP_TOKEN, Ready::readable(), PollOpt::edge())?;

        let receive_thread = thread::Builder::new()
            .name(format!("UdpTransport-{}", domain_id))
            .spawn(move || {
                let receiver = FrameReceiver {
                    participant,
                    poll,
                    socket,
                    stop_receiver,
                    bus,
                };
                receiver.receive_loop();
            })?;
        info!(
            "UDP transport of {} listening on {}:{}",
            participant, multicast_group, port
        );

        Ok(Self {
            inner: Arc::new(InnerTransport {
                domain_id,
                sender,
                multicast_group,
                port,
                stop_sender: Mutex::new(Some(stop_sender)),
                receive_thread: Mutex::new(Some(receive_thread)),
            }),
        })
    }

    pub fn send_change(
        &self,
        writer: &EndpointInfo,
        qos: &DataWriterQosPolicies,
        change: &CacheChange,
    ) {
        match SampleFrame::new(writer, qos, change).encode() {
            Ok(datagram) => {
                if datagram.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "change {} of Writer {} is too large to send: {} bytes",
                        change.sequence_number.0,
                        writer.guid,
                        datagram.len()
                    );
                    return;
                }
                trace!(
                    "send change {} of Writer {} on domain {}",
                    change.sequence_number.0,
                    writer.guid,
                    self.inner.domain_id
                );
                self.inner.sender.send_to_multicast(
                    &datagram,
                    self.inner.multicast_group,
                    self.inner.port,
                );
            }
            Err(e) => error!("couldn't encode a change of Writer {}: {}", writer.guid, e),
        }
    }

    /// Stops the receive thread and waits for it.
    pub fn shutdown(&self) {
        self.inner.stop();
    }
}

impl InnerTransport {
    fn stop(&self) {
        if let Some(stop_sender) = self
            .stop_sender
            .lock()
            .expect("couldn't lock stop_sender")
            .take()
        {
            if stop_sender.send(()).is_err() {
                debug!("receive thread already stopped");
            }
        }
        if let Some(handle) = self
            .receive_thread
            .lock()
            .expect("couldn't lock receive_thread")
            .take()
        {
            if handle.join().is_err() {
                error!("receive thread of domain {} panicked", self.domain_id);
            }
        }
    }
}

impl Drop for InnerTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

struct FrameReceiver {
    participant: GuidPrefix,
    poll: Poll,
    socket: UdpSocket,
    stop_receiver: mio_channel::Receiver<()>,
    bus: DomainBus,
}

impl FrameReceiver {
    fn receive_loop(self) {
        let mut events = Events::with_capacity(128);
        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                error!("UDP transport poll failed: {}", e);
                return;
            }
            for event in events.iter() {
                match event.token() {
                    USERTRAFFIC_MULTI_TOKEN => self.receive_datagrams(),
                    STOP_TOKEN => {
                        if self.stop_receiver.try_recv().is_ok() {
                            debug!("UDP transport of {} stopped", self.participant);
                            return;
                        }
                    }
                    _ => (),
                }
            }
        }
    }

    fn receive_datagrams(&self) {
        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    error!("UDP transport failed to receive: {}", e);
                    return;
                }
            };
            let frame = match SampleFrame::decode(&buf[..len]) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("dropped datagram from {}: {}", addr, e);
                    continue;
                }
            };
            // already delivered through the bus
            if self.bus.is_local_participant(frame.writer_guid.guid_prefix) {
                continue;
            }
            let writer = frame.writer_info();
            let qos = frame.writer_qos();
            self.bus
                .deliver_remote(self.participant, &writer, &qos, frame.into_change());
        }
    }
}
