pub(crate) mod frame;
pub(crate) mod net_util;
pub(crate) mod transport;
pub(crate) mod udp_listening_socket;
pub(crate) mod udp_sender;
