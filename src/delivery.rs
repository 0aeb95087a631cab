//! in-process delivery of samples between the endpoints of a domain

pub(crate) mod cache;
pub(crate) mod domain_bus;

pub(crate) use domain_bus::{DomainBus, EndpointInfo, ReaderEntry, WriterEntry};
