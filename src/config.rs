//! Process wide settings of union_dds.
//!
//! The configuration is read once from the `UNION_DDS_CONFIGURATION` environment
//! variable as JSON, for example
//! `{"default_domain_id": 3, "transport": "udp", "interface_addresses": ["192.168.1.10"]}`.
//! Missing fields take their default value.

use crate::error::{DdsError, DdsResult};
use crate::structure::DomainId;
use log::warn;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub const CONFIGURATION_ENV: &str = "UNION_DDS_CONFIGURATION";

/// Largest domain id whose user traffic port still fits in 16 bits.
pub const MAX_DOMAIN_ID: DomainId = 232;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// samples only travel between participants of this process
    #[default]
    IntraProcess,
    /// samples are additionally multicast to other processes
    Udp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnionDdsConfiguration {
    default_domain_id: DomainId,
    transport: TransportKind,
    multicast_group: Ipv4Addr,
    /// `None` selects every non loopback IPv4 interface.
    interface_addresses: Option<Vec<Ipv4Addr>>,
}

impl Default for UnionDdsConfiguration {
    fn default() -> Self {
        Self {
            default_domain_id: 0,
            transport: TransportKind::IntraProcess,
            multicast_group: Ipv4Addr::new(239, 255, 0, 1),
            interface_addresses: None,
        }
    }
}

impl UnionDdsConfiguration {
    pub fn default_domain_id(&self) -> DomainId {
        self.default_domain_id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn multicast_group(&self) -> Ipv4Addr {
        self.multicast_group
    }

    pub fn interface_addresses(&self) -> Option<&[Ipv4Addr]> {
        self.interface_addresses.as_deref()
    }

    pub fn validate(&self) -> DdsResult<()> {
        if !self.multicast_group.is_multicast() {
            return Err(DdsError::BadParameter(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        if self.default_domain_id > MAX_DOMAIN_ID {
            return Err(DdsError::BadParameter(format!(
                "default domain id {} exceeds {}",
                self.default_domain_id, MAX_DOMAIN_ID
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> DdsResult<Self> {
        let configuration: Self = serde_json::from_str(json)
            .map_err(|e| DdsError::BadParameter(format!("invalid configuration: {e}")))?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Reads `UNION_DDS_CONFIGURATION`, falling back to the defaults
    /// when it is unset or invalid.
    pub fn from_env() -> Self {
        match std::env::var(CONFIGURATION_ENV) {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|e| {
                warn!("ignoring {}: {}", CONFIGURATION_ENV, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

#[derive(Default)]
pub struct UnionDdsConfigurationBuilder {
    default_domain_id: Option<DomainId>,
    transport: Option<TransportKind>,
    multicast_group: Option<Ipv4Addr>,
    interface_addresses: Option<Vec<Ipv4Addr>>,
}

impl UnionDdsConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_domain_id(mut self, domain_id: DomainId) -> Self {
        self.default_domain_id = Some(domain_id);
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn multicast_group(mut self, group: Ipv4Addr) -> Self {
        self.multicast_group = Some(group);
        self
    }

    pub fn interface_addresses(mut self, addresses: Vec<Ipv4Addr>) -> Self {
        self.interface_addresses = Some(addresses);
        self
    }

    pub fn build(self) -> DdsResult<UnionDdsConfiguration> {
        let default = UnionDdsConfiguration::default();
        let configuration = UnionDdsConfiguration {
            default_domain_id: self.default_domain_id.unwrap_or(default.default_domain_id),
            transport: self.transport.unwrap_or(default.transport),
            multicast_group: self.multicast_group.unwrap_or(default.multicast_group),
            interface_addresses: self.interface_addresses.or(default.interface_addresses),
        };
        configuration.validate()?;
        Ok(configuration)
    }
}

impl From<UnionDdsConfiguration> for UnionDdsConfigurationBuilder {
    fn from(configuration: UnionDdsConfiguration) -> Self {
        Self {
            default_domain_id: Some(configuration.default_domain_id),
            transport: Some(configuration.transport),
            multicast_group: Some(configuration.multicast_group),
            interface_addresses: configuration.interface_addresses,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder() {
        let configuration = UnionDdsConfigurationBuilder::new()
            .default_domain_id(7)
            .transport(TransportKind::Udp)
            .build()
            .unwrap();
        assert_eq!(configuration.default_domain_id(), 7);
        assert_eq!(configuration.transport(), TransportKind::Udp);
        assert_eq!(configuration.multicast_group(), Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(configuration.interface_addresses(), None);

        assert!(matches!(
            UnionDdsConfigurationBuilder::new()
                .multicast_group(Ipv4Addr::new(192, 168, 0, 1))
                .build(),
            Err(DdsError::BadParameter(_))
        ));
        let udp_on_7 = UnionDdsConfigurationBuilder::from(configuration.clone())
            .build()
            .unwrap();
        assert_eq!(udp_on_7, configuration);

        assert!(matches!(
            UnionDdsConfigurationBuilder::new()
                .default_domain_id(233)
                .build(),
            Err(DdsError::BadParameter(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let configuration = UnionDdsConfiguration::from_json(
            r#"{"default_domain_id": 3, "transport": "udp", "interface_addresses": ["10.0.0.2"]}"#,
        )
        .unwrap();
        assert_eq!(configuration.default_domain_id(), 3);
        assert_eq!(configuration.transport(), TransportKind::Udp);
        assert_eq!(
            configuration.interface_addresses(),
            Some(&[Ipv4Addr::new(10, 0, 0, 2)][..])
        );

        assert_eq!(
            UnionDdsConfiguration::from_json("{}").unwrap(),
            UnionDdsConfiguration::default()
        );
        assert!(UnionDdsConfiguration::from_json(r#"{"transport": "tcp"}"#).is_err());
        assert!(
            UnionDdsConfiguration::from_json(r#"{"multicast_group": "10.0.0.1"}"#).is_err()
        );
    }
}
