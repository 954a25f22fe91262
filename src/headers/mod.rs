//! Built-in header catalogue.
//!
//! The engine knows nothing about these; they are ordinary [`HeaderCodec`]s registered
//! by [`RegistryBuilder::with_defaults`](crate::registry::RegistryBuilder::with_defaults).

use crate::header::HeaderCodec;
use std::sync::Arc;

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod fields;
pub mod icmpv6;
pub mod iec104;
pub mod ipv4;
pub mod ipv6;
pub mod raw;
pub mod udp;
pub mod vlan;

pub use arp::Arp;
pub use ethernet::EthernetII;
pub use icmpv6::Icmpv6;
pub use iec104::{Iec104SFrame, Iec104UFrame};
pub use ipv4::Ipv4;
pub use ipv6::Ipv6;
pub use raw::RawData;
pub use udp::Udp;
pub use vlan::Vlan;

/// Default matching order, catch-all excluded.
pub fn default_codecs() -> Vec<Arc<dyn HeaderCodec>> {
    vec![
        Arc::new(EthernetII),
        Arc::new(Vlan),
        Arc::new(Arp),
        Arc::new(Ipv4),
        Arc::new(Ipv6),
        Arc::new(Udp),
        Arc::new(Icmpv6),
        Arc::new(Iec104SFrame),
        Arc::new(Iec104UFrame),
    ]
}
