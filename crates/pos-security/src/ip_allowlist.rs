use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Networks allowed to reach the diagnostics pages.
#[derive(Debug, Clone)]
pub struct IpAllowList {
    allowed_networks: Vec<IpNetwork>,
}

impl IpAllowList {
    /// Entries may be single IPs or CIDR ranges. Unparseable entries are skipped
    /// with a warning. An empty list only admits loopback.
    pub fn new(entries: &[String]) -> Self {
        let mut allowed_networks = Vec::new();

        for entry in entries {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            // Single IPs parse as /32 or /128 networks
            match entry.parse::<IpNetwork>() {
                Ok(network) => {
                    debug!("Diagnostics allow-list entry: {}", network);
                    allowed_networks.push(network);
                }
                Err(e) => warn!("Ignoring invalid allow-list entry {:?}: {}", entry, e),
            }
        }

        Self { allowed_networks }
    }

    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };

        if self.allowed_networks.is_empty() {
            return ip.is_loopback();
        }

        self.allowed_networks.iter().any(|net| net.contains(ip))
    }
}
