use std::collections::HashMap;
use std::net::IpAddr;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::TransportError;

/// Service type every process advertises and browses under.
pub const SERVICE_TYPE: &str = "_localboard._tcp.local.";

/// A live DNS-SD registration. Shutting it down withdraws the record.
pub struct Advertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertisement {
    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            debug!("failed to unregister service: {}", e);
        }
        if let Err(e) = self.daemon.shutdown() {
            debug!("failed to shut down mDNS daemon: {}", e);
        }
        info!("withdrew service advertisement {}", self.fullname);
    }
}

/// Register one service record for this process, resolvable to this
/// host's auto-detected addresses and the given port. Best-effort: the
/// caller logs a failure and continues, since direct connection still
/// works without discovery.
pub fn advertise(port: u16) -> Result<Advertisement, TransportError> {
    let daemon =
        ServiceDaemon::new().map_err(|e| TransportError::Discovery(e.to_string()))?;

    let instance = format!("localboard-{}", Uuid::new_v4().simple());
    let host_name = format!("{}.local.", instance);
    let properties = HashMap::from([("name".to_string(), "LocalBoard".to_string())]);

    let info = ServiceInfo::new(SERVICE_TYPE, &instance, &host_name, "", port, properties)
        .map_err(|e| TransportError::Discovery(e.to_string()))?
        .enable_addr_auto();
    let fullname = info.get_fullname().to_string();

    daemon
        .register(info)
        .map_err(|e| TransportError::Discovery(e.to_string()))?;
    info!("advertising {} on port {}", fullname, port);

    Ok(Advertisement { daemon, fullname })
}

/// Browse for peers for the life of the process. Every resolved instance
/// with an IPv4 address and a nonzero port is offered to `on_found` as
/// `ip:port`. No deduplication here: `Transport::connect` ignores
/// addresses it already holds.
pub async fn browse<F>(on_found: F) -> Result<(), TransportError>
where
    F: Fn(String) + Send + 'static,
{
    let daemon =
        ServiceDaemon::new().map_err(|e| TransportError::Discovery(e.to_string()))?;
    let receiver = daemon
        .browse(SERVICE_TYPE)
        .map_err(|e| TransportError::Discovery(e.to_string()))?;

    while let Ok(event) = receiver.recv_async().await {
        if let ServiceEvent::ServiceResolved(info) = event {
            if info.get_port() == 0 {
                continue;
            }
            let v4 = info.get_addresses().iter().find_map(|addr| match addr {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            });
            match v4 {
                Some(v4) => {
                    let addr = format!("{}:{}", v4, info.get_port());
                    debug!("resolved peer instance {} at {}", info.get_fullname(), addr);
                    on_found(addr);
                }
                None => warn!(
                    "resolved instance {} without an IPv4 address, skipping",
                    info.get_fullname()
                ),
            }
        }
    }
    Ok(())
}
