//! Minimal reader for the daemon's torrc
//!
//! The daemon config stays opaque to the transfer path. Only the handful of
//! options that must agree with our own configuration are pulled out.

/// `HiddenServicePort <virtual> <target>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenServicePort {
    pub virtual_port: u16,
    pub target: String,
}

impl HiddenServicePort {
    /// Port of the local target (`127.0.0.1:8085` or bare `8085`)
    pub fn target_port(&self) -> Option<u16> {
        let port = self
            .target
            .rsplit_once(':')
            .map_or(self.target.as_str(), |(_, port)| port);
        port.parse().ok()
    }
}

/// Options of interest from a torrc
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrcSummary {
    pub socks_port: Option<u16>,
    pub data_dir: Option<String>,
    pub hidden_service_dir: Option<String>,
    pub hidden_service_ports: Vec<HiddenServicePort>,
}

impl TorrcSummary {
    /// Parse torrc text. Unknown options and malformed values are skipped.
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut summary = Self::default();

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();

            // torrc keywords are case-insensitive
            match key.to_ascii_lowercase().as_str() {
                "socksport" => {
                    // "9050", "127.0.0.1:9050", "9050 IsolateDestAddr"
                    let addr = value.split_whitespace().next().unwrap_or("");
                    let port = addr.rsplit_once(':').map_or(addr, |(_, port)| port);
                    if summary.socks_port.is_none() {
                        summary.socks_port = port.parse().ok();
                    }
                },
                "datadirectory" => summary.data_dir = Some(value.to_string()),
                "hiddenservicedir" => summary.hidden_service_dir = Some(value.to_string()),
                "hiddenserviceport" => {
                    let mut parts = value.split_whitespace();
                    if let Some(Ok(virtual_port)) = parts.next().map(str::parse::<u16>) {
                        let target = parts
                            .next()
                            .map_or_else(|| virtual_port.to_string(), str::to_string);
                        summary.hidden_service_ports.push(HiddenServicePort {
                            virtual_port,
                            target,
                        });
                    }
                },
                _ => {},
            }
        }

        summary
    }

    /// Whether some hidden service port forwards to `local_port`
    pub fn forwards_to(&self, local_port: u16) -> bool {
        self.hidden_service_ports
            .iter()
            .any(|p| p.target_port() == Some(local_port))
    }
}
