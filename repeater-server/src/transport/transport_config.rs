use webrtc::ice_transport::ice_server::RTCIceServer;

/// ICE servers handed to every peer transport the SFU creates.
///
/// Filled from the repeatable `--ice-server` flag at startup; the default is
/// a public STUN entry so candidates resolve behind NAT. An explicitly empty
/// list means host candidates only, which is what in-process loopback setups
/// want.
#[derive(Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
}

impl TransportConfig {
    /// Config from CLI-provided URLs; no URLs means the STUN default.
    pub fn from_urls(urls: Vec<String>) -> Self {
        if urls.is_empty() {
            Self::default()
        } else {
            Self { ice_servers: urls }
        }
    }

    /// The server list in the transport's own terms.
    pub(crate) fn rtc_ice_servers(&self) -> Vec<RTCIceServer> {
        if self.ice_servers.is_empty() {
            return vec![];
        }

        vec![RTCIceServer {
            urls: self.ice_servers.clone(),
            ..Default::default()
        }]
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
        }
    }
}
