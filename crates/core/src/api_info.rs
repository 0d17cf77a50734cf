//! Static identity of this API client, sent during login and used to tag the
//! HTTP CONNECT tunnel request.

use std::sync::LazyLock;

use uuid::Uuid;

/// Fixed identity fields reported by this client during the Pixie and Puffin
/// login handshakes, and used as the `GUID` header of the tunnel CONNECT
/// request.
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub guid: Uuid,
}

/// The client's identity for this process. The GUID is generated once per
/// process and reused across every provider connection and reconnect.
pub static BIDFX_API_INFO: LazyLock<ApiInfo> = LazyLock::new(|| ApiInfo {
    name: "BidFXRust",
    version: env!("CARGO_PKG_VERSION"),
    guid: Uuid::new_v4(),
});
