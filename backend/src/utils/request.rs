use std::net::{IpAddr, SocketAddr};

use axum::http::{header::USER_AGENT, HeaderMap};

use crate::{
    services::auth_guard::ClientOrigin,
    utils::fingerprint::{self, FingerprintError},
};

/// Resolves the origin address: forwarded headers when trusted, else the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|value| value.split(',').next())
            .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer.map(|addr| addr.ip())
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .unwrap_or_default()
}

pub fn client_origin(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Result<ClientOrigin, FingerprintError> {
    let ip = client_ip(headers, peer, trust_proxy).ok_or(FingerprintError::Unavailable)?;
    Ok(ClientOrigin {
        fingerprint: fingerprint::encode_addr(ip)?,
        user_agent: user_agent(headers),
    })
}
