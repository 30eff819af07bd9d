// src/utils/ip.rs
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Egress IP of this process, for status reports (exchanges whitelist by IP).
/// Lookup failure is non-fatal; the caller just omits the line.
pub async fn public_ip(http: &reqwest::Client) -> Option<String> {
    let resp = http
        .get("https://api.ipify.org?format=json")
        .send()
        .await
        .and_then(|r| r.error_for_status());

    match resp {
        Ok(resp) => match resp.json::<IpResponse>().await {
            Ok(body) => Some(body.ip),
            Err(e) => {
                warn!("Failed to parse public IP response: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Public IP lookup failed: {}", e);
            None
        }
    }
}
