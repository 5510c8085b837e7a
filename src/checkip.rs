use crate::errors::*;
use hyper::body;
use hyper::Client;
use hyper::StatusCode;
use hyper::Uri;
use std::net::Ipv4Addr;
use std::str;
use std::str::FromStr;
use tokio::runtime;
use tracing::debug;

/// Reports the caller's public IPv4 address.
pub trait PublicIp {
    fn public_ip(&self) -> Result<Ipv4Addr>;
}

/// Asks a checkip-style HTTP endpoint, which answers with the bare address.
pub struct CheckIp {
    url: String,
}

impl CheckIp {
    pub fn new<S: Into<String>>(url: S) -> CheckIp {
        CheckIp { url: url.into() }
    }
}

impl PublicIp for CheckIp {
    fn public_ip(&self) -> Result<Ipv4Addr> {
        let uri = Uri::from_str(&self.url)
            .map_err(|e| ErrorKind::ExternalLookup(format!("invalid URL {}: {}", self.url, e)))?;
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .chain_err(|| "could not create async runtime")?;
        let client = Client::new();
        let (status, bytes) = rt
            .block_on(async {
                let res = client.get(uri).await?;
                let status = res.status();
                let bytes = body::to_bytes(res.into_body()).await?;
                Ok::<_, hyper::Error>((status, bytes))
            })
            .map_err(|e| {
                ErrorKind::ExternalLookup(format!("failed to contact {}: {}", self.url, e))
            })?;
        let content = str::from_utf8(&bytes).map_err(|_| {
            ErrorKind::ExternalLookup(format!("{} did not return UTF-8", self.url))
        })?;
        debug!(url = %self.url, %status, content = content.trim(), "checkip response");
        parse_response(status, content)
    }
}

fn parse_response(status: StatusCode, content: &str) -> Result<Ipv4Addr> {
    if status != StatusCode::OK {
        bail!(ErrorKind::ExternalLookup(format!(
            "checkip service returned {}: {}",
            status,
            content.trim()
        )));
    }
    let addr = content.trim();
    Ipv4Addr::from_str(addr).map_err(|_| {
        ErrorKind::ExternalLookup(format!("expected an IPv4 address, got: {}", addr)).into()
    })
}
