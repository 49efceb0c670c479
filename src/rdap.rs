//! Address block ownership through RDAP (RFC 9082/9083).
//!
//! Only the parts of an IP network response needed to name the registrant
//! are modelled: the top-level entities with their roles and jCard, and the
//! remarks used as a fallback.

use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::annotate::Lookup;
use crate::error::{Error, Result};

/// Redirector used when no bootstrap service covers an address.
pub const DEFAULT_REDIRECTOR: &str = "https://rdap.org";

/// Where the IANA bootstrap files `ipv4.json` and `ipv6.json` live.
pub const IANA_BOOTSTRAP: &str = "https://data.iana.org/rdap";

const RDAP_ACCEPT: &str = "application/rdap+json, application/json;q=0.9";

/// RDAP role naming the holder of an address block.
pub const REGISTRANT_ROLE: &str = "registrant";

/// The subset of an RDAP IP network object used for ownership.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub remarks: Vec<Remark>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub roles: Vec<String>,
    /// jCard (RFC 7095): `["vcard", [[name, params, type, value], ...]]`.
    #[serde(rename = "vcardArray", default)]
    pub vcard_array: Option<serde_json::Value>,
}

impl Entity {
    /// Role listed first, which RDAP servers use as the primary one.
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }

    /// Value of the jCard `fn` (formatted name) property.
    pub fn display_name(&self) -> Option<&str> {
        let properties = self.vcard_array.as_ref()?.get(1)?.as_array()?;
        properties.iter().find_map(|property| {
            let property = property.as_array()?;
            if property.first()?.as_str()? == "fn" {
                property.get(3)?.as_str()
            } else {
                None
            }
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Remark {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Vec<String>,
}

/// Name of the registrant of `network`.
///
/// The first entity whose primary role is `registrant` wins. Without a named
/// registrant the first line of the first remark is used, and failing that
/// the result is empty.
pub fn registrant(network: &Network) -> String {
    network
        .entities
        .iter()
        .find(|entity| entity.primary_role() == Some(REGISTRANT_ROLE))
        .and_then(Entity::display_name)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            network
                .remarks
                .first()
                .and_then(|remark| remark.description.first())
                .map(String::as_str)
        })
        .unwrap_or_default()
        .to_string()
}

/// A directory service answering IP network queries.
pub trait Directory: fmt::Debug {
    fn query_ip(&self, ip: IpAddr) -> Result<Network>;
}

/// Query `ip`, turning any error into [`Lookup::Failed`].
pub fn resolve_ownership(directory: &dyn Directory, ip: IpAddr) -> Lookup<String> {
    match directory.query_ip(ip) {
        Ok(network) => Lookup::Found(registrant(&network)),
        Err(err) => {
            debug!("{err}: {:?}", std::error::Error::source(&err));
            Lookup::Failed
        }
    }
}

/// IANA RDAP bootstrap registry (RFC 9224) for one address family.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub services: Vec<(Vec<String>, Vec<String>)>,
}

impl Bootstrap {
    /// Base URL of the service with the longest prefix covering `ip`,
    /// preferring an https URL among that service's entries.
    pub fn server_for(&self, ip: IpAddr) -> Option<&str> {
        let mut best: Option<(u8, &[String])> = None;
        for (prefixes, urls) in &self.services {
            for prefix in prefixes {
                if let Some(len) = prefix_len_if_contains(prefix, ip) {
                    if best.is_none_or(|(best_len, _)| len > best_len) {
                        best = Some((len, urls));
                    }
                }
            }
        }
        let (_, urls) = best?;
        urls.iter()
            .find(|url| url.starts_with("https://"))
            .or_else(|| urls.first())
            .map(String::as_str)
    }
}

/// Prefix length of `cidr` when it contains `ip`.
fn prefix_len_if_contains(cidr: &str, ip: IpAddr) -> Option<u8> {
    let (net, len) = cidr.split_once('/')?;
    let net: IpAddr = net.parse().ok()?;
    let len: u8 = len.parse().ok()?;
    let hit = match (net, ip) {
        (IpAddr::V4(net), IpAddr::V4(ip)) if len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0);
            u32::from(net) & mask == u32::from(ip) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) if len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
            u128::from(net) & mask == u128::from(ip) & mask
        }
        _ => false,
    };
    hit.then_some(len)
}

/// Blocking RDAP client.
///
/// Uses a fixed server when one is configured, otherwise discovers the
/// authoritative registry through the IANA bootstrap files, fetched at most
/// once per address family.
#[derive(Debug)]
pub struct RdapClient {
    http: Client,
    server: Option<String>,
    bootstrap: String,
    v4: OnceLock<Bootstrap>,
    v6: OnceLock<Bootstrap>,
}

impl RdapClient {
    pub fn new(server: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geotrace/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::HttpClient)?;
        if let Some(server) = &server {
            info!("using RDAP server {server}");
        }
        Ok(Self {
            http,
            server,
            bootstrap: IANA_BOOTSTRAP.to_string(),
            v4: OnceLock::new(),
            v6: OnceLock::new(),
        })
    }

    /// Read the bootstrap files from `base` instead of IANA.
    pub fn with_bootstrap(mut self, base: impl Into<String>) -> Self {
        self.bootstrap = base.into();
        self
    }

    /// Base URL to query for `ip`.
    pub fn base_url(&self, ip: IpAddr) -> String {
        if let Some(server) = &self.server {
            return server.clone();
        }
        let bootstrap = match ip {
            IpAddr::V4(_) => self.v4.get_or_init(|| self.fetch_bootstrap("ipv4.json")),
            IpAddr::V6(_) => self.v6.get_or_init(|| self.fetch_bootstrap("ipv6.json")),
        };
        bootstrap
            .server_for(ip)
            .unwrap_or(DEFAULT_REDIRECTOR)
            .to_string()
    }

    fn fetch_bootstrap(&self, file: &str) -> Bootstrap {
        let url = format!("{}/{file}", self.bootstrap.trim_end_matches('/'));
        let fetched = self
            .http
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Bootstrap>());
        match fetched {
            Ok(bootstrap) => {
                debug!("loaded {} RDAP services from {url}", bootstrap.services.len());
                bootstrap
            }
            Err(err) => {
                warn!("RDAP bootstrap unavailable ({err}), falling back to {DEFAULT_REDIRECTOR}");
                Bootstrap::default()
            }
        }
    }
}

impl Directory for RdapClient {
    fn query_ip(&self, ip: IpAddr) -> Result<Network> {
        let url = format!("{}/ip/{ip}", self.base_url(ip).trim_end_matches('/'));
        debug!("GET {url}");
        self.http
            .get(&url)
            .header(ACCEPT, RDAP_ACCEPT)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Network>())
            .map_err(|source| Error::Rdap { ip, source })
    }
}
