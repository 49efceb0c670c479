use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use log::{debug, info};
use maxminddb::{geoip2, Mmap, Reader};

use crate::annotate::Lookup;
use crate::error::{Error, Result};

// Database names, most specific first
const CITY_DB_FILENAMES: &[&str] = &["GeoIP2-City.mmdb", "GeoLite2-City.mmdb"];

/// Language used for place names unless configured otherwise.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Place names for an address: country, first subdivision, city.
///
/// Only names present in the requested language are kept, so the list holds
/// between zero and three entries and always keeps that order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeoInfo {
    names: Vec<String>,
}

impl GeoInfo {
    pub fn from_parts(country: Option<&str>, subdivision: Option<&str>, city: Option<&str>) -> Self {
        let names = [country, subdivision, city]
            .into_iter()
            .flatten()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names joined with `,`, as shown inside the geo bracket.
    pub fn joined(&self) -> String {
        self.names.join(",")
    }
}

/// Source of geolocation data.
pub trait GeoLookup: fmt::Debug {
    fn locate(&self, ip: IpAddr) -> Result<GeoInfo>;
}

/// Look up `ip`, turning any error into [`Lookup::Failed`].
pub fn resolve_geo(geo: &dyn GeoLookup, ip: IpAddr) -> Lookup<GeoInfo> {
    match geo.locate(ip) {
        Ok(info) => Lookup::Found(info),
        Err(err) => {
            debug!("{err}: {:?}", std::error::Error::source(&err));
            Lookup::Failed
        }
    }
}

/// MaxMind City database reader.
pub struct MaxMindCity {
    reader: Reader<Mmap>,
    path: PathBuf,
    language: String,
}

impl fmt::Debug for MaxMindCity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindCity")
            .field("path", &self.path)
            .field("language", &self.language)
            .finish()
    }
}

impl MaxMindCity {
    /// Open the City database found in `dir`, or in the first standard
    /// GeoIP directory that exists when `dir` is `None`.
    pub fn open(dir: Option<&Path>, language: &str) -> Result<Self> {
        let dir = dir.map_or_else(default_path, Path::to_path_buf);
        let path = CITY_DB_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| Error::DatabaseNotFound {
                path: dir.clone(),
                candidates: CITY_DB_FILENAMES.join(", "),
            })?;
        Self::open_file(&path, language)
    }

    /// Open a specific database file.
    pub fn open_file(path: &Path, language: &str) -> Result<Self> {
        let reader = Reader::open_mmap(path).map_err(|source| Error::DatabaseOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!("using geolocation database {}", path.display());
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            language: language.to_string(),
        })
    }
}

impl GeoLookup for MaxMindCity {
    fn locate(&self, ip: IpAddr) -> Result<GeoInfo> {
        let record = self
            .reader
            .lookup::<geoip2::City>(ip)
            .map_err(|source| Error::LookupFailed { ip, source })?;

        let lang = self.language.as_str();
        let country = record
            .country
            .as_ref()
            .and_then(|c| pick(c.names.as_ref(), lang));
        let subdivision = record
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .and_then(|s| pick(s.names.as_ref(), lang));
        let city = record
            .city
            .as_ref()
            .and_then(|c| pick(c.names.as_ref(), lang));

        Ok(GeoInfo::from_parts(country, subdivision, city))
    }
}

/// Select the name for `lang` from a database names map.
#[inline]
fn pick<'a>(names: Option<&BTreeMap<&'a str, &'a str>>, lang: &str) -> Option<&'a str> {
    names?.get(lang).copied()
}

/// First standard GeoIP directory that exists on this system.
pub fn default_path() -> PathBuf {
    let paths = [
        "/usr/share/GeoIP",
        "/opt/homebrew/var/GeoIP",
        "/var/lib/GeoIP",
    ];

    paths
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(paths[0]))
}
