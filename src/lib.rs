//! The geotrace library: traceroute hop lines decorated with the registrant
//! of each hop's address block and its geolocation.
//!
//! Each hop line is handled on its own:
//!
//! 1. [`hop::parse_line`] picks the address candidate out of the line,
//! 2. [`classify::classify`] parses it and separates private from public,
//! 3. public hops are looked up through a [`rdap::Directory`] and a
//!    [`geoip::GeoLookup`],
//! 4. [`annotate::AnnotatedLine`] renders the result.
//!
//! [`pipeline::Enricher`] ties the steps together.
//!
//! # Examples
//!
//! ```rust
//! use geotrace::{Enricher, MissingGroup};
//!
//! // no resolvers configured: public hops get empty brackets
//! let enricher = Enricher::new(None, None, MissingGroup::Empty);
//! assert_eq!(
//!     enricher.enrich_line("1  router.local (192.168.1.5)  0.512 ms"),
//!     "1  router.local (192.168.1.5)  0.512 ms, private"
//! );
//! assert_eq!(enricher.enrich_line("2  *"), "2  *");
//! assert_eq!(enricher.enrich_line("3  8.8.8.8  9.1 ms"), "3  8.8.8.8  9.1 ms, [], []");
//! ```

pub mod annotate;
pub mod classify;
pub mod error;
pub mod geoip;
pub mod hop;
pub mod input;
pub mod logger;
pub mod pipeline;
pub mod rdap;
pub mod traceroute;

pub use crate::annotate::{AnnotatedLine, Annotation, Lookup, MissingGroup};
pub use crate::error::Error;
pub use crate::geoip::{GeoInfo, GeoLookup, MaxMindCity};
pub use crate::pipeline::Enricher;
pub use crate::rdap::{Directory, Network, RdapClient};
