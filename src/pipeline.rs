//! Per-line enrichment: parse, classify, resolve, format, emit.

use std::io::{self, Read};

use bstr::ByteSlice;
use log::debug;
use ripline::{
    line_buffer::{LineBufferBuilder, LineBufferReader},
    lines::LineIter,
};
use termcolor::WriteColor;

use crate::annotate::{AnnotatedLine, Annotation, Lookup, MissingGroup};
use crate::classify::{classify, AddressClass};
use crate::geoip::{resolve_geo, GeoLookup};
use crate::hop::{parse_line, HopLine};
use crate::rdap::{resolve_ownership, Directory};

/// Lookup services shared by every hop of a run.
///
/// Either resolver may be absent (offline mode), in which case its lookups
/// count as failed.
#[derive(Debug, Default)]
pub struct Enricher {
    directory: Option<Box<dyn Directory>>,
    geo: Option<Box<dyn GeoLookup>>,
    policy: MissingGroup,
}

impl Enricher {
    pub fn new(
        directory: Option<Box<dyn Directory>>,
        geo: Option<Box<dyn GeoLookup>>,
        policy: MissingGroup,
    ) -> Self {
        Self {
            directory,
            geo,
            policy,
        }
    }

    /// Work out the annotation for one trimmed hop line.
    pub fn annotate(&self, line: &str) -> Annotation {
        let candidate = match parse_line(line) {
            HopLine::Hop { addr } => addr,
            HopLine::Passthrough => return Annotation::None,
            HopLine::Unparseable => {
                debug!("too few fields, passing through: {line:?}");
                return Annotation::None;
            }
        };

        match classify(candidate) {
            None => {
                debug!("not an IP address, passing through: {candidate:?}");
                Annotation::None
            }
            Some((_, AddressClass::Private)) => Annotation::Private,
            Some((ip, AddressClass::Public)) => {
                let ownership = match &self.directory {
                    Some(directory) => resolve_ownership(directory.as_ref(), ip),
                    None => Lookup::Failed,
                };
                let geo = match &self.geo {
                    Some(geo) => resolve_geo(geo.as_ref(), ip),
                    None => Lookup::Failed,
                };
                Annotation::Public { ownership, geo }
            }
        }
    }

    /// Enrich a single raw line and return the text to print.
    pub fn enrich_line(&self, raw: &str) -> String {
        let line = raw.trim();
        let annotation = self.annotate(line);
        AnnotatedLine::new(line, &annotation, self.policy).to_string()
    }

    /// Enrich every line of `input`, writing each result to `out` as soon as
    /// it is ready.
    pub fn run<R, W>(&self, input: R, out: &mut W) -> io::Result<()>
    where
        R: Read,
        W: WriteColor + ?Sized,
    {
        let mut line_buffer = LineBufferBuilder::new().capacity(8192).build();
        let mut lb_reader = LineBufferReader::new(input, &mut line_buffer);

        while lb_reader.fill()? {
            let buffer = lb_reader.buffer();
            for raw in LineIter::new(b'\n', buffer) {
                let text = raw.to_str_lossy();
                let line = text.trim();
                let annotation = self.annotate(line);
                AnnotatedLine::new(line, &annotation, self.policy).write_to(out)?;
                out.flush()?;
            }
            lb_reader.consume_all();
        }
        Ok(())
    }
}
