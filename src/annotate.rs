//! Annotation data and its rendering.
//!
//! Resolvers produce structured [`Annotation`] values; [`AnnotatedLine`] is
//! the only place that turns them into text, which keeps the empty versus
//! omitted bracket rule in one spot.

use std::fmt;
use std::io;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::geoip::GeoInfo;

/// Outcome of a single external lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The query succeeded. The payload may still be empty.
    Found(T),
    /// The query itself failed.
    Failed,
}

impl<T> Lookup<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Failed => None,
        }
    }
}

/// How a failed ownership lookup is rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingGroup {
    /// Render it as `[]`, so public hops always carry two brackets.
    #[default]
    Empty,
    /// Drop the ownership group entirely.
    Omit,
}

/// Context gathered for one hop line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// Nothing to append; the line is emitted as is.
    None,
    Private,
    Public {
        ownership: Lookup<String>,
        geo: Lookup<GeoInfo>,
    },
}

/// A hop line together with its annotation, ready for output.
#[derive(Clone, Copy, Debug)]
pub struct AnnotatedLine<'a> {
    pub line: &'a str,
    pub annotation: &'a Annotation,
    pub policy: MissingGroup,
}

impl<'a> AnnotatedLine<'a> {
    pub fn new(line: &'a str, annotation: &'a Annotation, policy: MissingGroup) -> Self {
        Self {
            line,
            annotation,
            policy,
        }
    }

    /// The annotation groups, already joined, or `None` for passthrough lines.
    pub fn suffix(&self) -> Option<String> {
        match self.annotation {
            Annotation::None => None,
            Annotation::Private => Some("private".to_string()),
            Annotation::Public { ownership, geo } => {
                let mut groups = Vec::with_capacity(2);
                match (ownership, self.policy) {
                    (Lookup::Found(name), _) => groups.push(format!("[{name}]")),
                    (Lookup::Failed, MissingGroup::Empty) => groups.push("[]".to_string()),
                    (Lookup::Failed, MissingGroup::Omit) => {}
                }
                let places = geo.found().map(GeoInfo::joined).unwrap_or_default();
                groups.push(format!("[{places}]"));
                Some(groups.join(", "))
            }
        }
    }

    /// Write the line followed by a newline, coloring the annotation part.
    pub fn write_to<W: WriteColor + ?Sized>(&self, wtr: &mut W) -> io::Result<()> {
        wtr.write_all(self.line.as_bytes())?;
        if let Some(suffix) = self.suffix() {
            wtr.write_all(b", ")?;
            wtr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            wtr.write_all(suffix.as_bytes())?;
            wtr.reset()?;
        }
        wtr.write_all(b"\n")
    }
}

impl fmt::Display for AnnotatedLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix() {
            Some(suffix) => write!(f, "{}, {}", self.line, suffix),
            None => f.write_str(self.line),
        }
    }
}
