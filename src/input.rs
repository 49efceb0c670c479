use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};

/// A replay source that can be either a saved trace file or stdin.
#[derive(Default, Clone, Debug)]
pub enum FileOrStdin {
    /// Input from a file.
    File(Utf8PathBuf),
    /// Input from stdin.
    #[default]
    Stdin,
}

impl fmt::Display for FileOrStdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOrStdin::File(path) => write!(f, "{}", path),
            FileOrStdin::Stdin => write!(f, "<stdin>"),
        }
    }
}

impl FileOrStdin {
    /// Create a new FileOrStdin from a path.
    ///
    /// If the path is "-", stdin is used.
    pub fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == "-" {
            FileOrStdin::Stdin
        } else {
            FileOrStdin::File(path)
        }
    }

    /// Open the input source as an unbuffered reader; the pipeline does its
    /// own line buffering.
    pub fn reader(&self) -> Result<Box<dyn Read>> {
        match self {
            FileOrStdin::File(path) => {
                let file =
                    File::open(path).with_context(|| format!("failed to open file: {}", path))?;
                Ok(Box::new(file))
            }
            FileOrStdin::Stdin => Ok(Box::new(io::stdin())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdin() {
        assert!(matches!(
            FileOrStdin::from_path("-".into()),
            FileOrStdin::Stdin
        ));
        let file = FileOrStdin::from_path("trace.txt".into());
        assert_eq!(file.to_string(), "trace.txt");
        assert_eq!(FileOrStdin::Stdin.to_string(), "<stdin>");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = FileOrStdin::from_path("/nonexistent/trace.txt".into())
            .reader()
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/trace.txt"));
    }
}
