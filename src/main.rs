use anyhow::{Context, Error, Result};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::time::Duration;
use termcolor::{BufferedStandardStream, ColorChoice};

use geotrace::{geoip, input, logger, traceroute, Directory, GeoLookup};
use geotrace::{Enricher, MaxMindCity, MissingGroup, RdapClient};
use input::FileOrStdin;
use traceroute::{TraceOptions, Traceroute};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

/// traceroute with the registrant and location of every hop
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Set initial hop distance, i.e., time-to-live
    #[clap(short = 'f', long, default_value_t = 1)]
    first_hop: u8,

    /// Set maximal hop count
    #[clap(short = 'm', long, default_value_t = 64)]
    max_hop: u8,

    /// Use destination PORT port
    #[clap(short, long, default_value_t = 33434)]
    port: u16,

    /// Set type of service (TOS) to NUM
    #[clap(short, long, value_name = "NUM", default_value_t = 0)]
    tos: u8,

    /// Wait seconds for response
    #[clap(short, long, value_name = "SECONDS", default_value_t = 3)]
    wait: u32,

    /// Use ICMP ECHO as probe, otherwise use UDP datagrams
    #[clap(short = 'I', long)]
    icmp: bool,

    /// traceroute executable to run
    #[clap(long, value_name = "PATH", default_value = "traceroute")]
    program: String,

    /// Annotate a saved traceroute output instead of running traceroute.
    /// Use "-" to read from stdin
    #[clap(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    replay: Option<Utf8PathBuf>,

    /// Specify directory containing the GeoLite2/GeoIP2 City database
    #[clap(
        short = 'D',
        long,
        value_name = "DIR",
        value_hint = clap::ValueHint::DirPath,
        env = "GEOIP_MMDB_DIR"
    )]
    mmdb_dir: Option<Utf8PathBuf>,

    /// Language of place names
    #[clap(long, value_name = "CODE", default_value = geoip::DEFAULT_LANGUAGE)]
    lang: String,

    /// Query this RDAP server instead of discovering one through IANA bootstrap
    #[clap(long, value_name = "URL", env = "GEOTRACE_RDAP_SERVER")]
    rdap_server: Option<String>,

    /// Timeout for each RDAP request, in seconds
    #[clap(long, value_name = "SECONDS", default_value_t = 10)]
    rdap_timeout: u64,

    /// Skip registrant and geolocation lookups
    #[clap(long)]
    offline: bool,

    /// Leave out the registrant group when its lookup fails instead of showing []
    #[clap(long)]
    omit_failed_lookups: bool,

    /// Use markers to highlight the annotations
    #[clap(short = 'C', long, value_enum, default_value_t = ArgsColorChoice::Auto)]
    color: ArgsColorChoice,

    /// Minimum level of diagnostics written to stderr
    #[clap(long, value_name = "LEVEL", default_value_t = LevelFilter::Warn)]
    log_level: LevelFilter,

    /// Host to trace
    #[clap(required_unless_present = "replay")]
    destination: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsColorChoice {
    Always,
    Never,
    Auto,
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    // Handle broken pipe errors gracefully
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(&mut std::io::stderr(), "{:?}", err);
    } else {
        let _ = writeln!(&mut std::io::stderr(), "geotrace: {:#}", err);
    }

    ExitCode::FAILURE
}

fn run_main() -> Result<ExitCode> {
    let args = Args::parse();

    logger::init_logger(args.log_level).context("failed to initialize logging")?;

    // auto colors only when stdout is a tty
    let colormode = match args.color {
        ArgsColorChoice::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        ArgsColorChoice::Always => ColorChoice::Always,
        ArgsColorChoice::Never => ColorChoice::Never,
    };

    let enricher = build_enricher(&args)?;
    let mut out = BufferedStandardStream::stdout(colormode);

    match &args.replay {
        Some(path) => {
            let source = FileOrStdin::from_path(path.clone());
            info!("replaying {source}");
            enricher.run(source.reader()?, &mut out)?;
        }
        None => trace(&args, &enricher, &mut out)?,
    }

    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Open the lookup services once for the whole run.
fn build_enricher(args: &Args) -> Result<Enricher> {
    let policy = if args.omit_failed_lookups {
        MissingGroup::Omit
    } else {
        MissingGroup::Empty
    };

    if args.offline {
        info!("offline: registrant and geolocation lookups disabled");
        return Ok(Enricher::new(None, None, policy));
    }

    let geo = MaxMindCity::open(
        args.mmdb_dir.as_ref().map(|dir| dir.as_std_path()),
        &args.lang,
    )
    .context("failed to open geolocation database (set GEOIP_MMDB_DIR or use --offline)")?;

    let rdap = RdapClient::new(
        args.rdap_server.clone(),
        Duration::from_secs(args.rdap_timeout),
    )?;

    let directory: Box<dyn Directory> = Box::new(rdap);
    let geo: Box<dyn GeoLookup> = Box::new(geo);
    Ok(Enricher::new(Some(directory), Some(geo), policy))
}

/// Run traceroute and annotate its hops as they arrive.
fn trace(args: &Args, enricher: &Enricher, out: &mut BufferedStandardStream) -> Result<()> {
    let destination = args
        .destination
        .clone()
        .context("a destination host is required")?;

    let options = TraceOptions {
        program: args.program.clone(),
        first_hop: args.first_hop,
        max_hop: args.max_hop,
        port: args.port,
        tos: args.tos,
        wait: args.wait,
        icmp: args.icmp,
        as_lookups: traceroute::supports_as_lookups(&args.program),
        destination,
    };

    let mut child = Traceroute::spawn(&options)?;
    let stdout = child
        .stdout()
        .context("traceroute stdout was not captured")?;
    enricher.run(stdout, out)?;
    child.finish()?;
    Ok(())
}
