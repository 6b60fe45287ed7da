//! `log` facade wired to `env_logger`.
//!
//! `RUST_LOG` takes precedence when set. Otherwise the level comes from the
//! command line: `--quiet` shows errors only, the default shows warnings, and
//! each `-v` raises it one step (info, debug, trace).

use std::env;
use std::io::Write;
use env_logger::Builder;
use log::LevelFilter;

/// Initialize logging. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(|buf, record| {
        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{level_style}{:<5}{level_style:#} {}",
            record.level(),
            record.args()
        )
    });

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
