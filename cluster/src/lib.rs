//! Shared setup for the cluster binaries.

use std::fmt::Display;

/// Routes `log` output to stderr as `[tag][level][target] message`.
///
/// Verbosity counts `-v` flags: none shows warnings, then info, debug and
/// trace.
pub fn init_logging<T: Display>(tag: T, verbosity: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
    | 0 => log::LevelFilter::Warn,
    | 1 => log::LevelFilter::Info,
    | 2 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    let tag = tag.to_string();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                tag,
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}
