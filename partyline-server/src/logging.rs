use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter};

/// Sets up the global logger. Workspace crates log at `info`, or `debug`
/// when PARTYLINE_LOG_VERBOSE is set. Dependencies only get warnings and
/// errors through.
pub fn init_logger() {
    let local_level = if std::env::var("PARTYLINE_LOG_VERBOSE").is_ok() {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            let time = chrono::Local::now().format("%H:%M:%S");

            out.finish(format_args!(
                "{} {} {:>6} {}",
                time.to_string().bright_black(),
                level_tag(record.level()),
                origin_tag(record.target()),
                message
            ))
        })
        .filter(move |meta| {
            if is_local(meta.target()) {
                meta.level() <= local_level
            } else {
                meta.level() <= LevelFilter::Warn
            }
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

fn crate_name(target: &str) -> &str {
    target.split("::").next().unwrap_or(target)
}

fn is_local(target: &str) -> bool {
    matches!(crate_name(target), "partyline_server" | "partyline_collab")
}

fn origin_tag(target: &str) -> ColoredString {
    match crate_name(target) {
        "partyline_server" => "server".bright_green(),
        "partyline_collab" => "collab".bright_magenta(),
        other => other.clear(),
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => " warn".yellow().bold(),
        Level::Info => " info".cyan(),
        Level::Debug => "debug".bright_black(),
        Level::Trace => "trace".normal(),
    }
}
