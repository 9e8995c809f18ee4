use log::{LevelFilter, Metadata, Record};
use owo_colors::OwoColorize;

pub fn init() {
    static LOGGER: Logger = Logger;
    let level = std::env::var("FDSH_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    log::set_max_level(level);

    debug!("Current log level: {}", log::max_level());
}

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            log::Level::Error => eprintln!(
                "{} {}@{}: {}",
                "[E]".red().bold(),
                record.file().unwrap_or("").bold(),
                record.line().unwrap_or(0),
                record.args()
            ),
            log::Level::Warn => {
                eprintln!("{} {}", "[!]".yellow().bold(), record.args().yellow())
            }
            log::Level::Info => println!("{} {}", "[+]".green().bold(), record.args().green()),
            log::Level::Debug => {
                eprintln!("{} {}", "[D]".blue().bold(), record.args().blue())
            }
            log::Level::Trace => {
                eprintln!("{} {}", "[T]".dimmed().bold(), record.args().dimmed())
            }
        }
    }

    fn flush(&self) {}
}
