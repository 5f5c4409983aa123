//! Logging backend which writes to a file from a background thread.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{mpsc, Mutex},
};

struct Message {
    module: String,
    level: Level,
    string: String,
    time: String,
}

impl Message {
    fn format(&self) -> String {
        let level_name = match self.level {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };

        //      [date time] [module] [level] Text
        format!(
            "[{}] [{}] [{}] {}\n",
            self.time, self.module, level_name, self.string
        )
    }
}

pub struct Logger;

impl Logger {
    fn commit(&self, record: &Record) {
        let message = Message {
            module: record
                .module_path()
                .and_then(|path| path.split("::").last())
                .unwrap_or("unknown")
                .to_string(),
            level: record.level(),
            string: format!("{}", record.args()),
            time: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        };

        if let Some(sender) = MSG_SENDER.get() {
            let sender = sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

            // The receiver only goes away if the writer thread died, and then there is nowhere
            // left to report the failure.
            let _ = sender.send(message);
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.commit(record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;
static MSG_SENDER: OnceCell<Mutex<mpsc::Sender<Message>>> = OnceCell::new();
static PANIC_PATH: OnceCell<PathBuf> = OnceCell::new();

fn panic_hook(info: &std::panic::PanicHookInfo) {
    let message = info
        .payload()
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "no message".to_string());

    let location = info
        .location()
        .map(|location| format!("{}:{}", location.file(), location.line()))
        .unwrap_or_else(|| "unknown".to_string());

    let time = Local::now();
    let backtrace = std::backtrace::Backtrace::force_capture();

    let info_dump = format!(
        "CSV Name Bank crashed.

Message: {message}
Location: {location}
Time: {time}
Backtrace: see below

{backtrace}"
    );

    log::error!("{info_dump}");

    if let Some(path) = PANIC_PATH.get() {
        let _ = std::fs::write(path, &info_dump);
    }

    // Unwinding into the game's frames is undefined, so stop here.
    std::process::abort();
}

fn install_panic_hook(panic_path: PathBuf) {
    let _ = PANIC_PATH.set(panic_path);
    std::panic::set_hook(Box::new(panic_hook));
}

/// Starts logging to `log_path`. Panics are written to `panic_path` before the process aborts.
pub fn init(log_path: &Path, panic_path: PathBuf, level: LevelFilter) -> eyre::Result<()> {
    let mut file = File::create(log_path)?;

    let (sender, receiver) = mpsc::channel::<Message>();

    MSG_SENDER
        .set(Mutex::new(sender))
        .map_err(|_| eyre::eyre!("logging has already been initialised"))?;

    log::set_logger(&LOGGER).map_err(|err| eyre::eyre!("unable to set logger: {}", err))?;
    log::set_max_level(level);

    install_panic_hook(panic_path);

    // Writing happens on a background thread so that game code never waits on the disk.
    std::thread::Builder::new()
        .name("csv-name-bank-log".to_string())
        .spawn(move || {
            for message in receiver {
                let _ = file.write_all(message.format().as_bytes());
                let _ = file.flush();
            }
        })?;

    Ok(())
}

/// Returns `true` once [`init`] has succeeded.
pub fn is_running() -> bool {
    MSG_SENDER.get().is_some()
}

/// Reports an error that stopped the mod from starting. If logging never started, the error is
/// written to `fallback_path` instead, or to stderr if that fails too.
pub fn report_startup_failure(err: &eyre::Report, fallback_path: &Path) {
    let message = format!("CSV Name Bank failed to start, the game's names will be used: {:?}", err);

    if is_running() {
        log::error!("{}", message);
        return;
    }

    if let Err(write_err) = std::fs::write(fallback_path, &message) {
        eprintln!("{}\n(unable to write {:?}: {})", message, fallback_path, write_err);
    }
}
