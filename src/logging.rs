use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Route `log` records to the watcher log file as `timestamp [LEVEL] message`.
///
/// Falls back to stderr when the file cannot be opened. `RUST_LOG` still
/// overrides the default `info` level.
pub fn init(log_file: &Path) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("Unable to open log file {}: {} - logging to stderr", log_file.display(), e);
        }
    }

    builder.init();
}
