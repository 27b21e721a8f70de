use crate::error::Error;
use chrono::Local;
use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::io::Write;

/// Installs the global logger. `RUST_LOG` overrides the default `info` filter.
///
/// Records look like
/// `2024-01-01 12:00:00.000 - msads_report_loader::runner - INFO - src/runner.rs:85 - ...`.
pub fn init(log_file: Option<&str>) -> Result<(), Error> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}:{} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.target(),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    if let Some(path) = log_file {
        builder.target(Target::Pipe(Box::new(File::create(path)?)));
    }

    builder.init();
    Ok(())
}
