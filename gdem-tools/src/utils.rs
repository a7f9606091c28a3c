//! Helpers shared by the command line tools.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Resolve the output root: an explicit `--outdir` wins; otherwise
/// `<source>/../<basename>_tileset` is derived from the first source.
/// Deriving from a missing source exits with code 123.
pub fn resolve_out_dir(out_dir: Option<PathBuf>, sources: &[PathBuf]) -> PathBuf {
    if let Some(dir) = out_dir {
        return dir;
    }

    let first = &sources[0];
    let canonical = match first.canonicalize() {
        Ok(path) => path,
        Err(_) => {
            eprintln!("Error: source {} does not exist", first.display());
            std::process::exit(123);
        }
    };

    let name = match canonical.file_name() {
        Some(name) => format!("{}_tileset", name.to_string_lossy()),
        None => "gdem_tileset".to_string(),
    };
    match canonical.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Duplicates log output to stderr and the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialise the logger. With a log file, records are appended to it
/// as well as written to stderr. Respects `RUST_LOG`, defaulting to
/// `info`.
pub fn init_logging(log_file: Option<&Path>) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            Err(err) => eprintln!("cannot open {}: {}", path.display(), err),
        }
    }
    builder.init();
}
