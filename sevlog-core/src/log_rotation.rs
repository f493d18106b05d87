use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    config::SEVLOG_CONFIG,
    log_writer::{LogWriter, Record},
};

#[cfg(not(test))]
mod limits {
    pub const MIN_FILE_SIZE: u64 = 4_096;
}


/// Configuration for size-based log file rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeRotationConfig {
    pub path: PathBuf,
    pub max_file_size: u64,
    pub max_backups: u32,
}

impl SizeRotationConfig {
    /// Rotation limits taken from the process configuration (5 MiB, 5 backups by default).
    pub fn with_defaults<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_file_size: SEVLOG_CONFIG.ROTATE_MAX_BYTES,
            max_backups: SEVLOG_CONFIG.ROTATE_BACKUPS,
        }
    }
}

/// A log file that rolls over once it would reach `max_file_size`.
///
/// The live file keeps its name; older content moves to `<path>.1`, `<path>.2`
/// and so on up to `<path>.<max_backups>`, beyond which it is deleted.
pub struct RotatingFile {
    path: PathBuf,
    max_file_size: u64,
    max_backups: u32,
    current_file: BufWriter<File>,
    current_size: u64,
}

impl RotatingFile {
    pub fn new(config: SizeRotationConfig) -> Result<Self, io::Error> {
        if config.max_file_size < limits::MIN_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "max_file_size must be at least {} bytes",
                    limits::MIN_FILE_SIZE
                ),
            ));
        }
        if config.max_backups < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_backups must be at least 1",
            ));
        }
        let (file, size) = open_append(&config.path)?;
        Ok(Self {
            path: config.path,
            max_file_size: config.max_file_size,
            max_backups: config.max_backups,
            current_file: file,
            current_size: size,
        })
    }

    fn should_rotate(&self, incoming: u64) -> bool {
        // an oversized line still lands in a fresh file instead of rotating forever
        self.current_size > 0 && self.current_size + incoming >= self.max_file_size
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.current_file.flush()?;
        for index in (1..self.max_backups).rev() {
            let from = backup_path(&self.path, index);
            if from.exists() {
                let to = backup_path(&self.path, index + 1);
                remove_if_exists(&to)?;
                fs::rename(&from, &to)?;
            }
        }
        let first = backup_path(&self.path, 1);
        remove_if_exists(&first)?;
        if self.path.exists() {
            fs::rename(&self.path, &first)?;
        }
        let (file, size) = open_append(&self.path)?;
        self.current_file = file;
        self.current_size = size;
        Ok(())
    }
}

impl LogWriter for RotatingFile {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        let line = record.formatted();
        let incoming = line.len() as u64 + 1;
        if self.should_rotate(incoming) {
            self.rotate()?;
        }
        writeln!(self.current_file, "{line}")?;
        self.current_file.flush()?;
        self.current_size += incoming;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current_file.flush()
    }
}

/// `<path>.<index>`, keeping any extension the live file already has.
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn open_append(path: &Path) -> Result<(BufWriter<File>, u64), io::Error> {
    let file = File::options().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((BufWriter::new(file), size))
}
