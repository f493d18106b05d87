use std::path::PathBuf;

use sevlog::{LogEngine, Severity};
use sevlog_core::{RotatingFile, SizeRotationConfig, backup_path};

fn main() {
    let dir = PathBuf::from("/tmp/sevlog_example_rotation");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("proxy.log");

    let engine = LogEngine::new();
    engine.set_level(Severity::Info);
    engine.set_writer(
        RotatingFile::new(SizeRotationConfig {
            path: path.clone(),
            max_file_size: 4096,
            max_backups: 3,
        })
        .unwrap(),
    );

    for i in 0..200 {
        engine.info(&format!("proxy {i}"), format!("Log message number {i}"));
    }
    engine.flush();

    println!("\n--- Rotation Summary ---");
    println!("Log file: {}", path.display());
    for index in 1..=4 {
        let backup = backup_path(&path, index);
        println!("  {} exists: {}", backup.display(), backup.exists());
    }
    assert!(!backup_path(&path, 4).exists(), "max_backups should keep at most 3");

    println!("\n--- Last {} recorded messages ---", engine.entries().len());
    println!("{}", engine.history());
}
