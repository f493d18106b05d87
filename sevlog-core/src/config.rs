use std::sync::LazyLock;

use derive_from_env::FromEnv;

#[derive(FromEnv)]
#[from_env(prefix = "SEVLOG")]
#[allow(non_snake_case)]
pub struct SevLogConfig {
    #[from_env(default = "20")]
    pub HISTORY_SIZE: usize,
    #[from_env(default = "5242880")]
    pub ROTATE_MAX_BYTES: u64,
    #[from_env(default = "5")]
    pub ROTATE_BACKUPS: u32,
    #[from_env(default = "514")]
    pub SYSLOG_PORT: u16,
    #[from_env(default = "false")]
    pub COLOR: bool,
}

impl Default for SevLogConfig {
    fn default() -> Self {
        Self {
            HISTORY_SIZE: 20,
            ROTATE_MAX_BYTES: 5 * 1024 * 1024,
            ROTATE_BACKUPS: 5,
            SYSLOG_PORT: 514,
            COLOR: false,
        }
    }
}

/// Process configuration, read once from `SEVLOG_*` variables.
/// A malformed environment falls back to the defaults rather than aborting.
pub static SEVLOG_CONFIG: LazyLock<SevLogConfig> =
    LazyLock::new(|| SevLogConfig::from_env().unwrap_or_default());

#[test]
fn test_default_config_matches_documented_limits() {
    let config = SevLogConfig::default();
    assert_eq!(config.HISTORY_SIZE, 20);
    assert_eq!(config.ROTATE_MAX_BYTES, 5_242_880);
    assert_eq!(config.ROTATE_BACKUPS, 5);
    assert_eq!(config.SYSLOG_PORT, 514);
    assert!(!config.COLOR);
}
