//! Crate-wide constants.

/// Application name, used for data directories.
pub const APP_NAME: &str = "appstack";

/// Environment variable overriding the state root directory.
pub const HOME_ENV: &str = "APPSTACK_HOME";

/// Prefix of per-stack configuration files (`Appstack.<stack>.yaml`).
pub const CONFIG_FILE_PREFIX: &str = "Appstack";

/// Placeholder written in place of secret values in logs and stored inputs.
pub const REDACTED: &str = "[secret]";

/// Stack config key holding the key of the recorded input hashes.
pub const INPUT_SALT_KEY: &str = "encryptionsalt";
