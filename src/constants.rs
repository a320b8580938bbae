//! Shared constants used across the application.

/// User agent string used for archival HTTP requests and subprocess tools.
///
/// This is a realistic browser user agent so that archive services and origin
/// servers treat requests like normal browser traffic.
pub const ARCHIVAL_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Macro name that means "no macro expansion requested".
pub const AUTO_MACRO: &str = "auto";

/// Section name reserved by the macro file format. Never a user macro.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Suffix appended to the `--log` name to build the log file path.
pub const LOG_FILE_SUFFIX: &str = ".sak.log";

/// Default limit on the length of a derived filename.
pub const DEFAULT_FILENAME_CLIP: usize = 100;

/// Default limit on the length of the URL hash added by `--url-hash`.
pub const DEFAULT_HASH_CLIP: usize = 8;
