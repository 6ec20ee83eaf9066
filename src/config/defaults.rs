use super::Config;

/// Configuration written on first run.
///
/// The backend section starts blank. Previews of `http(s)` locations and
/// local files work without it; storage object paths need it filled in.
pub fn defaults() -> Config {
    Config::default()
}
