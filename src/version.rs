// Version info baked in at build time

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name version`, as logged at startup.
pub fn banner() -> String {
    format!("{NAME} {VERSION}")
}
