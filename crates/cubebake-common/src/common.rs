// common.rs — process-wide helpers shared by the tools and the engine

/// Distribution name and version (log banner, VTF comments, etc.)
pub const DISTNAME: &str = "cubebake";
pub const DISTVER: &str = env!("CARGO_PKG_VERSION");

// ============================================================
// Logging
// ============================================================

/// Install the `env_logger` backend behind the `log` facade.
///
/// The level is `info`, or `debug` when `developer` is set, and can be raised
/// later with [`set_developer`]. `RUST_LOG` always wins. Calling this more
/// than once is harmless.
pub fn init_logging(developer: bool) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
    set_developer(developer);
}

/// Switch between `info` and `debug` output. No-op under `RUST_LOG`.
pub fn set_developer(developer: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    log::set_max_level(if developer { log::LevelFilter::Debug } else { log::LevelFilter::Info });
}

/// Print the startup banner.
pub fn print_banner() {
    log::info!("{} {}", DISTNAME, DISTVER);
}

// ============================================================
// Path helpers
// ============================================================

/// Strip the extension from a `/`-separated path ("maps/foo.bsp" -> "maps/foo").
pub fn com_strip_extension(path: &str) -> &str {
    let slash = path.rfind('/').map_or(0, |p| p + 1);
    match path[slash..].rfind('.') {
        Some(dot) => &path[..slash + dot],
        None => path,
    }
}

/// Return the file base name without directory or extension.
pub fn com_file_base(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    let start = path.rfind(['/', '\\']).map_or(0, |p| p + 1);
    com_strip_extension(&path[start..])
}
