//! pointstream viewer: headless out-of-core point cloud streaming.
//!
//! ## Usage
//!
//! ```bash
//! pointstream-viewer cloud.ply --ooc --cache --test --frames 600
//! ```
//!
//! The positional `.ply` path is required; `.vert`/`.frag` paths are
//! accepted by suffix for GL-backed builds. `--ooc` streams blocks through
//! the slot table instead of loading the whole cloud, `--cache` adds the
//! host-side LRU tier, `--test` orbits the camera around the scene, and
//! `--export <dir>` writes every frame as a PNG.
//!
//! Logging is controlled through `RUST_LOG` (default `info`).

mod app;
mod args;
mod camera;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        args::print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let parsed = match args::parse(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {e}\n");
            args::print_help();
            std::process::exit(1);
        }
    };

    let mut viewer = app::Viewer::init(parsed)?;
    viewer.run()
}
