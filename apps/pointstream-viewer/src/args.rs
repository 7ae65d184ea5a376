//! Hand-rolled CLI parsing.

use std::path::PathBuf;

/// Parsed command line.
#[derive(Debug, Clone)]
pub struct Args {
    /// Source point cloud.
    pub ply_path: PathBuf,
    /// Block file directory; defaults to `<ply stem>_blocks`.
    pub out_dir: PathBuf,
    /// Orbital camera benchmark mode.
    pub test: bool,
    /// Out-of-core streaming; otherwise every block is loaded up front.
    pub ooc: bool,
    /// Enable the host-side subslot tier.
    pub cache: bool,
    /// Write each frame as a PNG into this directory.
    pub export: Option<PathBuf>,
    /// Trust an existing ingest manifest instead of re-partitioning.
    pub reuse: bool,
    /// Frames to render before exiting.
    pub frames: u32,
    /// Shader paths, accepted by suffix for GL-backed builds.
    pub shader_vert: Option<PathBuf>,
    pub shader_frag: Option<PathBuf>,
}

pub fn print_help() {
    eprintln!(
        "pointstream-viewer: out-of-core point cloud streaming benchmark

USAGE:
    pointstream-viewer <cloud.ply> [shaders...] [OPTIONS]

ARGS:
    <cloud.ply>        Source point cloud (binary_little_endian, xyz f64 + rgb u8)
    [*.vert, *.frag]   Shader paths, recognized by suffix (GL backends only)

OPTIONS:
    --test             Orbital camera benchmark (10 deg/s around the scene)
    --ooc              Stream blocks out-of-core instead of loading everything
    --cache            Keep demoted blocks in a host-side LRU tier (with --ooc)
    --export <DIR>     Write every frame as PNG into DIR
    --reuse            Reuse block files via the ingest manifest if it matches
    --out-dir <DIR>    Block file directory (default: <cloud stem>_blocks)
    --frames <N>       Frames to render before exiting (default: 300)
    -h, --help         Print this help

ENVIRONMENT VARIABLES:
    RUST_LOG           Log filter (e.g. info, pointstream_engine=debug)"
    );
}

/// Parse `argv[1..]`; returns a usage error string for the caller to print.
pub fn parse(mut argv: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut ply_path = None;
    let mut out_dir = None;
    let mut test = false;
    let mut ooc = false;
    let mut cache = false;
    let mut export = None;
    let mut reuse = false;
    let mut frames = 300u32;
    let mut shader_vert = None;
    let mut shader_frag = None;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--test" => test = true,
            "--ooc" => ooc = true,
            "--cache" => cache = true,
            "--reuse" => reuse = true,
            "--export" => {
                let dir = argv.next().ok_or("--export needs a directory")?;
                export = Some(PathBuf::from(dir));
            }
            "--out-dir" => {
                let dir = argv.next().ok_or("--out-dir needs a directory")?;
                out_dir = Some(PathBuf::from(dir));
            }
            "--frames" => {
                let n = argv.next().ok_or("--frames needs a count")?;
                frames = n.parse().map_err(|_| format!("bad frame count `{n}`"))?;
            }
            _ if arg.ends_with(".ply") => ply_path = Some(PathBuf::from(arg)),
            _ if arg.ends_with(".vert") => shader_vert = Some(PathBuf::from(arg)),
            _ if arg.ends_with(".frag") => shader_frag = Some(PathBuf::from(arg)),
            other => return Err(format!("unrecognized argument `{other}`")),
        }
    }

    let ply_path: PathBuf = ply_path.ok_or("no .ply path given")?;
    let out_dir = out_dir.unwrap_or_else(|| {
        let stem = ply_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cloud".to_owned());
        ply_path.with_file_name(format!("{stem}_blocks"))
    });

    Ok(Args {
        ply_path,
        out_dir,
        test,
        ooc,
        cache,
        export,
        reuse,
        frames,
        shader_vert,
        shader_frag,
    })
}
