// main.rs — the `cubebake` command line tool
//
// Startup:
//   1. Parse the command line, install the logger
//   2. Register cvars and commands, exec cubebake.cfg
//   3. Load --map, then run the trailing +commands in order

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cubebake_common::cmd::CmdContext;
use cubebake_common::common::{init_logging, print_banner};
use cubebake_common::files::FsContext;
use cubebake_engine::{BuiltinToolchain, DllToolchain, EngineHost, ToolchainProvider};
use cubebake_sys::console::{register_commands, BakeTool};

#[derive(Parser, Debug)]
#[command(name = "cubebake", version, about = "Bake cubemap samples into a Source BSP")]
struct Args {
    /// Game directory holding maps/, materials/ and materialsrc/
    #[arg(long, default_value = ".")]
    game: PathBuf,

    /// Extra read-only directories searched after the game directory
    #[arg(long = "search-path")]
    search_paths: Vec<PathBuf>,

    /// Map to load before running commands (maps/<name>.bsp)
    #[arg(long)]
    map: Option<String>,

    #[arg(long, default_value_t = 1024)]
    width: usize,

    #[arg(long, default_value_t = 768)]
    height: usize,

    /// Texture compiler library exporting VTex_CompileCubemap
    #[arg(long)]
    compiler_dll: Option<PathBuf>,

    /// Linear sky radiance
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"])]
    sky: Option<Vec<f32>>,

    /// Debug output
    #[arg(long)]
    developer: bool,

    /// Console commands, each introduced by `+` (e.g. `+buildcubemaps 2`)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    commands: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.developer);
    print_banner();

    let mut fs = FsContext::new(args.game.clone());
    for dir in &args.search_paths {
        fs.add_search_path(dir.clone());
    }
    let toolchain: Box<dyn ToolchainProvider> = match &args.compiler_dll {
        Some(path) => Box::new(DllToolchain::new(path.clone())),
        None => Box::new(BuiltinToolchain),
    };

    let mut tool = BakeTool::new(fs, args.width, args.height, toolchain);
    if let Some(&[r, g, b]) = args.sky.as_deref() {
        tool.host.set_sky_radiance([r, g, b]);
    }
    if args.developer {
        tool.cvars.set("developer", "1");
    }

    let mut cmd = CmdContext::new();
    register_commands(&mut cmd, &tool);

    if let Some(text) = tool.host.fs().exec_autoexec() {
        cmd.cbuf_add_text(&text);
        cmd.cbuf_execute(&mut tool);
    }
    tool.apply_developer();

    if let Some(map) = &args.map {
        if let Err(e) = tool.host.load_map(map) {
            log::error!("can't load map {}: {}", map, e);
            return ExitCode::FAILURE;
        }
    }

    if !cmd.cbuf_add_late_commands(&args.commands) {
        log::info!("nothing to do (try +buildcubemaps)");
        return ExitCode::SUCCESS;
    }
    cmd.cbuf_execute(&mut tool);
    ExitCode::SUCCESS
}
