// console.rs — the tool's console commands and the state they run against

use std::sync::Arc;

use parking_lot::RwLock;

use cubebake_common::cmd::{CmdArgs, CmdContext, CommandTarget};
use cubebake_common::common::set_developer;
use cubebake_common::cvar::CvarContext;
use cubebake_common::files::{FsContext, AUTOEXEC_CFG};
use cubebake_common::q_shared::parse_vec3;
use cubebake_engine::config::{register_cvars, DEVELOPER};
use cubebake_engine::envmap::take_envmap;
use cubebake_engine::lightprobe::take_light_probe;
use cubebake_engine::{bake_cubemaps, BakeContext, BspLevelHost, EngineHost, SharedScene, SoftRenderer, ToolchainProvider};

/// Everything a console command can touch.
pub struct BakeTool {
    pub cvars: CvarContext,
    pub host: BspLevelHost,
    pub renderer: SoftRenderer,
    pub toolchain: Box<dyn ToolchainProvider>,
}

impl BakeTool {
    /// A tool with registered cvars and no level; `width`×`height` is the
    /// renderer's screen.
    pub fn new(fs: FsContext, width: usize, height: usize, toolchain: Box<dyn ToolchainProvider>) -> Self {
        let scene: SharedScene = Arc::new(RwLock::new(None));
        let mut cvars = CvarContext::new();
        register_cvars(&mut cvars);
        Self {
            cvars,
            host: BspLevelHost::new(fs, scene.clone()),
            renderer: SoftRenderer::new(scene, width, height),
            toolchain,
        }
    }

    /// Follow the `developer` cvar.
    pub fn apply_developer(&self) {
        set_developer(self.cvars.variable_int(DEVELOPER) != 0);
    }
}

impl CommandTarget for BakeTool {
    fn cvars(&self) -> &CvarContext {
        &self.cvars
    }

    fn cvars_mut(&mut self) -> &mut CvarContext {
        &mut self.cvars
    }

    fn load_script(&self, name: &str) -> Option<String> {
        self.host.fs().load_text(name)
    }
}

pub fn register_commands(cmd: &mut CmdContext<BakeTool>, tool: &BakeTool) {
    cmd.cmd_add_command(tool, "map", "load maps/<name>.bsp", map_f);
    cmd.cmd_add_command(tool, "setpos", "move the view to x y z", setpos_f);
    cmd.cmd_add_command(tool, "buildcubemaps", "bake and pack every cubemap sample [bounces]", buildcubemaps_f);
    cmd.cmd_add_command(tool, "envmap", "bake one cubemap at the view origin", envmap_f);
    cmd.cmd_add_command(tool, "lightprobe", "bake a light probe at the view origin <name> [edge]", lightprobe_f);
    cmd.cmd_add_command(tool, "writeconfig", "write archived cvars [filename]", writeconfig_f);
}

fn map_f(tool: &mut BakeTool, args: &CmdArgs) {
    if args.argc() != 2 {
        log::info!("usage: map <mapname>");
        return;
    }
    if let Err(e) = tool.host.load_map(args.argv(1)) {
        log::error!("map {}: {}", args.argv(1), e);
    }
}

fn setpos_f(tool: &mut BakeTool, args: &CmdArgs) {
    match parse_vec3(args.args()) {
        Some(origin) => tool.host.set_view_origin(origin),
        None => log::info!("usage: setpos <x> <y> <z>"),
    }
}

/// `buildcubemaps [bounces]`
fn buildcubemaps_f(tool: &mut BakeTool, args: &CmdArgs) {
    let bounces = if args.argc() > 1 {
        match args.argv(1).parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                log::info!("usage: buildcubemaps [bounces]");
                return;
            }
        }
    } else {
        1
    };
    tool.apply_developer();

    let ctx = BakeContext {
        cvars: &mut tool.cvars,
        host: &mut tool.host,
        renderer: &mut tool.renderer,
        toolchain: tool.toolchain.as_ref(),
    };
    match bake_cubemaps(ctx, bounces) {
        Ok(report) => log::info!(
            "buildcubemaps: {} bounce(s), {} baked, {} skipped, default cubemap {}",
            report.bounces_completed,
            report.samples_baked,
            report.samples_skipped,
            if report.default_cubemap_packed { "packed" } else { "skipped" }
        ),
        Err(e) => log::error!("buildcubemaps: {}", e),
    }
}

fn envmap_f(tool: &mut BakeTool, _args: &CmdArgs) {
    tool.apply_developer();
    if let Err(e) = take_envmap(&tool.cvars, &tool.host, &mut tool.renderer, tool.toolchain.as_ref()) {
        log::error!("envmap: {}", e);
    }
}

/// `lightprobe <name> [edge]`
fn lightprobe_f(tool: &mut BakeTool, args: &CmdArgs) {
    if args.argc() < 2 || args.argc() > 3 {
        log::info!("usage: lightprobe <name> [edge]");
        return;
    }
    let edge = match args.argv(2) {
        "" => None,
        text => match text.parse::<usize>() {
            Ok(edge) => Some(edge),
            Err(_) => {
                log::info!("usage: lightprobe <name> [edge]");
                return;
            }
        },
    };
    tool.apply_developer();

    match take_light_probe(
        &tool.cvars,
        &tool.host,
        &mut tool.renderer,
        tool.toolchain.as_ref(),
        args.argv(1),
        edge,
    ) {
        Ok(probe) => log::info!(
            "lightprobe {}: {} visible light(s)",
            probe.name,
            probe.visible_lights.len()
        ),
        Err(e) => log::error!("lightprobe {}: {}", args.argv(1), e),
    }
}

fn writeconfig_f(tool: &mut BakeTool, args: &CmdArgs) {
    let name = match args.argv(1) {
        "" => AUTOEXEC_CFG.to_string(),
        name if name.ends_with(".cfg") => name.to_string(),
        name => format!("{}.cfg", name),
    };
    let mut text = Vec::new();
    if let Err(e) = tool.cvars.write_variables(&mut text) {
        log::error!("writeconfig: {}", e);
        return;
    }
    match tool.host.fs().write_file(&name, &text) {
        Ok(path) => log::info!("wrote {}", path.display()),
        Err(e) => log::error!("writeconfig {}: {}", name, e),
    }
}
