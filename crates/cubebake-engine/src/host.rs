// host.rs — the engine services a bake needs besides rendering

use std::sync::Arc;

use cubebake_bsp::Level;
use cubebake_common::cvar::CvarContext;
use cubebake_common::files::FsContext;
use cubebake_common::q_shared::Vec3;
use cubebake_raytrace::RayTracingEnvironment;

use crate::BakeError;

pub trait EngineHost {
    /// The loaded level, if any.
    fn level(&self) -> Option<&Level>;

    /// Game-relative world model name, e.g. `maps/foo.bsp`.
    fn world_model_path(&self) -> Option<String> {
        self.level().map(|level| level.world_model_path.clone())
    }

    /// Where `envmap` and `lightprobe` bake.
    fn view_origin(&self) -> Vec3;

    fn fs(&self) -> &FsContext;

    /// Pick up material-related cvar changes.
    fn rebuild_material_system_config(&mut self, cvars: &CvarContext);

    /// `restart setpos`: reload the level from disk, keeping the view.
    fn restart_level(&mut self) -> Result<(), BakeError>;

    fn reload_materials(&mut self);

    /// CPU tracer over the level geometry, when the host has one.
    fn tracer(&self) -> Option<Arc<RayTracingEnvironment>> {
        None
    }
}
