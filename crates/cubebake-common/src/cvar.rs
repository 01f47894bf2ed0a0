// cvar.rs — console variables and the scoped save/restore guard used by bakes

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use bitflags::bitflags;

bitflags! {
    /// Console variable flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        /// Written to the config file by `writeconfig`.
        const ARCHIVE = 0x01;
        /// Only settable from the command line or by force.
        const NOSET = 0x02;
    }
}

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub default_string: String,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

/// The full cvar system context. Owned by the host and threaded explicitly
/// through everything that reads or mutates configuration.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a cvar by name, returning its index. O(1) via HashMap.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    /// Find a cvar by name.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the value truncated to an integer. Returns 0 if not found.
    pub fn variable_int(&self, name: &str) -> i32 {
        self.variable_value(name) as i32
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            default_string: value.to_string(),
            flags,
            modified: true,
            value: value.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };

        let var = &mut self.cvar_vars[idx];
        if !force && var.flags.contains(CvarFlags::NOSET) {
            log::warn!("{} is write protected.", name);
            return idx;
        }

        if var.string == value {
            return idx;
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = value.parse::<f32>().unwrap_or(0.0);
        idx
    }

    /// Set a cvar, respecting NOSET.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Set a cvar, ignoring NOSET.
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Handle a console line of the form `name [value]`.
    /// Returns false if `args[0]` is not a known variable.
    pub fn command(&mut self, args: &[String]) -> bool {
        let Some(name) = args.first() else {
            return false;
        };
        let Some(idx) = self.find_var_index(name) else {
            return false;
        };

        if args.len() == 1 {
            let var = &self.cvar_vars[idx];
            log::info!("\"{}\" is \"{}\" (default \"{}\")", var.name, var.string, var.default_string);
            return true;
        }

        self.set(name, &args[1]);
        true
    }

    /// Log every variable whose name starts with `prefix`.
    pub fn list(&self, prefix: &str) -> usize {
        let mut count = 0;
        for var in self.cvar_vars.iter().filter(|v| v.name.starts_with(prefix)) {
            let archive = if var.flags.contains(CvarFlags::ARCHIVE) { '*' } else { ' ' };
            let noset = if var.flags.contains(CvarFlags::NOSET) { '-' } else { ' ' };
            log::info!("{}{} {} \"{}\"", archive, noset, var.name, var.string);
            count += 1;
        }
        log::info!("{} cvars", count);
        count
    }

    /// Write all ARCHIVE variables as `set` lines.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in self.cvar_vars.iter().filter(|v| v.flags.contains(CvarFlags::ARCHIVE)) {
            writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
        }
        Ok(())
    }
}

// ============================================================
// Scoped save/restore
// ============================================================

/// Captures a fixed set of cvars and puts every one of them back when dropped.
///
/// The guard owns the mutable borrow of the context for its lifetime, so all
/// mutation during the guarded region goes through it (via `DerefMut`). Keys
/// that did not exist at capture time are reset to the default they were
/// created with.
pub struct SavedCvars<'a> {
    ctx: &'a mut CvarContext,
    saved: Vec<(String, Option<String>)>,
}

impl<'a> SavedCvars<'a> {
    pub fn capture(ctx: &'a mut CvarContext, names: &[&str]) -> Self {
        let saved = names
            .iter()
            .map(|&name| (name.to_string(), ctx.find_var(name).map(|v| v.string.clone())))
            .collect();
        Self { ctx, saved }
    }

    /// Names captured by this guard, in capture order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.saved.iter().map(|(name, _)| name.as_str())
    }

    fn restore(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(value) => {
                    self.ctx.force_set(name, value);
                }
                None => {
                    if let Some(idx) = self.ctx.find_var_index(name) {
                        let default = self.ctx.cvar_vars[idx].default_string.clone();
                        self.ctx.force_set(name, &default);
                    }
                }
            }
        }
    }
}

impl Deref for SavedCvars<'_> {
    type Target = CvarContext;

    fn deref(&self) -> &CvarContext {
        &*self.ctx
    }
}

impl DerefMut for SavedCvars<'_> {
    fn deref_mut(&mut self) -> &mut CvarContext {
        &mut *self.ctx
    }
}

impl Drop for SavedCvars<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "42", CvarFlags::empty());
        assert_eq!(ctx.variable_value("test_var"), 42.0);
        assert_eq!(ctx.variable_int("test_var"), 42);
        assert_eq!(ctx.variable_string("test_var"), "42");
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        ctx.get("test", "1", CvarFlags::empty());
        ctx.get("test", "2", CvarFlags::ARCHIVE);
        assert_eq!(ctx.variable_string("test"), "1");
        assert!(ctx.find_var("test").unwrap().flags.contains(CvarFlags::ARCHIVE));
    }

    #[test]
    fn test_cvar_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CvarFlags::NOSET);
        ctx.set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 10.0);
        ctx.force_set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert_eq!(ctx.variable_string("nonexistent"), "");
    }

    #[test]
    fn test_cvar_command() {
        let mut ctx = CvarContext::new();
        ctx.get("r_shadows", "1", CvarFlags::empty());
        assert!(ctx.command(&["r_shadows".to_string(), "0".to_string()]));
        assert_eq!(ctx.variable_int("r_shadows"), 0);
        assert!(ctx.command(&["r_shadows".to_string()]));
        assert!(!ctx.command(&["nope".to_string(), "1".to_string()]));
    }

    #[test]
    fn test_saved_cvars_restore_on_drop() {
        let mut ctx = CvarContext::new();
        ctx.get("r_shadows", "1", CvarFlags::empty());
        ctx.get("mat_fastspecular", "1", CvarFlags::empty());
        {
            let mut guard = SavedCvars::capture(&mut ctx, &["r_shadows", "mat_fastspecular"]);
            guard.set("r_shadows", "0");
            guard.set("mat_fastspecular", "0");
            assert_eq!(guard.variable_int("r_shadows"), 0);
        }
        assert_eq!(ctx.variable_int("r_shadows"), 1);
        assert_eq!(ctx.variable_int("mat_fastspecular"), 1);
    }

    #[test]
    fn test_saved_cvars_restore_through_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("locked", "5", CvarFlags::NOSET);
        {
            let mut guard = SavedCvars::capture(&mut ctx, &["locked"]);
            guard.force_set("locked", "6");
        }
        assert_eq!(ctx.variable_int("locked"), 5);
    }

    #[test]
    fn test_saved_cvars_restore_on_early_return() {
        fn mutate_then_fail(ctx: &mut CvarContext) -> Result<(), ()> {
            let mut guard = SavedCvars::capture(ctx, &["r_occlusion"]);
            guard.set("r_occlusion", "0");
            Err(())
        }

        let mut ctx = CvarContext::new();
        ctx.get("r_occlusion", "1", CvarFlags::empty());
        assert!(mutate_then_fail(&mut ctx).is_err());
        assert_eq!(ctx.variable_int("r_occlusion"), 1);
    }

    #[test]
    fn test_write_variables() {
        let mut ctx = CvarContext::new();
        ctx.get("archived_var", "hello", CvarFlags::ARCHIVE);
        ctx.get("normal_var", "world", CvarFlags::empty());
        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("set archived_var \"hello\""));
        assert!(!output.contains("normal_var"));
    }
}
