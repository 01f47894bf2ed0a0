// cmd.rs — console command buffer, tokenizer and command registry

use std::collections::HashMap;

use crate::cvar::CvarContext;

pub const MAX_STRING_TOKENS: usize = 80;

/// Maximum size of the pending command text.
pub const MAX_CMD_BUFFER: usize = 65536;

/// Everything a registered command can reach. Implemented by the tool that
/// owns the command buffer.
pub trait CommandTarget {
    fn cvars(&self) -> &CvarContext;
    fn cvars_mut(&mut self) -> &mut CvarContext;
    /// Load the text of a script for `exec`. Returns None if it does not exist.
    fn load_script(&self, name: &str) -> Option<String>;
}

/// A tokenized command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmdArgs {
    argv: Vec<String>,
    /// Everything after the first token, untokenized.
    args: String,
}

impl CmdArgs {
    /// Parse the given string into command line tokens. Quoted tokens may
    /// contain whitespace; `//` starts a comment that runs to end of line.
    pub fn tokenize(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut argv = Vec::new();
        let mut args = String::new();
        let mut pos = 0;

        loop {
            while pos < bytes.len() && bytes[pos] <= b' ' && bytes[pos] != b'\n' {
                pos += 1;
            }
            if pos >= bytes.len() || bytes[pos] == b'\n' {
                break;
            }
            if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'/') {
                break;
            }

            if argv.len() == 1 {
                let rest = String::from_utf8_lossy(&bytes[pos..]);
                args = rest.lines().next().unwrap_or("").trim_end().to_string();
            }

            let (token, new_pos) = com_parse_inline(bytes, pos);
            if new_pos == pos {
                break;
            }
            pos = new_pos;

            if argv.len() < MAX_STRING_TOKENS {
                argv.push(token);
            }
        }

        Self { argv, args }
    }

    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Returns "" for out-of-range indices.
    pub fn argv(&self, arg: usize) -> &str {
        self.argv.get(arg).map_or("", |s| s.as_str())
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn as_slice(&self) -> &[String] {
        &self.argv
    }
}

/// Handler for a registered command.
pub type CmdFn<T> = fn(&mut T, &CmdArgs);

/// A registered command.
pub struct CmdFunction<T> {
    pub name: String,
    pub description: &'static str,
    pub function: CmdFn<T>,
}

/// The command system: pending text plus the registry of commands that can
/// run against a `T`.
pub struct CmdContext<T> {
    cmd_text: String,
    cmd_wait: bool,
    cmd_functions: Vec<CmdFunction<T>>,
    /// O(1) command lookup by name (lowercase) -> index in cmd_functions
    cmd_functions_index: HashMap<String, usize>,
}

impl<T: CommandTarget> Default for CmdContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CommandTarget> CmdContext<T> {
    pub fn new() -> Self {
        Self {
            cmd_text: String::new(),
            cmd_wait: false,
            cmd_functions: Vec::new(),
            cmd_functions_index: HashMap::new(),
        }
    }

    // ========================================================
    // Command buffer operations
    // ========================================================

    /// Add command text at the end of the buffer.
    pub fn cbuf_add_text(&mut self, text: &str) {
        if self.cmd_text.len() + text.len() >= MAX_CMD_BUFFER {
            log::warn!("Cbuf_AddText: overflow");
            return;
        }
        self.cmd_text.push_str(text);
    }

    /// Insert command text immediately after the current command.
    pub fn cbuf_insert_text(&mut self, text: &str) {
        if self.cmd_text.len() + text.len() + 1 >= MAX_CMD_BUFFER {
            log::warn!("Cbuf_InsertText: overflow");
            return;
        }
        let mut inserted = text.to_string();
        if !inserted.ends_with('\n') {
            inserted.push('\n');
        }
        self.cmd_text.insert_str(0, &inserted);
    }

    /// Pending, unexecuted text.
    pub fn pending_text(&self) -> &str {
        &self.cmd_text
    }

    /// Adds command line parameters as script statements.
    /// Commands lead with a + and continue until the next +.
    /// Returns true if any commands were added.
    pub fn cbuf_add_late_commands(&mut self, args: &[String]) -> bool {
        let mut build = String::new();
        let mut current: Option<Vec<&str>> = None;

        for arg in args {
            if let Some(cmd) = arg.strip_prefix('+') {
                if let Some(words) = current.take() {
                    push_command_line(&mut build, &words);
                }
                current = Some(vec![cmd]);
            } else if let Some(words) = current.as_mut() {
                words.push(arg);
            }
        }
        if let Some(words) = current {
            push_command_line(&mut build, &words);
        }

        if build.is_empty() {
            return false;
        }
        self.cbuf_add_text(&build);
        true
    }

    /// Execute all commands in the buffer.
    pub fn cbuf_execute(&mut self, target: &mut T) {
        while !self.cmd_text.is_empty() {
            // Find a \n or ; line break outside quotes
            let bytes = self.cmd_text.as_bytes();
            let mut quotes = 0;
            let mut i = 0;
            while i < bytes.len() {
                let ch = bytes[i];
                if ch == b'"' {
                    quotes += 1;
                }
                if (quotes & 1) == 0 && ch == b';' {
                    break;
                }
                if ch == b'\n' {
                    break;
                }
                i += 1;
            }

            let line = self.cmd_text[..i].to_string();
            let skip = (i + 1).min(self.cmd_text.len());
            self.cmd_text.drain(..skip);

            self.cmd_execute_string(target, &line);

            if self.cmd_wait {
                self.cmd_wait = false;
                break;
            }
        }
    }

    // ========================================================
    // Command registration
    // ========================================================

    /// Register a new command. Commands may not shadow cvars.
    pub fn cmd_add_command(&mut self, target: &T, name: &str, description: &'static str, function: CmdFn<T>) {
        if target.cvars().find_var(name).is_some() {
            log::warn!("Cmd_AddCommand: {} already defined as a var", name);
            return;
        }
        let key = name.to_ascii_lowercase();
        if self.cmd_functions_index.contains_key(&key) {
            log::warn!("Cmd_AddCommand: {} already defined", name);
            return;
        }
        self.cmd_functions_index.insert(key, self.cmd_functions.len());
        self.cmd_functions.push(CmdFunction {
            name: name.to_string(),
            description,
            function,
        });
    }

    pub fn cmd_exists(&self, name: &str) -> bool {
        self.cmd_functions_index.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered commands, in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &CmdFunction<T>> {
        self.cmd_functions.iter()
    }

    // ========================================================
    // Execution
    // ========================================================

    /// Execute a single command line: built-ins first, then registered
    /// commands, then cvar get/set.
    pub fn cmd_execute_string(&mut self, target: &mut T, text: &str) {
        let args = CmdArgs::tokenize(text);
        if args.argc() == 0 {
            return;
        }

        let key = args.argv(0).to_ascii_lowercase();
        match key.as_str() {
            "exec" => return self.cmd_exec_f(target, &args),
            "echo" => {
                log::info!("{}", args.as_slice()[1..].join(" "));
                return;
            }
            "wait" => {
                self.cmd_wait = true;
                return;
            }
            "set" => {
                if args.argc() < 3 {
                    log::info!("usage: set <variable> <value>");
                } else {
                    target.cvars_mut().set(args.argv(1), args.argv(2));
                }
                return;
            }
            "cmdlist" => {
                for cmd in &self.cmd_functions {
                    log::info!("{:<16} {}", cmd.name, cmd.description);
                }
                log::info!("{} commands", self.cmd_functions.len());
                return;
            }
            "cvarlist" => {
                target.cvars().list(args.argv(1));
                return;
            }
            _ => {}
        }

        if let Some(&idx) = self.cmd_functions_index.get(&key) {
            let function = self.cmd_functions[idx].function;
            function(target, &args);
            return;
        }

        if target.cvars_mut().command(args.as_slice()) {
            return;
        }

        log::warn!("Unknown command \"{}\"", args.argv(0));
    }

    /// `exec <filename>`: execute a script file.
    fn cmd_exec_f(&mut self, target: &mut T, args: &CmdArgs) {
        if args.argc() != 2 {
            log::info!("exec <filename> : execute a script file");
            return;
        }

        let mut filename = args.argv(1).to_string();
        if !filename.ends_with(".cfg") {
            filename.push_str(".cfg");
        }

        match target.load_script(&filename) {
            Some(text) => {
                log::info!("execing {}", filename);
                self.cbuf_insert_text(&text);
            }
            None => log::warn!("couldn't exec {}", filename),
        }
    }
}

fn push_command_line(build: &mut String, words: &[&str]) {
    let quoted: Vec<String> = words
        .iter()
        .map(|w| if w.contains(char::is_whitespace) { format!("\"{}\"", w) } else { w.to_string() })
        .collect();
    build.push_str(&quoted.join(" "));
    build.push('\n');
}

// ============================================================
// Inline token parser
// ============================================================

/// Parse a single token from the byte slice starting at `pos`.
/// Returns (token, new_pos).
fn com_parse_inline(data: &[u8], mut pos: usize) -> (String, usize) {
    while pos < data.len() && data[pos] <= b' ' {
        if data[pos] == b'\n' {
            return (String::new(), pos);
        }
        pos += 1;
    }

    if pos >= data.len() {
        return (String::new(), pos);
    }

    let start;
    let end;

    if data[pos] == b'"' {
        pos += 1;
        start = pos;
        while pos < data.len() && data[pos] != b'"' && data[pos] != b'\n' {
            pos += 1;
        }
        end = pos;
        if pos < data.len() && data[pos] == b'"' {
            pos += 1;
        }
    } else {
        start = pos;
        while pos < data.len() && data[pos] > b' ' {
            pos += 1;
        }
        end = pos;
    }

    (String::from_utf8_lossy(&data[start..end]).into_owned(), pos)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvar::CvarFlags;

    #[derive(Default)]
    struct TestTarget {
        cvars: CvarContext,
        calls: Vec<Vec<String>>,
        scripts: HashMap<String, String>,
    }

    impl CommandTarget for TestTarget {
        fn cvars(&self) -> &CvarContext {
            &self.cvars
        }
        fn cvars_mut(&mut self) -> &mut CvarContext {
            &mut self.cvars
        }
        fn load_script(&self, name: &str) -> Option<String> {
            self.scripts.get(name).cloned()
        }
    }

    fn record(target: &mut TestTarget, args: &CmdArgs) {
        target.calls.push(args.as_slice().to_vec());
    }

    fn setup() -> (CmdContext<TestTarget>, TestTarget) {
        let mut target = TestTarget::default();
        target.cvars.get("mat_hdr_level", "0", CvarFlags::empty());
        let mut ctx = CmdContext::new();
        ctx.cmd_add_command(&target, "buildcubemaps", "bake cubemaps", record);
        (ctx, target)
    }

    #[test]
    fn test_tokenize() {
        let args = CmdArgs::tokenize("lightprobe \"my probe\" 64 // comment");
        assert_eq!(args.argc(), 3);
        assert_eq!(args.argv(0), "lightprobe");
        assert_eq!(args.argv(1), "my probe");
        assert_eq!(args.argv(2), "64");
        assert_eq!(args.argv(3), "");
        assert_eq!(args.args(), "\"my probe\" 64 // comment");
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(CmdArgs::tokenize("   ").argc(), 0);
        assert_eq!(CmdArgs::tokenize("// only a comment").argc(), 0);
    }

    #[test]
    fn test_cbuf_insert_text() {
        let (mut ctx, _) = setup();
        ctx.cbuf_add_text("second\n");
        ctx.cbuf_insert_text("first");
        assert_eq!(ctx.pending_text(), "first\nsecond\n");
    }

    #[test]
    fn test_execute_registered_command() {
        let (mut ctx, mut target) = setup();
        ctx.cbuf_add_text("buildcubemaps 3; BUILDCUBEMAPS\n");
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.calls, vec![vec!["buildcubemaps".to_string(), "3".to_string()], vec!["BUILDCUBEMAPS".to_string()]]);
        assert!(ctx.pending_text().is_empty());
    }

    #[test]
    fn test_execute_cvar_set() {
        let (mut ctx, mut target) = setup();
        ctx.cbuf_add_text("mat_hdr_level 2\nset r_new 5\n");
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.cvars.variable_int("mat_hdr_level"), 2);
        assert_eq!(target.cvars.variable_int("r_new"), 5);
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        let (mut ctx, mut target) = setup();
        ctx.cbuf_add_text("set motd \"a;b\"\n");
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.cvars.variable_string("motd"), "a;b");
    }

    #[test]
    fn test_exec_script() {
        let (mut ctx, mut target) = setup();
        target.scripts.insert("bake.cfg".to_string(), "mat_hdr_level 2\nbuildcubemaps 2\n".to_string());
        ctx.cbuf_add_text("exec bake\n");
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.cvars.variable_int("mat_hdr_level"), 2);
        assert_eq!(target.calls.len(), 1);
    }

    #[test]
    fn test_wait_stops_execution() {
        let (mut ctx, mut target) = setup();
        ctx.cbuf_add_text("buildcubemaps\nwait\nbuildcubemaps\n");
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.calls.len(), 1);
        ctx.cbuf_execute(&mut target);
        assert_eq!(target.calls.len(), 2);
    }

    #[test]
    fn test_cmd_add_case_insensitive() {
        let (mut ctx, target) = setup();
        ctx.cmd_add_command(&target, "envmap", "", record);
        assert!(ctx.cmd_exists("envmap"));
        assert!(ctx.cmd_exists("ENVMAP"));
        assert!(!ctx.cmd_exists("envmaps"));
    }

    #[test]
    fn test_command_cannot_shadow_cvar() {
        let (mut ctx, target) = setup();
        ctx.cmd_add_command(&target, "mat_hdr_level", "", record);
        assert!(!ctx.cmd_exists("mat_hdr_level"));
    }

    #[test]
    fn test_cbuf_add_late_commands() {
        let (mut ctx, _) = setup();
        let args: Vec<String> = ["+set", "developer", "1", "+buildcubemaps", "2", "+lightprobe", "a b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(ctx.cbuf_add_late_commands(&args));
        assert_eq!(ctx.pending_text(), "set developer 1\nbuildcubemaps 2\nlightprobe \"a b\"\n");
        assert!(!ctx.cbuf_add_late_commands(&["plain".to_string()]));
    }
}
