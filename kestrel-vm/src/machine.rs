//! The embeddable runtime handle.
//!
//! A [`Machine`] owns everything shared by the threads of one runtime:
//! the builtins dictionary, the module cache, the module search path,
//! the process arguments, the standard streams and the GIL. Executing
//! source acquires the GIL, runs the frontend pipeline and interprets
//! the resulting code object against a fresh globals dictionary.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::builtins;
use crate::compiler;
use crate::error::Thrown;
use crate::gil::Gil;
use crate::interpreter::{self, Vm};
use crate::lexer::{self, Source};
use crate::parser;
use crate::types::code::Code;
use crate::types::core;
use crate::types::stream::Stream;
use crate::value::Value;

/// Installation directory searched last for native modules.
pub const INSTALL_MODULE_DIR: &str = "/usr/local/lib/kestrel/modules";

/// Environment variable holding extra module search directories.
pub const PATH_ENV: &str = "KS_PATH";

/// One runtime: shared state plus the global interpreter lock.
pub struct Machine {
    /// Builtin functions and types (a dict value).
    pub builtins: Value,
    /// Module cache, keyed by module name (a dict value).
    pub modules: Value,
    /// Module search path (a list of strings).
    pub paths: Value,
    /// Script arguments (a list of strings).
    pub argv: Value,
    /// Wrapper around standard input.
    pub stdin: Value,
    /// Standard output sink; scripts print here.
    pub stdout: Value,
    /// Standard error sink.
    pub stderr: Value,
    /// The global interpreter lock.
    pub gil: Gil,
    /// Loaded extension libraries, kept alive for their symbols.
    pub(crate) libs: Mutex<Vec<libloading::Library>>,
}

impl Machine {
    /// A runtime wired to the process standard streams.
    pub fn new() -> Arc<Machine> {
        Machine::build(Stream::stdout())
    }

    /// A runtime whose standard output is captured in memory; read it
    /// back with [`Machine::captured_output`].
    pub fn capturing() -> Arc<Machine> {
        Machine::build(Stream::memory())
    }

    fn build(stdout: Stream) -> Arc<Machine> {
        core(); // wire the type registry before anything executes

        let mut paths = vec![Value::str(".")];
        if let Ok(extra) = std::env::var(PATH_ENV) {
            for dir in extra.split(':').filter(|d| !d.is_empty()) {
                paths.push(Value::str(dir));
            }
        }
        paths.push(Value::str(INSTALL_MODULE_DIR));

        Arc::new(Machine {
            builtins: builtins::table(),
            modules: Value::dict(),
            paths: Value::list(paths),
            argv: Value::list(Vec::new()),
            stdin: Value::stream(Stream::stdin()),
            stdout: Value::stream(stdout),
            stderr: Value::stream(Stream::stderr()),
            gil: Gil::new(),
            libs: Mutex::new(Vec::new()),
        })
    }

    /// Replace the script arguments.
    pub fn set_argv(&self, args: &[String]) {
        if let Some(list) = self.argv.as_list() {
            *list.write() = args.iter().map(Value::str).collect();
        }
    }

    /// Fresh module globals carrying the well-known entries.
    pub fn base_globals(&self) -> Value {
        let globals = Value::dict();
        if let Some(t) = globals.as_dict() {
            let mut t = t.write();
            t.insert_str("__argv__", self.argv.clone());
            t.insert_str("__path__", self.paths.clone());
            t.insert_str("__stdin__", self.stdin.clone());
            t.insert_str("__stdout__", self.stdout.clone());
            t.insert_str("__stderr__", self.stderr.clone());
        }
        // the globals dictionary exposes itself (an accepted cycle)
        if let Some(t) = globals.as_dict() {
            t.write().insert_str("__globals__", globals.clone());
        }
        globals
    }

    /// Compile `text` without running it.
    pub fn compile(
        self: &Arc<Machine>,
        name: &str,
        text: &str,
    ) -> Result<Arc<Code>, Thrown> {
        let src = Source::new(name, text);
        let toks = lexer::lex(&src)?;
        let prog = parser::parse(&src, &toks)?;
        compiler::compile_program(&src, &prog, name)
    }

    /// Compile and execute `text`, returning the program's result.
    pub fn exec_source(
        self: &Arc<Machine>,
        name: &str,
        text: &str,
    ) -> Result<Value, Thrown> {
        let code = self.compile(name, text)?;
        self.exec_code(code)
    }

    /// Compile and execute `text` against an existing globals dictionary
    /// (the prompt keeps one alive across lines).
    pub fn exec_source_in(
        self: &Arc<Machine>,
        name: &str,
        text: &str,
        globals: &Value,
    ) -> Result<Value, Thrown> {
        let code = self.compile(name, text)?;
        self.exec_code_in(code, globals.clone())
    }

    /// Execute a compiled code object on the calling thread.
    pub fn exec_code(self: &Arc<Machine>, code: Arc<Code>) -> Result<Value, Thrown> {
        let globals = self.base_globals();
        self.exec_code_in(code, globals)
    }

    /// Execute a compiled code object against the given globals.
    pub fn exec_code_in(
        self: &Arc<Machine>,
        code: Arc<Code>,
        globals: Value,
    ) -> Result<Value, Thrown> {
        self.gil.acquire();
        let mut vm = Vm::new(self.clone());
        let out = interpreter::run_code(&mut vm, code, globals);
        self.gil.release();
        out
    }

    /// Render `repr(v)` under the GIL (prompt echoing).
    pub fn exec_repr(self: &Arc<Machine>, v: &Value) -> Result<String, Thrown> {
        self.gil.acquire();
        let mut vm = Vm::new(self.clone());
        let out = crate::ops::repr_string(&mut vm, v);
        self.gil.release();
        out
    }

    /// Contents of a capturing machine's standard output.
    pub fn captured_output(&self) -> Option<String> {
        let stream = self.stdout.as_stream()?;
        let stream = stream.lock();
        stream
            .memory_contents()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_globals_carry_the_well_known_names() {
        let m = Machine::new();
        let globals = m.base_globals();
        let t = globals.as_dict().unwrap().read();
        for name in [
            "__argv__",
            "__path__",
            "__globals__",
            "__stdin__",
            "__stdout__",
            "__stderr__",
        ] {
            assert!(t.get_str(name).is_some(), "{name}");
        }
        let g2 = t.get_str("__globals__").unwrap();
        assert!(g2.is(&globals));
    }

    #[test]
    fn paths_start_with_cwd() {
        let m = Machine::new();
        let paths = m.paths.as_list().unwrap().read();
        assert_eq!(paths[0].as_str(), Some("."));
        assert_eq!(
            paths.last().unwrap().as_str(),
            Some(INSTALL_MODULE_DIR)
        );
    }

    #[test]
    fn exec_returns_the_last_expression() {
        let m = Machine::new();
        let out = m.exec_source("<test>", "1 + 2").unwrap();
        assert_eq!(out.as_i64(), Some(3));
    }

    #[test]
    fn globals_persist_when_reused() {
        let m = Machine::new();
        let globals = m.base_globals();
        m.exec_source_in("<stdin>", "x = 41", &globals).unwrap();
        let out = m.exec_source_in("<stdin>", "x + 1", &globals).unwrap();
        assert_eq!(out.as_i64(), Some(42));
    }

    #[test]
    fn captured_output_round_trips() {
        let m = Machine::capturing();
        m.exec_source("<test>", "print(\"hello\")").unwrap();
        assert_eq!(m.captured_output().as_deref(), Some("hello\n"));
    }
}
