//! Native extension loading and the module cache.
//!
//! `import name` searches the machine's path list (current directory,
//! `KS_PATH` entries, the installation prefix) for a shared library
//! named after the module. A candidate must export the well-known
//! [`ENTRY_SYMBOL`]: a function handing back the module's
//! [`ModuleEntry`], whose `init` builds and returns the module value.
//! Successful imports are cached by name, so later imports are no-ops;
//! exhausting every candidate raises `ImportError`.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::types::core;
use crate::value::Value;

/// Version stamp of the extension interface. Bumped whenever the engine
/// types an extension touches change shape.
pub const ABI_VERSION: u32 = 1;

/// Symbol every extension library exports.
pub const ENTRY_SYMBOL: &[u8] = b"kestrel_module\0";

/// What the entry symbol returns.
pub struct ModuleEntry {
    /// Must equal [`ABI_VERSION`].
    pub abi_version: u32,
    /// Builds the module value, or fails with a thrown error.
    pub init: fn(&mut Vm) -> Result<Value, Thrown>,
}

/// Signature of the exported entry function.
pub type EntryFn = fn() -> &'static ModuleEntry;

#[derive(Debug, thiserror::Error)]
enum CandidateError {
    #[error("could not open library: {0}")]
    Open(#[from] libloading::Error),
    #[error("library exports ABI version {found}, engine expects {expected}")]
    AbiMismatch { found: u32, expected: u32 },
}

#[allow(unsafe_code)] // dynamic loading is inherently a host-trust boundary
fn try_candidate(
    vm: &mut Vm,
    path: &str,
) -> Result<Option<(libloading::Library, Value)>, CandidateError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }
    tracing::debug!(path, "[import] trying candidate");

    // Safety: loading runs arbitrary library initializers; extensions
    // are trusted host code, there is no sandbox.
    let lib = unsafe { libloading::Library::new(path) }?;
    let entry: EntryFn = unsafe { *lib.get::<EntryFn>(ENTRY_SYMBOL)? };
    let entry = entry();
    if entry.abi_version != ABI_VERSION {
        return Err(CandidateError::AbiMismatch {
            found: entry.abi_version,
            expected: ABI_VERSION,
        });
    }

    match (entry.init)(vm) {
        Ok(module) => Ok(Some((lib, module))),
        Err(thrown) => {
            tracing::debug!(path, "[import] init failed: {:?}", thrown.value);
            Ok(None)
        }
    }
}

fn candidate_paths(dir: &str, name: &str) -> [String; 2] {
    let prefix = std::env::consts::DLL_PREFIX;
    let suffix = std::env::consts::DLL_SUFFIX;
    [
        format!("{dir}/{prefix}{name}{suffix}"),
        format!("{dir}/{name}/{prefix}{name}{suffix}"),
    ]
}

/// Import `name`, loading it on first use and caching the result.
pub fn import(vm: &mut Vm, name: &str) -> Result<Value, Thrown> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(vm.throw(
            &core().import_error,
            format!("invalid module name '{name}'"),
        ));
    }

    let machine = vm.machine.clone();
    if let Some(cache) = machine.modules.as_dict() {
        if let Some(module) = cache.read().get_str(name) {
            return Ok(module);
        }
    }

    let dirs: Vec<String> = machine
        .paths
        .as_list()
        .map(|l| {
            l.read()
                .iter()
                .filter_map(|p| p.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    for dir in &dirs {
        for path in candidate_paths(dir, name) {
            match try_candidate(vm, &path) {
                Ok(Some((lib, module))) => {
                    tracing::debug!(path, module = name, "[import] loaded");
                    machine.libs.lock().push(lib);
                    if let Some(cache) = machine.modules.as_dict() {
                        cache.write().insert_str(name, module.clone());
                    }
                    return Ok(module);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(path, "[import] candidate failed: {e}");
                }
            }
        }
    }

    Err(vm.throw(
        &core().import_error,
        format!("failed to import module '{name}': no such module"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    #[test]
    fn missing_module_raises_import_error() {
        let m = Machine::new();
        let mut vm = Vm::new(m);
        let err = import(&mut vm, "definitely_not_installed").unwrap_err();
        assert_eq!(err.value.type_name(), "ImportError");
    }

    #[test]
    fn bad_names_are_rejected() {
        let m = Machine::new();
        let mut vm = Vm::new(m);
        for bad in ["", "a/b", "..\\x"] {
            let err = import(&mut vm, bad).unwrap_err();
            assert_eq!(err.value.type_name(), "ImportError", "{bad}");
        }
    }

    #[test]
    fn cache_returns_the_same_module() {
        let m = Machine::new();
        let module = Value::module("probe");
        if let Some(cache) = m.modules.as_dict() {
            cache.write().insert_str("probe", module.clone());
        }
        let mut vm = Vm::new(m);
        let again = import(&mut vm, "probe").unwrap();
        assert!(again.is(&module));
    }
}
