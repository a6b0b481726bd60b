//! Script-visible OS threads.
//!
//! A thread wraps a callable; construction spawns the OS thread, which
//! acquires the machine's GIL, runs the callable on a fresh per-thread
//! interpreter, parks the outcome, and releases the lock. `join`
//! releases the GIL while waiting and then returns the callable's result
//! or re-raises its uncaught exception in the joining thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Default)]
struct Shared {
    outcome: Mutex<Option<Result<Value, Thrown>>>,
}

/// Payload of a thread value.
#[derive(Debug)]
pub struct ThreadObj {
    /// Display name.
    pub name: String,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

fn thread_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let func = args
        .get(1)
        .cloned()
        .filter(ops::is_callable)
        .ok_or_else(|| vm.throw(&core().arg_error, "thread(func, args=()) takes a callable"))?;
    let call_args: Vec<Value> = match args.get(2) {
        None => Vec::new(),
        Some(v) if v.is_none() => Vec::new(),
        Some(v) => ops::collect(vm, v)?,
    };

    let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    let name = format!("__thread__{id}");
    let shared = Arc::new(Shared::default());

    let machine = vm.machine.clone();
    let thread_shared = shared.clone();
    let handle = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            tracing::debug!(thread = %std::thread::current().name().unwrap_or("?"), "thread starting");
            machine.gil.acquire();
            let mut tvm = Vm::new(machine.clone());
            let result = ops::call(&mut tvm, &func, call_args);
            *thread_shared.outcome.lock() = Some(result);
            machine.gil.release();
            tracing::debug!("thread finished");
        })
        .map_err(|e| vm.throw(&core().internal_error, format!("could not spawn thread: {e}")))?;

    Ok(Value::alloc(
        core().thread.clone(),
        Payload::Thread(ThreadObj {
            name,
            shared,
            handle: Mutex::new(Some(handle)),
        }),
    ))
}

fn expect_thread<'v>(vm: &Vm, args: &'v [Value]) -> Result<&'v ThreadObj, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Thread(t)) => Ok(t),
        _ => Err(vm.throw(&core().type_error, "expected a 'thread' receiver")),
    }
}

fn thread_join(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let this = expect_thread(vm, args)?;
    let handle = this.handle.lock().take();
    if let Some(handle) = handle {
        let joined = vm.machine.gil.blocking(|| handle.join());
        if joined.is_err() {
            return Err(vm.throw(&core().internal_error, "thread panicked"));
        }
    }
    match this.shared.outcome.lock().take() {
        Some(Ok(v)) => Ok(v),
        Some(Err(thrown)) => Err(thrown),
        None => Ok(Value::none()),
    }
}

fn thread_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let this = expect_thread(vm, args)?;
    Ok(Value::str(format!(
        "<thread '{}' @ {:#x}>",
        this.name,
        args[0].addr()
    )))
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.thread;
    t.define("__new__", "thread.__new__(func, args=none)", thread_new);
    t.define("__str__", "thread.__str__(self)", thread_str);
    t.define("__repr__", "thread.__repr__(self)", thread_str);
    t.define("join", "thread.join(self)", thread_join);
}
