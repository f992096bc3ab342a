//! Top-level panic reporting.
//!
//! A panic inside a spawned task only ends that task: an HTTP handler drops
//! its connection, a session reader stops reading. The hook installed here
//! records the panic message into the status of every running bridge and
//! then hands over to the previously installed hook.

use std::any::Any;
use std::panic::{self, PanicHookInfo};
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, const_mutex};

use wabridge_core::SupervisorHandle;

static BRIDGES: Mutex<Vec<(u64, SupervisorHandle)>> = const_mutex(Vec::new());
static NEXT_ID: AtomicU64 = AtomicU64::new(0);
static INSTALL: Once = Once::new();

/// Registration of one bridge with the panic hook, removed on drop.
#[derive(Debug)]
pub(crate) struct FaultReporter {
    id: u64,
}

impl FaultReporter {
    /// Installs the hook on first use and registers `handle`.
    pub(crate) fn register(handle: SupervisorHandle) -> Self {
        INSTALL.call_once(install_hook);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        BRIDGES.lock().push((id, handle));
        Self { id }
    }
}

impl Drop for FaultReporter {
    fn drop(&mut self) {
        BRIDGES.lock().retain(|(id, _)| *id != self.id);
    }
}

fn install_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        report(info);
        previous(info);
    }));
}

fn report(info: &PanicHookInfo<'_>) {
    // Never block inside the hook; a panic while the registry is held skips reporting.
    let Some(bridges) = BRIDGES.try_lock() else {
        return;
    };
    if bridges.is_empty() {
        return;
    }

    let reason = panic_message(info.payload());
    for (_, handle) in bridges.iter() {
        handle.report_fault(reason.clone());
    }
}

/// The message a panic was raised with.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
