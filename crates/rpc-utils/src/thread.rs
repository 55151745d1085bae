use core_affinity::CoreId;
#[cfg(target_os = "linux")]
use libc::{sched_param, sched_setscheduler, SCHED_FIFO};
use tracing::warn;

/// Best-effort OS thread priority hint.
///
/// The RPC OS contract (see crate docs) explicitly allows the host to ignore
/// this: on platforms or under permissions where elevating scheduling class
/// fails, the worker keeps running under the default policy and a warning is
/// logged rather than the call failing.
#[derive(Clone, Copy, Debug, Default)]
pub enum ThreadPriority {
    #[default]
    OsDefault,
    Low,
    Medium,
    High,
}

#[cfg(target_os = "linux")]
impl ThreadPriority {
    fn to_sched_param(self) -> Option<sched_param> {
        let prio = match self {
            ThreadPriority::OsDefault => return None,
            ThreadPriority::Low => 20,
            ThreadPriority::Medium => 50,
            ThreadPriority::High => 80,
        };
        Some(sched_param { sched_priority: prio })
    }
}

#[cfg(target_os = "linux")]
fn set_thread_prio(prio: ThreadPriority) {
    if let Some(param) = prio.to_sched_param() {
        unsafe {
            let code = sched_setscheduler(0, SCHED_FIFO, &param);
            if code != 0 {
                warn!(?prio, "couldn't set worker thread priority, continuing under OS default");
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn set_thread_prio(prio: ThreadPriority) {
    if !matches!(prio, ThreadPriority::OsDefault) {
        warn!(?prio, "thread priority hints are only honored on linux");
    }
}

/// Applies the requested priority hint and, optionally, pins the calling
/// thread to a CPU core. Call this as the first statement inside a worker's
/// thread body, mirroring how `os_thread_create` accepts (ignorable) name
/// and priority hints in the reference OSAL.
pub fn thread_boot(core: Option<usize>, prio: ThreadPriority) {
    if let Some(core) = core {
        if !core_affinity::set_for_current(CoreId { id: core }) {
            warn!(core, "couldn't pin worker thread to requested core");
        }
    }
    set_thread_prio(prio);
}
