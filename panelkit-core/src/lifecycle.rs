//! Mount and unmount hooks.

use tracing::{debug, info};

use crate::slice::{PanelContext, SliceKey};

/// Slices to refresh when a panel mounts: each required slice that the
/// host already lists and that is not loading. Mounting twice while a
/// refresh is underway requests nothing the second time.
pub fn on_mount(panel: &str, required: &[SliceKey], context: &PanelContext) -> Vec<SliceKey> {
    let slices = context.slices();
    let due: Vec<SliceKey> = required
        .iter()
        .filter(|key| slices.get(key).is_some_and(|slice| !slice.loading))
        .cloned()
        .collect();

    info!(panel, refreshing = due.len(), "panel mounted");
    for key in required.iter().filter(|k| slices.get(k).is_none()) {
        debug!(panel, slice = %key, "required slice not provided by host");
    }
    due
}

pub fn on_unmount(panel: &str) {
    info!(panel, "panel unmounted");
}
