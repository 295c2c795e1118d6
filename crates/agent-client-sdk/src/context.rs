//! Scoped merging of client context updates.
//!
//! The client is the source of truth for `ClientContext`: it accumulates
//! partial updates from wherever the surrounding application observes them
//! (navigation, capability probes, user actions) and sends the *merged*
//! result to the gateway on `agent:context_update`. Merging is shallow and
//! last-writer-wins per scope, with one exception: `capabilities` is a set
//! that only grows, so updates concatenate and dedupe rather than replace —
//! a capability a component announced earlier in the session must not
//! disappear because a later update didn't re-announce it.

use agent_protocol::ClientContext;

/// Merges `update` into `base` in place, per the scoping rules described
/// above.
pub fn merge_context(base: &mut ClientContext, update: ClientContext) {
    if update.page_id.is_some() {
        base.page_id = update.page_id;
    }
    if update.active_tab.is_some() {
        base.active_tab = update.active_tab;
    }
    if let Some(new_caps) = update.capabilities {
        let mut merged = base.capabilities.take().unwrap_or_default();
        for cap in new_caps {
            if !merged.contains(&cap) {
                merged.push(cap);
            }
        }
        base.capabilities = Some(merged);
    }
    if let Some(new_meta) = update.metadata {
        let mut merged = base.metadata.take().unwrap_or_default();
        for (k, v) in new_meta {
            merged.insert(k, v);
        }
        base.metadata = Some(merged);
    }
}
