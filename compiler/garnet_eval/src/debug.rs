//! Debug hook run before every body dispatch.

use garnet_ir::IrScope;

use crate::config::RuntimeConfig;

/// Log the execution of a body when execution debugging is on.
///
/// Output only; nothing here can fail or change what the call does.
pub(crate) fn maybe_debug(config: &RuntimeConfig, scope: &IrScope, name: &str) {
    if !config.is_debug() {
        return;
    }
    let real_name = if name.is_empty() { scope.name() } else { name };
    tracing::info!(
        target: "garnet::exec",
        kind = %scope.kind(),
        file = scope.file(),
        line = scope.line(),
        "executing '{real_name}'"
    );
}
