//! Runtime configuration.
//!
//! Debug output and the frame limit are carried by an explicit
//! [`RuntimeConfig`] owned by each `CallContext`, so that two contexts in
//! the same process (or two tests) can run with different settings.
//! [`RuntimeConfig::from_env`] is the only place the environment is read.
//!
//! # Environment Variables
//!
//! - `GARNET_DEBUG`: comma-separated flags
//!   - `exec` - log every body execution
//!   - `ir` - dump instructions when a body is first materialized
//!   - `all` - everything
//! - `GARNET_MAX_DEPTH`: maximum number of method frames
//!
//! Example: `GARNET_DEBUG=exec,ir RUST_LOG=garnet=info`

bitflags::bitflags! {
    /// Debug output switches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DebugFlags: u32 {
        /// Log each body execution.
        const EXECUTION = 0b0000_0001;
        /// Dump instructions on first materialization.
        const IR = 0b0000_0010;
    }
}

impl DebugFlags {
    /// Parse a comma-separated flag list. Unknown names are ignored.
    pub fn parse(s: &str) -> Self {
        let mut flags = DebugFlags::empty();
        for part in s.split(',') {
            match part.trim().to_lowercase().as_str() {
                "exec" | "execution" => flags |= DebugFlags::EXECUTION,
                "ir" => flags |= DebugFlags::IR,
                "all" => flags |= DebugFlags::all(),
                "" => {}
                other => tracing::warn!(flag = other, "unknown GARNET_DEBUG flag"),
            }
        }
        flags
    }
}

/// Per-context runtime settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub debug: DebugFlags,
    /// `None` for unlimited.
    pub max_depth: Option<usize>,
}

impl RuntimeConfig {
    /// Read `GARNET_DEBUG` and `GARNET_MAX_DEPTH`.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("GARNET_DEBUG").ok().as_deref(),
            std::env::var("GARNET_MAX_DEPTH").ok().as_deref(),
        )
    }

    fn from_vars(debug: Option<&str>, max_depth: Option<&str>) -> Self {
        let max_depth = max_depth.and_then(|raw| match raw.trim().parse::<usize>() {
            Ok(depth) => Some(depth),
            Err(_) => {
                tracing::warn!(value = raw, "ignoring invalid GARNET_MAX_DEPTH");
                None
            }
        });
        RuntimeConfig {
            debug: debug.map(DebugFlags::parse).unwrap_or_default(),
            max_depth,
        }
    }

    #[must_use]
    pub fn with_debug(mut self, flags: DebugFlags) -> Self {
        self.debug = flags;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Whether body executions are logged.
    #[inline]
    pub fn is_debug(&self) -> bool {
        self.debug.contains(DebugFlags::EXECUTION)
    }
}
