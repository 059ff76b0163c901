// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tracing subscriber setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Directive used when neither `RUST_LOG` nor the caller names one.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Calling it again is a no-op.
pub fn init_tracing(default_directive: Option<&str>) {
    let directive = default_directive.unwrap_or(DEFAULT_DIRECTIVE);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing(Some("debug"));
        init_tracing(None);
        tracing::info!("still logging after a second init");
    }
}
