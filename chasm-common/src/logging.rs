//! Diagnostics for the control client.
//!
//! Socket traffic is logged with [`outgoing!`], [`incoming!`] and
//! [`internal!`]. Each event is entered inside a `control` span whose
//! `direction` field records which way the bytes went. Output goes to stderr
//! so that command output on stdout stays clean.

use std::io::IsTerminal;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Environment variable overriding the client's log level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[doc(hidden)]
#[macro_export]
macro_rules! control_event {
    ($level:ident, $direction:literal, $($msg:tt)+) => {{
        let span = $crate::tracing::span!(
            $crate::tracing::Level::$level,
            "control",
            direction = $direction
        );
        let _enter = span.enter();

        $crate::tracing::event!($crate::tracing::Level::$level, $($msg)+)
    }};
}

/// Bytes leaving the client for the daemon
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:tt)+) => {
        $crate::control_event!($level, "outgoing", $($msg)+)
    };

    ($($msg:tt)+) => {
        $crate::control_event!(TRACE, "outgoing", $($msg)+)
    };
}

/// Bytes arriving from the daemon
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:tt)+) => {
        $crate::control_event!($level, "incoming", $($msg)+)
    };

    ($($msg:tt)+) => {
        $crate::control_event!(TRACE, "incoming", $($msg)+)
    };
}

/// Connection and exchange state changes
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:tt)+) => {
        $crate::control_event!($level, "internal", $($msg)+)
    };

    ($($msg:tt)+) => {
        $crate::control_event!(TRACE, "internal", $($msg)+)
    };
}

/// Level filter for a [`LOG_LEVEL_ENV`] value; unset means `default`
///
/// # Errors
///
/// Returns the rejected value if it names no level
fn parse_level(value: Option<&str>, default: LevelFilter) -> Result<LevelFilter, String> {
    value.map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| value.to_string())
    })
}

/// Events from the client crates and the `chasmctl` binary; dependencies stay
/// quiet
fn is_client_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or_default();
    matches!(krate, "chasm" | "chasmctl") || krate.starts_with("chasm_")
}

pub fn init() {
    let default = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let value = std::env::var(LOG_LEVEL_ENV).ok();
    let level = parse_level(value.as_deref(), default).unwrap_or_else(|rejected| {
        eprintln!("Invalid {LOG_LEVEL_ENV} {rejected:?}, defaulting to {default}");
        default
    });

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(std::io::stderr().is_terminal())
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    is_client_target(metadata.target())
                })),
        )
        .init();
}
