use std::time::Duration;

/// How often the server checks a connection's liveness.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// A connection that has neither pinged nor sent anything for this long is
/// dropped; the registry cleanup then runs as for any disconnect.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);
/// How long an un-identified connection may sit before it is closed.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(30);
