//! # Constants
//!
//! Shared defaults for the controller. Anything tunable at runtime is read
//! through [`crate::config::ControllerConfig`]; the values here are the
//! fallbacks used when the corresponding environment variable is absent.

/// API group of every custom resource served by this controller
pub const API_GROUP: &str = "config.mediastack.io";

/// API version of every custom resource served by this controller
pub const API_VERSION: &str = "v1alpha1";

/// Field manager recorded on every patch issued by the controller
pub const FIELD_MANAGER: &str = "media-config-controller";

/// Default port for the metrics and probe server
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default requeue interval after a failed pass (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;

/// Default requeue interval after a fully successful pass (seconds)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Upper bound for a single reconciliation pass (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

/// Default timeout for backend HTTP calls when the resource does not set one (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Delay before restarting a controller whose watch stream ended (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default number of reconciliations that may run concurrently per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default namespace the controller runs in
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "media-config-system";

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Annotation written by `mcctl reconcile` to request an immediate pass
pub const RECONCILE_REQUEST_ANNOTATION: &str = "config.mediastack.io/reconcile";

/// Default key inside a secret holding an API key
pub const DEFAULT_API_KEY_SECRET_KEY: &str = "apiKey";

/// Default key inside a credentials secret holding the username
pub const DEFAULT_USERNAME_SECRET_KEY: &str = "username";

/// Default key inside a credentials secret holding the password
pub const DEFAULT_PASSWORD_SECRET_KEY: &str = "password";

/// Value the servarr family returns in place of write-only fields
pub const MASKED_FIELD_VALUE: &str = "********";

/// Tolerance applied when deciding whether a scheduled pass is due (seconds)
pub const SCHEDULE_TOLERANCE_SECS: i64 = 2;
