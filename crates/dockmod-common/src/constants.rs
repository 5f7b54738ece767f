//! System-wide constants and default paths.

/// Mounted path of the user's codebase inside the runtime container.
pub const CODEBASE_PATH: &str = "/app";

/// Sentinel root the Compose loader resolves relative paths against.
pub const COMPOSE_PROJECT_ROOT: &str = "/scratch";

/// Project name used when the manifest does not declare one.
pub const DEFAULT_PROJECT_NAME: &str = "dockmod";

/// Default module name exposed to the orchestrator.
pub const DEFAULT_MODULE_NAME: &str = "dockmod";

/// File name patterns recognised as a Dockerfile.
pub const DOCKERFILE_PATTERNS: &[&str] = &["Dockerfile", "*.Dockerfile"];

/// File name patterns recognised as a Compose manifest.
pub const COMPOSE_PATTERNS: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yaml",
    "compose.yml",
];

/// Directory in which Compose secrets are mounted inside a container.
pub const SECRETS_MOUNT_DIR: &str = "/run/secrets";

/// Image used for the aggregating reverse proxy.
pub const PROXY_IMAGE: &str = "nginx:1.25.3";

/// Application name used in CLI output.
pub const APP_NAME: &str = "dockmod";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "dockmod";
