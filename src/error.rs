#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("invalid rate limit spec `{0}`")]
    InvalidRateLimit(String),
    #[error("unknown resolver type `{0}`")]
    UnknownResolver(String),
    #[error("invalid argument spec: {0}")]
    InvalidArgSpec(String),
    #[error("guild-only command invoked outside a guild")]
    GuildOnly,
    #[error("caller is missing permissions: {}", .0.join(", "))]
    MissingCallerPermissions(Vec<String>),
    #[error("command is limited to roles: {}", .0.join(", "))]
    RoleLimited(Vec<String>),
    #[error("caller is missing required roles: {}", .0.join(", "))]
    MissingRoles(Vec<String>),
    #[error("{0}")]
    Middleware(String),
}

pub type Result<T> = std::result::Result<T, Error>;
