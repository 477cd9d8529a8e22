//! Table names and the SQLite schema.

/// Database schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Role grants per identity.
pub const USER_ROLES: &str = "user_roles";
/// Per-identity permission overrides.
pub const USER_PERMISSIONS: &str = "user_permissions";
/// Append-only audit trail of permission mutations.
pub const PERMISSION_AUDIT_LOG: &str = "permission_audit_log";
/// Per-guild moderation configuration.
pub const MODERATION_CONFIG: &str = "moderation_config";
/// Moderation exemptions.
pub const MODERATION_WHITELIST: &str = "moderation_whitelist";
/// Per-identity, per-guild offense ledger.
pub const MODERATION_OFFENDERS: &str = "moderation_offenders";
/// Append-only moderation action log.
pub const MODERATION_LOGS: &str = "moderation_logs";
/// Durable daily counters per guild.
pub const MODERATION_DAILY_STATS: &str = "moderation_daily_stats";

/// Statements creating every table and index, in order.
pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        role_type TEXT NOT NULL,
        granted_by TEXT NOT NULL,
        granted_at TEXT NOT NULL,
        expires_at TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE (user_id, role_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_permissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        permission_name TEXT NOT NULL,
        is_granted INTEGER NOT NULL,
        granted_by TEXT NOT NULL,
        granted_at TEXT NOT NULL,
        expires_at TEXT,
        reason TEXT,
        UNIQUE (user_id, permission_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permission_audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL,
        target_user_id TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        role_type TEXT,
        permission_name TEXT,
        details TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_config (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id TEXT NOT NULL UNIQUE,
        enabled INTEGER NOT NULL,
        keywords TEXT NOT NULL,
        case_sensitive INTEGER NOT NULL,
        escalation_enabled INTEGER NOT NULL,
        warning_threshold INTEGER NOT NULL,
        timeout_threshold INTEGER NOT NULL,
        kick_threshold INTEGER NOT NULL,
        timeout_duration_secs INTEGER NOT NULL,
        templates TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_whitelist (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        reason TEXT,
        added_by TEXT NOT NULL,
        added_at TEXT NOT NULL,
        expires_at TEXT,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_offenders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        guild_id TEXT NOT NULL,
        offense_count INTEGER NOT NULL DEFAULT 0,
        escalation_level TEXT NOT NULL DEFAULT 'none',
        is_banned INTEGER NOT NULL DEFAULT 0,
        last_offense_at TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, guild_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        guild_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        message_id TEXT NOT NULL,
        action_type TEXT NOT NULL,
        outcome TEXT NOT NULL DEFAULT 'applied',
        content_snippet TEXT NOT NULL,
        detected_keywords TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_daily_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id TEXT NOT NULL,
        date TEXT NOT NULL,
        messages_deleted INTEGER NOT NULL DEFAULT 0,
        warnings INTEGER NOT NULL DEFAULT 0,
        timeouts INTEGER NOT NULL DEFAULT 0,
        kicks INTEGER NOT NULL DEFAULT 0,
        bans INTEGER NOT NULL DEFAULT 0,
        whitelist_bypasses INTEGER NOT NULL DEFAULT 0,
        UNIQUE (guild_id, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_roles_user_id ON user_roles(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_user_roles_role_type ON user_roles(role_type)",
    "CREATE INDEX IF NOT EXISTS idx_user_permissions_user_id ON user_permissions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_whitelist_guild_user ON moderation_whitelist(guild_id, user_id)",
    "CREATE INDEX IF NOT EXISTS idx_moderation_logs_guild_user ON moderation_logs(guild_id, user_id)",
];

/// Statements bringing an older schema up to date, keyed by the version
/// that introduced them.
pub const UPGRADES: &[(i32, &str)] = &[(
    2,
    "ALTER TABLE moderation_logs ADD COLUMN outcome TEXT NOT NULL DEFAULT 'applied'",
)];
