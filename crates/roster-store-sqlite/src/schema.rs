//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Queue tables carry no foreign keys to subjects or containers: actions
/// must be able to outlive the rows they reference (a deleted container
/// leaves orphaned actions for the sweeper; a deleted subject is detected
/// and dropped during the batch pass).
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id   TEXT PRIMARY KEY,
    external_key TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS containers (
    container_id TEXT PRIMARY KEY,
    external_key TEXT NOT NULL UNIQUE,
    kind         TEXT NOT NULL,              -- 'course' | 'module'
    ready        INTEGER NOT NULL DEFAULT 0, -- externally-managed gate
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    role_id   TEXT PRIMARY KEY,
    shortname TEXT NOT NULL UNIQUE
);

-- One row per (subject, container, source).
CREATE TABLE IF NOT EXISTS memberships (
    membership_id TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL
                  REFERENCES subjects(subject_id) ON DELETE CASCADE,
    container_id  TEXT NOT NULL
                  REFERENCES containers(container_id) ON DELETE CASCADE,
    source        TEXT NOT NULL,
    status        TEXT NOT NULL,             -- 'active' | 'suspended'
    window_start  TEXT,
    window_end    TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (subject_id, container_id, source)
);

-- source NULL = manual grant, owned by no mechanism.
CREATE TABLE IF NOT EXISTS role_assignments (
    assignment_id TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL
                  REFERENCES subjects(subject_id) ON DELETE CASCADE,
    container_id  TEXT NOT NULL
                  REFERENCES containers(container_id) ON DELETE CASCADE,
    role_id       TEXT NOT NULL REFERENCES roles(role_id),
    source        TEXT
);

CREATE TABLE IF NOT EXISTS groups (
    group_id     TEXT PRIMARY KEY,
    container_id TEXT NOT NULL
                 REFERENCES containers(container_id) ON DELETE CASCADE,
    name         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id   TEXT NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    subject_id TEXT NOT NULL,
    UNIQUE (group_id, subject_id)
);

-- The ordered action queue. AUTOINCREMENT guarantees a monotonically
-- increasing id, so ascending action_id is creation order even across
-- deletes.
CREATE TABLE IF NOT EXISTS queued_actions (
    action_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id   TEXT NOT NULL,
    container_id TEXT NOT NULL,
    role_id      TEXT NOT NULL,
    kind         TEXT NOT NULL,      -- 'add' | 'suspend' | 'unsuspend' | 'remove'
    window_start TEXT,
    window_end   TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS queued_groups (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    action_id INTEGER NOT NULL
              REFERENCES queued_actions(action_id) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    op        TEXT NOT NULL           -- 'add' | 'remove'
);

CREATE INDEX IF NOT EXISTS queued_pair_idx
    ON queued_actions(subject_id, container_id);
CREATE INDEX IF NOT EXISTS queued_container_idx
    ON queued_actions(container_id);
CREATE INDEX IF NOT EXISTS memberships_pair_idx
    ON memberships(subject_id, container_id);
CREATE INDEX IF NOT EXISTS assignments_pair_idx
    ON role_assignments(subject_id, container_id);
CREATE INDEX IF NOT EXISTS groups_container_idx
    ON groups(container_id);

PRAGMA user_version = 1;
";
