use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                email            TEXT NOT NULL UNIQUE,
                password         TEXT NOT NULL,
                bio              TEXT,
                profile_picture  TEXT,
                created_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE groups (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL,
                description  TEXT,
                creator_id   TEXT NOT NULL REFERENCES users(id),
                invite_code  TEXT NOT NULL UNIQUE,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- (group, user) primary key is the uniqueness guarantee for
            -- memberships; racing joins hit the constraint, not app logic.
            CREATE TABLE memberships (
                group_id   TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id    TEXT NOT NULL REFERENCES users(id),
                role       TEXT NOT NULL,
                joined_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (group_id, user_id)
            );

            CREATE INDEX idx_memberships_user ON memberships(user_id);

            -- uploader_id is a weak reference: photos outlive both the
            -- uploader's membership and the uploader's account.
            CREATE TABLE photos (
                id           TEXT PRIMARY KEY,
                group_id     TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                uploader_id  TEXT NOT NULL,
                storage_ref  TEXT NOT NULL,
                mime_type    TEXT NOT NULL,
                file_size    INTEGER NOT NULL,
                sha256       TEXT NOT NULL,
                description  TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_photos_group ON photos(group_id, created_at);

            CREATE TABLE photo_tags (
                photo_id  TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
                tag       TEXT NOT NULL,
                PRIMARY KEY (photo_id, tag)
            );

            CREATE TABLE revoked_tokens (
                token       TEXT PRIMARY KEY,
                revoked_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
