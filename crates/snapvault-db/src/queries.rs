use crate::Database;
use crate::models::{GroupRow, MemberRow, MembershipRow, PhotoRow, UserRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use snapvault_types::api::{PhotoFilter, SortOrder};

impl Database {
    // -- Users --

    /// Returns false if the email is already registered. The UNIQUE
    /// constraint makes the check-and-insert atomic.
    pub fn create_user(&self, id: &str, name: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            )?;
            Ok(conn.changes() > 0)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, bio, profile_picture, created_at
                 FROM users WHERE email = ?1",
                [email],
                map_user,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, bio, profile_picture, created_at
                 FROM users WHERE id = ?1",
                [id],
                map_user,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn update_user_bio(&self, id: &str, bio: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET bio = ?2 WHERE id = ?1", (id, bio))?;
            Ok(())
        })
    }

    pub fn update_user_name(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET name = ?2 WHERE id = ?1", (id, name))?;
            Ok(())
        })
    }

    /// Returns false if the new email belongs to another account.
    pub fn update_user_email(&self, id: &str, email: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE OR IGNORE users SET email = ?2 WHERE id = ?1",
                (id, email),
            )?;
            Ok(conn.changes() > 0)
        })
    }

    pub fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn update_user_profile_picture(&self, id: &str, storage_ref: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET profile_picture = ?2 WHERE id = ?1",
                (id, storage_ref),
            )?;
            Ok(())
        })
    }

    /// Deletes the user, their owned groups (with memberships and photos,
    /// via cascade), and their remaining memberships. Photos they uploaded
    /// to groups they do not own are preserved. Returns the storage refs
    /// that no longer have a backing record.
    pub fn delete_user(&self, id: &str) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT group_id FROM memberships WHERE user_id = ?1 AND role = 'owner'",
                )?;
                let ids = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };

            let mut refs = Vec::new();
            for group_id in &owned {
                let mut stmt =
                    tx.prepare("SELECT storage_ref FROM photos WHERE group_id = ?1")?;
                let group_refs = stmt
                    .query_map([group_id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                refs.extend(group_refs);
            }

            let profile_picture: Option<String> = tx
                .query_row("SELECT profile_picture FROM users WHERE id = ?1", [id], |r| {
                    r.get(0)
                })
                .optional()?
                .flatten();
            refs.extend(profile_picture);

            for group_id in &owned {
                tx.execute("DELETE FROM groups WHERE id = ?1", [group_id])?;
            }
            tx.execute("DELETE FROM memberships WHERE user_id = ?1", [id])?;
            tx.execute("DELETE FROM users WHERE id = ?1", [id])?;

            tx.commit()?;
            Ok(refs)
        })
    }

    // -- Groups & memberships --

    /// Inserts the group and its owner membership in one transaction.
    /// Returns false on an invite-code collision so the caller can
    /// regenerate; the UNIQUE constraint is what makes the retry loop safe
    /// under concurrent creation.
    pub fn create_group(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        creator_id: &str,
        invite_code: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO groups (id, name, description, creator_id, invite_code)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, name, description, creator_id, invite_code),
            )?;
            if tx.changes() == 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO memberships (group_id, user_id, role) VALUES (?1, ?2, 'owner')",
                (id, creator_id),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, creator_id, invite_code, created_at
                 FROM groups WHERE id = ?1",
                [id],
                map_group,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_group_by_invite_code(&self, code: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, creator_id, invite_code, created_at
                 FROM groups WHERE invite_code = ?1",
                [code],
                map_group,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn update_group(&self, id: &str, name: Option<&str>, description: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE groups
                 SET name = COALESCE(?2, name), description = COALESCE(?3, description)
                 WHERE id = ?1",
                (id, name, description),
            )?;
            Ok(())
        })
    }

    /// Deletes the group; memberships and photo records go with it via
    /// cascade, atomically. Returns the storage refs of the cascaded photos
    /// (None if the group did not exist).
    pub fn delete_group(&self, id: &str) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let refs: Vec<String> = {
                let mut stmt =
                    tx.prepare("SELECT storage_ref FROM photos WHERE group_id = ?1")?;
                let refs = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                refs
            };

            tx.execute("DELETE FROM groups WHERE id = ?1", [id])?;
            if tx.changes() == 0 {
                return Ok(None);
            }
            tx.commit()?;
            Ok(Some(refs))
        })
    }

    /// Returns false if the (group, user) pair already exists — racing joins
    /// resolve at the primary key, not in application logic.
    pub fn insert_membership(&self, group_id: &str, user_id: &str, role: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO memberships (group_id, user_id, role) VALUES (?1, ?2, ?3)",
                (group_id, user_id, role),
            )?;
            Ok(conn.changes() > 0)
        })
    }

    pub fn get_membership(&self, group_id: &str, user_id: &str) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT group_id, user_id, role, joined_at
                 FROM memberships WHERE group_id = ?1 AND user_id = ?2",
                (group_id, user_id),
                |row| {
                    Ok(MembershipRow {
                        group_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn delete_membership(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM memberships WHERE group_id = ?1 AND user_id = ?2",
                (group_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn set_member_role(&self, group_id: &str, user_id: &str, role: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE memberships SET role = ?3 WHERE group_id = ?1 AND user_id = ?2",
                (group_id, user_id, role),
            )?;
            Ok(())
        })
    }

    /// Swaps the owner role in one transaction so the one-owner-per-group
    /// invariant holds at every commit point.
    pub fn transfer_ownership(
        &self,
        group_id: &str,
        old_owner_id: &str,
        new_owner_id: &str,
        demoted_role: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE memberships SET role = ?3 WHERE group_id = ?1 AND user_id = ?2",
                (group_id, old_owner_id, demoted_role),
            )?;
            tx.execute(
                "UPDATE memberships SET role = 'owner' WHERE group_id = ?1 AND user_id = ?2",
                (group_id, new_owner_id),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_members(&self, group_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.user_id, u.name, m.role, m.joined_at
                 FROM memberships m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.group_id = ?1
                 ORDER BY m.joined_at",
            )?;
            let rows = stmt
                .query_map([group_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.creator_id, g.invite_code, g.created_at
                 FROM groups g
                 JOIN memberships m ON m.group_id = g.id
                 WHERE m.user_id = ?1
                 ORDER BY g.created_at",
            )?;
            let rows = stmt
                .query_map([user_id], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Photos --

    pub fn insert_photo(
        &self,
        id: &str,
        group_id: &str,
        uploader_id: &str,
        storage_ref: &str,
        mime_type: &str,
        file_size: i64,
        sha256: &str,
        description: Option<&str>,
        tags: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO photos (id, group_id, uploader_id, storage_ref, mime_type, file_size, sha256, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                (id, group_id, uploader_id, storage_ref, mime_type, file_size, sha256, description),
            )?;
            for tag in tags {
                tx.execute(
                    "INSERT OR IGNORE INTO photo_tags (photo_id, tag) VALUES (?1, ?2)",
                    (id, tag),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_photo(&self, id: &str) -> Result<Option<PhotoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, group_id, uploader_id, storage_ref, mime_type, file_size, sha256, description, created_at
                 FROM photos WHERE id = ?1",
                [id],
                map_photo,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_photo_tags(&self, photo_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT tag FROM photo_tags WHERE photo_id = ?1 ORDER BY tag")?;
            let tags = stmt
                .query_map([photo_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tags)
        })
    }

    /// Batch-fetch tags for a set of photo IDs (single query, no N+1).
    pub fn get_tags_for_photos(&self, photo_ids: &[String]) -> Result<Vec<(String, String)>> {
        if photo_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=photo_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT photo_id, tag FROM photo_tags WHERE photo_id IN ({}) ORDER BY tag",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = photo_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Filtered, paginated photo listing for one group. The WHERE clause is
    /// assembled from whichever filters are present.
    pub fn list_group_photos(&self, group_id: &str, filter: &PhotoFilter) -> Result<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT p.id, p.group_id, p.uploader_id, p.storage_ref, p.mime_type, p.file_size, p.sha256, p.description, p.created_at
                 FROM photos p
                 WHERE p.group_id = ?1",
            );
            let mut params: Vec<String> = vec![group_id.to_string()];

            if let Some(tag) = &filter.tag {
                params.push(tag.clone());
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM photo_tags t WHERE t.photo_id = p.id AND t.tag = ?{})",
                    params.len()
                ));
            }
            if let Some(uploader) = &filter.uploader_id {
                params.push(uploader.to_string());
                sql.push_str(&format!(" AND p.uploader_id = ?{}", params.len()));
            }
            if let Some(from) = &filter.from {
                params.push(from.format("%Y-%m-%d %H:%M:%S").to_string());
                sql.push_str(&format!(" AND p.created_at >= ?{}", params.len()));
            }
            if let Some(to) = &filter.to {
                params.push(to.format("%Y-%m-%d %H:%M:%S").to_string());
                sql.push_str(&format!(" AND p.created_at <= ?{}", params.len()));
            }

            let dir = match filter.order {
                Some(SortOrder::Asc) => "ASC",
                _ => "DESC",
            };
            // id is the tiebreaker so pagination is stable within a second
            sql.push_str(&format!(
                " ORDER BY p.created_at {dir}, p.id {dir} LIMIT {} OFFSET {}",
                filter.limit.min(200),
                filter.offset
            ));

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::types::ToSql> = params
                .iter()
                .map(|p| p as &dyn rusqlite::types::ToSql)
                .collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), map_photo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_photo_tags(
        &self,
        photo_id: &str,
        tags: &[String],
        description: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM photo_tags WHERE photo_id = ?1", [photo_id])?;
            for tag in tags {
                tx.execute(
                    "INSERT OR IGNORE INTO photo_tags (photo_id, tag) VALUES (?1, ?2)",
                    (photo_id, tag),
                )?;
            }
            if let Some(description) = description {
                tx.execute(
                    "UPDATE photos SET description = ?2 WHERE id = ?1",
                    (photo_id, description),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Deletes the record and returns its storage ref for file cleanup.
    pub fn delete_photo(&self, id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let storage_ref: Option<String> = tx
                .query_row("SELECT storage_ref FROM photos WHERE id = ?1", [id], |r| {
                    r.get(0)
                })
                .optional()?;
            let Some(storage_ref) = storage_ref else {
                return Ok(None);
            };
            tx.execute("DELETE FROM photos WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(Some(storage_ref))
        })
    }

    // -- Revoked tokens --

    pub fn revoke_token(&self, token: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (token) VALUES (?1)",
                [token],
            )?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM revoked_tokens WHERE token = ?1",
                    [token],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

// -- Row mapping helpers --

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        bio: row.get(4)?,
        profile_picture: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        creator_id: row.get(3)?,
        invite_code: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_photo(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        uploader_id: row.get(2)?,
        storage_ref: row.get(3)?,
        mime_type: row.get(4)?,
        file_size: row.get(5)?,
        sha256: row.get(6)?,
        description: row.get(7)?,
        created_at: row.get(8)?,
    })
}
