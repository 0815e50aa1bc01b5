use crate::model::StorageError;
use chrono::Utc;
use rusqlite::{Connection, params};
use std::collections::HashSet;

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS playlists (
                user_id TEXT NOT NULL,
                playlist_id TEXT NOT NULL,
                auto_check INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL,
                PRIMARY KEY (user_id, playlist_id)
            );

            CREATE TABLE IF NOT EXISTS playlist_tracks (
                user_id TEXT NOT NULL,
                playlist_id TEXT NOT NULL,
                track_id TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                PRIMARY KEY (user_id, playlist_id, track_id)
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Registers a user if unknown. Returns true when newly created.
    pub fn add_user(&self, user_id: &str) -> Result<bool, StorageError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool, StorageError> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM users WHERE user_id = ?1")?;
        let mut rows = stmt.query(params![user_id])?;
        Ok(rows.next()?.is_some())
    }

    fn playlist_exists(&self, user_id: &str, playlist_id: &str) -> Result<bool, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM playlists WHERE user_id = ?1 AND playlist_id = ?2")?;
        let mut rows = stmt.query(params![user_id, playlist_id])?;
        Ok(rows.next()?.is_some())
    }

    /// Stores a new playlist together with its scraped track set.
    pub fn add_playlist(
        &mut self,
        user_id: &str,
        playlist_id: &str,
        track_ids: &HashSet<String>,
        auto_check: bool,
    ) -> Result<(), StorageError> {
        if !self.user_exists(user_id)? {
            return Err(StorageError::NotFound(format!("user {}", user_id)));
        }
        if self.playlist_exists(user_id, playlist_id)? {
            return Err(StorageError::AlreadyExists(format!("playlist {}", playlist_id)));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO playlists (user_id, playlist_id, auto_check, added_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, playlist_id, auto_check, now],
        )?;
        for track_id in track_ids {
            tx.execute(
                "INSERT INTO playlist_tracks (user_id, playlist_id, track_id, first_seen)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, playlist_id, track_id, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replaces the stored track set with `track_ids` exactly: unknown ids
    /// are inserted (keeping first_seen for ones already present), stored
    /// ids missing from the new set are deleted. Idempotent.
    pub fn update_playlist_tracks(
        &mut self,
        user_id: &str,
        playlist_id: &str,
        track_ids: &HashSet<String>,
    ) -> Result<(), StorageError> {
        if !self.playlist_exists(user_id, playlist_id)? {
            return Err(StorageError::NotFound(format!("playlist {}", playlist_id)));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for track_id in track_ids {
            tx.execute(
                "INSERT OR IGNORE INTO playlist_tracks (user_id, playlist_id, track_id, first_seen)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, playlist_id, track_id, now],
            )?;
        }
        if track_ids.is_empty() {
            tx.execute(
                "DELETE FROM playlist_tracks WHERE user_id = ?1 AND playlist_id = ?2",
                params![user_id, playlist_id],
            )?;
        } else {
            let placeholders = track_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "DELETE FROM playlist_tracks
                 WHERE user_id = ?1 AND playlist_id = ?2 AND track_id NOT IN ({})",
                placeholders
            );
            let mut stmt = tx.prepare(&sql)?;
            let mut bind = vec![user_id.to_string(), playlist_id.to_string()];
            bind.extend(track_ids.iter().cloned());
            stmt.execute(rusqlite::params_from_iter(bind))?;
            drop(stmt);
        }
        tx.commit()?;
        Ok(())
    }

    pub fn set_auto_check(
        &self,
        user_id: &str,
        playlist_id: &str,
        auto_check: bool,
    ) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE playlists SET auto_check = ?3 WHERE user_id = ?1 AND playlist_id = ?2",
            params![user_id, playlist_id, auto_check],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("playlist {}", playlist_id)));
        }
        Ok(())
    }

    pub fn delete_playlist(&mut self, user_id: &str, playlist_id: &str) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM playlists WHERE user_id = ?1 AND playlist_id = ?2",
            params![user_id, playlist_id],
        )?;
        if deleted == 0 {
            return Err(StorageError::NotFound(format!("playlist {}", playlist_id)));
        }
        tx.execute(
            "DELETE FROM playlist_tracks WHERE user_id = ?1 AND playlist_id = ?2",
            params![user_id, playlist_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_playlist_track_ids(
        &self,
        user_id: &str,
        playlist_id: &str,
    ) -> Result<HashSet<String>, StorageError> {
        if !self.playlist_exists(user_id, playlist_id)? {
            return Err(StorageError::NotFound(format!("playlist {}", playlist_id)));
        }
        let mut stmt = self.conn.prepare(
            "SELECT track_id FROM playlist_tracks WHERE user_id = ?1 AND playlist_id = ?2",
        )?;
        let rows = stmt.query_map(params![user_id, playlist_id], |row| row.get::<_, String>(0))?;

        let mut track_ids = HashSet::new();
        for row in rows {
            track_ids.insert(row?);
        }
        Ok(track_ids)
    }

    pub fn get_playlist_ids(&self, user_id: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT playlist_id FROM playlists WHERE user_id = ?1 ORDER BY added_at ASC, playlist_id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// All (user_id, playlist_id) pairs flagged for periodic re-checking.
    pub fn all_auto_check(&self) -> Result<Vec<(String, String)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, playlist_id FROM playlists WHERE auto_check = 1 ORDER BY added_at ASC, playlist_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }
}
