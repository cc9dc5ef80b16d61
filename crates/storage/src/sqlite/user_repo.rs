use chrono::{DateTime, Utc};
use exam_core::model::{NewUser, User};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db, ser, user_id_from_i64};
use crate::repository::{StorageError, UserRepository};

fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        google_id: row.try_get("google_id").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO users (google_id, email, name, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(google_id) DO UPDATE SET
                    -- first sign-in keeps created_at; profile fields follow the provider
                    email = excluded.email,
                    name = excluded.name
                RETURNING id, google_id, email, name, created_at
            ",
        )
        .bind(user.google_id())
        .bind(user.email())
        .bind(user.name())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        map_user_row(&row)
    }

    async fn find_user_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, google_id, email, name, created_at
                FROM users
                WHERE google_id = ?1
            ",
        )
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_user_row).transpose()
    }
}
