//! Repository for the `clusters` table.

use orchestra_core::types::Id;
use sqlx::PgPool;

use crate::models::cluster::{Cluster, NewCluster};

/// Column list for `clusters` queries.
const COLUMNS: &str = "\
    id, name, cluster_type, capabilities, status, \
    messenger, messenger_queue, created_at, updated_at";

pub struct ClusterRepo;

impl ClusterRepo {
    pub async fn create(pool: &PgPool, input: &NewCluster) -> Result<Cluster, sqlx::Error> {
        let query = format!(
            "INSERT INTO clusters (\
                id, name, cluster_type, capabilities, messenger, messenger_queue\
             ) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Cluster>(&query)
            .bind(Id::new_v4())
            .bind(&input.name)
            .bind(&input.cluster_type)
            .bind(input.capabilities.as_deref())
            .bind(&input.messenger)
            .bind(&input.messenger_queue)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Id) -> Result<Option<Cluster>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clusters WHERE id = $1");
        sqlx::query_as::<_, Cluster>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The scheduling pool, ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Cluster>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clusters ORDER BY name");
        sqlx::query_as::<_, Cluster>(&query).fetch_all(pool).await
    }
}
