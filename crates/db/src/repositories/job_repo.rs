//! Repository for the `jobs` table.

use orchestra_core::types::Id;
use sqlx::PgPool;

use crate::models::job::{Job, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, name, description, script, specification, metadata, \
    cluster_caps_req, owner_id, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (\
                id, name, description, script, specification, metadata, \
                cluster_caps_req, owner_id\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(Id::new_v4())
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.script)
            .bind(&input.specification)
            .bind(input.metadata.as_ref())
            .bind(input.cluster_caps_req.as_deref())
            .bind(&input.owner_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Id) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
