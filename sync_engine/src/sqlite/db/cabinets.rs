use chrono::{DateTime, Utc};
use log::debug;
use pm_common::Secret;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Cabinet, NewCabinet, UpdateCabinetRequest},
    traits::SyncEngineError,
};

/// Passwords live in the database as plain columns but only ever cross into the rest of the engine wrapped in
/// [`Secret`], so this row type stays private to the query layer.
#[derive(FromRow)]
struct CabinetRow {
    id: i64,
    name: String,
    login: String,
    password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CabinetRow> for Cabinet {
    fn from(row: CabinetRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            login: row.login,
            password: Secret::new(row.password),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn insert_cabinet(cabinet: NewCabinet, conn: &mut SqliteConnection) -> Result<Cabinet, SyncEngineError> {
    let row: CabinetRow =
        sqlx::query_as("INSERT INTO cabinets (name, login, password) VALUES ($1, $2, $3) RETURNING *")
            .bind(cabinet.name)
            .bind(cabinet.login)
            .bind(cabinet.password.into_inner())
            .fetch_one(conn)
            .await?;
    debug!("🗄️ Cabinet [{}] inserted with id {}", row.login, row.id);
    Ok(row.into())
}

pub async fn fetch_cabinet(id: i64, conn: &mut SqliteConnection) -> Result<Option<Cabinet>, sqlx::Error> {
    let row: Option<CabinetRow> =
        sqlx::query_as("SELECT * FROM cabinets WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row.map(Cabinet::from))
}

/// Every configured cabinet, in creation order. This is the target set for an "all cabinets" sync job.
pub async fn fetch_all_cabinets(conn: &mut SqliteConnection) -> Result<Vec<Cabinet>, sqlx::Error> {
    let rows: Vec<CabinetRow> = sqlx::query_as("SELECT * FROM cabinets ORDER BY id ASC").fetch_all(conn).await?;
    Ok(rows.into_iter().map(Cabinet::from).collect())
}

pub async fn update_cabinet(
    id: i64,
    update: UpdateCabinetRequest,
    conn: &mut SqliteConnection,
) -> Result<Option<Cabinet>, SyncEngineError> {
    if update.is_empty() {
        debug!("🗄️ No fields to update for cabinet {id}. Update request skipped.");
        return Err(SyncEngineError::CabinetModificationNoOp);
    }
    let mut builder = QueryBuilder::new("UPDATE cabinets SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.new_name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name);
    }
    if let Some(login) = update.new_login {
        set_clause.push("login = ");
        set_clause.push_bind_unseparated(login);
    }
    if let Some(password) = update.new_password {
        set_clause.push("password = ");
        set_clause.push_bind_unseparated(password.into_inner());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    let row = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| CabinetRow::from_row(&row)).transpose()?;
    Ok(row.map(Cabinet::from))
}

pub async fn delete_cabinet(id: i64, conn: &mut SqliteConnection) -> Result<bool, SyncEngineError> {
    let result = sqlx::query("DELETE FROM cabinets WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
