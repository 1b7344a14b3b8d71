use async_trait::async_trait;
use oauth2_core::OAuth2Error;
use oauth2_ports::{ModelClass, RecordStore};
use sqlx::{Pool, Postgres, Sqlite};
use std::borrow::Cow;
use std::path::PathBuf;

#[derive(Clone, Debug)]
enum DatabasePool {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
        }
    }
}

/// SQL-backed record store (SQLite/Postgres) using SQLx.
///
/// Each [`ModelClass`] maps to one table with an auto-increment `id`, one TEXT
/// column per key and one column per serialized field.
#[derive(Clone, Debug)]
pub struct SqlxRecordStore {
    pool: DatabasePool,
}

impl SqlxRecordStore {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = if database_url.starts_with("postgres") {
            DatabasePool::Postgres(Pool::<Postgres>::connect(database_url).await?)
        } else {
            // Best-effort: if we can't create it (permissions, etc.), sqlx will surface the
            // underlying error on connect.
            if let Some(path) = sqlite_db_path(database_url) {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                }

                if !path.as_os_str().is_empty() && !path.exists() {
                    let _ = std::fs::File::create(&path);
                }
            }

            let connect_url = sqlite_url_with_create_mode(database_url);
            DatabasePool::Sqlite(Pool::<Sqlite>::connect(connect_url.as_ref()).await?)
        };

        Ok(Self { pool })
    }

    pub fn db_system(&self) -> &'static str {
        match self.pool {
            DatabasePool::Sqlite(_) => "sqlite",
            DatabasePool::Postgres(_) => "postgresql",
        }
    }

    fn dialect(&self) -> Dialect {
        match self.pool {
            DatabasePool::Sqlite(_) => Dialect::Sqlite,
            DatabasePool::Postgres(_) => Dialect::Postgres,
        }
    }
}

#[async_trait]
impl RecordStore for SqlxRecordStore {
    async fn init_model(&self, model: &ModelClass) -> Result<(), OAuth2Error> {
        let statements = schema_statements(model, self.dialect());
        tracing::debug!(table = %model.table, statements = statements.len(), "bootstrapping model schema");

        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                for sql in &statements {
                    sqlx::query(sql).execute(pool).await?;
                }
            }
            DatabasePool::Postgres(pool) => {
                for sql in &statements {
                    sqlx::query(sql).execute(pool).await?;
                }
            }
        }

        Ok(())
    }

    async fn filter(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
    ) -> Result<Vec<Option<String>>, OAuth2Error> {
        model.check_columns(key_name, property_name)?;
        let sql = select_sql(model, key_name, property_name, self.dialect());

        let values = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_scalar::<_, Option<String>>(&sql)
                    .bind(key_value)
                    .fetch_all(pool)
                    .await?
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar::<_, Option<String>>(&sql)
                    .bind(key_value)
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(values)
    }

    async fn save(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
        value: Option<String>,
    ) -> Result<(), OAuth2Error> {
        model.check_columns(key_name, property_name)?;
        let dialect = self.dialect();
        let update = update_sql(model, key_name, property_name, dialect);
        let insert = insert_sql(model, key_name, property_name, dialect);

        // Upsert: update every matching row, insert only when none matched.
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let updated = sqlx::query(&update)
                    .bind(value.as_deref())
                    .bind(key_value)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                if updated == 0 {
                    sqlx::query(&insert)
                        .bind(key_value)
                        .bind(value.as_deref())
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
            DatabasePool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let updated = sqlx::query(&update)
                    .bind(value.as_deref())
                    .bind(key_value)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                if updated == 0 {
                    sqlx::query(&insert)
                        .bind(key_value)
                        .bind(value.as_deref())
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
        }

        Ok(())
    }

    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        // Keep readiness/liveness cheap: don't run bootstrap.
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }

        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn schema_statements(model: &ModelClass, dialect: Dialect) -> Vec<String> {
    let mut columns = vec![dialect.id_column().to_string()];
    columns.extend(
        model
            .key_columns
            .iter()
            .map(|key| format!("{} TEXT", quote_ident(key))),
    );
    columns.extend(
        model
            .fields
            .iter()
            .map(|field| format!("{} {}", quote_ident(&field.name), field.db_type)),
    );

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&model.table),
        columns.join(", ")
    )];

    for key in &model.key_columns {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&format!("idx_{}_{}", model.table, key)),
            quote_ident(&model.table),
            quote_ident(key)
        ));
    }

    statements
}

fn select_sql(model: &ModelClass, key_name: &str, property_name: &str, dialect: Dialect) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY id",
        quote_ident(property_name),
        quote_ident(&model.table),
        quote_ident(key_name),
        dialect.placeholder(1)
    )
}

fn update_sql(model: &ModelClass, key_name: &str, property_name: &str, dialect: Dialect) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} = {}",
        quote_ident(&model.table),
        quote_ident(property_name),
        dialect.placeholder(1),
        quote_ident(key_name),
        dialect.placeholder(2)
    )
}

fn insert_sql(model: &ModelClass, key_name: &str, property_name: &str, dialect: Dialect) -> String {
    format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        quote_ident(&model.table),
        quote_ident(key_name),
        quote_ident(property_name),
        dialect.placeholder(1),
        dialect.placeholder(2)
    )
}

fn sqlite_db_path(database_url: &str) -> Option<PathBuf> {
    if !database_url.starts_with("sqlite:") {
        return None;
    }
    if database_url.starts_with("sqlite::memory:") {
        return None;
    }

    let mut rest = &database_url["sqlite:".len()..];

    // Reduce multiple leading slashes to a single one.
    if rest.starts_with("///") {
        rest = &rest[2..];
    } else if rest.starts_with("//") {
        rest = &rest[1..];
    }

    let path_part = rest.split('?').next().unwrap_or(rest);
    if path_part.is_empty() {
        return None;
    }

    Some(PathBuf::from(path_part))
}

fn sqlite_url_with_create_mode(database_url: &str) -> Cow<'_, str> {
    if !database_url.starts_with("sqlite:") || database_url.starts_with("sqlite::memory:") {
        return Cow::Borrowed(database_url);
    }
    if database_url.contains("mode=") {
        return Cow::Borrowed(database_url);
    }

    let sep = if database_url.contains('?') { '&' } else { '?' };
    Cow::Owned(format!("{database_url}{sep}mode=rwc"))
}
