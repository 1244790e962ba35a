//! Database connection pool

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Connect and migrate once at startup. Failures are logged and reported as
/// `None` so the service can keep serving without a store.
pub async fn connect(database_url: Option<&str>) -> Option<PgPool> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set, running without a store");
        return None;
    };

    tracing::info!("Connecting to database...");
    let pool = match create_pool(url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed, running without a store");
            return None;
        }
    };
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    run_migrations(&pool).await;
    Some(pool)
}

/// Split SQL into statements, keeping `$$` delimited blocks intact
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_dollar_block = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if c == '$' && chars.peek() == Some(&'$') {
            current.push('$');
            chars.next();
            in_dollar_block = !in_dollar_block;
        } else if c == ';' && !in_dollar_block {
            if has_sql_content(&current) {
                statements.push(current.trim().to_string());
            }
            current.clear();
        }
    }

    if has_sql_content(&current) {
        statements.push(current.trim().to_string());
    }

    statements
}

/// Check if a string has actual SQL content (not just comments)
fn has_sql_content(s: &str) -> bool {
    s.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("--")
    })
}

/// Apply the embedded schema. Statements are idempotent; a failing statement
/// is logged and skipped.
pub async fn run_migrations(pool: &PgPool) {
    let migration_sql = include_str!("migrations/001_initial.sql");
    let statements = split_sql_statements(migration_sql);
    let total = statements.len();
    let mut failed = 0;

    for statement in statements {
        if let Err(e) = sqlx::query(&statement).execute(pool).await {
            failed += 1;
            tracing::warn!(error = %e, "Migration statement failed (possibly already applied)");
        }
    }

    tracing::info!(statements = total, failed, "Database migrations completed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_dollar_blocks() {
        let sql = r#"
-- enum
DO $$ BEGIN
    CREATE TYPE issue_status AS ENUM ('pending', 'resolved');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS t (id INT);
-- trailing comment
"#;
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TYPE issue_status"));
        assert!(statements[0].ends_with("END $$;"));
        assert_eq!(statements[1], "CREATE TABLE IF NOT EXISTS t (id INT);");
    }

    #[test]
    fn test_has_sql_content() {
        assert!(!has_sql_content("-- only a comment\n\n"));
        assert!(has_sql_content("-- comment\nSELECT 1"));
    }

    #[test]
    fn test_embedded_migration_splits() {
        let statements = split_sql_statements(include_str!("migrations/001_initial.sql"));
        assert!(statements.iter().any(|s| s.contains("CREATE TABLE IF NOT EXISTS users")));
        assert!(statements.iter().any(|s| s.contains("ON DELETE CASCADE")));
    }
}
