use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashSet;

type Migration = (i64, &'static str);

fn migrations() -> Vec<Migration> {
    vec![
        (
            1,
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                whatsapp_number TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );
            "#,
        ),
        (
            2,
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                email_tone TEXT NOT NULL DEFAULT 'neutral',
                email_signoff TEXT NOT NULL DEFAULT 'Best regards',
                work_hours TEXT NOT NULL DEFAULT '9am-5pm',
                favorite_locations TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );
            "#,
        ),
        (
            3,
            r#"
            CREATE TABLE IF NOT EXISTS user_tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                task_type TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user_status ON user_tasks(user_id, status);
            "#,
        ),
        (
            4,
            r#"
            CREATE TABLE IF NOT EXISTS conversation_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                message_text TEXT NOT NULL,
                message_type TEXT NOT NULL,
                intent TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user_ts
                ON conversation_history(user_id, created_at DESC);
            "#,
        ),
        (
            5,
            r#"
            CREATE TABLE IF NOT EXISTS message_embeddings (
                conversation_id TEXT PRIMARY KEY REFERENCES conversation_history(id),
                user_id TEXT NOT NULL,
                model TEXT NOT NULL,
                embedding TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_user ON message_embeddings(user_id);
            "#,
        ),
    ]
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS __schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    let mut stmt = conn.prepare("SELECT version FROM __schema_version")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut applied = HashSet::new();
    for row in rows {
        applied.insert(row?);
    }

    for (version, sql) in migrations() {
        if applied.contains(&version) {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO __schema_version(version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;
    }

    Ok(())
}
