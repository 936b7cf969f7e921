use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (boards, columns, leads)");
        conn.execute_batch(
            "
            CREATE TABLE boards (
                id              TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name            TEXT NOT NULL CHECK (length(trim(name)) > 0),
                description     TEXT,
                webhook_token   TEXT NOT NULL UNIQUE,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_boards_org
                ON boards(organization_id, created_at);

            CREATE TABLE board_columns (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                title       TEXT NOT NULL CHECK (length(trim(title)) > 0),
                status      TEXT NOT NULL,
                position    INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_columns_board
                ON board_columns(board_id, position);

            CREATE TABLE leads (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                column_id   TEXT NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                phone       TEXT,
                chat_id     TEXT,
                description TEXT,
                origin      TEXT NOT NULL CHECK (origin IN ('whatsapp', 'manual')),
                position    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_leads_column
                ON leads(column_id, position);

            CREATE INDEX idx_leads_board
                ON leads(board_id, position);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
