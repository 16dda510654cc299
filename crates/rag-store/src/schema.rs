//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Passages, partitioned by tenant
CREATE TABLE IF NOT EXISTS passages (
    id INTEGER PRIMARY KEY,
    tenant TEXT NOT NULL,
    source_key TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL,
    UNIQUE (tenant, source_key)
);

CREATE INDEX IF NOT EXISTS idx_passages_tenant ON passages(tenant);

-- FTS5 virtual table for lexical search
CREATE VIRTUAL TABLE IF NOT EXISTS passages_fts USING fts5(
    content,
    content=passages,
    content_rowid=id
);

-- Triggers to keep FTS5 in sync with passages table
CREATE TRIGGER IF NOT EXISTS passages_ai AFTER INSERT ON passages BEGIN
    INSERT INTO passages_fts(rowid, content) VALUES (NEW.id, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS passages_ad AFTER DELETE ON passages BEGIN
    INSERT INTO passages_fts(passages_fts, rowid, content) VALUES ('delete', OLD.id, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS passages_au AFTER UPDATE ON passages BEGIN
    INSERT INTO passages_fts(passages_fts, rowid, content) VALUES ('delete', OLD.id, OLD.content);
    INSERT INTO passages_fts(rowid, content) VALUES (NEW.id, NEW.content);
END;

-- Conversation history, one row per turn
CREATE TABLE IF NOT EXISTS history (
    session_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (session_id, seq)
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
