//! SQLite-based storage implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use rag_core::{
    ConversationTurn, DatabaseConfig, Document, HistoryStore, LexicalIndex, RagError, RankedList,
    Result, Role, SessionId, VectorIndex, TENANT_KEY,
};

use crate::schema::SCHEMA;

/// Default number of lexical hits per query.
const DEFAULT_LEXICAL_LIMIT: usize = 10;

/// SQLite-backed passage index and conversation history.
///
/// Every passage row carries its tenant; all searches filter on it, so one
/// database file holds every tenant's collection without mixing them.
/// Vector search is an exact cosine scan over the tenant's rows.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,

    /// Maximum hits returned by lexical search.
    lexical_limit: usize,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, 30000)
    }

    /// Open the database described by `config`.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open_with_timeout(&config.path, config.busy_timeout_ms)
    }

    fn open_with_timeout(path: impl AsRef<Path>, busy_timeout_ms: u32) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| RagError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, path, busy_timeout_ms)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RagError::database(format!("Failed to open in-memory database: {}", e)))?;

        Self::init(conn, Path::new(":memory:"), 30000)
    }

    /// Cap the number of lexical hits per query.
    pub fn with_lexical_limit(mut self, limit: usize) -> Self {
        self.lexical_limit = limit.max(1);
        self
    }

    fn init(conn: Connection, path: &Path, busy_timeout_ms: u32) -> Result<Self> {
        Self::configure_connection(&conn, busy_timeout_ms)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| RagError::database(format!("Failed to initialize schema: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            lexical_limit: DEFAULT_LEXICAL_LIMIT,
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection, busy_timeout_ms: u32) -> Result<()> {
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = {};
            PRAGMA temp_store = MEMORY;
            "#,
            busy_timeout_ms
        ))
        .map_err(|e| RagError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&mut conn)
    }

    /// Replace everything indexed for `tenant` with `docs`.
    ///
    /// `embeddings[i]` belongs to `docs[i]`. Each stored passage gets a
    /// `tenant` metadata entry. Runs in one transaction.
    pub fn replace_tenant(
        &self,
        tenant: &str,
        docs: &[Document],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        if tenant.trim().is_empty() {
            return Err(RagError::invalid_argument("tenant must not be empty"));
        }
        if docs.len() != embeddings.len() {
            return Err(RagError::invalid_argument(format!(
                "{} documents but {} embeddings",
                docs.len(),
                embeddings.len()
            )));
        }

        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RagError::database(e.to_string()))?;

            let removed = tx
                .execute("DELETE FROM passages WHERE tenant = ?1", params![tenant])
                .map_err(|e| RagError::database(e.to_string()))?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO passages (tenant, source_key, content, metadata, embedding)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                    )
                    .map_err(|e| RagError::database(e.to_string()))?;

                for (doc, embedding) in docs.iter().zip(embeddings) {
                    let mut metadata = doc.metadata.clone();
                    metadata.insert(TENANT_KEY.to_string(), serde_json::Value::from(tenant));
                    let metadata = serde_json::to_string(&metadata)?;

                    stmt.execute(params![
                        tenant,
                        doc.source_key,
                        doc.content,
                        metadata,
                        vec_to_bytes(embedding),
                    ])
                    .map_err(|e| RagError::database(format!("Failed to insert passage: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| RagError::database(e.to_string()))?;

            debug!(
                "Replaced {} passages with {} for tenant {}",
                removed,
                docs.len(),
                tenant
            );
            Ok(docs.len())
        })
    }

    /// Number of passages indexed for `tenant`.
    pub fn passage_count(&self, tenant: &str) -> Result<u64> {
        self.with_conn(|conn| Self::count_passages(conn, tenant))
    }

    fn count_passages(conn: &Connection, tenant: &str) -> Result<u64> {
        conn.query_row(
            "SELECT COUNT(*) FROM passages WHERE tenant = ?1",
            params![tenant],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(|e| RagError::database(e.to_string()))
    }
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn vector_search(&self, embedding: &[f32], k: usize, tenant: &str) -> Result<RankedList> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT source_key, content, metadata, embedding FROM passages WHERE tenant = ?1",
                )
                .map_err(|e| RagError::database(e.to_string()))?;

            let rows = stmt
                .query_map(params![tenant], |row| {
                    let doc = row_to_document(row)?;
                    let bytes: Vec<u8> = row.get(3)?;
                    Ok((doc, bytes))
                })
                .map_err(|e| RagError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| RagError::database(e.to_string()))?;

            Ok(rows)
        })?;

        if rows.is_empty() {
            return Err(RagError::empty_tenant(tenant));
        }

        let mut scored = Vec::with_capacity(rows.len());
        for (doc, bytes) in rows {
            let stored = bytes_to_vec(&bytes);
            if stored.len() != embedding.len() {
                return Err(RagError::embedding(format!(
                    "query has dimension {} but passage {} has {}",
                    embedding.len(),
                    doc.source_key,
                    stored.len()
                )));
            }
            scored.push((doc, cosine_similarity(embedding, &stored)));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }
}

#[async_trait]
impl LexicalIndex for SqliteStore {
    async fn lexical_search(&self, query: &str, tenant: &str) -> Result<RankedList> {
        let fts_query = fts5_any_term_query(query);
        let limit = self.lexical_limit as i64;

        self.with_conn(|conn| {
            if Self::count_passages(conn, tenant)? == 0 {
                return Err(RagError::empty_tenant(tenant));
            }

            let Some(fts_query) = &fts_query else {
                return Ok(Vec::new());
            };

            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT p.source_key, p.content, p.metadata, bm25(passages_fts) AS score
                    FROM passages_fts f
                    JOIN passages p ON p.id = f.rowid
                    WHERE passages_fts MATCH ?1
                    AND p.tenant = ?2
                    ORDER BY score
                    LIMIT ?3
                    "#,
                )
                .map_err(|e| RagError::database(e.to_string()))?;

            let docs = stmt
                .query_map(params![fts_query, tenant, limit], row_to_document)
                .map_err(|e| RagError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| RagError::database(e.to_string()))?;

            Ok(docs)
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn load_history(&self, session: &SessionId) -> Result<Vec<ConversationTurn>> {
        let session_id = session.to_string();

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT role, content FROM history WHERE session_id = ?1 ORDER BY seq")
                .map_err(|e| RagError::database(e.to_string()))?;

            let rows = stmt
                .query_map(params![session_id], |row| {
                    let role: String = row.get(0)?;
                    let content: String = row.get(1)?;
                    Ok((role, content))
                })
                .map_err(|e| RagError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| RagError::database(e.to_string()))?;

            rows.into_iter()
                .map(|(role, content)| -> Result<ConversationTurn> {
                    let role: Role = role.parse()?;
                    Ok(ConversationTurn { role, content })
                })
                .collect()
        })
    }

    async fn append_history(&self, session: &SessionId, turns: &[ConversationTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        let session_id = session.to_string();
        let now = now_millis();

        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RagError::database(e.to_string()))?;

            let next: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), -1) + 1 FROM history WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .map_err(|e| RagError::database(e.to_string()))?;

            for (offset, turn) in turns.iter().enumerate() {
                tx.execute(
                    "INSERT INTO history (session_id, seq, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        session_id,
                        next + offset as i64,
                        turn.role.as_str(),
                        turn.content,
                        now
                    ],
                )
                .map_err(|e| RagError::database(format!("Failed to append history: {}", e)))?;
            }

            tx.commit()
                .map_err(|e| RagError::database(e.to_string()))?;

            debug!("Appended {} turns to {}", turns.len(), session_id);
            Ok(())
        })
    }
}

// Helper functions

/// Convert a `(source_key, content, metadata, ..)` row to a Document.
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let metadata_str: String = row.get(2)?;
    let metadata: HashMap<String, serde_json::Value> =
        serde_json::from_str(&metadata_str).unwrap_or_default();

    Ok(Document {
        source_key: row.get(0)?,
        content: row.get(1)?,
        metadata,
    })
}

/// Convert f32 vector to bytes (little-endian).
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert little-endian bytes back to an f32 vector.
fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Build an FTS5 query matching any term of a natural-language question.
///
/// Each term is quoted so punctuation and FTS5 operators in user input are
/// taken literally. Returns `None` when the question has no terms.
fn fts5_any_term_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(source: &str, texts: &[&str]) -> Vec<Document> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::from_source(*t, source, i))
            .collect()
    }

    #[test]
    fn test_fts5_query() {
        assert_eq!(
            fts5_any_term_query("What's the refund-window?").as_deref(),
            Some("\"What\" OR \"s\" OR \"the\" OR \"refund\" OR \"window\"")
        );
        assert_eq!(fts5_any_term_query("?!"), None);
    }

    #[test]
    fn test_vec_roundtrip_and_cosine() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(bytes_to_vec(&vec_to_bytes(&v)), v);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_empty_tenant_errors() {
        let store = SqliteStore::open_memory().unwrap();

        let err = store.vector_search(&[1.0, 0.0], 5, "alice").await.unwrap_err();
        assert!(err.is_empty_tenant());

        let err = store.lexical_search("refund", "alice").await.unwrap_err();
        assert!(err.is_empty_tenant());
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_cosine() {
        let store = SqliteStore::open_memory().unwrap();
        let docs = passages("a.md", &["east", "north", "north-east"]);
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        store.replace_tenant("alice", &docs, &embeddings).unwrap();

        let hits = store.vector_search(&[0.0, 1.0], 2, "alice").await.unwrap();
        let keys: Vec<_> = hits.iter().map(|d| d.source_key.as_str()).collect();
        assert_eq!(keys, ["a.md-1", "a.md-2"]);
        assert_eq!(hits[0].tenant(), Some("alice"));
        assert_eq!(hits[0].source(), Some("a.md"));

        let err = store.vector_search(&[0.0, 1.0, 0.0], 2, "alice").await.unwrap_err();
        assert_eq!(err.error_code(), "EMBEDDING_ERROR");
    }

    #[tokio::test]
    async fn test_lexical_search_is_tenant_isolated() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .replace_tenant(
                "alice",
                &passages("alice.md", &["Refunds are processed within 30 days.", "Shipping is free."]),
                &[vec![1.0], vec![1.0]],
            )
            .unwrap();
        store
            .replace_tenant(
                "bob",
                &passages("bob.md", &["Bob's refund policy is secret."]),
                &[vec![1.0]],
            )
            .unwrap();

        let hits = store.lexical_search("How do refunds work?", "alice").await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|d| d.tenant() == Some("alice")));
        assert_eq!(hits[0].source_key, "alice.md-0");

        let hits = store.lexical_search("refund", "bob").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_key, "bob.md-0");

        // Punctuation-only query on a populated tenant is simply empty.
        assert!(store.lexical_search("???", "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lexical_limit() {
        let store = SqliteStore::open_memory().unwrap().with_lexical_limit(2);
        let texts = ["apple one", "apple two", "apple three", "apple four"];
        store
            .replace_tenant("t", &passages("f", &texts), &vec![vec![1.0]; 4])
            .unwrap();

        assert_eq!(store.lexical_search("apple", "t").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_tenant_replaces() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .replace_tenant("alice", &passages("old.md", &["old text"]), &[vec![1.0]])
            .unwrap();
        store
            .replace_tenant("alice", &passages("new.md", &["new text", "more"]), &[vec![1.0], vec![0.5]])
            .unwrap();

        assert_eq!(store.passage_count("alice").unwrap(), 2);
        assert!(store.lexical_search("old", "alice").await.unwrap().is_empty());

        assert!(store
            .replace_tenant("alice", &passages("x", &["a"]), &[])
            .is_err());
    }

    #[tokio::test]
    async fn test_history_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let session: SessionId = "u1#c1".parse().unwrap();
        let other: SessionId = "u1#c2".parse().unwrap();

        assert!(store.load_history(&session).await.unwrap().is_empty());

        store
            .append_history(&session, &[ConversationTurn::human("hi"), ConversationTurn::ai("hello")])
            .await
            .unwrap();
        store
            .append_history(&session, &[ConversationTurn::human("bye"), ConversationTurn::ai("ciao")])
            .await
            .unwrap();
        store
            .append_history(&other, &[ConversationTurn::human("elsewhere")])
            .await
            .unwrap();

        let history = store.load_history(&session).await.unwrap();
        let contents: Vec<_> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["hi", "hello", "bye", "ciao"]);
        assert_eq!(history[1].role, Role::Ai);

        assert_eq!(store.load_history(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rag.db");
        let session: SessionId = "u#c".parse().unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .append_history(&session, &[ConversationTurn::human("q"), ConversationTurn::ai("a")])
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_history(&session).await.unwrap().len(), 2);
    }
}
