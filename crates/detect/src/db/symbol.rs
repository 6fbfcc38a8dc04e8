use super::{Database, SymbolRecord};
use rusqlite::{params, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRecord> {
    Ok(SymbolRecord {
        qualified_name: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        file_path: row.get(4)?,
        range_start: row.get(5)?,
        range_end: row.get(6)?,
        content_hash: row.get(7)?,
        structure_hash: row.get(8)?,
        embedding: row.get(9)?,
        group_id: row.get(10)?,
    })
}

const SYMBOL_COLUMNS: &str = "qualified_name, project_id, name, kind, file_path, \
     range_start, range_end, content_hash, structure_hash, embedding, group_id";

impl Database {
    /// Inserts or refreshes a symbol row.
    ///
    /// An existing embedding survives the upsert when the new row carries
    /// none, and a group assignment survives as long as the structure hash
    /// has not changed.
    pub fn upsert_symbol(&self, record: &SymbolRecord) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO symbols (qualified_name, project_id, name, kind, file_path, \
             range_start, range_end, content_hash, structure_hash, embedding, group_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(qualified_name) DO UPDATE SET \
             project_id = excluded.project_id, \
             name = excluded.name, \
             kind = excluded.kind, \
             file_path = excluded.file_path, \
             range_start = excluded.range_start, \
             range_end = excluded.range_end, \
             content_hash = excluded.content_hash, \
             structure_hash = excluded.structure_hash, \
             embedding = COALESCE(excluded.embedding, symbols.embedding), \
             group_id = CASE WHEN symbols.structure_hash = excluded.structure_hash \
                             THEN symbols.group_id ELSE NULL END",
            params![
                record.qualified_name,
                record.project_id,
                record.name,
                record.kind,
                record.file_path,
                record.range_start,
                record.range_end,
                record.content_hash,
                record.structure_hash,
                record.embedding,
                record.group_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_symbol(&self, qualified_name: &str) -> SqliteResult<Option<SymbolRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {SYMBOL_COLUMNS} FROM symbols WHERE qualified_name = ?1"),
                params![qualified_name],
                row_to_symbol,
            )
            .optional()
    }

    pub fn get_symbols_by_project(&self, project_id: i64) -> SqliteResult<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE project_id = ?1 ORDER BY qualified_name"
        ))?;
        let rows = stmt.query_map(params![project_id], row_to_symbol)?;
        rows.collect()
    }

    pub fn get_all_symbols(&self) -> SqliteResult<Vec<SymbolRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SYMBOL_COLUMNS} FROM symbols ORDER BY qualified_name"))?;
        let rows = stmt.query_map([], row_to_symbol)?;
        rows.collect()
    }

    pub fn get_symbols_by_file(
        &self,
        project_id: i64,
        file_path: &str,
    ) -> SqliteResult<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE project_id = ?1 AND file_path = ?2"
        ))?;
        let rows = stmt.query_map(params![project_id, file_path], row_to_symbol)?;
        rows.collect()
    }

    /// Removes symbols of a file that are not in `keep`, typically because
    /// the symbol was deleted or renamed since the last index run.
    pub fn delete_stale_file_symbols(
        &self,
        project_id: i64,
        file_path: &str,
        keep: &[String],
    ) -> SqliteResult<usize> {
        let stale: Vec<String> = self
            .get_symbols_by_file(project_id, file_path)?
            .into_iter()
            .map(|s| s.qualified_name)
            .filter(|name| !keep.contains(name))
            .collect();
        for name in &stale {
            self.delete_pairs_involving(name)?;
            self.conn.execute(
                "DELETE FROM symbols WHERE qualified_name = ?1",
                params![name],
            )?;
        }
        Ok(stale.len())
    }

    /// Looks up a cached embedding for identical content anywhere in the
    /// registry, so re-indexing unchanged code skips the embedding backend.
    pub fn get_embedding_by_content_hash(
        &self,
        content_hash: &str,
    ) -> SqliteResult<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT embedding FROM symbols \
                 WHERE content_hash = ?1 AND embedding IS NOT NULL LIMIT 1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()
    }

    /// Map of qualified name to content hash for one project, used to tell
    /// changed symbols from unchanged ones on incremental runs.
    pub fn get_content_hashes(&self, project_id: i64) -> SqliteResult<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT qualified_name, content_hash FROM symbols WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect()
    }

    pub fn store_embedding(&self, qualified_name: &str, embedding: &[u8]) -> SqliteResult<()> {
        self.conn.execute(
            "UPDATE symbols SET embedding = ?2 WHERE qualified_name = ?1",
            params![qualified_name, embedding],
        )?;
        Ok(())
    }
}
