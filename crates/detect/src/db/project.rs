use super::{Database, ProjectRecord};
use rusqlite::{params, OptionalExtension, Result as SqliteResult};

impl Database {
    /// Returns the project id for `root_path`, creating the row if needed.
    pub fn get_or_create_project(&self, name: &str, root_path: &str) -> SqliteResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM projects WHERE root_path = ?1",
                params![root_path],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO projects (name, root_path) VALUES (?1, ?2)",
            params![name, root_path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_project_indexed_time(&self, project_id: i64) -> SqliteResult<()> {
        self.conn.execute(
            "UPDATE projects SET last_indexed_at = datetime('now') WHERE id = ?1",
            params![project_id],
        )?;
        Ok(())
    }

    pub fn get_all_projects(&self) -> SqliteResult<Vec<ProjectRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, root_path, last_indexed_at FROM projects ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                root_path: row.get(2)?,
                last_indexed_at: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    pub fn get_project_by_path(&self, root_path: &str) -> SqliteResult<Option<ProjectRecord>> {
        self.conn
            .query_row(
                "SELECT id, name, root_path, last_indexed_at FROM projects WHERE root_path = ?1",
                params![root_path],
                |row| {
                    Ok(ProjectRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        root_path: row.get(2)?,
                        last_indexed_at: row.get(3)?,
                    })
                },
            )
            .optional()
    }
}
