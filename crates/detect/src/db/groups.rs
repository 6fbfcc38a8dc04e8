use super::{Database, GroupRecord, ProjectStats};
use rusqlite::{params, Result as SqliteResult};

impl Database {
    pub fn create_group(
        &self,
        project_id: i64,
        name: &str,
        reason: Option<&str>,
        pattern: Option<&str>,
    ) -> SqliteResult<i64> {
        self.conn.execute(
            "INSERT INTO similarity_groups (project_id, name, reason, pattern) \
             VALUES (?1, ?2, ?3, ?4)",
            params![project_id, name, reason, pattern],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Assigns a symbol to a group. Pairs inside the same group are treated
    /// as intentional and suppressed from scan results.
    pub fn add_to_group(&self, group_id: i64, qualified_name: &str) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE symbols SET group_id = ?1 WHERE qualified_name = ?2",
            params![group_id, qualified_name],
        )?;
        Ok(changed > 0)
    }

    pub fn get_groups(&self) -> SqliteResult<Vec<GroupRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.project_id, g.name, g.reason, g.pattern, \
             (SELECT COUNT(*) FROM symbols s WHERE s.group_id = g.id) \
             FROM similarity_groups g ORDER BY g.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GroupRecord {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                reason: row.get(3)?,
                pattern: row.get(4)?,
                member_count: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    pub fn get_group_members(&self, group_id: i64) -> SqliteResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT qualified_name FROM symbols WHERE group_id = ?1 ORDER BY qualified_name",
        )?;
        let rows = stmt.query_map(params![group_id], |row| row.get(0))?;
        rows.collect()
    }

    pub fn get_stats(&self) -> SqliteResult<ProjectStats> {
        let count = |sql: &str| -> SqliteResult<i64> {
            self.conn.query_row(sql, [], |row| row.get(0))
        };
        Ok(ProjectStats {
            projects: count("SELECT COUNT(*) FROM projects")?,
            symbols: count("SELECT COUNT(*) FROM symbols")?,
            embedded: count("SELECT COUNT(*) FROM symbols WHERE embedding IS NOT NULL")?,
            pairs: count("SELECT COUNT(*) FROM similar_pairs")?,
            groups: count("SELECT COUNT(*) FROM similarity_groups")?,
        })
    }
}
