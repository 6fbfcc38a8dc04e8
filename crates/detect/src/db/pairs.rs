use super::{Database, PairStatus, SimilarPairRecord};
use rusqlite::{params, Result as SqliteResult};

fn order_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Database {
    /// Stores a pair keyed by the lexically ordered qualified names.
    ///
    /// On conflict the score, comparison and confidence are refreshed but a
    /// reviewed status (confirmed, redundant, ignored) is kept.
    pub fn upsert_similar_pair(
        &self,
        unit_a: &str,
        unit_b: &str,
        score: f32,
        comparison: &str,
        confidence: f32,
    ) -> SqliteResult<()> {
        let (a, b) = order_pair(unit_a, unit_b);
        self.conn.execute(
            "INSERT INTO similar_pairs (unit_a, unit_b, score, comparison, confidence) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(unit_a, unit_b) DO UPDATE SET \
             score = excluded.score, \
             comparison = excluded.comparison, \
             confidence = excluded.confidence",
            params![a, b, score, comparison, confidence],
        )?;
        Ok(())
    }

    /// Batch variant of [`Database::upsert_similar_pair`] in one transaction.
    pub fn upsert_similar_pairs(
        &mut self,
        pairs: &[(String, String, f32, String, f32)],
    ) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO similar_pairs (unit_a, unit_b, score, comparison, confidence) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(unit_a, unit_b) DO UPDATE SET \
                 score = excluded.score, \
                 comparison = excluded.comparison, \
                 confidence = excluded.confidence",
            )?;
            for (unit_a, unit_b, score, comparison, confidence) in pairs {
                let (a, b) = order_pair(unit_a, unit_b);
                stmt.execute(params![a, b, score, comparison, confidence])?;
            }
        }
        tx.commit()
    }

    pub fn get_similar_pairs(
        &self,
        status: Option<PairStatus>,
        min_score: f32,
        limit: usize,
    ) -> SqliteResult<Vec<SimilarPairRecord>> {
        let status_filter = match status {
            Some(_) => " AND p.status = ?2",
            None => "",
        };
        let sql = format!(
            "SELECT p.id, p.unit_a, p.unit_b, p.score, p.comparison, p.confidence, \
             p.status, p.reason, \
             sa.file_path, sa.range_start, sa.range_end, \
             sb.file_path, sb.range_start, sb.range_end \
             FROM similar_pairs p \
             JOIN symbols sa ON sa.qualified_name = p.unit_a \
             JOIN symbols sb ON sb.qualified_name = p.unit_b \
             WHERE p.score >= ?1{status_filter} \
             ORDER BY p.score DESC LIMIT {limit}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let map = |row: &rusqlite::Row<'_>| {
            Ok(SimilarPairRecord {
                id: row.get(0)?,
                unit_a: row.get(1)?,
                unit_b: row.get(2)?,
                score: row.get(3)?,
                comparison: row.get(4)?,
                confidence: row.get(5)?,
                status: row.get(6)?,
                reason: row.get(7)?,
                file_a: row.get(8)?,
                start_a: row.get(9)?,
                end_a: row.get(10)?,
                file_b: row.get(11)?,
                start_b: row.get(12)?,
                end_b: row.get(13)?,
            })
        };
        let rows = match status {
            Some(s) => stmt
                .query_map(params![min_score, s.as_str()], map)?
                .collect::<SqliteResult<Vec<_>>>()?,
            None => stmt
                .query_map(params![min_score], map)?
                .collect::<SqliteResult<Vec<_>>>()?,
        };
        Ok(rows)
    }

    pub fn update_pair_status(
        &self,
        unit_a: &str,
        unit_b: &str,
        status: PairStatus,
        reason: Option<&str>,
    ) -> SqliteResult<bool> {
        let (a, b) = order_pair(unit_a, unit_b);
        let changed = self.conn.execute(
            "UPDATE similar_pairs SET status = ?3, reason = ?4 \
             WHERE unit_a = ?1 AND unit_b = ?2",
            params![a, b, status.as_str(), reason],
        )?;
        Ok(changed > 0)
    }

    /// Returns the stored ignored pairs as ordered name tuples.
    pub fn get_ignored_pairs(&self) -> SqliteResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT unit_a, unit_b FROM similar_pairs WHERE status = 'ignored'")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    pub fn delete_pairs_involving(&self, qualified_name: &str) -> SqliteResult<usize> {
        self.conn.execute(
            "DELETE FROM similar_pairs WHERE unit_a = ?1 OR unit_b = ?1",
            params![qualified_name],
        )
    }
}
