use serde::{Deserialize, Serialize};

/// Review status of a stored similar pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    New,
    Confirmed,
    Redundant,
    Ignored,
}

impl PairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairStatus::New => "new",
            PairStatus::Confirmed => "confirmed",
            PairStatus::Redundant => "redundant",
            PairStatus::Ignored => "ignored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(PairStatus::New),
            "confirmed" => Some(PairStatus::Confirmed),
            "redundant" => Some(PairStatus::Redundant),
            "ignored" => Some(PairStatus::Ignored),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub root_path: String,
    pub last_indexed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub qualified_name: String,
    pub project_id: i64,
    pub name: String,
    pub kind: String,
    pub file_path: String,
    pub range_start: u32,
    pub range_end: u32,
    pub content_hash: String,
    pub structure_hash: String,
    pub embedding: Option<Vec<u8>>,
    pub group_id: Option<i64>,
}

/// Similar pair joined with the location of both symbols.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPairRecord {
    pub id: i64,
    pub unit_a: String,
    pub unit_b: String,
    pub score: f32,
    pub comparison: String,
    pub confidence: f32,
    pub status: String,
    pub reason: Option<String>,
    pub file_a: String,
    pub start_a: u32,
    pub end_a: u32,
    pub file_b: String,
    pub start_b: u32,
    pub end_b: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub reason: Option<String>,
    pub pattern: Option<String>,
    pub member_count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectStats {
    pub projects: i64,
    pub symbols: i64,
    pub embedded: i64,
    pub pairs: i64,
    pub groups: i64,
}
