use std::fmt;
use std::str::FromStr;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Exam families offered by the results lookup selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "gce-o")]
    GceO,
    #[default]
    #[serde(rename = "gce-a")]
    GceA,
}

impl ExamType {
    pub fn code(self) -> &'static str {
        match self {
            ExamType::GceO => "gce-o",
            ExamType::GceA => "gce-a",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ExamType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "gce-o" => Ok(ExamType::GceO),
            "gce-a" => Ok(ExamType::GceA),
            other => Err(anyhow!("Unknown exam type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Subject {
    pub code: String,
    pub grade: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub name: String,
    pub subjects: Vec<Subject>,
    pub exam_type: ExamType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub exam_type: ExamType,
    pub name_fragment: String,
}

impl SearchQuery {
    // Returns None for blank input, which never reaches the index.
    pub fn new(exam_type: ExamType, raw_fragment: &str) -> Option<Self> {
        let name_fragment = raw_fragment.trim();
        if name_fragment.is_empty() {
            return None;
        }
        Some(SearchQuery { exam_type, name_fragment: name_fragment.to_string() })
    }
}

/// What the results container shows after a search action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    EmptyQuery,
    NoMatch { term: String },
    Matches { term: String, records: Vec<StudentRecord> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetState {
    Pending,
    Ready(usize),
    Failed(String),
}
