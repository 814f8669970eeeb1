use crate::models::{ExamType, SearchOutcome, SearchQuery, StudentRecord};

/// In-memory results, rebuilt on every page load.
#[derive(Debug, Default)]
pub struct ResultsIndex {
    records: Vec<StudentRecord>,
}

impl ResultsIndex {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        ResultsIndex { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive substring match on the name, restricted to the query's exam type.
    /// Keeps parse order.
    pub fn search(&self, query: &SearchQuery) -> Vec<&StudentRecord> {
        let needle = query.name_fragment.to_lowercase();
        self.records
            .iter()
            .filter(|record| record.exam_type == query.exam_type && record.name.to_lowercase().contains(&needle))
            .collect()
    }
}

// Runs a search action from raw user input.
pub fn run_search(index: &ResultsIndex, exam_type: ExamType, raw_fragment: &str) -> SearchOutcome {
    let Some(query) = SearchQuery::new(exam_type, raw_fragment) else {
        return SearchOutcome::EmptyQuery;
    };

    let records: Vec<StudentRecord> = index.search(&query).into_iter().cloned().collect();
    if records.is_empty() {
        SearchOutcome::NoMatch { term: query.name_fragment }
    } else {
        SearchOutcome::Matches { term: query.name_fragment, records }
    }
}
