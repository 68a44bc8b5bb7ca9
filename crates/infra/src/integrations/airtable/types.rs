/// Records API wire types
use flowsync_domain::StoredRecord;
use serde::{Deserialize, Serialize};

/// Response body of list, create and update calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsResponse {
    #[serde(default)]
    pub records: Vec<StoredRecord>,
    /// Cursor for the next page of a list call
    #[serde(default)]
    pub offset: Option<String>,
}

/// Query options for listing records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecordsOptions {
    pub max_records: Option<usize>,
    pub view: Option<String>,
    pub filter_by_formula: Option<String>,
}

impl ListRecordsOptions {
    pub fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn filter_by_formula(mut self, formula: impl Into<String>) -> Self {
        self.filter_by_formula = Some(formula.into());
        self
    }

    /// Query-string pairs in the API's parameter names
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(max_records) = self.max_records {
            query.push(("maxRecords", max_records.to_string()));
        }
        if let Some(view) = &self.view {
            query.push(("view", view.clone()));
        }
        if let Some(formula) = &self.filter_by_formula {
            query.push(("filterByFormula", formula.clone()));
        }
        query
    }
}

/// Which batch endpoint a write goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}
