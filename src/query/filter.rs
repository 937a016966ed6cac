use crate::error::{FacetError, Result};
use crate::types::Filter;

/// Renders [`Filter`] trees as Elasticsearch Query DSL.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterCompiler;

impl FilterCompiler {
    pub fn new() -> Self {
        FilterCompiler
    }

    const MAX_FILTER_DEPTH: usize = 10;
    const MAX_BOOLEAN_CLAUSES: usize = 1000;

    pub fn compile(&self, filter: &Filter) -> Result<serde_json::Value> {
        let clause_count = self.count_clauses(filter);
        if clause_count > Self::MAX_BOOLEAN_CLAUSES {
            return Err(FacetError::InvalidQuery(format!(
                "Filter has {} clauses, exceeds maximum {}",
                clause_count,
                Self::MAX_BOOLEAN_CLAUSES
            )));
        }
        self.to_query_dsl(filter, 0)
    }

    fn to_query_dsl(&self, filter: &Filter, depth: usize) -> Result<serde_json::Value> {
        if depth > Self::MAX_FILTER_DEPTH {
            return Err(FacetError::InvalidQuery(format!(
                "Filter nesting exceeds {} levels",
                Self::MAX_FILTER_DEPTH
            )));
        }

        match filter {
            Filter::MatchAll => Ok(serde_json::json!({ "match_all": {} })),
            Filter::Equals { field, value } => {
                Ok(serde_json::json!({ "term": { field.as_str(): value.to_json() } }))
            }
            Filter::Terms { field, values } => {
                Ok(serde_json::json!({ "terms": { field.as_str(): values } }))
            }
            Filter::Range { field, gte, lte } => {
                let mut bounds = serde_json::Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_string(), gte.to_json());
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".to_string(), lte.to_json());
                }
                Ok(serde_json::json!({ "range": { field.as_str(): bounds } }))
            }
            Filter::And(filters) => {
                let mut clauses = Vec::with_capacity(filters.len());
                for f in filters {
                    clauses.push(self.to_query_dsl(f, depth + 1)?);
                }
                Ok(serde_json::json!({ "bool": { "filter": clauses } }))
            }
            Filter::Nested {
                path,
                query,
                inner_hits,
            } => {
                let mut nested = serde_json::Map::new();
                nested.insert("path".to_string(), serde_json::json!(path));
                nested.insert("query".to_string(), self.to_query_dsl(query, depth + 1)?);
                nested.insert("score_mode".to_string(), serde_json::json!("none"));
                if let Some(inner) = inner_hits {
                    nested.insert(
                        "inner_hits".to_string(),
                        serde_json::json!({ "name": inner.name, "size": inner.size }),
                    );
                }
                Ok(serde_json::json!({ "nested": nested }))
            }
        }
    }

    fn count_clauses(&self, filter: &Filter) -> usize {
        fn count_recursive(filter: &Filter) -> usize {
            match filter {
                Filter::MatchAll => 0,
                Filter::Equals { .. } | Filter::Range { .. } => 1,
                Filter::Terms { values, .. } => values.len().max(1),
                Filter::Nested { query, .. } => count_recursive(query),
                Filter::And(filters) => filters.iter().map(count_recursive).sum(),
            }
        }
        count_recursive(filter)
    }
}
