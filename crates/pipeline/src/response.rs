//! Response assembly

use serde::Serialize;

use localfind_core::{PipelineTelemetry, QueryAnalysis};
use localfind_retrieval::RankedBusiness;

/// Pagination over the full ranked match list.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    /// Total matches before windowing
    pub total: usize,
    pub page_size: usize,
    pub offset: usize,
}

/// The full result of one query.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RankedBusiness>,
    pub pagination: Pagination,
    pub analysis: QueryAnalysis,
    pub performance: PipelineTelemetry,
}

impl SearchResponse {
    /// Window a ranked list into a response page.
    pub fn paginate(
        ranked: Vec<RankedBusiness>,
        page_size: usize,
        offset: usize,
        analysis: QueryAnalysis,
        performance: PipelineTelemetry,
    ) -> Self {
        let total = ranked.len();
        let results: Vec<RankedBusiness> =
            ranked.into_iter().skip(offset).take(page_size).collect();
        Self {
            results,
            pagination: Pagination {
                total,
                page_size,
                offset,
            },
            analysis,
            performance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localfind_core::QueryAnalysis;

    #[test]
    fn test_pagination_windows_and_totals() {
        let analysis = QueryAnalysis::fallback("q", "general");
        let response = SearchResponse::paginate(
            Vec::new(),
            20,
            0,
            analysis,
            PipelineTelemetry::new(),
        );
        assert_eq!(response.pagination.total, 0);
        assert_eq!(response.pagination.page_size, 20);
        assert!(response.results.is_empty());
    }
}
