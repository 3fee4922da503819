//! The [`ProviderGateway`] trait: uniform, total-function access to the two
//! external capabilities (§4.1). Every concrete implementation (mock, live
//! HTTP) enforces the same input validation before doing any I/O.

use crate::types::{CompleteTextRequest, CompleteTextResponse, SearchHit, SearchWebRequest};
use async_trait::async_trait;
use research_core::error::{ResearchError, Result};

/// Validate the shared input contract: non-empty prompt, `max-results` in
/// `[1, 50]`. Model-role validity is enforced by the type system
/// ([`research_core::model::ModelRole`] is a closed enum), so it needs no
/// runtime check here.
pub fn validate_complete_text(request: &CompleteTextRequest) -> Result<()> {
    if request.prompt.trim().is_empty() {
        return Err(ResearchError::InputError(
            "complete-text prompt must not be empty".into(),
        ));
    }
    Ok(())
}

/// Validate a `search-web` request.
pub fn validate_search_web(request: &SearchWebRequest) -> Result<()> {
    if request.query.trim().is_empty() {
        return Err(ResearchError::InputError(
            "search-web query must not be empty".into(),
        ));
    }
    if !(1..=50).contains(&request.max_results) {
        return Err(ResearchError::InputError(format!(
            "max-results must be in [1, 50], got {}",
            request.max_results
        )));
    }
    Ok(())
}

/// Uniform access to the two provider capabilities. Implementations must
/// never let an unmodeled panic or ambiguous exception escape this
/// boundary; every terminal failure comes back as a [`ResearchError`].
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// `complete-text(prompt, model-role, schema?)`. When `schema` is set on
    /// the request, the returned `parsed` field is guaranteed `Some` (the
    /// gateway exhausts its repair retries and returns
    /// `ResearchError::ProviderShapeError` rather than returning `None`).
    async fn complete_text(&self, request: CompleteTextRequest) -> Result<CompleteTextResponse>;

    /// `search-web(query, max-results)`.
    async fn search_web(&self, request: SearchWebRequest) -> Result<Vec<SearchHit>>;

    /// Whether this gateway instance is operating without credentials.
    fn is_mock(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_prompt() {
        let req = CompleteTextRequest::free_text("   ", research_core::model::ModelRole::Planner);
        assert!(validate_complete_text(&req).is_err());
    }

    #[test]
    fn rejects_out_of_range_max_results() {
        let req = SearchWebRequest {
            query: "q".into(),
            max_results: 0,
        };
        assert!(validate_search_web(&req).is_err());
        let req = SearchWebRequest {
            query: "q".into(),
            max_results: 51,
        };
        assert!(validate_search_web(&req).is_err());
    }

    #[test]
    fn accepts_boundary_max_results() {
        for n in [1, 50] {
            let req = SearchWebRequest {
                query: "q".into(),
                max_results: n,
            };
            assert!(validate_search_web(&req).is_ok());
        }
    }
}
