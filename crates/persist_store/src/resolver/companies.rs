use async_trait::async_trait;

use pmt_persist_core::{FieldValue, PersistResult, ResolutionContext};

use super::{Lookup, ResolutionStrategy};
use crate::db::{Companies, col_name};

/// The caller's own company wins; otherwise match on the company's name.
pub struct CompanyStrategy;

#[async_trait]
impl ResolutionStrategy for CompanyStrategy {
    async fn resolve(
        &self,
        lookup: &Lookup<'_>,
        reference: &str,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>> {
        if let Some(company_id) = context.company_id {
            return Ok(Some(FieldValue::Uuid(company_id)));
        }
        let by_company_name = col_name(Companies::CompanyName);
        let column = if lookup.has_column(&by_company_name) {
            by_company_name
        } else {
            col_name(Companies::Name)
        };
        lookup.first_key_matching(&column, reference).await
    }
}
