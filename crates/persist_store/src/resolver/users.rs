use async_trait::async_trait;

use pmt_persist_core::{FieldValue, PersistResult, ResolutionContext, is_self_reference};

use super::{Lookup, ResolutionStrategy};
use crate::db::{Users, col_name};

/// `me`/`current`/`self` name the caller; values with an `@` are emails, anything else a username.
pub struct UserStrategy;

#[async_trait]
impl ResolutionStrategy for UserStrategy {
    async fn resolve(
        &self,
        lookup: &Lookup<'_>,
        reference: &str,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>> {
        if is_self_reference(reference) {
            return Ok(context.user_id.map(FieldValue::Uuid));
        }
        let column = if reference.contains('@') {
            col_name(Users::Email)
        } else {
            col_name(Users::Username)
        };
        lookup.first_key_matching(&column, reference).await
    }
}
