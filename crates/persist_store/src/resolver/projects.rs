use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Condition, Expr, ExprTrait, Query};

use pmt_persist_core::{FieldValue, PersistResult, ResolutionContext};

use super::{Lookup, ResolutionStrategy};
use crate::db::{ProjectMembers, Projects, col_name};
use crate::sql::sea_value;

/// Matches a project by name among the projects the caller owns or is a member of.
///
/// Without a calling user nothing resolves. When the schema carries neither an owner column
/// nor a membership table the name alone decides.
pub struct ProjectStrategy;

#[async_trait]
impl ResolutionStrategy for ProjectStrategy {
    async fn resolve(
        &self,
        lookup: &Lookup<'_>,
        reference: &str,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>> {
        let Some(user_id) = context.user_id else {
            return Ok(None);
        };
        let name = col_name(Projects::Name);
        if !lookup.has_column(&name) {
            return Ok(None);
        }
        let caller = FieldValue::Uuid(user_id);

        let mut access = Condition::any();
        let mut constrained = false;
        let owner = col_name(Projects::OwnerId);
        if lookup.has_column(&owner) {
            let owned = Expr::col(Alias::new(owner.as_str())).eq(lookup.bind(&owner, &caller));
            access = access.add(owned);
            constrained = true;
        }
        if let Some(members) = lookup
            .catalog()
            .get(&col_name(ProjectMembers::Table))
            .await?
            && members.has_column(&col_name(ProjectMembers::ProjectId))
            && let Some(member) = members.column(&col_name(ProjectMembers::UserId))
        {
            let memberships = Query::select()
                .column(ProjectMembers::ProjectId)
                .from(ProjectMembers::Table)
                .and_where(
                    Expr::col(ProjectMembers::UserId)
                        .eq(sea_value(lookup.backend(), member.kind, &caller)),
                )
                .to_owned();
            let shared = Expr::col(Alias::new(lookup.key().name.as_str())).in_subquery(memberships);
            access = access.add(shared);
            constrained = true;
        }

        let mut condition = Condition::all()
            .add(Expr::col(Alias::new(name.as_str())).eq(lookup.bind_text(&name, reference)));
        if constrained {
            condition = condition.add(access);
        }
        lookup.first_key(Some(condition)).await
    }
}
