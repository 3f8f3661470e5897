use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, OnConflict, Query, SimpleExpr};
use uuid::Uuid;

use pmt_persist_core::{
    ColumnKind, FieldValue, PersistError, PersistResult, ResolutionContext,
};

use super::{Lookup, ResolutionStrategy};
use crate::db::{Admins, col_name};
use crate::sql::exec;

const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

/// Resolves admin references, creating the referenced admin when there is none.
///
/// An elevated caller resolves to their own admin row, created from the context on first use.
/// An email resolves by lookup only. Anything else resolves to an existing admin, or to a
/// default admin created when the table is empty. Creation is an insert that does nothing when
/// the email already exists; the key is then read back by email so racing callers agree on it.
pub struct AdminStrategy;

struct AdminSeed<'s> {
    first_name: &'s str,
    last_name: &'s str,
    email: &'s str,
    role: &'s str,
}

#[async_trait]
impl ResolutionStrategy for AdminStrategy {
    async fn resolve(
        &self,
        lookup: &Lookup<'_>,
        reference: &str,
        context: &ResolutionContext,
    ) -> PersistResult<Option<FieldValue>> {
        let email_column = col_name(Admins::Email);

        if context.is_elevated()
            && let Some(email) = context.email.as_deref()
            && lookup.has_column(&email_column)
        {
            if let Some(existing) = lookup.first_key_matching(&email_column, email).await? {
                return Ok(Some(existing));
            }
            let (first_name, last_name) = context.display_names();
            let role = lookup
                .admin_defaults()
                .created_role
                .as_deref()
                .unwrap_or("admin");
            let seed = AdminSeed {
                first_name: &first_name,
                last_name: &last_name,
                email,
                role,
            };
            create_if_absent(lookup, &seed).await?;
            log::info!("persist: ensured admin row for {email}");
            return lookup.first_key_matching(&email_column, email).await;
        }

        if reference.contains('@') {
            return lookup.first_key_matching(&email_column, reference).await;
        }

        ensure_default_admin(lookup).await
    }
}

async fn ensure_default_admin(lookup: &Lookup<'_>) -> PersistResult<Option<FieldValue>> {
    if let Some(existing) = lookup.first_key(None).await? {
        return Ok(Some(existing));
    }
    let defaults = lookup.admin_defaults();
    let email = defaults
        .default_email
        .as_deref()
        .unwrap_or("admin@system.local");
    let seed = AdminSeed {
        first_name: defaults.default_first_name.as_deref().unwrap_or("System"),
        last_name: defaults.default_last_name.as_deref().unwrap_or("Admin"),
        email,
        role: defaults.default_role.as_deref().unwrap_or("super_admin"),
    };
    create_if_absent(lookup, &seed).await?;
    log::info!("persist: created default admin {email}");
    let email_column = col_name(Admins::Email);
    if lookup.has_column(&email_column) {
        return lookup.first_key_matching(&email_column, email).await;
    }
    lookup.first_key(None).await
}

// Only columns present on the live admins table are written.
async fn create_if_absent(lookup: &Lookup<'_>, seed: &AdminSeed<'_>) -> PersistResult<()> {
    let defaults = lookup.admin_defaults();
    let password = defaults.placeholder_password.as_deref().unwrap_or("!unset");
    let mut columns: Vec<Alias> = Vec::new();
    let mut values: Vec<SimpleExpr> = Vec::new();

    let key = lookup.key();
    if key.kind == ColumnKind::Uuid {
        columns.push(Alias::new(key.name.as_str()));
        values.push(lookup.bind(&key.name, &FieldValue::Uuid(Uuid::new_v4())).into());
    }
    let text_fields = [
        (col_name(Admins::FirstName), seed.first_name),
        (col_name(Admins::LastName), seed.last_name),
        (col_name(Admins::Email), seed.email),
        (col_name(Admins::Password), password),
        (col_name(Admins::Role), seed.role),
    ];
    for (column, value) in &text_fields {
        if lookup.has_column(column) {
            columns.push(Alias::new(column.as_str()));
            values.push(lookup.bind_text(column, value).into());
        }
    }
    for column in TIMESTAMP_COLUMNS {
        if lookup.has_column(column) {
            columns.push(Alias::new(column));
            values.push(Expr::current_timestamp().into());
        }
    }

    let table = lookup.foreign().table_name.as_str();
    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(table))
        .columns(columns)
        .values(values)
        .map_err(|err| PersistError::storage(err.to_string()))?;
    let email_column = col_name(Admins::Email);
    if lookup.has_column(&email_column) {
        insert.on_conflict(
            OnConflict::column(Alias::new(email_column.as_str()))
                .do_nothing()
                .to_owned(),
        );
    }
    exec(lookup.connection(), &insert).await?;
    Ok(())
}
