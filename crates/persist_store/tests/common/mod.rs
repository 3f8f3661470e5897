#![allow(dead_code)]

use std::path::Path;

use pmt_persist_store::{PersistConfig, PersistStore, RawRecord, Record};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
use sea_orm_migration::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const FIXTURE_TABLES: [&str; 8] = [
    "admins",
    "announcements",
    "companies",
    "project_members",
    "projects",
    "task_notes",
    "tasks",
    "users",
];

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(FixtureSchema)]
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    UserId,
    Email,
    Username,
    FirstName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Admins {
    Table,
    AdminId,
    FirstName,
    LastName,
    Email,
    Password,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    CompanyId,
    CompanyName,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    ProjectId,
    Name,
    Description,
    OwnerId,
    CompanyId,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectMembers {
    Table,
    MemberId,
    ProjectId,
    UserId,
    Role,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    TaskId,
    ProjectId,
    AssigneeId,
    Title,
    Done,
    DueDate,
}

#[derive(DeriveIden)]
enum TaskNotes {
    Table,
    NoteId,
    TaskId,
    Body,
}

#[derive(DeriveIden)]
enum Announcements {
    Table,
    AnnouncementId,
    Title,
    AdminId,
    PublishedAt,
}

#[derive(DeriveMigrationName)]
struct FixtureSchema;

fn created_at(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for FixtureSchema {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::UserId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Username).string())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(created_at(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Admins::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Admins::AdminId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Admins::FirstName).string())
                    .col(ColumnDef::new(Admins::LastName).string())
                    .col(ColumnDef::new(Admins::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Admins::Password).string())
                    .col(ColumnDef::new(Admins::Role).string())
                    .col(created_at(Admins::CreatedAt))
                    .col(created_at(Admins::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Companies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Companies::CompanyId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Companies::CompanyName).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::ProjectId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(ColumnDef::new(Projects::OwnerId).uuid())
                    .col(ColumnDef::new(Projects::CompanyId).uuid())
                    .col(ColumnDef::new(Projects::Metadata).json_binary())
                    .col(created_at(Projects::CreatedAt))
                    .col(created_at(Projects::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_owner")
                            .from(Projects::Table, Projects::OwnerId)
                            .to(Users::Table, Users::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_company")
                            .from(Projects::Table, Projects::CompanyId)
                            .to(Companies::Table, Companies::CompanyId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectMembers::MemberId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectMembers::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectMembers::UserId).uuid())
                    .col(ColumnDef::new(ProjectMembers::Role).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_members_project")
                            .from(ProjectMembers::Table, ProjectMembers::ProjectId)
                            .to(Projects::Table, Projects::ProjectId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_members_user")
                            .from(ProjectMembers::Table, ProjectMembers::UserId)
                            .to(Users::Table, Users::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::TaskId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tasks::ProjectId).uuid())
                    .col(ColumnDef::new(Tasks::AssigneeId).uuid())
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Done).boolean().not_null().default(false))
                    .col(ColumnDef::new(Tasks::DueDate).date())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::ProjectId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assignee")
                            .from(Tasks::Table, Tasks::AssigneeId)
                            .to(Users::Table, Users::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskNotes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskNotes::NoteId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TaskNotes::TaskId).integer())
                    .col(ColumnDef::new(TaskNotes::Body).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_notes_task")
                            .from(TaskNotes::Table, TaskNotes::TaskId)
                            .to(Tasks::Table, Tasks::TaskId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Announcements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Announcements::AnnouncementId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Announcements::Title).string().not_null())
                    .col(ColumnDef::new(Announcements::AdminId).uuid())
                    .col(ColumnDef::new(Announcements::PublishedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_announcements_admin")
                            .from(Announcements::Table, Announcements::AdminId)
                            .to(Admins::Table, Admins::AdminId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

/// Creates the fixture schema in a fresh SQLite file under `dir` and opens a store on it.
pub async fn open_fixture_store(dir: &Path) -> Result<PersistStore, Box<dyn std::error::Error>> {
    let path = dir.join("fixture.sqlite");
    let conn = Database::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;
    Migrator::up(&conn, None).await?;
    conn.close().await?;
    Ok(PersistStore::connect_sqlite(&path).await?)
}

/// Recreates the fixture schema on the Postgres database at `url`. Every table in it is dropped.
pub async fn open_postgres_fixture_store(
    url: &str,
    dir: &Path,
) -> Result<PersistStore, Box<dyn std::error::Error>> {
    let conn = Database::connect(url).await?;
    Migrator::fresh(&conn).await?;
    conn.close().await?;
    Ok(PersistStore::connect(&PersistConfig::postgres(url), dir).await?)
}

pub fn record(value: JsonValue) -> RawRecord {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("fixture record must be an object, got {other}"),
    }
}

pub fn text<'r>(row: &'r Record, column: &str) -> &'r str {
    row.get(column)
        .and_then(JsonValue::as_str)
        .unwrap_or_else(|| panic!("{column} should be text in {row:?}"))
}

pub fn uuid_of(row: &Record, column: &str) -> Uuid {
    Uuid::parse_str(text(row, column)).expect("uuid column")
}

pub async fn count_where(
    store: &PersistStore,
    table: &str,
    column: &str,
    value: &str,
) -> Result<i64, Box<dyn std::error::Error>> {
    let backend = store.backend();
    let placeholder = match backend {
        DatabaseBackend::Postgres => "$1",
        _ => "?",
    };
    let sql = format!(r#"SELECT COUNT(*) AS n FROM "{table}" WHERE "{column}" = {placeholder}"#);
    let row = store
        .connection()
        .query_one_raw(Statement::from_sql_and_values(backend, sql, [value.into()]))
        .await?
        .ok_or("count returned no row")?;
    Ok(row.try_get::<i64>("", "n")?)
}

pub async fn count_rows(
    store: &PersistStore,
    table: &str,
) -> Result<i64, Box<dyn std::error::Error>> {
    let backend = store.backend();
    let sql = format!(r#"SELECT COUNT(*) AS n FROM "{table}""#);
    let row = store
        .connection()
        .query_one_raw(Statement::from_string(backend, sql))
        .await?
        .ok_or("count returned no row")?;
    Ok(row.try_get::<i64>("", "n")?)
}
