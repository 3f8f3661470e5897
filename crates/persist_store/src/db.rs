use sea_orm::sea_query;
use sea_orm_migration::prelude::Iden;

// Column names the built-in resolution strategies match on.

#[derive(Iden, Clone, Copy)]
pub enum Users {
    Email,
    Username,
}

#[derive(Iden, Clone, Copy)]
pub enum Admins {
    FirstName,
    LastName,
    Email,
    Password,
    Role,
}

#[derive(Iden, Clone, Copy)]
pub enum Companies {
    CompanyName,
    Name,
}

#[derive(Iden, Clone, Copy)]
pub enum Projects {
    Name,
    OwnerId,
}

#[derive(Iden, Clone, Copy)]
pub enum ProjectMembers {
    Table,
    ProjectId,
    UserId,
}

pub fn col_name(column: impl sea_query::Iden) -> String {
    column.to_string()
}
