//! MySQL database and user resources
//!
//! Statements go through the `mysql` client on stdin with the password in
//! `MYSQL_PWD`, so nothing secret appears on a command line.

use anyhow::{Context, Result};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// How to reach the server as an administrative user
#[derive(Debug, Clone)]
pub struct MysqlConnection {
    pub host: String,
    pub user: String,
    pub password: Option<String>,
}

impl MysqlConnection {
    pub fn new(host: &str, user: &str, password: Option<&str>) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            password: password.map(String::from),
        }
    }

    /// Run SQL and return the tab-separated result rows
    pub fn query(&self, sql: &str) -> Result<String> {
        let envs: Vec<(&str, &str)> = self
            .password
            .as_deref()
            .map(|pw| vec![("MYSQL_PWD", pw)])
            .unwrap_or_default();

        runner::run_with_input(
            "mysql",
            &["--batch", "--skip-column-names", "-h", &self.host, "-u", &self.user],
            &envs,
            sql,
        )
        .with_context(|| format!("MySQL query as {}@{} failed", self.user, self.host))
    }

    /// Whether `user` can log in with `password`
    pub fn can_login(&self, user: &str, password: &str) -> bool {
        runner::run_quiet_env(
            "mysql",
            &["-h", &self.host, "-u", user, "-e", "SELECT 1"],
            &[("MYSQL_PWD", password)],
        )
    }
}

/// Quote a string literal
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Quote an identifier (database name)
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape `%` and `_` so a LIKE pattern matches literally
fn like_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A database that must exist
#[derive(Debug, Clone)]
pub struct MysqlDatabase {
    pub name: String,
    pub connection: MysqlConnection,
}

impl MysqlDatabase {
    pub fn new(name: &str, connection: MysqlConnection) -> Self {
        Self {
            name: name.to_string(),
            connection,
        }
    }

    fn exists(&self) -> Result<bool> {
        let rows = self.connection.query(&format!(
            "SHOW DATABASES LIKE {};",
            quote(&like_literal(&self.name))
        ))?;
        Ok(rows.lines().any(|row| row.trim() == self.name))
    }
}

impl Resource for MysqlDatabase {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("MySQL database {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "mysql_database"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.exists()? {
            Ok(ResourceState::present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.connection.query(&create_database_sql(&self.name))?;
        Ok(ApplyResult::Created)
    }
}

fn create_database_sql(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {};", quote_ident(name))
}

/// A database user with all privileges on one database
#[derive(Debug, Clone)]
pub struct MysqlUser {
    pub user: String,
    pub password: String,
    /// Host the user connects from
    pub host: String,
    pub database: String,
    pub connection: MysqlConnection,
}

impl MysqlUser {
    pub fn new(
        user: &str,
        password: &str,
        host: &str,
        database: &str,
        connection: MysqlConnection,
    ) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            database: database.to_string(),
            connection,
        }
    }

    fn account(&self) -> String {
        format!("{}@{}", quote(&self.user), quote(&self.host))
    }

    fn has_grant(&self) -> Result<bool> {
        let rows = self.connection.query(&format!(
            "SELECT 1 FROM mysql.db WHERE User = {} AND Host = {} AND Db = {};",
            quote(&self.user),
            quote(&self.host),
            quote(&self.database)
        ))?;
        Ok(!rows.is_empty())
    }
}

fn grant_sql(user: &MysqlUser) -> String {
    let account = user.account();
    let password = quote(&user.password);
    format!(
        "CREATE USER IF NOT EXISTS {account} IDENTIFIED BY {password};\n\
         ALTER USER {account} IDENTIFIED BY {password};\n\
         GRANT ALL PRIVILEGES ON {}.* TO {account};\n\
         FLUSH PRIVILEGES;\n",
        quote_ident(&user.database)
    )
}

impl Resource for MysqlUser {
    fn id(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn description(&self) -> String {
        format!(
            "Grant all on {} to {}@{}",
            self.database, self.user, self.host
        )
    }

    fn resource_type(&self) -> &'static str {
        "mysql_user"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.has_grant()? {
            return Ok(ResourceState::Absent);
        }
        if !self.connection.can_login(&self.user, &self.password) {
            return Ok(ResourceState::Modified {
                from: "password differs".to_string(),
                to: "configured password".to_string(),
            });
        }
        Ok(ResourceState::present())
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.connection.query(&grant_sql(self))?;
        Ok(ApplyResult::Modified)
    }
}
