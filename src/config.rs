//! Desired-state file (`hearth.toml`)

use anyhow::{Context, Result, bail};
use phpconfig::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::secret;
use crate::settings::{ADMIN_PASSWORD, DB_PASSWORD};

/// Everything the operator declares about the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearthConfig {
    #[serde(default)]
    pub app: AppConfig,
    /// Values merged into the application's `config.php`
    #[serde(default)]
    pub config: PhpConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_download_url")]
    pub download_url: String,
    #[serde(default = "default_www_dir")]
    pub www_dir: String,
    /// Where the archive unpacks to, defaults to `<www_dir>/owncloud`
    #[serde(default)]
    pub dir: Option<String>,
    /// Defaults to `<dir>/data`
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_web_user")]
    pub web_user: String,
    #[serde(default = "default_web_user")]
    pub web_group: String,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default = "default_apache_modules")]
    pub apache_modules: Vec<String>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// URL requested once after autoconfig is written
    #[serde(default = "default_setup_url")]
    pub setup_url: String,
    #[serde(default = "default_apache_service")]
    pub apache_service: String,
    #[serde(default = "default_apache_dir")]
    pub apache_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_url: default_download_url(),
            www_dir: default_www_dir(),
            dir: None,
            data_dir: None,
            server_name: default_server_name(),
            ssl: false,
            web_user: default_web_user(),
            web_group: default_web_user(),
            packages: default_packages(),
            apache_modules: default_apache_modules(),
            cache_dir: default_cache_dir(),
            setup_url: default_setup_url(),
            apache_service: default_apache_service(),
            apache_dir: default_apache_dir(),
        }
    }
}

impl AppConfig {
    pub fn www_dir(&self) -> PathBuf {
        paths::expand(&self.www_dir)
    }

    pub fn app_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => paths::expand(dir),
            None => self.www_dir().join("owncloud"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => paths::expand(dir),
            None => self.app_dir().join("data"),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        paths::expand(&self.cache_dir)
    }

    pub fn apache_dir(&self) -> PathBuf {
        paths::expand(&self.apache_dir)
    }

    /// Last path segment of the download URL, without query string
    pub fn archive_name(&self) -> &str {
        let url = self.download_url.split(['?', '#']).next().unwrap_or_default();
        url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
    }
}

/// The `[config]` section
///
/// Known keys are typed; anything else is passed through to `config.php`
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhpConfig {
    #[serde(default = "default_dbtype")]
    pub dbtype: String,
    #[serde(default = "default_db_name")]
    pub dbname: String,
    #[serde(default = "default_db_name")]
    pub dbuser: String,
    #[serde(default)]
    pub dbpassword: Option<String>,
    #[serde(default = "default_host")]
    pub dbhost: String,
    #[serde(default)]
    pub dbtableprefix: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for PhpConfig {
    fn default() -> Self {
        Self {
            dbtype: default_dbtype(),
            dbname: default_db_name(),
            dbuser: default_db_name(),
            dbpassword: None,
            dbhost: default_host(),
            dbtableprefix: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_user")]
    pub user: String,
    #[serde(default)]
    pub pass: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: default_admin_user(),
            pass: None,
        }
    }
}

/// Connection used to create the database and grant the app user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_mysql_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_mysql_user(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secret_length")]
    pub length: usize,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            length: default_secret_length(),
        }
    }
}

fn default_download_url() -> String {
    "https://download.owncloud.org/community/owncloud-latest.tar.bz2".to_string()
}

fn default_www_dir() -> String {
    "/var/www".to_string()
}

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_web_user() -> String {
    "www-data".to_string()
}

fn default_packages() -> Vec<String> {
    ["apache2", "libapache2-mod-php5", "mysql-server", "php5", "php5-mysql", "php5-gd"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_dir() -> String {
    "/var/cache/hearth".to_string()
}

fn default_setup_url() -> String {
    "http://localhost/".to_string()
}

fn default_apache_service() -> String {
    "apache2".to_string()
}

fn default_apache_dir() -> String {
    "/etc/apache2".to_string()
}

fn default_dbtype() -> String {
    "mysql".to_string()
}

fn default_db_name() -> String {
    "owncloud".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_apache_modules() -> Vec<String> {
    vec!["php5".to_string()]
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_secret_length() -> usize {
    secret::DEFAULT_LENGTH
}

impl HearthConfig {
    /// Load and validate the desired-state file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        log::debug!("Loaded desired state from {}", path.display());
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app.download_url.trim().is_empty() {
            bail!("app.download_url must not be empty");
        }
        if self.app.archive_name().is_empty() {
            bail!("app.download_url has no file name: {}", self.app.download_url);
        }
        if self.config.dbtype.trim().is_empty() {
            bail!("config.dbtype must not be empty");
        }
        if self.secrets.length == 0 {
            bail!("secrets.length must be greater than zero");
        }
        Ok(())
    }

    /// Whether the database is MySQL and needs a database and user
    pub fn uses_mysql(&self) -> bool {
        self.config.dbtype == "mysql"
    }

    /// Secret supplied by the operator for a settings key
    pub fn operator_secret(&self, key: &str) -> Option<&str> {
        match key {
            DB_PASSWORD => self.config.dbpassword.as_deref(),
            ADMIN_PASSWORD => self.admin.pass.as_deref(),
            _ => None,
        }
    }

    /// Values to merge into `config.php`
    pub fn php_values(&self, db_password: &str) -> BTreeMap<String, Value> {
        let mut values: BTreeMap<String, Value> = self
            .config
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), toml_to_php(value)))
            .collect();

        values.insert("dbtype".into(), self.config.dbtype.as_str().into());
        values.insert("dbname".into(), self.config.dbname.as_str().into());
        values.insert("dbuser".into(), self.config.dbuser.as_str().into());
        values.insert("dbpassword".into(), db_password.into());
        values.insert("dbhost".into(), self.config.dbhost.as_str().into());
        values.insert(
            "dbtableprefix".into(),
            self.config.dbtableprefix.as_str().into(),
        );
        values
    }
}

/// Convert a TOML value to its PHP config equivalent
pub fn toml_to_php(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_php).collect()),
        toml::Value::Table(table) => Value::from_pairs(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_php(v)))
                .collect(),
        ),
    }
}
