//! The provisioning recipe: which resources exist, in which order, and who
//! notifies whom.

use anyhow::Result;
use declarative::{Action, ExecutionPlan, Timing};
use phpconfig::{Value, writer};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::HearthConfig;
use crate::resource::template::render;
use crate::resource::{
    ApacheModule, ApplyConfig, Archive, Directory, HttpRequest, MysqlConnection, MysqlDatabase,
    MysqlUser, Ownership, Package, RemoteFile, Service, Template, WebApp,
};
use crate::secret::generate_secure_password;
use crate::settings::{
    ADMIN_PASSWORD, DB_PASSWORD, INSTANCE_ID, PASSWORD_SALT, SOLO_REQUIRED, SettingsError,
    SettingsStore,
};

const VHOST_TEMPLATE: &str = include_str!("templates/vhost.conf");

/// Values the application writes into `config.php` during setup and that
/// are kept in the settings store, as `(config key, settings key)`
pub const CAPTURED: &[(&str, &str)] = &[
    ("passwordsalt", PASSWORD_SALT),
    ("instanceid", INSTANCE_ID),
];

const SITE_NAME: &str = "owncloud";
const SSL_SITE_NAME: &str = "owncloud-ssl";
const SSL_CERT_PACKAGE: &str = "ssl-cert";

/// Passwords used in this run
#[derive(Debug, Clone)]
pub struct Secrets {
    pub db_password: String,
    pub admin_password: String,
}

/// Decide the passwords for this run.
///
/// Operator values win. Otherwise a stored value is reused, and only when
/// there is none a new one is generated and stored. In solo mode every
/// password must come from the operator.
pub fn resolve_secrets(
    config: &HearthConfig,
    settings: &mut SettingsStore,
) -> Result<Secrets, SettingsError> {
    settings.require(SOLO_REQUIRED, |key| config.operator_secret(key).is_some())?;

    let length = config.secrets.length;
    let mut resolve = |key: &str| match config.operator_secret(key) {
        Some(value) => value.to_string(),
        None => settings
            .set_if_absent_with(key, || generate_secure_password(length))
            .to_string(),
    };

    Ok(Secrets {
        db_password: resolve(DB_PASSWORD),
        admin_password: resolve(ADMIN_PASSWORD),
    })
}

/// Values merged into `config.php`, including remembered setup values
pub fn desired_php_config(
    config: &HearthConfig,
    secrets: &Secrets,
    settings: &SettingsStore,
) -> BTreeMap<String, Value> {
    let mut desired = config.php_values(&secrets.db_password);
    for (config_key, setting) in CAPTURED {
        if let Some(value) = settings.get(setting) {
            desired
                .entry((*config_key).to_string())
                .or_insert_with(|| Value::from(value));
        }
    }
    desired
}

/// First-run answers the application reads from `autoconfig.php`
pub fn autoconfig_content(config: &HearthConfig, secrets: &Secrets) -> String {
    let data_dir = config.app.data_dir().to_string_lossy().to_string();
    let entries: Vec<(String, Value)> = [
        ("dbtype", config.config.dbtype.as_str()),
        ("dbname", config.config.dbname.as_str()),
        ("dbuser", config.config.dbuser.as_str()),
        ("dbpass", secrets.db_password.as_str()),
        ("dbhost", config.config.dbhost.as_str()),
        ("dbtableprefix", config.config.dbtableprefix.as_str()),
        ("adminlogin", config.admin.user.as_str()),
        ("adminpass", secrets.admin_password.as_str()),
        ("directory", data_dir.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Value::from(v)))
    .collect();

    writer::write_string("AUTOCONFIG", &entries)
}

/// Apache site for `port`, with TLS directives when `ssl` is set
pub fn vhost_content(config: &HearthConfig, name: &str, port: u16, ssl: bool) -> Result<String> {
    let ssl_directives = if ssl {
        [
            "  SSLEngine on",
            "  SSLCertificateFile /etc/ssl/certs/ssl-cert-snakeoil.pem",
            "  SSLCertificateKeyFile /etc/ssl/private/ssl-cert-snakeoil.key",
        ]
        .join("\n")
    } else {
        String::new()
    };

    let mut vars = BTreeMap::new();
    vars.insert("name", name.to_string());
    vars.insert("port", port.to_string());
    vars.insert("server_name", config.app.server_name.clone());
    vars.insert("docroot", config.app.app_dir().to_string_lossy().to_string());
    vars.insert("data_dir", config.app.data_dir().to_string_lossy().to_string());
    vars.insert("ssl_directives", ssl_directives);

    render(VHOST_TEMPLATE, &vars)
}

/// Declare every resource for the host, in order.
pub fn build_plan(
    config: &HearthConfig,
    secrets: &Secrets,
    settings: &SettingsStore,
) -> Result<ExecutionPlan> {
    let app = &config.app;
    let apache_dir = app.apache_dir();
    let web = |mode| Ownership::new(&app.web_user, &app.web_group, mode);
    let mut plan = ExecutionPlan::new();

    for name in &app.packages {
        plan.add(Package::new(name));
    }

    let apache = plan.add(Service::new(&app.apache_service));
    for module in &app.apache_modules {
        let key = plan.add(ApacheModule::new(module, &apache_dir));
        plan.notify(&key, Action::Restart, &apache, Timing::Delayed);
    }

    if config.uses_mysql() {
        let admin = MysqlConnection::new(
            &config.mysql.host,
            &config.mysql.user,
            config.mysql.password.as_deref(),
        );
        plan.add(MysqlDatabase::new(&config.config.dbname, admin.clone()));
        plan.add(MysqlUser::new(
            &config.config.dbuser,
            &secrets.db_password,
            "localhost",
            &config.config.dbname,
            admin,
        ));
    }

    let www_dir = app.www_dir();
    plan.add(Directory::new(&www_dir));

    let archive = app.cache_dir().join(app.archive_name());
    let download =
        plan.add(RemoteFile::new(&app.download_url, &archive).with_ownership(Ownership::mode(0o644)));
    let extract = plan.add_handler(Archive::new("extract owncloud", &archive, &www_dir));
    plan.notify(&download, Action::Run, &extract, Timing::Immediate);

    let app_dir = app.app_dir();
    let config_dir = app_dir.join("config");
    for dir in [app_dir.join("apps"), config_dir.clone(), app.data_dir()] {
        plan.add(Directory::new(dir).with_ownership(web(0o750)));
    }

    let site = plan.add(WebApp::new(
        SITE_NAME,
        vhost_content(config, SITE_NAME, 80, false)?,
        &apache_dir,
    ));
    plan.notify(&site, Action::Reload, &apache, Timing::Delayed);

    if app.ssl {
        if !app.packages.iter().any(|p| p == SSL_CERT_PACKAGE) {
            plan.add(Package::new(SSL_CERT_PACKAGE));
        }
        if !app.apache_modules.iter().any(|m| m == "ssl") {
            let module = plan.add(ApacheModule::new("ssl", &apache_dir));
            plan.notify(&module, Action::Restart, &apache, Timing::Delayed);
        }
        let ssl_site = plan.add(WebApp::new(
            SSL_SITE_NAME,
            vhost_content(config, SSL_SITE_NAME, 443, true)?,
            &apache_dir,
        ));
        plan.notify(&ssl_site, Action::Reload, &apache, Timing::Delayed);
    }

    let config_php = config_dir.join("config.php");
    let autoconfig = plan.add(
        Template::new(
            config_dir.join("autoconfig.php"),
            autoconfig_content(config, secrets),
        )
        .with_ownership(web(0o640))
        .not_if_exists(&config_php),
    );
    let setup = plan.add_handler(HttpRequest::new("run setup", &app.setup_url));
    plan.notify(&autoconfig, Action::Restart, &apache, Timing::Immediate);
    plan.notify(&autoconfig, Action::Get, &setup, Timing::Immediate);

    plan.add(apply_config(&config_php, config, secrets, settings).with_ownership(web(0o640)));

    plan.validate()?;
    Ok(plan)
}

fn apply_config(
    path: &Path,
    config: &HearthConfig,
    secrets: &Secrets,
    settings: &SettingsStore,
) -> ApplyConfig {
    CAPTURED.iter().fold(
        ApplyConfig::new(path, desired_php_config(config, secrets, settings)),
        |resource, (config_key, setting)| resource.capture(config_key, setting),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{NotificationEdge, ResourceExt};
    use std::fs;

    fn config() -> HearthConfig {
        toml::from_str(
            r#"
[app]
server_name = "cloud.example.com"

[config]
dbpassword = "db-secret"

[admin]
pass = "admin-secret"
"#,
        )
        .unwrap()
    }

    fn secrets() -> Secrets {
        Secrets {
            db_password: "db-secret".into(),
            admin_password: "admin-secret".into(),
        }
    }

    fn keys(plan: &ExecutionPlan) -> Vec<String> {
        plan.resources.iter().map(|r| r.key()).collect()
    }

    fn position(keys: &[String], key: &str) -> usize {
        keys.iter()
            .position(|k| k == key)
            .unwrap_or_else(|| panic!("{key} not declared"))
    }

    #[test]
    fn test_declaration_order() {
        let plan = build_plan(&config(), &secrets(), &SettingsStore::solo()).unwrap();
        let keys = keys(&plan);

        let order = [
            "package[php5-gd]",
            "service[apache2]",
            "mysql_database[owncloud]",
            "mysql_user[owncloud@localhost]",
            "directory[/var/www]",
            "remote_file[/var/cache/hearth/owncloud-latest.tar.bz2]",
            "directory[/var/www/owncloud/data]",
            "web_app[owncloud]",
            "template[/var/www/owncloud/config/autoconfig.php]",
            "apply_config[/var/www/owncloud/config/config.php]",
        ];
        let positions: Vec<usize> = order.iter().map(|k| position(&keys, k)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{keys:?}");
        assert_eq!(keys.last().unwrap(), order.last().unwrap());
    }

    #[test]
    fn test_handlers_are_not_in_main_pass() {
        let plan = build_plan(&config(), &secrets(), &SettingsStore::solo()).unwrap();
        let handlers: Vec<String> = plan.handlers.iter().map(|r| r.key()).collect();
        assert_eq!(handlers, ["archive[extract owncloud]", "http_request[run setup]"]);
        assert!(!keys(&plan).iter().any(|k| handlers.contains(k)));
    }

    #[test]
    fn test_autoconfig_notifies_restart_then_setup() {
        let plan = build_plan(&config(), &secrets(), &SettingsStore::solo()).unwrap();
        let source = "template[/var/www/owncloud/config/autoconfig.php]";
        let edges: Vec<&NotificationEdge> =
            plan.edges.iter().filter(|e| e.source == source).collect();

        assert_eq!(edges.len(), 2);
        assert_eq!(
            (edges[0].action, edges[0].target.as_str(), edges[0].timing),
            (Action::Restart, "service[apache2]", Timing::Immediate)
        );
        assert_eq!(
            (edges[1].action, edges[1].target.as_str(), edges[1].timing),
            (Action::Get, "http_request[run setup]", Timing::Immediate)
        );
    }

    #[test]
    fn test_download_triggers_extract() {
        let plan = build_plan(&config(), &secrets(), &SettingsStore::solo()).unwrap();
        assert!(plan.edges.contains(&NotificationEdge {
            source: "remote_file[/var/cache/hearth/owncloud-latest.tar.bz2]".into(),
            action: Action::Run,
            target: "archive[extract owncloud]".into(),
            timing: Timing::Immediate,
        }));
    }

    #[test]
    fn test_ssl_adds_site_and_module() {
        let mut config = config();
        config.app.ssl = true;
        let plan = build_plan(&config, &secrets(), &SettingsStore::solo()).unwrap();
        let keys = keys(&plan);

        assert!(position(&keys, "package[ssl-cert]") < position(&keys, "web_app[owncloud-ssl]"));
        assert!(keys.contains(&"apache_module[ssl]".to_string()));
        assert!(plan.edges.iter().any(|e| e.source == "web_app[owncloud-ssl]"
            && e.action == Action::Reload
            && e.timing == Timing::Delayed));
    }

    #[test]
    fn test_sqlite_skips_mysql() {
        let mut config = config();
        config.config.dbtype = "sqlite".into();
        let plan = build_plan(&config, &secrets(), &SettingsStore::solo()).unwrap();
        assert!(!keys(&plan).iter().any(|k| k.starts_with("mysql_")));
    }

    #[test]
    fn test_solo_without_passwords_fails_fast() {
        let root = tempfile::tempdir().unwrap();
        let www = root.path().join("www");
        let config_php = www.join("owncloud/config/config.php");
        fs::create_dir_all(config_php.parent().unwrap()).unwrap();
        fs::write(&config_php, "<?php\n$CONFIG = array (\n  'dbtype' => 'mysql',\n);\n").unwrap();
        let before = fs::read(&config_php).unwrap();

        let config: HearthConfig = toml::from_str(&format!(
            r#"
[app]
www_dir = "{www}"
data_dir = "{data}"
cache_dir = "{cache}"
"#,
            www = www.display(),
            data = root.path().join("data").display(),
            cache = root.path().join("cache").display(),
        ))
        .unwrap();
        let mut settings = SettingsStore::solo();

        let err = resolve_secrets(&config, &mut settings).unwrap_err();
        match err {
            SettingsError::Missing { keys } => {
                assert_eq!(keys, [DB_PASSWORD, ADMIN_PASSWORD]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(settings.values().is_empty());

        assert!(!config.app.data_dir().exists());
        assert!(!config.app.cache_dir().exists());
        assert_eq!(fs::read(&config_php).unwrap(), before);
        let mut top: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        top.sort();
        assert_eq!(top, ["www"]);
    }

    #[test]
    fn test_generated_secrets_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let config = HearthConfig::default();

        let mut settings = SettingsStore::open(&path).unwrap();
        let first = resolve_secrets(&config, &mut settings).unwrap();
        assert_eq!(first.db_password.len(), 20);
        assert_ne!(first.db_password, first.admin_password);
        settings.persist().unwrap();

        let mut reopened = SettingsStore::open(&path).unwrap();
        let second = resolve_secrets(&config, &mut reopened).unwrap();
        assert_eq!(first.db_password, second.db_password);
        assert_eq!(first.admin_password, second.admin_password);
    }

    #[test]
    fn test_operator_secrets_are_not_stored() {
        let mut settings = SettingsStore::solo();
        let secrets = resolve_secrets(&config(), &mut settings).unwrap();
        assert_eq!(secrets.db_password, "db-secret");
        assert!(settings.get(DB_PASSWORD).is_none());
    }

    #[test]
    fn test_remembered_salt_is_merged() {
        let mut settings = SettingsStore::solo();
        settings.set_if_absent(PASSWORD_SALT, "pepper");

        let desired = desired_php_config(&config(), &secrets(), &settings);
        assert_eq!(desired["passwordsalt"], Value::from("pepper"));
        assert_eq!(desired["dbpassword"], Value::from("db-secret"));
        assert!(!desired.contains_key("instanceid"));
    }

    #[test]
    fn test_autoconfig_content() {
        let content = autoconfig_content(&config(), &secrets());
        assert!(content.starts_with("<?php\n$AUTOCONFIG = array (\n"));
        assert!(content.contains("'dbpass' => 'db-secret',"));
        assert!(content.contains("'adminlogin' => 'admin',"));
        assert!(content.contains("'directory' => '/var/www/owncloud/data',"));
    }

    #[test]
    fn test_vhost_content() {
        let plain = vhost_content(&config(), "owncloud", 80, false).unwrap();
        assert!(plain.contains("<VirtualHost *:80>"));
        assert!(plain.contains("ServerName cloud.example.com"));
        assert!(plain.contains("DocumentRoot /var/www/owncloud"));
        assert!(!plain.contains("SSLEngine"));

        let ssl = vhost_content(&config(), "owncloud-ssl", 443, true).unwrap();
        assert!(ssl.contains("<VirtualHost *:443>"));
        assert!(ssl.contains("SSLEngine on"));
        assert!(ssl.contains("${APACHE_LOG_DIR}/owncloud-ssl-error.log"));
    }
}
