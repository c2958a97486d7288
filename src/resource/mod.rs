//! Concrete resources for provisioning the application host
//!
//! Each resource implements [`declarative::Resource`]: a side-effect free
//! probe plus an apply step. Resources that only make sense as notification
//! targets (extract, restart, setup request) override `run_action`.

pub use declarative::{
    Action, ApplyContext, ApplyResult, ContentChange, Resource, ResourceState,
};

mod ownership;

pub mod apache_module;
pub mod apply_config;
pub mod archive;
pub mod directory;
pub mod http_request;
pub mod mysql;
pub mod package;
pub mod remote_file;
pub mod service;
pub mod template;
pub mod web_app;

pub use apache_module::ApacheModule;
pub use apply_config::ApplyConfig;
pub use archive::Archive;
pub use directory::Directory;
pub use http_request::HttpRequest;
pub use mysql::{MysqlConnection, MysqlDatabase, MysqlUser};
pub use ownership::Ownership;
pub use package::Package;
pub use remote_file::RemoteFile;
pub use service::Service;
pub use template::Template;
pub use web_app::WebApp;
