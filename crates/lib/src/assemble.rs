//! Deterministic string assembly for URLs, connection strings and commands.
//!
//! Nothing here signs or encrypts: SAS signing is done by the backend, these
//! functions only splice resolved values together.

/// Start of the validity window requested for deployment-package SAS tokens.
pub const SAS_START: &str = "2021-01-01";

/// End of the validity window requested for deployment-package SAS tokens.
pub const SAS_EXPIRY: &str = "2030-01-01";

const WEB_APP_DOMAIN: &str = ".azurewebsites.net";
const SCM_DOMAIN: &str = ".scm.azurewebsites.net";

/// `https://{account}.blob.core.windows.net/{container}/{blob}?{token}`
pub fn signed_blob_url(account: &str, container: &str, blob: &str, token: &str) -> String {
  format!("https://{account}.blob.core.windows.net/{container}/{blob}?{token}")
}

/// The resource path a container-scoped service SAS is issued for.
pub fn canonicalized_resource(account: &str, container: &str) -> String {
  format!("/blob/{account}/{container}")
}

/// ADO.NET connection string for an Azure SQL database.
pub fn sql_connection_string(server: &str, database: &str, login: &str, password: &str) -> String {
  format!(
    "Server=tcp:{server}.database.windows.net;initial catalog={database};user ID={login};password={password};Min Pool Size=0;Max Pool Size=30;Persist Security Info=true;"
  )
}

pub fn app_insights_connection_string(instrumentation_key: &str) -> String {
  format!("InstrumentationKey={instrumentation_key}")
}

/// Maps a web app host name to its Kudu (SCM) host name.
///
/// Hosts outside `azurewebsites.net` are returned unchanged.
pub fn scm_host(default_host_name: &str) -> String {
  default_host_name.replace(WEB_APP_DOMAIN, SCM_DOMAIN)
}

pub fn log_tail_command(app: &str, resource_group: &str) -> String {
  format!("az webapp log tail --name {app} --resource-group {resource_group}")
}

pub fn web_ssh_url(scm_host: &str) -> String {
  format!("https://{scm_host}/webssh/host")
}
