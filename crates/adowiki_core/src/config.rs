use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{WikiError, WikiResult};

pub const DEFAULT_USER_AGENT: &str = "adowiki/0.1";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const CLOUD_HOST: &str = "dev.azure.com";

pub const ENV_URL: &str = "AZURE_DEVOPS_URL";
pub const ENV_ORGANIZATION: &str = "AZURE_DEVOPS_ORGANIZATION";
pub const ENV_PROJECT: &str = "AZURE_DEVOPS_PROJECT";
pub const ENV_PAT: &str = "AZURE_DEVOPS_PAT";
pub const ENV_TOKEN: &str = "AZURE_DEVOPS_TOKEN";
pub const ENV_BRANCH: &str = "AZURE_DEVOPS_BRANCH";
pub const ENV_TIMEOUT_MS: &str = "AZURE_DEVOPS_HTTP_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AdoConfig {
    #[serde(default)]
    pub azure_devops: AzureDevOpsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AzureDevOpsSection {
    pub url: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub personal_access_token: Option<String>,
    pub default_branch: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as HTTP basic auth with an empty user name.
    PersonalAccessToken(String),
    Bearer(String),
}

/// Fully resolved settings; env values already applied over the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub url: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub credential: Option<Credential>,
    pub default_branch: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: None,
            organization: None,
            project: None,
            credential: None,
            default_branch: DEFAULT_BRANCH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl AdoConfig {
    /// Reject values that are present but unusable.
    pub fn validate(&self) -> Result<()> {
        let section = &self.azure_devops;
        if let Some(url) = &section.url {
            validate_url(url)?;
        }
        for (key, value) in [
            ("organization", &section.organization),
            ("project", &section.project),
            ("personal_access_token", &section.personal_access_token),
            ("default_branch", &section.default_branch),
        ] {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                bail!("azure_devops.{key} cannot be empty");
            }
        }
        Ok(())
    }

    /// Resolve settings: env > config > default.
    pub fn resolve(&self) -> Result<Settings> {
        self.resolve_with(env_value)
    }

    /// Same as [`AdoConfig::resolve`] with an explicit environment lookup.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
        self.validate()?;
        let section = &self.azure_devops;

        let url = env(ENV_URL).or_else(|| section.url.clone());
        if let Some(url) = &url {
            validate_url(url).with_context(|| format!("invalid {ENV_URL}"))?;
        }

        let credential = env(ENV_PAT)
            .or_else(|| section.personal_access_token.clone())
            .map(Credential::PersonalAccessToken)
            .or_else(|| env(ENV_TOKEN).map(Credential::Bearer));

        let timeout_ms = match env(ENV_TIMEOUT_MS) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid {ENV_TIMEOUT_MS}: {raw}"))?,
            None => section.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };

        Ok(Settings {
            url,
            organization: env(ENV_ORGANIZATION).or_else(|| section.organization.clone()),
            project: env(ENV_PROJECT).or_else(|| section.project.clone()),
            credential,
            default_branch: env(ENV_BRANCH)
                .or_else(|| section.default_branch.clone())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            user_agent: section
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Organization and project a single call runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    pub organization: String,
    pub project: String,
    /// Organization URL without a trailing slash.
    pub org_url: String,
}

impl ProjectScope {
    pub fn project_api_url(&self, suffix: &str) -> String {
        format!("{}/{}/_apis/{}", self.org_url, self.project, suffix)
    }

    /// Search is served from a separate host for cloud organizations.
    pub fn search_api_url(&self) -> String {
        let base = if is_cloud_url(&self.org_url) {
            format!("https://almsearch.{CLOUD_HOST}/{}", self.organization)
        } else {
            self.org_url.clone()
        };
        format!("{base}/{}/_apis/search/wikisearchresults", self.project)
    }
}

impl Settings {
    /// Request overrides beat configured defaults; both parts must resolve.
    pub fn scope(
        &self,
        organization: Option<&str>,
        project: Option<&str>,
    ) -> WikiResult<ProjectScope> {
        let organization = pick(organization, self.organization.as_deref());
        let project = pick(project, self.project.as_deref());
        let (Some(organization), Some(project)) = (organization, project) else {
            return Err(WikiError::not_configured(
                "Organization and project must be provided",
            ));
        };
        // A cloud URL names one organization; follow the resolved one so page
        // and search requests agree.
        let org_url = match &self.url {
            Some(url) if !is_cloud_url(url.trim()) => {
                url.trim().trim_end_matches('/').to_string()
            }
            _ => format!("https://{CLOUD_HOST}/{organization}"),
        };
        Ok(ProjectScope {
            organization,
            project,
            org_url,
        })
    }

    pub fn require_credential(&self) -> WikiResult<&Credential> {
        self.credential.as_ref().ok_or_else(|| {
            WikiError::not_configured(format!(
                "no credential configured; set {ENV_PAT} or {ENV_TOKEN}"
            ))
        })
    }
}

/// Load and parse an AdoConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<AdoConfig> {
    if !config_path.exists() {
        return Ok(AdoConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: AdoConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    parsed
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    Ok(parsed)
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim()).with_context(|| format!("not a valid URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("URL must use http or https: {raw}");
    }
    Ok(())
}

fn is_cloud_url(org_url: &str) -> bool {
    Url::parse(org_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.eq_ignore_ascii_case(CLOUD_HOST)))
        .unwrap_or(false)
}

fn pick(request: Option<&str>, configured: Option<&str>) -> Option<String> {
    request
        .or(configured)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(url: Option<&str>, organization: Option<&str>, project: Option<&str>) -> Settings {
        Settings {
            url: url.map(ToString::to_string),
            organization: organization.map(ToString::to_string),
            project: project.map(ToString::to_string),
            ..Settings::default()
        }
    }

    #[test]
    fn default_config_has_no_connection_values() {
        let config = AdoConfig::default();
        assert!(config.azure_devops.url.is_none());
        assert!(config.azure_devops.organization.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/adowiki.toml")).expect("load config");
        assert_eq!(config, AdoConfig::default());
    }

    #[test]
    fn load_config_parses_azure_devops_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(
            &config_path,
            r#"
[azure_devops]
url = "https://dev.azure.com/myorg"
organization = "myorg"
project = "myproject"
default_branch = "wikiMaster"
user_agent = "test-agent/1.0"
timeout_ms = 5000
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        let section = &config.azure_devops;
        assert_eq!(section.url.as_deref(), Some("https://dev.azure.com/myorg"));
        assert_eq!(section.organization.as_deref(), Some("myorg"));
        assert_eq!(section.project.as_deref(), Some("myproject"));
        assert_eq!(section.default_branch.as_deref(), Some("wikiMaster"));
        assert_eq!(section.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(section.timeout_ms, Some(5000));
    }

    #[test]
    fn load_config_tolerates_unrelated_tables() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(&config_path, "[other]\nkey = \"value\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config, AdoConfig::default());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(&config_path, "[azure_devops\nurl = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolve_maps_file_values_to_settings() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(
            &config_path,
            r#"
[azure_devops]
url = "https://ado.example.com/tfs/Collection"
organization = "myorg"
project = "myproject"
personal_access_token = "file-pat"
default_branch = "wikiMaster"
user_agent = "test-agent/1.0"
timeout_ms = 5000
"#,
        )
        .expect("write config");

        let settings = load_config(&config_path)
            .expect("load config")
            .resolve_with(no_env)
            .expect("resolve");
        assert_eq!(settings.url.as_deref(), Some("https://ado.example.com/tfs/Collection"));
        assert_eq!(settings.organization.as_deref(), Some("myorg"));
        assert_eq!(settings.project.as_deref(), Some("myproject"));
        assert_eq!(
            settings.credential,
            Some(Credential::PersonalAccessToken("file-pat".to_string()))
        );
        assert_eq!(settings.default_branch, "wikiMaster");
        assert_eq!(settings.user_agent, "test-agent/1.0");
        assert_eq!(settings.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn resolve_falls_back_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(&config_path, "[azure_devops]\norganization = \"myorg\"\n")
            .expect("write config");

        let settings = load_config(&config_path)
            .expect("load config")
            .resolve_with(no_env)
            .expect("resolve");
        assert_eq!(settings.default_branch, DEFAULT_BRANCH);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(settings.credential.is_none());
        assert!(settings.url.is_none());
    }

    #[test]
    fn file_pat_beats_bearer_token() {
        let config = AdoConfig {
            azure_devops: AzureDevOpsSection {
                personal_access_token: Some("file-pat".to_string()),
                ..AzureDevOpsSection::default()
            },
        };
        let env = |key: &str| (key == ENV_TOKEN).then(|| "bearer".to_string());
        let settings = config.resolve_with(env).expect("resolve");
        assert_eq!(
            settings.credential,
            Some(Credential::PersonalAccessToken("file-pat".to_string()))
        );
    }

    #[test]
    fn bearer_token_is_used_without_pat() {
        let env = |key: &str| (key == ENV_TOKEN).then(|| "bearer".to_string());
        let settings = AdoConfig::default().resolve_with(env).expect("resolve");
        assert_eq!(settings.credential, Some(Credential::Bearer("bearer".to_string())));
    }

    #[test]
    fn env_values_override_file_values() {
        let config = AdoConfig {
            azure_devops: AzureDevOpsSection {
                project: Some("file-project".to_string()),
                default_branch: Some("file-branch".to_string()),
                timeout_ms: Some(5000),
                ..AzureDevOpsSection::default()
            },
        };
        let env = |key: &str| match key {
            ENV_PROJECT => Some("env-project".to_string()),
            ENV_BRANCH => Some("env-branch".to_string()),
            ENV_TIMEOUT_MS => Some("1500".to_string()),
            _ => None,
        };
        let settings = config.resolve_with(env).expect("resolve");
        assert_eq!(settings.project.as_deref(), Some("env-project"));
        assert_eq!(settings.default_branch, "env-branch");
        assert_eq!(settings.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn unparseable_env_timeout_is_rejected() {
        let env = |key: &str| (key == ENV_TIMEOUT_MS).then(|| "soon".to_string());
        let error = AdoConfig::default().resolve_with(env).expect_err("must fail");
        assert!(error.to_string().contains(ENV_TIMEOUT_MS));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("adowiki.toml");
        fs::write(&config_path, "[azure_devops]\nurl = \"not-a-url\"\n").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("invalid config"));
    }

    #[test]
    fn empty_project_is_rejected() {
        let config = AdoConfig {
            azure_devops: AzureDevOpsSection {
                url: Some("https://dev.azure.com/myorg".to_string()),
                project: Some(String::new()),
                personal_access_token: Some("token".to_string()),
                ..AzureDevOpsSection::default()
            },
        };
        let error = config.validate().expect_err("must fail");
        assert!(error.to_string().contains("azure_devops.project"));
    }

    #[test]
    fn empty_pat_is_rejected() {
        let config = AdoConfig {
            azure_devops: AzureDevOpsSection {
                personal_access_token: Some("  ".to_string()),
                ..AzureDevOpsSection::default()
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = AdoConfig {
            azure_devops: AzureDevOpsSection {
                url: Some("ftp://dev.azure.com/myorg".to_string()),
                ..AzureDevOpsSection::default()
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn scope_defaults_to_cloud_org_url() {
        let scope = settings(None, Some("testorg"), Some("testproject"))
            .scope(None, None)
            .expect("scope");
        assert_eq!(scope.org_url, "https://dev.azure.com/testorg");
        assert_eq!(
            scope.project_api_url("wiki/wikis/wiki123/pages"),
            "https://dev.azure.com/testorg/testproject/_apis/wiki/wikis/wiki123/pages"
        );
    }

    #[test]
    fn request_values_override_configured_defaults() {
        let scope = settings(None, Some("configured"), Some("configured-project"))
            .scope(Some("requested"), Some("requested-project"))
            .expect("scope");
        assert_eq!(scope.organization, "requested");
        assert_eq!(scope.project, "requested-project");
        assert_eq!(scope.org_url, "https://dev.azure.com/requested");
    }

    #[test]
    fn custom_url_is_used_as_org_url() {
        let custom = Some("https://ado.example.com/tfs/Collection/");
        let scope = settings(custom, Some("org"), Some("p"))
            .scope(None, None)
            .expect("scope");
        assert_eq!(scope.org_url, "https://ado.example.com/tfs/Collection");
        assert_eq!(
            scope.search_api_url(),
            "https://ado.example.com/tfs/Collection/p/_apis/search/wikisearchresults"
        );
    }

    #[test]
    fn organization_override_follows_cloud_url() {
        let scope = settings(Some("https://dev.azure.com/orgA/"), Some("orgA"), Some("p"))
            .scope(Some("orgB"), None)
            .expect("scope");
        assert_eq!(scope.org_url, "https://dev.azure.com/orgB");
        assert_eq!(
            scope.project_api_url("wiki/wikis/w/pages"),
            "https://dev.azure.com/orgB/p/_apis/wiki/wikis/w/pages"
        );
        assert_eq!(
            scope.search_api_url(),
            "https://almsearch.dev.azure.com/orgB/p/_apis/search/wikisearchresults"
        );
    }

    #[test]
    fn cloud_search_uses_almsearch_host() {
        let scope = settings(None, Some("org"), Some("p"))
            .scope(None, None)
            .expect("scope");
        assert_eq!(
            scope.search_api_url(),
            "https://almsearch.dev.azure.com/org/p/_apis/search/wikisearchresults"
        );
    }

    #[test]
    fn missing_organization_is_not_configured() {
        let error = settings(None, None, Some("testproject"))
            .scope(None, None)
            .expect_err("must fail");
        assert!(matches!(error, WikiError::NotConfigured(_)));
        assert_eq!(error.to_string(), "Organization and project must be provided");
    }

    #[test]
    fn blank_project_is_not_configured() {
        let error = settings(None, Some("org"), Some(""))
            .scope(None, Some("  "))
            .expect_err("must fail");
        assert!(matches!(error, WikiError::NotConfigured(_)));
    }

    #[test]
    fn missing_credential_is_not_configured() {
        let error = Settings::default()
            .require_credential()
            .expect_err("must fail");
        assert!(matches!(error, WikiError::NotConfigured(_)));
    }

    #[test]
    fn default_settings_use_main_branch() {
        let settings = Settings::default();
        assert_eq!(settings.default_branch, "main");
        assert_eq!(settings.user_agent, "adowiki/0.1");
        assert_eq!(settings.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }
}
