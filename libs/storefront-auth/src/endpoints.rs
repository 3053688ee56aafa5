use crate::config::AuthClientConfig;

/// What a request path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Login,
    Register,
    Refresh,
    /// Any business endpoint. Only these get bearer credentials and refresh handling.
    Resource,
}

impl EndpointKind {
    #[must_use]
    pub fn is_auth(self) -> bool {
        !matches!(self, EndpointKind::Resource)
    }
}

/// The three credential-issuing paths.
///
/// Matching is exact after dropping the query string, fragment and a
/// trailing `/`. `/auth/login-history` is a resource, not the login path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    login: String,
    register: String,
    refresh: String,
}

fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

impl AuthEndpoints {
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        register: impl Into<String>,
        refresh: impl Into<String>,
    ) -> Self {
        Self {
            login: normalize(&login.into()).to_owned(),
            register: normalize(&register.into()).to_owned(),
            refresh: normalize(&refresh.into()).to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthClientConfig) -> Self {
        Self::new(&config.login_path, &config.register_path, &config.refresh_path)
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> EndpointKind {
        let path = normalize(path);
        if path == self.login {
            EndpointKind::Login
        } else if path == self.register {
            EndpointKind::Register
        } else if path == self.refresh {
            EndpointKind::Refresh
        } else {
            EndpointKind::Resource
        }
    }

    #[must_use]
    pub fn is_auth(&self, path: &str) -> bool {
        self.classify(path).is_auth()
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    #[must_use]
    pub fn register(&self) -> &str {
        &self.register
    }

    #[must_use]
    pub fn refresh(&self) -> &str {
        &self.refresh
    }
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self::from_config(&AuthClientConfig::default())
    }
}
