//! Per-scope gate configuration.
//!
//! Responsibility:
//! - Parse the scope tree (root directives + nested path scopes) from JSON.
//! - Merge every scope with its nearest ancestor once, at load time.
//! - Validate the merged result (fatal at startup / reload, never per request).
//! - Select the flattened snapshot for a request path (longest prefix wins).
//!
//! Directives left unset in a scope inherit the parent's value; the root scope
//! inherits from [`GateConfig::default`] (`enabled = false`, everything else empty).

use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("failed to read scope file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scope tree: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scope path must start with '/': {0:?}")]
    InvalidPath(String),
    #[error("scope {child} is not nested under {parent}")]
    NotNested { parent: String, child: String },
    #[error("duplicate scope path: {0}")]
    Duplicate(String),
    #[error("scope {path}: invalid header name {name:?}")]
    InvalidHeaderName { path: String, name: String },
    #[error("scope {path}: invalid cookie name {name:?}")]
    InvalidCookieName { path: String, name: String },
    #[error("scope {path}: redirect location is not a valid header value")]
    InvalidRedirectLocation { path: String },
    #[error("scope {path}: enabled without header_name or cookie_name")]
    NoCredentialSource { path: String },
    #[error("invalid on/off value for {key}: {value:?}")]
    InvalidFlag { key: &'static str, value: String },
    #[error("scope loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Raw, unmerged directives of one scope as written in the scope tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeDirectives {
    pub path: Option<String>,
    pub enabled: Option<bool>,
    pub header_name: Option<String>,
    pub cookie_name: Option<String>,
    pub redirect_location: Option<String>,
    #[serde(default)]
    pub scopes: Vec<ScopeDirectives>,
}

/// Flattened, immutable configuration the gate evaluates for one scope.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub enabled: bool,
    // `None` means "not configured": the cookie path is used instead.
    pub header_name: Option<HeaderName>,
    pub cookie_name: String,
    pub redirect_location: HeaderValue,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: None,
            cookie_name: String::new(),
            redirect_location: HeaderValue::from_static(""),
        }
    }
}

impl GateConfig {
    fn validate(&self, path: &str) -> Result<(), ScopeError> {
        if !self.enabled {
            return Ok(());
        }

        if self.header_name.is_none() && self.cookie_name.is_empty() {
            return Err(ScopeError::NoCredentialSource {
                path: path.to_string(),
            });
        }

        if self.redirect_location.is_empty() {
            tracing::warn!(
                scope = %path,
                "auth token gate enabled with an empty redirect location"
            );
        }

        Ok(())
    }
}

/// Merge `child` over its already-merged `parent`.
pub fn merge(
    child: &ScopeDirectives,
    parent: &GateConfig,
    path: &str,
) -> Result<GateConfig, ScopeError> {
    let header_name = match child.header_name.as_deref() {
        None => parent.header_name.clone(),
        Some("") => None,
        Some(name) => Some(HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ScopeError::InvalidHeaderName {
                path: path.to_string(),
                name: name.to_string(),
            }
        })?),
    };

    let cookie_name = match child.cookie_name.as_deref() {
        None => parent.cookie_name.clone(),
        Some(name) if is_cookie_name(name) => name.to_string(),
        Some(name) => {
            return Err(ScopeError::InvalidCookieName {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
    };

    let redirect_location = match child.redirect_location.as_deref() {
        None => parent.redirect_location.clone(),
        Some(location) => HeaderValue::from_str(location).map_err(|_| {
            ScopeError::InvalidRedirectLocation {
                path: path.to_string(),
            }
        })?,
    };

    let config = GateConfig {
        enabled: child.enabled.unwrap_or(parent.enabled),
        header_name,
        cookie_name,
        redirect_location,
    };
    config.validate(path)?;

    Ok(config)
}

// Empty is allowed and means "unset".
fn is_cookie_name(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b'=' | b';' | b','))
}

// Prefix match on path-segment boundaries: `/api` covers `/api` and `/api/x`, not `/apix`.
fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" || path == prefix {
        return true;
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/')
}

#[derive(Debug, Clone)]
struct Scope {
    path: String,
    config: Arc<GateConfig>,
}

/// All merged scopes of one configuration generation.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    root: Arc<GateConfig>,
    // Longest path first.
    nested: Vec<Scope>,
}

impl ScopeTable {
    /// A table with only a root scope.
    pub fn single(config: GateConfig) -> Self {
        Self {
            root: Arc::new(config),
            nested: Vec::new(),
        }
    }

    pub fn build(root: &ScopeDirectives) -> Result<Self, ScopeError> {
        match root.path.as_deref() {
            None | Some("/") => {}
            Some(other) => return Err(ScopeError::InvalidPath(other.to_string())),
        }

        let root_config = merge(root, &GateConfig::default(), "/")?;
        let mut nested = Vec::new();
        collect(&root.scopes, "/", &root_config, &mut nested)?;
        nested.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        Ok(Self {
            root: Arc::new(root_config),
            nested,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ScopeError> {
        let root: ScopeDirectives = serde_json::from_str(json)?;
        Self::build(&root)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScopeError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScopeError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Configuration of the most specific scope covering `request_path`.
    pub fn select(&self, request_path: &str) -> &Arc<GateConfig> {
        self.nested
            .iter()
            .find(|scope| covers(&scope.path, request_path))
            .map(|scope| &scope.config)
            .unwrap_or(&self.root)
    }

    /// Number of scopes including the root.
    pub fn len(&self) -> usize {
        self.nested.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

fn collect(
    children: &[ScopeDirectives],
    parent_path: &str,
    parent: &GateConfig,
    out: &mut Vec<Scope>,
) -> Result<(), ScopeError> {
    for child in children {
        let path = child.path.as_deref().unwrap_or_default();
        if !path.starts_with('/') {
            return Err(ScopeError::InvalidPath(path.to_string()));
        }
        if !covers(parent_path, path) {
            return Err(ScopeError::NotNested {
                parent: parent_path.to_string(),
                child: path.to_string(),
            });
        }
        if path == "/" || out.iter().any(|s| s.path == path) {
            return Err(ScopeError::Duplicate(path.to_string()));
        }

        // Pushed before its children so a child repeating this path is caught above.
        let config = Arc::new(merge(child, parent, path)?);
        out.push(Scope {
            path: path.to_string(),
            config: config.clone(),
        });
        collect(&child.scopes, path, &config, out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
        "enabled": true,
        "cookie_name": "session",
        "redirect_location": "/login",
        "scopes": [
            { "path": "/public", "enabled": false },
            {
                "path": "/api",
                "header_name": "X-Auth-Token",
                "scopes": [
                    { "path": "/api/admin", "redirect_location": "/admin/login" }
                ]
            }
        ]
    }"#;

    #[test]
    fn nested_scopes_inherit_unset_directives() {
        let table = ScopeTable::from_json(TREE).expect("valid tree");
        assert_eq!(table.len(), 4);

        let admin = table.select("/api/admin/users");
        assert!(admin.enabled);
        assert_eq!(
            admin.header_name.as_ref().map(HeaderName::as_str),
            Some("x-auth-token")
        );
        assert_eq!(admin.cookie_name, "session");
        assert_eq!(admin.redirect_location, "/admin/login");

        let api = table.select("/api/posts");
        assert_eq!(api.redirect_location, "/login");

        let public = table.select("/public/logo.png");
        assert!(!public.enabled);
        assert_eq!(public.cookie_name, "session");
    }

    #[test]
    fn select_respects_segment_boundaries() {
        let table = ScopeTable::from_json(TREE).expect("valid tree");

        assert!(table.select("/apix").header_name.is_none());
        assert!(table.select("/api").header_name.is_some());
        assert!(table.select("/").enabled);
        assert!(table.select("/other").enabled);
    }

    #[test]
    fn explicit_empty_header_name_clears_inherited_one() {
        let json = r#"{
            "enabled": true,
            "header_name": "X-Auth-Token",
            "cookie_name": "session",
            "scopes": [{ "path": "/web", "header_name": "" }]
        }"#;
        let table = ScopeTable::from_json(json).expect("valid tree");

        assert!(table.select("/web").header_name.is_none());
        assert!(table.select("/").header_name.is_some());
    }

    #[test]
    fn defaults_are_disabled_and_empty() {
        let table = ScopeTable::from_json("{}").expect("empty tree is valid");
        let root = table.select("/anything");

        assert!(!root.enabled);
        assert!(root.header_name.is_none());
        assert!(root.cookie_name.is_empty());
        assert!(root.redirect_location.is_empty());
    }

    #[test]
    fn enabled_scope_without_credential_source_is_rejected() {
        let err = ScopeTable::from_json(r#"{ "enabled": true, "redirect_location": "/login" }"#)
            .expect_err("must fail");
        assert!(matches!(err, ScopeError::NoCredentialSource { ref path } if path == "/"));

        let err = ScopeTable::from_json(
            r#"{ "scopes": [{ "path": "/app", "enabled": true }] }"#,
        )
        .expect_err("must fail");
        assert!(matches!(err, ScopeError::NoCredentialSource { ref path } if path == "/app"));
    }

    #[test]
    fn malformed_trees_are_rejected() {
        let cases = [
            r#"{ "scopes": [{ "path": "api" }] }"#,
            r#"{ "scopes": [{ "enabled": false }] }"#,
            r#"{ "scopes": [{ "path": "/a" }, { "path": "/a" }] }"#,
            r#"{ "scopes": [{ "path": "/a", "scopes": [{ "path": "/b" }] }] }"#,
            r#"{ "scopes": [{ "path": "/a", "scopes": [{ "path": "/a" }] }] }"#,
            r#"{ "header_name": "bad header" }"#,
            r#"{ "cookie_name": "a=b" }"#,
            r#"{ "redirect_location": "/login\nSet-Cookie: x" }"#,
            r#"{ "unknown_directive": 1 }"#,
        ];

        for json in cases {
            assert!(ScopeTable::from_json(json).is_err(), "accepted: {json}");
        }
    }

    #[test]
    fn child_repeating_parent_path_is_a_duplicate() {
        let json = r#"{
            "scopes": [{
                "path": "/a",
                "redirect_location": "/outer",
                "scopes": [{ "path": "/a", "redirect_location": "/inner" }]
            }]
        }"#;

        let err = ScopeTable::from_json(json).expect_err("must fail");
        assert!(matches!(err, ScopeError::Duplicate(ref path) if path == "/a"));
    }

    #[test]
    fn root_path_other_than_slash_is_rejected() {
        let err = ScopeTable::from_json(r#"{ "path": "/api" }"#).expect_err("must fail");
        assert!(matches!(err, ScopeError::InvalidPath(_)));
    }
}
