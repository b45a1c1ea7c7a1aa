//! Session state and backend selection.

use std::str::FromStr;

use thiserror::Error;

/// Path of the cart page; loading it renders the full cart view.
pub const CART_PAGE_PATH: &str = "/carrito";

/// Host-supplied session state, injected into the manager at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartSession {
    authenticated: bool,
}

impl CartSession {
    /// Session with the given authentication flag.
    #[must_use]
    pub const fn new(authenticated: bool) -> Self {
        Self { authenticated }
    }

    /// Session with no identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::new(false)
    }

    /// Session backed by a logged-in identity.
    #[must_use]
    pub const fn authenticated() -> Self {
        Self::new(true)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Which cart backend serves a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

/// Rule for choosing a [`BackendKind`] from the authentication flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPolicy {
    /// Always the server cart; anonymous shoppers are asked to log in.
    #[default]
    RemoteOnly,
    /// Server cart when logged in, local cart otherwise.
    LocalWhenAnonymous,
    /// Always the local cart.
    LocalOnly,
}

impl BackendPolicy {
    /// Backend for a session.
    #[must_use]
    pub const fn select(self, session: CartSession) -> BackendKind {
        match self {
            Self::RemoteOnly => BackendKind::Remote,
            Self::LocalWhenAnonymous if session.is_authenticated() => BackendKind::Remote,
            Self::LocalWhenAnonymous | Self::LocalOnly => BackendKind::Local,
        }
    }
}

/// Unknown backend policy name.
#[derive(Debug, Error)]
#[error("unknown cart backend '{0}' (expected remote, auto or local)")]
pub struct UnknownPolicy(String);

impl FromStr for BackendPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::RemoteOnly),
            "auto" => Ok(Self::LocalWhenAnonymous),
            "local" => Ok(Self::LocalOnly),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_selection() {
        let anon = CartSession::anonymous();
        let user = CartSession::authenticated();

        assert_eq!(BackendPolicy::RemoteOnly.select(anon), BackendKind::Remote);
        assert_eq!(BackendPolicy::RemoteOnly.select(user), BackendKind::Remote);
        assert_eq!(
            BackendPolicy::LocalWhenAnonymous.select(anon),
            BackendKind::Local
        );
        assert_eq!(
            BackendPolicy::LocalWhenAnonymous.select(user),
            BackendKind::Remote
        );
        assert_eq!(BackendPolicy::LocalOnly.select(user), BackendKind::Local);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "Remote".parse::<BackendPolicy>().unwrap(),
            BackendPolicy::RemoteOnly
        );
        assert_eq!(
            " auto ".parse::<BackendPolicy>().unwrap(),
            BackendPolicy::LocalWhenAnonymous
        );
        assert!("browser".parse::<BackendPolicy>().is_err());
    }
}
