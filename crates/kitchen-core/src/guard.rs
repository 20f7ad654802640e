//! Route guard: which screens need a session, and where sign-in returns to.

use std::fmt;

use crate::auth::AuthSession;

/// Every screen of the app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Inventory,
    /// Items stored at one location.
    Location(String),
    Organization,
    Manage,
    Login,
    Signup,
}

impl Route {
    /// Parse a path such as `/location/Upper%20Cabinet`.
    ///
    /// Query strings, fragments and trailing slashes are ignored. Unknown
    /// paths yield `None`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let path = path.trim_end_matches('/');

        let route = match path {
            "" => Self::Home,
            "/inventory" => Self::Inventory,
            "/organization" => Self::Organization,
            "/manage" => Self::Manage,
            "/login" => Self::Login,
            "/signup" => Self::Signup,
            other => {
                let encoded = other.strip_prefix("/location/")?;
                if encoded.is_empty() || encoded.contains('/') {
                    return None;
                }
                let name = urlencoding::decode(encoded).ok()?;
                if name.trim().is_empty() {
                    return None;
                }
                Self::Location(name.into_owned())
            }
        };
        Some(route)
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Inventory => "/inventory".to_string(),
            Self::Location(name) => format!("/location/{}", urlencoding::encode(name)),
            Self::Organization => "/organization".to_string(),
            Self::Manage => "/manage".to_string(),
            Self::Login => "/login".to_string(),
            Self::Signup => "/signup".to_string(),
        }
    }

    /// Reachable without signing in.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Send the user to `to`, remembering where they were headed.
    Redirect { to: Route, from: Route },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGuard;

impl RouteGuard {
    #[must_use]
    pub fn check(session: Option<&AuthSession>, route: &Route) -> GuardDecision {
        if route.is_public() || AuthSession::is_valid(session) {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect {
                to: Route::Login,
                from: route.clone(),
            }
        }
    }

    /// Where to go after a successful sign-in.
    #[must_use]
    pub fn post_login_destination(from: Option<Route>) -> Route {
        from.filter(|route| !route.is_public())
            .unwrap_or(Route::Home)
    }
}
