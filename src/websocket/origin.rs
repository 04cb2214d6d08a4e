//! Browser origin access control

use regex::Regex;

/// One entry of an origin allow-list.
#[derive(Debug, Clone)]
pub enum AllowedOrigin {
    /// Matches an origin that is exactly equal
    Literal(String),
    /// Matches an origin when the expression matches at its start
    Pattern(Regex),
}

impl AllowedOrigin {
    pub fn pattern(expr: &str) -> Result<Self, regex::Error> {
        Regex::new(expr).map(AllowedOrigin::Pattern)
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            AllowedOrigin::Literal(allowed) => allowed == origin,
            AllowedOrigin::Pattern(re) => re.find(origin).is_some_and(|m| m.start() == 0),
        }
    }
}

/// The set of origins allowed to connect.
///
/// An empty policy lets everything through.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<AllowedOrigin>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<AllowedOrigin>) -> Self {
        Self { allowed }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Whether a request carrying `origin` may proceed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        if !self.is_restricted() {
            return true;
        }

        origin_matches(origin, &self.allowed)
    }
}

/// True if `origin` is absent or matches any entry of `allowed`.
pub fn origin_matches(origin: Option<&str>, allowed: &[AllowedOrigin]) -> bool {
    let Some(origin) = origin else {
        return true;
    };

    allowed.iter().any(|entry| entry.matches(origin))
}
