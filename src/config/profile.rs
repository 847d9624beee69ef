use std::fmt;

/// Environment variable selecting which dotenv profile to load.
pub const PROFILE_ENV_VAR: &str = "TXLATENCY_ENV";

/// Configuration profile. `None` is the base profile (`.env`); a named profile
/// `p` loads `.env.p`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile(Option<String>);

impl Profile {
    pub fn base() -> Self {
        Self(None)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    /// Reads the profile selector once at startup.
    pub fn from_env() -> Self {
        match std::env::var(PROFILE_ENV_VAR) {
            Ok(name) if !name.trim().is_empty() => Self::named(name.trim()),
            _ => Self::base(),
        }
    }

    pub fn file_name(&self) -> String {
        match &self.0 {
            Some(name) => format!(".env.{}", name),
            None => ".env".to_string(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "base"),
        }
    }
}
