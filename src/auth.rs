//! Who is allowed to purchase
use std::convert::Infallible;
use std::str::FromStr;

/// The signed-in user, as supplied by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(uid: &str, email: Option<&str>) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.map(str::to_string),
        }
    }
}

pub trait AuthorizationPolicy: Send + Sync {
    fn is_admin(&self, user: &User) -> bool;
}

/// Admins listed by email, matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: Vec<String>,
}

impl AdminAllowList {
    /// Parse a comma separated list such as `"a@x.com, B@x.com"`.
    pub fn from_csv(raw: &str) -> Self {
        let emails = raw
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        Self { emails }
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// The normalized (trimmed, lowercase) emails, in configured order.
    pub fn emails(&self) -> &[String] {
        &self.emails
    }
}

impl FromStr for AdminAllowList {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_csv(s))
    }
}

impl AuthorizationPolicy for AdminAllowList {
    fn is_admin(&self, user: &User) -> bool {
        let Some(email) = user.email.as_deref() else {
            return false;
        };
        let email = email.to_lowercase();
        self.emails.iter().any(|admin| *admin == email)
    }
}
