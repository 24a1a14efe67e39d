//! Privileged-caller checks, kept outside the catalog so the catalog never
//! sees credentials.

/// Decides whether a caller may run admin operations (add and delete).
pub trait AccessPolicy: Send + Sync {
    fn is_privileged(&self, credential: Option<&str>) -> bool;
}

/// A single password shared by every administrator.
///
/// This is a convenience gate for a front desk, not a security boundary.
#[derive(Debug, Clone)]
pub struct SharedPassword {
    password: String,
}

impl SharedPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl AccessPolicy for SharedPassword {
    fn is_privileged(&self, credential: Option<&str>) -> bool {
        credential.is_some_and(|given| given == self.password)
    }
}
