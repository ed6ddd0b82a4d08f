use std::fmt::{Debug, Display};

/// A string wrapper type that will not leak credentials in logs or printing while still able to be
/// used as a string. Will zero out the memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(String);

impl SecureString {
    /// Returns the wrapped value. Only use this when handing the secret to the client that needs it
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        // SAFETY: We're dropping so writing zeros to this vec is fine.
        unsafe {
            for b in self.0.as_mut_vec() {
                *b = 0;
            }
        }
    }
}

impl Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "**********")
    }
}

impl Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "**********")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
