use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for sensitive values (card numbers, holder names).
///
/// Debug and Display never print the value, so it cannot leak through
/// `tracing::info!("{:?}", ..)`. Serialization still writes the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: AsRef<str>> Masked<T> {
    /// Last four characters, the only part receipts may show.
    pub fn last_four(&self) -> String {
        let chars: Vec<char> = self.0.as_ref().chars().collect();
        let start = chars.len().saturating_sub(4);
        chars[start..].iter().collect()
    }
}
