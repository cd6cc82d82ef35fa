use std::fmt::{Debug, Formatter};
use std::sync::Arc;

struct Frame<T> {
    name: String,
    value: T,
    next: Option<Arc<Frame<T>>>,
}

/// Persistent lexical environment.
///
/// Binding returns a new environment sharing the tail with the old one, so
/// closures can capture an environment by cloning a pointer.
pub struct Env<T> {
    head: Option<Arc<Frame<T>>>,
}

impl<T> Env<T> {
    pub fn new() -> Self {
        Self { head: None }
    }

    pub fn bind(&self, name: impl Into<String>, value: T) -> Self {
        Self {
            head: Some(Arc::new(Frame {
                name: name.into(),
                value,
                next: self.head.clone(),
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Innermost binding first; shadowed bindings are included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        let mut cursor = self.head.as_deref();
        std::iter::from_fn(move || {
            let frame = cursor?;
            cursor = frame.next.as_deref();
            Some((frame.name.as_str(), &frame.value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Env<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T> Default for Env<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Env<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter().map(|(name, _)| name)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bindings_are_persistent() {
        let base = Env::new().bind("x", 1);
        let shadowed = base.bind("x", 2).bind("y", 3);
        assert_eq!(base.lookup("x"), Some(&1));
        assert_eq!(shadowed.lookup("x"), Some(&2));
        assert_eq!(base.lookup("y"), None);
        assert_eq!(shadowed.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["y", "x", "x"]);
    }
}
