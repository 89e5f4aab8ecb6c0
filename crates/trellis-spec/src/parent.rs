use crate::error::{SpecError, SpecResult};

/// Set-exactly-once back-reference from a spec to its owner.
///
/// Holds the owner's spec path rather than a pointer, so spec trees stay
/// plainly clonable and serializable. Attaching a spec that already has an
/// owner is an error; the back-reference is never cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parent {
    path: Option<String>,
}

impl Parent {
    /// Record the owner's path. Fails on a second call.
    pub fn set(&mut self, child_path: &str, owner_path: impl Into<String>) -> SpecResult<()> {
        if self.path.is_some() {
            return Err(SpecError::ParentReassigned {
                path: child_path.to_string(),
            });
        }
        self.path = Some(owner_path.into());
        Ok(())
    }

    /// The owner's path, if attached.
    pub fn get(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Whether this spec has been attached to an owner.
    pub fn is_set(&self) -> bool {
        self.path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_sets_exactly_once() {
        let mut parent = Parent::default();
        assert!(!parent.is_set());
        parent.set("label", "Foo").unwrap();
        assert_eq!(parent.get(), Some("Foo"));
        let err = parent.set("label", "Bar").unwrap_err();
        assert!(matches!(err, SpecError::ParentReassigned { path } if path == "label"));
        assert_eq!(parent.get(), Some("Foo"));
    }
}
