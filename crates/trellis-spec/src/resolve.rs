use std::collections::BTreeSet;

/// Bookkeeping of which child names a spec inherited from the type it
/// extends, versus declared itself.
///
/// Filled in by `resolve_inc`: a name is *inherited* if the parent type
/// declares it (whether or not this spec redefines it), and *overridden*
/// if the parent declares it and this spec redefines it locally.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Inheritance {
    inherited: BTreeSet<String>,
    overridden: BTreeSet<String>,
}

impl Inheritance {
    pub(crate) fn mark_inherited(&mut self, key: &str) {
        self.inherited.insert(key.to_string());
    }

    pub(crate) fn mark_overridden(&mut self, key: &str) {
        self.inherited.insert(key.to_string());
        self.overridden.insert(key.to_string());
    }

    pub(crate) fn is_inherited(&self, key: &str) -> bool {
        self.inherited.contains(key)
    }

    pub(crate) fn is_overridden(&self, key: &str) -> bool {
        self.overridden.contains(key)
    }
}
