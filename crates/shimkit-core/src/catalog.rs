//! Per-contract member index
//!
//! A [`MemberCatalog`] flattens a contract and everything it extends into
//! one property table and one overload table, each indexed by a
//! [`NameIndex`] so exact and fuzzy lookups are both constant time.

use crate::contract::{Contract, Member};
use crate::resolver::{MatchMode, NameIndex};

/// Flattened, indexed member set of one contract
#[derive(Debug, Clone, Default)]
pub struct MemberCatalog {
    properties: Vec<Member>,
    property_index: NameIndex,
    /// Overload groups, one per distinct method name
    methods: Vec<Vec<Member>>,
    method_index: NameIndex,
}

impl MemberCatalog {
    /// Own members first, then each extended contract's catalog in order.
    /// Never fails: conflicts resolve to the first occurrence.
    pub fn build(contract: &Contract) -> Self {
        let mut catalog = MemberCatalog::default();
        for member in contract.members() {
            catalog.add(member);
        }
        for base in contract.extends() {
            let inherited = base.catalog();
            for member in inherited.properties() {
                catalog.add(member);
            }
            for member in inherited.all_methods() {
                catalog.add(member);
            }
        }
        tracing::debug!(
            contract = contract.name(),
            properties = catalog.properties.len(),
            methods = catalog.methods.len(),
            "built member catalog"
        );
        catalog
    }

    fn add(&mut self, member: &Member) {
        if member.is_method() {
            self.add_method(member);
        } else if self.property_index.insert(member.name(), self.properties.len()) {
            self.properties.push(member.clone());
        }
    }

    fn add_method(&mut self, member: &Member) {
        match self.method_index.lookup(member.name(), MatchMode::Strict) {
            Some((slot, _)) => {
                let group = &mut self.methods[slot];
                if !group.iter().any(|m| m.same_signature(member)) {
                    group.push(member.clone());
                }
            }
            None => {
                self.method_index.insert(member.name(), self.methods.len());
                self.methods.push(vec![member.clone()]);
            }
        }
    }

    pub fn property(&self, name: &str, mode: MatchMode) -> Option<&Member> {
        self.property_index
            .lookup(name, mode)
            .map(|(slot, _)| &self.properties[slot])
    }

    /// Every overload of the resolved method name, in declaration order
    pub fn methods(&self, name: &str, mode: MatchMode) -> &[Member] {
        match self.method_index.lookup(name, mode) {
            Some((slot, _)) => &self.methods[slot],
            None => &[],
        }
    }

    /// First-declared overload taking `arity` arguments, from the most
    /// precisely matching name group that has one
    pub fn method(&self, name: &str, arity: usize, mode: MatchMode) -> Option<&Member> {
        self.method_index
            .lookup_all(name, mode)
            .into_iter()
            .find_map(|(slot, _)| self.methods[slot].iter().find(|m| m.arity() == arity))
    }

    pub fn properties(&self) -> &[Member] {
        &self.properties
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &Member> {
        self.methods.iter().flatten()
    }

    /// Number of distinct properties plus method overloads
    pub fn len(&self) -> usize {
        self.properties.len() + self.methods.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
