//! Contract descriptors
//!
//! A contract is an explicit, immutable description of a member set:
//! properties with an access direction and a declared type, and methods
//! with ordered parameters and a return type. Descriptors stand in for
//! runtime reflection; they are built with [`ContractBuilder`], by the
//! `contract!` macro, or from a JSON schema document.
//!
//! # Identity
//!
//! A contract is identified by its fingerprint: the SHA-256 of a canonical
//! text form covering the name, annotations, members (in declaration order)
//! and the fingerprints of composed contracts. Two structurally identical
//! descriptors share a fingerprint and therefore share synthesized types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::catalog::MemberCatalog;
use crate::types::TypeDesc;
use crate::{validate, Error, Result};

/// Free-form descriptive metadata (e.g. `doc`)
pub type Annotations = BTreeMap<String, String>;

/// Direction a property may be accessed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn can_read(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::ReadOnly => write!(f, "read_only"),
            Access::WriteOnly => write!(f, "write_only"),
            Access::ReadWrite => write!(f, "read_write"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Property(Access),
    Method,
}

/// A method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
}

/// One declared member of a contract
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    name: String,
    kind: MemberKind,
    /// Property type, or method return type
    ty: TypeDesc,
    params: Vec<Param>,
    annotations: Annotations,
}

impl Member {
    pub fn property(name: impl Into<String>, ty: TypeDesc, access: Access) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::Property(access),
            ty,
            params: Vec::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn method<N: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = (N, TypeDesc)>,
        returns: TypeDesc,
    ) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::Method,
            ty: returns,
            params: params
                .into_iter()
                .map(|(name, ty)| Param {
                    name: name.into(),
                    ty,
                })
                .collect(),
            annotations: Annotations::new(),
        }
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Append a documentation line to the `doc` annotation
    pub fn doc(mut self, line: &str) -> Self {
        append_doc(&mut self.annotations, line);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn access(&self) -> Option<Access> {
        match self.kind {
            MemberKind::Property(access) => Some(access),
            MemberKind::Method => None,
        }
    }

    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    pub fn is_readable(&self) -> bool {
        self.access().is_some_and(Access::can_read)
    }

    pub fn is_writable(&self) -> bool {
        self.access().is_some_and(Access::can_write)
    }

    /// Human-readable signature, e.g. `Greet(who: String) -> String`
    pub fn signature(&self) -> String {
        match self.kind {
            MemberKind::Property(access) => format!("{}: {} [{}]", self.name, self.ty, access),
            MemberKind::Method => {
                let params: Vec<String> = self
                    .params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty))
                    .collect();
                format!("{}({}) -> {}", self.name, params.join(", "), self.ty)
            }
        }
    }

    /// True when both members are methods with identical parameter types
    pub(crate) fn same_signature(&self, other: &Member) -> bool {
        self.is_method()
            && other.is_method()
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }

    fn canonical(&self, out: &mut String) {
        match self.kind {
            MemberKind::Property(access) => {
                out.push_str(&format!("property {} {} {}", access, self.name, self.ty.canonical()));
            }
            MemberKind::Method => {
                let params: Vec<String> = self
                    .params
                    .iter()
                    .map(|p| format!("{}:{}", p.name, p.ty.canonical()))
                    .collect();
                out.push_str(&format!(
                    "method {}({}) {}",
                    self.name,
                    params.join(","),
                    self.ty.canonical()
                ));
            }
        }
        write_annotations(out, &self.annotations);
        out.push('\n');
    }
}

fn append_doc(annotations: &mut Annotations, line: &str) {
    let line = line.strip_prefix(' ').unwrap_or(line);
    annotations
        .entry("doc".to_string())
        .and_modify(|doc| {
            doc.push('\n');
            doc.push_str(line);
        })
        .or_insert_with(|| line.to_string());
}

fn write_annotations(out: &mut String, annotations: &Annotations) {
    for (key, value) in annotations {
        out.push_str(&format!(" @{}={:?}", key, value));
    }
}

// ── Contract ──────────────────────────────────────────────

/// An immutable member-set description
pub struct Contract {
    name: String,
    members: Vec<Member>,
    extends: Vec<Arc<Contract>>,
    annotations: Annotations,
    catalog: OnceCell<MemberCatalog>,
    fingerprint: OnceCell<String>,
    validity: OnceCell<Result<()>>,
}

impl Contract {
    pub fn builder(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder {
            name: name.into(),
            members: Vec::new(),
            extends: Vec::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members declared directly on this contract, in declaration order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Composed contracts whose members this one inherits
    pub fn extends(&self) -> &[Arc<Contract>] {
        &self.extends
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// The member index, built on first use and never rebuilt
    pub fn catalog(&self) -> &MemberCatalog {
        self.catalog.get_or_init(|| MemberCatalog::build(self))
    }

    /// SHA-256 over the canonical form, hex encoded
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.canonical_form().as_bytes());
            format!("{:x}", hasher.finalize())
        })
    }

    /// True when both contracts describe the same member set
    pub fn same_shape(&self, other: &Contract) -> bool {
        std::ptr::eq(self, other) || self.fingerprint() == other.fingerprint()
    }

    /// Validate the contract shape; the outcome is computed once.
    ///
    /// # Errors
    /// Returns `InvalidContract` carrying every error diagnostic found.
    pub fn validate(&self) -> Result<()> {
        self.validity
            .get_or_init(|| {
                let report = validate::verify(self);
                if report.is_valid() {
                    Ok(())
                } else {
                    Err(Error::InvalidContract {
                        contract: self.name.clone(),
                        diagnostics: report.errors().iter().map(|d| d.to_string()).collect(),
                    })
                }
            })
            .clone()
    }

    /// Deterministic text form the fingerprint is computed over
    pub fn canonical_form(&self) -> String {
        let mut out = format!("contract {}", self.name);
        write_annotations(&mut out, &self.annotations);
        out.push('\n');
        for base in &self.extends {
            out.push_str(&format!("extends {}\n", base.fingerprint()));
        }
        for member in &self.members {
            member.canonical(&mut out);
        }
        out
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("members", &self.members)
            .field(
                "extends",
                &self.extends.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Incremental builder for [`Contract`]
#[derive(Debug)]
pub struct ContractBuilder {
    name: String,
    members: Vec<Member>,
    extends: Vec<Arc<Contract>>,
    annotations: Annotations,
}

impl ContractBuilder {
    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn property(self, name: impl Into<String>, ty: TypeDesc, access: Access) -> Self {
        self.member(Member::property(name, ty, access))
    }

    pub fn read_write(self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.property(name, ty, Access::ReadWrite)
    }

    pub fn read_only(self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.property(name, ty, Access::ReadOnly)
    }

    pub fn write_only(self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.property(name, ty, Access::WriteOnly)
    }

    pub fn method<N: Into<String>>(
        self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = (N, TypeDesc)>,
        returns: TypeDesc,
    ) -> Self {
        self.member(Member::method(name, params, returns))
    }

    pub fn extends(mut self, base: Arc<Contract>) -> Self {
        self.extends.push(base);
        self
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn doc(mut self, line: &str) -> Self {
        append_doc(&mut self.annotations, line);
        self
    }

    pub fn build(self) -> Arc<Contract> {
        Arc::new(Contract {
            name: self.name,
            members: self.members,
            extends: self.extends,
            annotations: self.annotations,
            catalog: OnceCell::new(),
            fingerprint: OnceCell::new(),
            validity: OnceCell::new(),
        })
    }
}
