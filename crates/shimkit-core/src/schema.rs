//! JSON contract documents
//!
//! A schema document declares contracts without Rust code:
//!
//! ```json
//! {
//!   "contracts": [
//!     { "name": "Animal",
//!       "members": [
//!         { "kind": "property", "name": "Legs", "type": "Integer" },
//!         { "kind": "property", "name": "Tags", "type": "List<String>?", "access": "read_only" },
//!         { "kind": "method", "name": "Speak",
//!           "params": [{ "name": "times", "type": "Integer" }], "returns": "String" }
//!       ] },
//!     { "name": "Owner", "extends": ["Named"],
//!       "members": [{ "kind": "property", "name": "Pet", "type": "Animal" }] }
//!   ]
//! }
//! ```
//!
//! Type expressions name a builtin type or a contract declared earlier in
//! the same document, optionally wrapped as `List<T>` / `Array<T>` and
//! suffixed with `?` for nullable.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::contract::{Access, Annotations, Contract, Member};
use crate::types::TypeDesc;
use crate::{Error, Result};

// ── Document ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDoc {
    contracts: Vec<ContractDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContractDoc {
    name: String,
    #[serde(default)]
    extends: Vec<String>,
    #[serde(default)]
    annotations: Annotations,
    #[serde(default)]
    members: Vec<MemberDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
enum MemberDoc {
    Property {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default = "default_access")]
        access: Access,
        #[serde(default)]
        annotations: Annotations,
    },
    Method {
        name: String,
        #[serde(default)]
        params: Vec<ParamDoc>,
        returns: Option<String>,
        #[serde(default)]
        annotations: Annotations,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamDoc {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

fn default_access() -> Access {
    Access::ReadWrite
}

// ── Schema ────────────────────────────────────────────────

/// Contracts loaded from one schema document, in declaration order
#[derive(Debug, Default)]
pub struct Schema {
    contracts: Vec<Arc<Contract>>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Parse a schema document.
    ///
    /// # Errors
    /// `Schema` for malformed JSON, bad type expressions, unknown or
    /// forward references and duplicate contract names.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: SchemaDoc = serde_json::from_str(text).map_err(|e| Error::Schema(e.to_string()))?;
        let mut schema = Schema::default();
        for contract in doc.contracts {
            let built = schema.build_contract(contract)?;
            schema.insert(built)?;
        }
        tracing::debug!(contracts = schema.contracts.len(), "loaded contract schema");
        Ok(schema)
    }

    fn build_contract(&self, doc: ContractDoc) -> Result<Arc<Contract>> {
        let mut builder = Contract::builder(doc.name.as_str());
        for (key, value) in doc.annotations {
            builder = builder.annotate(key, value);
        }
        for base in &doc.extends {
            let base = self.get(base).ok_or_else(|| {
                Error::Schema(format!("contract '{}' extends unknown contract '{}'", doc.name, base))
            })?;
            builder = builder.extends(Arc::clone(base));
        }
        for member in doc.members {
            builder = builder.member(self.build_member(&doc.name, member)?);
        }
        Ok(builder.build())
    }

    fn build_member(&self, contract: &str, doc: MemberDoc) -> Result<Member> {
        let context = |name: &str, e: Error| match e {
            Error::Schema(msg) => Error::Schema(format!("{}.{}: {}", contract, name, msg)),
            other => other,
        };
        let (member, annotations) = match doc {
            MemberDoc::Property {
                name,
                ty,
                access,
                annotations,
            } => {
                let ty = self.parse_type(&ty).map_err(|e| context(&name, e))?;
                (Member::property(name, ty, access), annotations)
            }
            MemberDoc::Method {
                name,
                params,
                returns,
                annotations,
            } => {
                let mut typed = Vec::with_capacity(params.len());
                for param in params {
                    let ty = self.parse_type(&param.ty).map_err(|e| context(&name, e))?;
                    typed.push((param.name, ty));
                }
                let returns = match returns {
                    Some(expr) => self.parse_type(&expr).map_err(|e| context(&name, e))?,
                    None => TypeDesc::Any,
                };
                (Member::method(name, typed, returns), annotations)
            }
        };
        Ok(annotations
            .into_iter()
            .fold(member, |member, (key, value)| member.annotate(key, value)))
    }

    fn insert(&mut self, contract: Arc<Contract>) -> Result<()> {
        if self.index.contains_key(contract.name()) {
            return Err(Error::Schema(format!(
                "contract '{}' is declared twice",
                contract.name()
            )));
        }
        self.index.insert(contract.name().to_string(), self.contracts.len());
        self.contracts.push(contract);
        Ok(())
    }

    /// Parse a type expression against the contracts declared so far
    pub fn parse_type(&self, expr: &str) -> Result<TypeDesc> {
        let tokens = TypeTokenizer::new(expr).tokenize()?;
        let mut parser = TypeParser {
            tokens: &tokens,
            position: 0,
            schema: self,
        };
        let ty = parser.parse_type()?;
        parser.expect(&TypeToken::Eof)?;
        Ok(ty)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Contract>> {
        self.index.get(name).map(|&i| &self.contracts[i])
    }

    /// Contract by exact name
    pub fn contract(&self, name: &str) -> Result<Arc<Contract>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::Schema(format!("no contract named '{}'", name)))
    }

    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.iter().map(|c| c.name())
    }
}

// ── Type expressions ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum TypeToken {
    Identifier(String),
    LAngle,
    RAngle,
    Question,
    Eof,
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeToken::Identifier(name) => write!(f, "'{}'", name),
            TypeToken::LAngle => write!(f, "'<'"),
            TypeToken::RAngle => write!(f, "'>'"),
            TypeToken::Question => write!(f, "'?'"),
            TypeToken::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug)]
struct SpannedTypeToken {
    token: TypeToken,
    column: usize,
}

struct TypeTokenizer {
    input: Vec<char>,
    position: usize,
}

impl TypeTokenizer {
    fn new(text: &str) -> Self {
        TypeTokenizer {
            input: text.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(&mut self) -> Result<Vec<SpannedTypeToken>> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.position += 1;
            }
            let column = self.position + 1;
            let Some(ch) = self.peek() else {
                tokens.push(SpannedTypeToken {
                    token: TypeToken::Eof,
                    column,
                });
                return Ok(tokens);
            };
            let token = match ch {
                '<' => {
                    self.position += 1;
                    TypeToken::LAngle
                }
                '>' => {
                    self.position += 1;
                    TypeToken::RAngle
                }
                '?' => {
                    self.position += 1;
                    TypeToken::Question
                }
                c if c.is_alphabetic() || c == '_' => self.read_identifier(),
                _ => {
                    return Err(Error::Schema(format!(
                        "unexpected character '{}' at column {}",
                        ch, column
                    )))
                }
            };
            tokens.push(SpannedTypeToken { token, column });
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn read_identifier(&mut self) -> TypeToken {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.position += 1;
        }
        TypeToken::Identifier(self.input[start..self.position].iter().collect())
    }
}

struct TypeParser<'a> {
    tokens: &'a [SpannedTypeToken],
    position: usize,
    schema: &'a Schema,
}

impl TypeParser<'_> {
    fn current(&self) -> &SpannedTypeToken {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) -> TypeToken {
        let token = self.current().token.clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &TypeToken) -> Result<()> {
        let current = self.current();
        if &current.token == expected {
            self.advance();
            Ok(())
        } else {
            Err(Error::Schema(format!(
                "expected {}, found {} at column {}",
                expected, current.token, current.column
            )))
        }
    }

    fn parse_type(&mut self) -> Result<TypeDesc> {
        let column = self.current().column;
        let name = match self.advance() {
            TypeToken::Identifier(name) => name,
            other => {
                return Err(Error::Schema(format!(
                    "expected a type name, found {} at column {}",
                    other, column
                )))
            }
        };

        let mut ty = match name.as_str() {
            "Array" | "List" => {
                self.expect(&TypeToken::LAngle)?;
                let inner = self.parse_type()?;
                self.expect(&TypeToken::RAngle)?;
                TypeDesc::list(inner)
            }
            other => self.named_type(other, column)?,
        };

        while self.current().token == TypeToken::Question {
            self.advance();
            if !matches!(ty, TypeDesc::Nullable(_)) {
                ty = TypeDesc::nullable(ty);
            }
        }
        Ok(ty)
    }

    fn named_type(&self, name: &str, column: usize) -> Result<TypeDesc> {
        let ty = match name {
            "Integer" | "Int" => TypeDesc::Integer,
            "Float" | "Double" => TypeDesc::Float,
            "String" => TypeDesc::String,
            "Boolean" | "Bool" => TypeDesc::Boolean,
            "UUID" | "Uuid" | "Guid" => TypeDesc::Guid,
            "ISO8601" | "DateTime" => TypeDesc::DateTime,
            "Any" => TypeDesc::Any,
            "Map" => TypeDesc::Map,
            "Object" => TypeDesc::Object,
            contract => match self.schema.get(contract) {
                Some(contract) => TypeDesc::Contract(Arc::clone(contract)),
                None => {
                    return Err(Error::Schema(format!(
                        "unknown type '{}' at column {}",
                        contract, column
                    )))
                }
            },
        };
        Ok(ty)
    }
}
