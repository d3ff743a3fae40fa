//! Statically typed contract wrappers
//!
//! [`contract!`](crate::contract) declares a contract and a struct
//! presenting it with typed accessors. The struct wraps an [`Instance`] of
//! the contract's synthesized type, so every accessor goes through the same
//! shim machinery as loosely typed access.
//!
//! ```ignore
//! shimkit_core::contract! {
//!     /// Something with legs
//!     pub struct Animal : "Animal" {
//!         /// Number of legs
//!         rw "Legs" => legs, set_legs: i64;
//!         ro "Name" => name: String;
//!         wo "Secret" => set_secret: String;
//!         fn "Speak" => speak(times: i64) -> String;
//!     }
//! }
//!
//! let dog = Animal::over(vec![map.into()], MatchMode::Fuzzy)?;
//! dog.set_legs(4)?;
//! ```
//!
//! Doc comments become rustdoc on the generated items and `doc`
//! annotations on the contract and its members. Member types are any
//! [`ContractValue`](crate::ContractValue), including other generated
//! contract structs.
//!
//! [`Instance`]: crate::Instance

/// Declare a contract together with a typed wrapper struct.
///
/// See the [module documentation](crate::macros) for the syntax.
#[macro_export]
macro_rules! contract {
    // ── Descriptor ────────────────────────────────────────
    (@describe $b:ident; ) => { $b };
    (@describe $b:ident;
        $(#[doc = $doc:literal])*
        rw $n:literal => $get:ident, $set:ident : $ty:ty;
        $($rest:tt)*
    ) => {{
        let member = $crate::Member::property(
            $n,
            <$ty as $crate::ContractValue>::type_desc(),
            $crate::Access::ReadWrite,
        );
        $( let member = member.doc($doc); )*
        let $b = $b.member(member);
        $crate::contract!(@describe $b; $($rest)*)
    }};
    (@describe $b:ident;
        $(#[doc = $doc:literal])*
        ro $n:literal => $get:ident : $ty:ty;
        $($rest:tt)*
    ) => {{
        let member = $crate::Member::property(
            $n,
            <$ty as $crate::ContractValue>::type_desc(),
            $crate::Access::ReadOnly,
        );
        $( let member = member.doc($doc); )*
        let $b = $b.member(member);
        $crate::contract!(@describe $b; $($rest)*)
    }};
    (@describe $b:ident;
        $(#[doc = $doc:literal])*
        wo $n:literal => $set:ident : $ty:ty;
        $($rest:tt)*
    ) => {{
        let member = $crate::Member::property(
            $n,
            <$ty as $crate::ContractValue>::type_desc(),
            $crate::Access::WriteOnly,
        );
        $( let member = member.doc($doc); )*
        let $b = $b.member(member);
        $crate::contract!(@describe $b; $($rest)*)
    }};
    (@describe $b:ident;
        $(#[doc = $doc:literal])*
        fn $n:literal => $m:ident ( $($p:ident : $pty:ty),* ) -> $ret:ty;
        $($rest:tt)*
    ) => {{
        let params: ::std::vec::Vec<(&str, $crate::TypeDesc)> = ::std::vec![
            $( (stringify!($p), <$pty as $crate::ContractValue>::type_desc()) ),*
        ];
        let member = $crate::Member::method(
            $n,
            params,
            <$ret as $crate::ContractValue>::type_desc(),
        );
        $( let member = member.doc($doc); )*
        let $b = $b.member(member);
        $crate::contract!(@describe $b; $($rest)*)
    }};

    // ── Accessors ─────────────────────────────────────────
    (@accessors) => {};
    (@accessors
        $(#[doc = $doc:literal])*
        rw $n:literal => $get:ident, $set:ident : $ty:ty;
        $($rest:tt)*
    ) => {
        $(#[doc = $doc])*
        pub fn $get(&self) -> $crate::Result<$ty> {
            self.instance.get_as::<$ty>($n)
        }

        #[doc = concat!("Write `", $n, "`")]
        pub fn $set(&self, value: $ty) -> $crate::Result<()> {
            self.instance.set_as::<$ty>($n, value)
        }

        $crate::contract!(@accessors $($rest)*);
    };
    (@accessors
        $(#[doc = $doc:literal])*
        ro $n:literal => $get:ident : $ty:ty;
        $($rest:tt)*
    ) => {
        $(#[doc = $doc])*
        pub fn $get(&self) -> $crate::Result<$ty> {
            self.instance.get_as::<$ty>($n)
        }

        $crate::contract!(@accessors $($rest)*);
    };
    (@accessors
        $(#[doc = $doc:literal])*
        wo $n:literal => $set:ident : $ty:ty;
        $($rest:tt)*
    ) => {
        $(#[doc = $doc])*
        pub fn $set(&self, value: $ty) -> $crate::Result<()> {
            self.instance.set_as::<$ty>($n, value)
        }

        $crate::contract!(@accessors $($rest)*);
    };
    (@accessors
        $(#[doc = $doc:literal])*
        fn $n:literal => $m:ident ( $($p:ident : $pty:ty),* ) -> $ret:ty;
        $($rest:tt)*
    ) => {
        $(#[doc = $doc])*
        pub fn $m(&self, $($p: $pty),*) -> $crate::Result<$ret> {
            self.instance.call_as::<$ret>(
                $n,
                ::std::vec![$( $crate::ContractValue::into_value($p) ),*],
            )
        }

        $crate::contract!(@accessors $($rest)*);
    };

    // ── Entry ─────────────────────────────────────────────
    (
        $(#[doc = $cdoc:literal])*
        $vis:vis struct $name:ident : $cname:literal { $($body:tt)* }
    ) => {
        $(#[doc = $cdoc])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            instance: $crate::Instance,
        }

        impl $name {
            /// The contract this type presents
            pub fn descriptor() -> ::std::sync::Arc<$crate::Contract> {
                static DESCRIPTOR: $crate::__private::OnceCell<::std::sync::Arc<$crate::Contract>> =
                    $crate::__private::OnceCell::new();
                ::std::sync::Arc::clone(DESCRIPTOR.get_or_init(|| {
                    let builder = $crate::Contract::builder($cname);
                    $( let builder = builder.doc($cdoc); )*
                    let builder = $crate::contract!(@describe builder; $($body)*);
                    builder.build()
                }))
            }

            pub fn synthesized(
                mode: $crate::MatchMode,
            ) -> $crate::Result<::std::sync::Arc<$crate::SynthesizedType>> {
                $crate::ContractTypeFactory::global().make_type_for(&Self::descriptor(), mode)
            }

            /// A fresh value over plain data
            pub fn new() -> $crate::Result<Self> {
                let instance = Self::synthesized($crate::MatchMode::Strict)?.instantiate()?;
                Ok(Self { instance })
            }

            /// A value forwarding to `chain`
            pub fn over(
                chain: ::std::vec::Vec<$crate::Value>,
                mode: $crate::MatchMode,
            ) -> $crate::Result<Self> {
                let instance = Self::synthesized(mode)?.instantiate_over(chain)?;
                Ok(Self { instance })
            }

            pub fn instance(&self) -> &$crate::Instance {
                &self.instance
            }

            $crate::contract!(@accessors $($body)*);
        }

        impl $crate::ContractValue for $name {
            fn type_desc() -> $crate::TypeDesc {
                $crate::TypeDesc::Contract(Self::descriptor())
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                match value {
                    $crate::Value::Shim(shim) => {
                        let instance = Self::synthesized(shim.mode())?.attach(shim)?;
                        Ok(Self { instance })
                    }
                    value @ ($crate::Value::Map(_) | $crate::Value::Object(_)) => {
                        Self::over(::std::vec![value], $crate::MatchMode::default())
                    }
                    _ => Self::new(),
                }
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::Shim(self.instance.into_shim())
            }
        }

        impl ::std::convert::From<$name> for $crate::Value {
            fn from(value: $name) -> Self {
                $crate::ContractValue::into_value(value)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use crate::{Callable, ContractValue, MapRef, MatchMode, TypeDesc, Value};

    crate::contract! {
        /// Something with legs
        pub struct Animal : "Animal" {
            /// Number of legs
            rw "Legs" => legs, set_legs: i64;
            ro "Name" => name: String;
        }
    }

    crate::contract! {
        pub struct Owner : "Owner" {
            rw "Pet" => pet, set_pet: Animal;
            ro "Id" => id: Uuid;
            wo "Password" => set_password: String;
            /// Say hello
            fn "Greet" => greet(who: String) -> String;
            fn "Reset" => reset() -> ();
        }
    }

    // ── Descriptors ───────────────────────────────────────

    #[test]
    fn test_descriptor_is_built_once() {
        assert!(Arc::ptr_eq(&Animal::descriptor(), &Animal::descriptor()));
        let owner = Owner::descriptor();
        let names: Vec<&str> = owner.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Pet", "Id", "Password", "Greet", "Reset"]);
        assert!(owner.validate().is_ok());
    }

    #[test]
    fn test_doc_comments_become_annotations() {
        let animal = Animal::descriptor();
        assert_eq!(
            animal.annotations().get("doc").map(String::as_str),
            Some("Something with legs")
        );
        assert_eq!(
            animal.members()[0].annotations().get("doc").map(String::as_str),
            Some("Number of legs")
        );
        let ty = Owner::synthesized(MatchMode::Fuzzy).unwrap();
        assert_eq!(
            ty.member_annotations("Greet").and_then(|a| a.get("doc")).map(String::as_str),
            Some("Say hello")
        );
    }

    #[test]
    fn test_member_types_follow_rust_types() {
        let owner = Owner::descriptor();
        assert_eq!(owner.members()[0].ty(), &Animal::type_desc());
        assert_eq!(owner.members()[1].ty(), &TypeDesc::Guid);
        assert_eq!(owner.members()[3].params()[0].name, "who");
        assert_eq!(owner.members()[4].arity(), 0);
    }

    // ── Plain data ────────────────────────────────────────

    #[test]
    fn test_new_over_plain_data() {
        let owner = Owner::new().unwrap();
        assert_eq!(owner.id(), Ok(Uuid::nil()));
        let pet = owner.pet().unwrap();
        assert_eq!(pet.legs(), Ok(0));
        pet.set_legs(4).unwrap();
        assert_eq!(owner.pet().unwrap().legs(), Ok(4));
        owner.set_password("hunter2".to_string()).unwrap();
        assert!(owner.greet("Bob".to_string()).is_err());
    }

    #[test]
    fn test_set_nested_value() {
        let owner = Owner::new().unwrap();
        let rex = Animal::new().unwrap();
        rex.set_legs(3).unwrap();
        owner.set_pet(rex).unwrap();
        assert_eq!(owner.pet().unwrap().legs(), Ok(3));
    }

    // ── Backed values ─────────────────────────────────────

    #[test]
    fn test_over_dictionary() {
        let greet = Callable::new(|args| Ok(Value::from(format!("hello {}", args[0].as_str().unwrap_or("")))));
        let reset = Callable::new(|_| Ok(Value::Null));
        let map = MapRef::from_entries([
            ("pet", Value::from(MapRef::from_entries([("legs", Value::from("4"))]))),
            ("greet", Value::Function(greet)),
            ("reset", Value::Function(reset)),
        ]);
        let owner = Owner::over(vec![Value::Map(map)], MatchMode::Fuzzy).unwrap();
        assert_eq!(owner.pet().unwrap().legs(), Ok(4));
        assert_eq!(owner.pet().unwrap().name(), Ok(String::new()));
        assert_eq!(owner.greet("Bob".to_string()), Ok("hello Bob".to_string()));
        assert_eq!(owner.reset(), Ok(()));
    }

    #[test]
    fn test_round_trip_through_value() {
        let rex = Animal::new().unwrap();
        rex.set_legs(2).unwrap();
        let value: Value = rex.into();
        let back = Animal::from_value(value).unwrap();
        assert_eq!(back.legs(), Ok(2));
        let fresh = Animal::from_value(Value::Null).unwrap();
        assert_eq!(fresh.legs(), Ok(0));
    }
}
