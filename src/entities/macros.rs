//! Macros for reducing boilerplate when declaring documents
//!
//! A document type is a plain serde struct with a key field and a flattened
//! [`Timestamps`](crate::core::entity::Timestamps) block named `timestamps`.
//! These macros generate its static schema and trait implementations.

/// Implement `Persistable` for a document struct
///
/// # Example
/// ```rust,ignore
/// impl_document!(Location,
///     key: id: Uuid,
///     collection: "locations",
///     name: "location",
///     required: ["phone", "user"],
///     references: ["country" => "countries", "user" => "users"],
///     indexes: [IndexSpec::new("domain_instance", DOMAIN_INSTANCE)
///         .unique()
///         .partial_on_string("domain")],
/// );
/// ```
///
/// The key field may be `Option<K>` (store-assigned keys) or a plain natural
/// key such as `String`. `auto_dereference: true` makes the resolver load this
/// type's references strictly.
#[macro_export]
macro_rules! impl_document {
    (@auto) => {
        false
    };
    (@auto $auto:literal) => {
        $auto
    };
    (
        $type:ty,
        key: $key_field:ident : $key_ty:ty,
        collection: $collection:literal,
        name: $name:literal
        $(, required: [$($required:literal),* $(,)?])?
        $(, references: [$($ref_path:literal => $ref_target:literal),* $(,)?])?
        $(, indexes: [$($index:expr),* $(,)?])?
        $(, auto_dereference: $auto:literal)?
        $(,)?
    ) => {
        impl $crate::core::entity::Persistable for $type {
            type Key = $key_ty;

            fn schema() -> &'static $crate::core::entity::EntitySchema {
                static SCHEMA: $crate::core::entity::EntitySchema =
                    $crate::core::entity::EntitySchema {
                        name: $name,
                        collection: $collection,
                        key_field: stringify!($key_field),
                        required: &[$($($required),*)?],
                        references: &[$($(
                            $crate::core::entity::ReferenceField::new($ref_path, $ref_target)
                        ),*)?],
                        indexes: &[$($($index),*)?],
                        auto_dereference: $crate::impl_document!(@auto $($auto)?),
                    };
                &SCHEMA
            }

            fn primary_key(&self) -> Option<$key_ty> {
                $crate::core::entity::KeySlot::<$key_ty>::current_key(&self.$key_field)
            }

            fn timestamps(&self) -> &$crate::core::entity::Timestamps {
                &self.timestamps
            }

            fn timestamps_mut(&mut self) -> &mut $crate::core::entity::Timestamps {
                &mut self.timestamps
            }
        }
    };
}

/// Implement `Serializable`, optionally with fields that are always redacted
///
/// ```rust,ignore
/// impl_serializable!(User, redact: ["password"]);
/// impl_serializable!(Currency, Country, Category);
/// ```
#[macro_export]
macro_rules! impl_serializable {
    ($type:ty, redact: [$($field:literal),* $(,)?]) => {
        impl $crate::core::entity::Serializable for $type {
            fn redacted_fields() -> &'static [&'static str] {
                &[$($field),*]
            }
        }
    };
    ($($type:ty),+ $(,)?) => {
        $(impl $crate::core::entity::Serializable for $type {})+
    };
}
