//! Bridging host functions to metadata.
//!
//! A patch often needs to call a method whose shape mirrors a Rust function, for example a
//! hook `fn(String)` that the patched module should call as `void Prism.Hooks::OnLog(string)`.
//! [`HostMethod::of`] derives the metadata signature from the function pointer type, so the
//! resolver can find the method without spelling the parameter types out.
//!
//! ```rust
//! use cilsplice::resolver::HostMethod;
//!
//! let on_log = HostMethod::of::<fn(String)>("Prism", "Prism.Hooks", "OnLog");
//! assert_eq!(on_log.signature.to_string(), "System.Void (System.String)");
//!
//! let draw = HostMethod::instance_of::<fn(i32) -> bool>("Terraria", "Terraria.Main", "DrawMenu");
//! assert_eq!(draw.signature.to_string(), "instance System.Boolean (System.Int32)");
//! ```

use crate::metadata::signatures::{MethodSignature, TypeSignature};

/// A Rust type with a metadata counterpart.
pub trait HostType {
    /// The metadata type of `Self`
    fn type_signature() -> TypeSignature;
}

/// Marker for `System.Object` parameters and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Object;

macro_rules! host_types {
    ($($ty:ty => $sig:expr),* $(,)?) => {
        $(
            impl HostType for $ty {
                fn type_signature() -> TypeSignature {
                    $sig
                }
            }
        )*
    };
}

host_types! {
    () => TypeSignature::Void,
    bool => TypeSignature::Boolean,
    char => TypeSignature::Char,
    i8 => TypeSignature::I1,
    u8 => TypeSignature::U1,
    i16 => TypeSignature::I2,
    u16 => TypeSignature::U2,
    i32 => TypeSignature::I4,
    u32 => TypeSignature::U4,
    i64 => TypeSignature::I8,
    u64 => TypeSignature::U8,
    f32 => TypeSignature::R4,
    f64 => TypeSignature::R8,
    isize => TypeSignature::I,
    usize => TypeSignature::U,
    String => TypeSignature::String,
    &str => TypeSignature::String,
    Object => TypeSignature::Object,
}

impl<T: HostType> HostType for Vec<T> {
    fn type_signature() -> TypeSignature {
        TypeSignature::SzArray(Box::new(T::type_signature()))
    }
}

impl<T: HostType> HostType for &[T] {
    fn type_signature() -> TypeSignature {
        TypeSignature::SzArray(Box::new(T::type_signature()))
    }
}

/// A function pointer type with a metadata signature.
pub trait HostSignature {
    /// Return type and parameters, without calling convention
    fn signature() -> (TypeSignature, Vec<TypeSignature>);
}

macro_rules! host_signatures {
    ($(($($arg:ident),*)),* $(,)?) => {
        $(
            impl<R: HostType, $($arg: HostType),*> HostSignature for fn($($arg),*) -> R {
                fn signature() -> (TypeSignature, Vec<TypeSignature>) {
                    (R::type_signature(), vec![$($arg::type_signature()),*])
                }
            }
        )*
    };
}

host_signatures! {
    (),
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
}

/// A method named by its module, declaring type, name and a host signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMethod {
    /// Name of the defining module
    pub module: String,
    /// Qualified declaring type
    pub type_name: String,
    /// Method name
    pub name: String,
    /// Signature derived from the host function
    pub signature: MethodSignature,
}

impl HostMethod {
    /// A static method shaped like `F`
    #[must_use]
    pub fn of<F: HostSignature>(module: &str, type_name: &str, name: &str) -> Self {
        let (return_type, params) = F::signature();
        Self::new(
            module,
            type_name,
            name,
            MethodSignature::static_method(return_type, params),
        )
    }

    /// An instance method shaped like `F`, `this` excluded
    #[must_use]
    pub fn instance_of<F: HostSignature>(module: &str, type_name: &str, name: &str) -> Self {
        let (return_type, params) = F::signature();
        Self::new(
            module,
            type_name,
            name,
            MethodSignature::instance_method(return_type, params),
        )
    }

    fn new(module: &str, type_name: &str, name: &str, signature: MethodSignature) -> Self {
        HostMethod {
            module: module.to_string(),
            type_name: type_name.to_string(),
            name: name.to_string(),
            signature,
        }
    }

    /// Qualified parameter type names
    #[must_use]
    pub fn param_names(&self) -> Vec<String> {
        self.signature.param_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_signatures() {
        let concat = HostMethod::of::<fn(Vec<Object>) -> String>("mscorlib", "System.String", "Concat");
        assert_eq!(concat.param_names(), vec!["System.Object[]".to_string()]);
        assert_eq!(concat.signature.return_type, TypeSignature::String);
        assert!(!concat.signature.has_this);

        let max = HostMethod::of::<fn(i64, i64) -> i64>("mscorlib", "System.Math", "Max");
        assert_eq!(max.signature.params, vec![TypeSignature::I8, TypeSignature::I8]);

        let update = HostMethod::instance_of::<fn()>("Terraria", "Terraria.Main", "Update");
        assert!(update.signature.has_this);
        assert_eq!(update.signature.return_type, TypeSignature::Void);
        assert!(update.signature.params.is_empty());
    }
}
