//! Argument coercion.
//!
//! Every parameter a message command declares after its event is resolved,
//! once at registration, to one of three strategies:
//!
//! - **Scalar**: strings, integers, floats and booleans, parsed from a
//!   single token.
//! - **Custom**: a type implementing [`Parseable`], registered with a
//!   template value. Each coercion parses into a fresh clone of the template.
//! - **Manual**: a type implementing [`ManualParseable`] that consumes the
//!   whole token list. It must be the only parameter.
//!
//! Which strategy a type gets is recorded in an [`ArgumentRegistry`], one per
//! router. A type the registry does not know makes registration fail.

use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use courier_core::BoxError;

/// A type that can be parsed from a single token.
///
/// Registered with a template instance through
/// [`ArgumentRegistry::register`]. The template itself is never mutated:
/// every coercion clones it and parses into the clone.
///
/// ```rust,ignore
/// #[derive(Clone, Default)]
/// struct Hex(u32);
///
/// impl Parseable for Hex {
///     fn parse(&mut self, token: &str) -> Result<(), BoxError> {
///         self.0 = u32::from_str_radix(token.trim_start_matches("0x"), 16)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Parseable: Send + Sync + 'static {
    /// Parses `token` into `self`.
    fn parse(&mut self, token: &str) -> Result<(), BoxError>;
}

/// A type that parses the whole token list of a message.
///
/// `args[0]` is the command name with the prefix already removed. A fresh
/// [`Default`] instance is created for every invocation.
pub trait ManualParseable: Send + Sync + 'static {
    /// Parses the token list into `self`.
    fn parse_content(&mut self, args: &[String]) -> Result<(), BoxError>;
}

// ============================================================================
// Scalars
// ============================================================================

/// Built-in single-token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Bool,
}

/// Errors produced while coercing a token into a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// The token is not one of the accepted boolean spellings.
    #[error("invalid bool [true/false]")]
    InvalidBool,

    /// The token is not a valid number of the requested type.
    #[error("invalid {kind} '{token}': {reason}")]
    InvalidNumber {
        /// Name of the requested type.
        kind: &'static str,
        /// The rejected token.
        token: String,
        /// Why parsing failed.
        reason: String,
    },
}

macro_rules! scalar_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        impl ScalarKind {
            /// Every scalar kind, in registry seeding order.
            pub const ALL: &'static [ScalarKind] = &[ScalarKind::String, $(ScalarKind::$variant,)* ScalarKind::Bool];

            /// Returns the [`TypeId`] of the Rust type this kind produces.
            pub fn value_type_id(self) -> TypeId {
                match self {
                    Self::String => TypeId::of::<String>(),
                    Self::Bool => TypeId::of::<bool>(),
                    $(Self::$variant => TypeId::of::<$ty>(),)*
                }
            }

            /// Returns the name of the Rust type this kind produces.
            pub fn name(self) -> &'static str {
                match self {
                    Self::String => "String",
                    Self::Bool => "bool",
                    $(Self::$variant => stringify!($ty),)*
                }
            }

            /// Coerces one token into a value of this kind.
            pub fn coerce(self, token: &str) -> Result<Box<dyn Any + Send>, CoercionError> {
                match self {
                    Self::String => Ok(Box::new(token.to_owned())),
                    Self::Bool => parse_bool(token).map(|b| Box::new(b) as Box<dyn Any + Send>),
                    $(Self::$variant => token
                        .parse::<$ty>()
                        .map(|v| Box::new(v) as Box<dyn Any + Send>)
                        .map_err(|e| CoercionError::InvalidNumber {
                            kind: stringify!($ty),
                            token: token.to_owned(),
                            reason: e.to_string(),
                        }),)*
                }
            }
        }
    };
}

scalar_kinds! {
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    Isize => isize,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    Usize => usize,
    F32 => f32,
    F64 => f64,
}

fn parse_bool(token: &str) -> Result<bool, CoercionError> {
    match token {
        "true" | "yes" | "y" | "Y" | "1" => Ok(true),
        "false" | "no" | "n" | "N" | "0" => Ok(false),
        _ => Err(CoercionError::InvalidBool),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// How a registered type is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSpec {
    /// A built-in single-token type.
    Scalar(ScalarKind),
    /// A [`Parseable`] type registered with a template.
    Custom(TypeId),
    /// A [`ManualParseable`] type consuming the whole token list.
    Manual(TypeId),
}

impl ArgumentSpec {
    /// Returns `true` for whole-line types.
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

trait CustomTemplate: Send + Sync {
    fn parse_clone(&self, token: &str) -> Result<Box<dyn Any + Send>, BoxError>;
}

struct Template<T>(T);

impl<T: Parseable + Clone> CustomTemplate for Template<T> {
    fn parse_clone(&self, token: &str) -> Result<Box<dyn Any + Send>, BoxError> {
        let mut value = self.0.clone();
        value.parse(token)?;
        Ok(Box::new(value))
    }
}

trait ManualFactory: Send + Sync {
    fn parse_fresh(&self, args: &[String]) -> Result<Box<dyn Any + Send>, BoxError>;
}

struct Fresh<T>(PhantomData<fn() -> T>);

impl<T: ManualParseable + Default> ManualFactory for Fresh<T> {
    fn parse_fresh(&self, args: &[String]) -> Result<Box<dyn Any + Send>, BoxError> {
        let mut value = T::default();
        value.parse_content(args)?;
        Ok(Box::new(value))
    }
}

#[derive(Clone)]
enum Entry {
    Scalar(ScalarKind),
    Custom(Arc<dyn CustomTemplate>),
    Manual(Arc<dyn ManualFactory>),
}

/// Maps argument types to their coercion strategy.
///
/// A fresh registry knows every [`ScalarKind`] and [`RawArguments`].
#[derive(Clone)]
pub struct ArgumentRegistry {
    entries: HashMap<TypeId, (&'static str, Entry)>,
}

impl Default for ArgumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgumentRegistry {
    /// Creates a registry seeded with the built-in types.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        for &kind in ScalarKind::ALL {
            registry
                .entries
                .insert(kind.value_type_id(), (kind.name(), Entry::Scalar(kind)));
        }
        registry.register_manual::<RawArguments>();
        registry
    }

    /// Registers a single-token type using `template` as its starting value.
    ///
    /// Registering a type again replaces the previous template.
    pub fn register<T: Parseable + Clone>(&mut self, template: T) -> &mut Self {
        self.entries.insert(
            TypeId::of::<T>(),
            (type_name::<T>(), Entry::Custom(Arc::new(Template(template)))),
        );
        self
    }

    /// Registers a whole-line type.
    pub fn register_manual<T: ManualParseable + Default>(&mut self) -> &mut Self {
        self.entries.insert(
            TypeId::of::<T>(),
            (type_name::<T>(), Entry::Manual(Arc::new(Fresh::<T>(PhantomData)))),
        );
        self
    }

    /// Returns the strategy for a type, if it is registered.
    pub fn spec(&self, type_id: TypeId) -> Option<ArgumentSpec> {
        self.entries.get(&type_id).map(|(_, entry)| match entry {
            Entry::Scalar(kind) => ArgumentSpec::Scalar(*kind),
            Entry::Custom(_) => ArgumentSpec::Custom(type_id),
            Entry::Manual(_) => ArgumentSpec::Manual(type_id),
        })
    }

    /// Returns `true` if `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn resolve(&self, ty: ArgumentType) -> Option<Coercer> {
        self.entries.get(&ty.id).map(|(_, entry)| match entry {
            Entry::Scalar(kind) => Coercer::Token(TokenCoercer {
                name: ty.name,
                kind: TokenKind::Scalar(*kind),
            }),
            Entry::Custom(template) => Coercer::Token(TokenCoercer {
                name: ty.name,
                kind: TokenKind::Custom(Arc::clone(template)),
            }),
            Entry::Manual(factory) => Coercer::Manual(ManualCoercer {
                name: ty.name,
                factory: Arc::clone(factory),
            }),
        })
    }
}

impl fmt::Debug for ArgumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("ArgumentRegistry")
            .field("types", &names)
            .finish()
    }
}


// ============================================================================
// Resolved coercers
// ============================================================================

/// A parameter type as declared by a command, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentType {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl ArgumentType {
    /// Returns the declared type of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub(crate) enum Coercer {
    Token(TokenCoercer),
    Manual(ManualCoercer),
}

/// Coerces one token into one argument.
#[derive(Clone)]
pub struct TokenCoercer {
    name: &'static str,
    kind: TokenKind,
}

#[derive(Clone)]
enum TokenKind {
    Scalar(ScalarKind),
    Custom(Arc<dyn CustomTemplate>),
}

impl TokenCoercer {
    /// Returns the name of the produced type.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Coerces `token` into a boxed value of the produced type.
    pub fn coerce(&self, token: &str) -> Result<Box<dyn Any + Send>, BoxError> {
        match &self.kind {
            TokenKind::Scalar(kind) => kind.coerce(token).map_err(Into::into),
            TokenKind::Custom(template) => template.parse_clone(token),
        }
    }
}

impl fmt::Debug for TokenCoercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Coerces a whole token list into one argument.
#[derive(Clone)]
pub struct ManualCoercer {
    name: &'static str,
    factory: Arc<dyn ManualFactory>,
}

impl ManualCoercer {
    /// Returns the name of the produced type.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Parses `args` into a fresh boxed value of the produced type.
    pub fn coerce(&self, args: &[String]) -> Result<Box<dyn Any + Send>, BoxError> {
        self.factory.parse_fresh(args)
    }
}

impl fmt::Debug for ManualCoercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (manual)", self.name)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Returned when a command body takes an argument of the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument {index} is missing or is not a {expected}")]
pub struct ArgumentMismatch {
    /// Position of the argument.
    pub index: usize,
    /// Type the body asked for.
    pub expected: &'static str,
}

/// Coerced arguments of one invocation, handed out in declaration order.
#[derive(Default)]
pub struct Arguments {
    values: VecDeque<Box<dyn Any + Send>>,
    taken: usize,
}

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, value: Box<dyn Any + Send>) {
        self.values.push_back(value);
    }

    /// Returns the number of arguments not taken yet.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if every argument has been taken.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument as a `T`.
    pub fn take<T: 'static>(&mut self) -> Result<T, ArgumentMismatch> {
        let index = self.taken;
        self.taken += 1;

        let mismatch = || ArgumentMismatch {
            index,
            expected: type_name::<T>(),
        };
        let value = self.values.pop_front().ok_or_else(mismatch)?;
        value.downcast::<T>().map(|v| *v).map_err(|_| mismatch())
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("remaining", &self.values.len())
            .field("taken", &self.taken)
            .finish()
    }
}

// ============================================================================
// RawArguments
// ============================================================================

/// Name given to the command when re-parsing raw arguments.
pub const RAW_COMMAND_NAME: &str = "command";

/// Built-in whole-line type: every token after the command name, untouched.
///
/// With the `command` feature the tokens can be handed to a clap parser:
///
/// ```rust,ignore
/// #[derive(clap::Parser)]
/// struct Ban {
///     user: String,
///     #[arg(long)]
///     days: Option<u32>,
/// }
///
/// pub fn ban(&self, m: &MessageCreate, args: RawArguments) -> Result<(), BoxError> {
///     let ban: Ban = args.parse_with()?;
///     ...
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArguments {
    args: Vec<String>,
}

impl RawArguments {
    /// Returns the arguments.
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Consumes self, returning the arguments.
    pub fn into_vec(self) -> Vec<String> {
        self.args
    }

    /// Short usage hint.
    pub fn usage(&self) -> &'static str {
        "flags..."
    }

    /// Parses the arguments with a clap parser.
    #[cfg(feature = "command")]
    pub fn parse_with<C: clap::Parser>(&self) -> Result<C, clap::Error> {
        C::try_parse_from(
            std::iter::once(RAW_COMMAND_NAME).chain(self.args.iter().map(String::as_str)),
        )
    }
}

impl std::ops::Deref for RawArguments {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.args
    }
}

impl ManualParseable for RawArguments {
    fn parse_content(&mut self, args: &[String]) -> Result<(), BoxError> {
        self.args = args.get(1..).unwrap_or_default().to_vec();
        Ok(())
    }
}
