//! Builder stages and the transitions each one allows.
//!
//! A stage is a zero-sized marker carried in the builder's type. Each
//! `Can*` trait lists the stages from which one refinement is legal, so a
//! call that would revisit an earlier stage does not compile.

mod sealed {
    pub trait Sealed {}
}

/// A builder stage.
pub trait Stage: sealed::Sealed {}

macro_rules! stages {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name;

            impl sealed::Sealed for $name {}
            impl Stage for $name {}
        )*
    };
}

stages!(
    /// Nothing refined yet.
    Start,
    /// Returned fields restricted.
    Projected,
    /// Scan consistency chosen.
    Consistent,
    /// Scope chosen.
    Scoped,
    /// Collection chosen.
    Collected,
    /// Call options attached.
    Optioned,
    /// Durability or expiry attached; may repeat.
    Tuned,
    /// Predicate attached.
    Matched,
);

/// Stages from which `project` is legal.
pub trait CanProject: Stage {}
impl CanProject for Start {}

/// Stages from which `with_consistency` is legal.
pub trait CanConsist: Stage {}
impl CanConsist for Start {}

/// Stages from which `in_scope` is legal.
///
/// The scope comes before the collection:
///
/// ```
/// use docspace::{bson::Document, MemoryStore, Template};
///
/// let template = Template::new(MemoryStore::new());
/// let _ = template.find_by_id::<Document>().in_scope("inventory").in_collection("airline");
/// ```
///
/// Choosing the collection first leaves no way back to the scope:
///
/// ```compile_fail
/// use docspace::{bson::Document, MemoryStore, Template};
///
/// let template = Template::new(MemoryStore::new());
/// let _ = template.find_by_id::<Document>().in_collection("airline").in_scope("inventory");
/// ```
pub trait CanScope: Stage {}
impl CanScope for Start {}
impl CanScope for Projected {}
impl CanScope for Consistent {}

/// Stages from which `in_collection` is legal.
pub trait CanCollect: Stage {}
impl CanCollect for Start {}
impl CanCollect for Projected {}
impl CanCollect for Consistent {}
impl CanCollect for Scoped {}

/// Stages from which `with_options` is legal.
pub trait CanConfigure: Stage {}
impl CanConfigure for Start {}
impl CanConfigure for Projected {}
impl CanConfigure for Consistent {}
impl CanConfigure for Scoped {}
impl CanConfigure for Collected {}

/// Stages from which durability and expiry are legal.
pub trait CanTune: Stage {}
impl CanTune for Start {}
impl CanTune for Scoped {}
impl CanTune for Collected {}
impl CanTune for Optioned {}
impl CanTune for Tuned {}

/// Stages from which `matching` is legal.
pub trait CanMatch: Stage {}
impl CanMatch for Start {}
impl CanMatch for Consistent {}
impl CanMatch for Scoped {}
impl CanMatch for Collected {}
impl CanMatch for Optioned {}
