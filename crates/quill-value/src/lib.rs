//! # Quill Value
//!
//! Value engine of the quill PHP runtime: dynamically typed values, ordered
//! copy-on-write arrays, reference cells and deferred call arguments.
//!
//! ## Design Principles
//!
//! - **Single-threaded contexts**: values use `Rc`/`RefCell` and never cross
//!   threads; [`ConstArray`] is the one shareable container
//! - **Copy-on-write arrays**: assigning an array is O(1); the first write
//!   through a shared copy forks the table
//! - **References are cells**: an element bound with `&` holds a [`Var`] that
//!   array copies share
//! - **Total conversions**: coercions never fail; only container adapters and
//!   the codec return [`ValueResult`]

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod arg;
pub mod array;
pub mod config;
pub mod copy;
pub mod entry;
pub mod error;
pub mod key;
pub mod marshal;
pub mod numeric;
pub mod object;
pub mod serialize;
pub mod string;
pub mod value;
pub mod var;

pub use arg::{ArgBase, ArgValue, ParamMode, ResolvedArg};
pub use array::{ArrayAccess, ArrayValue, ConstArray, ConstValue, FixedArray};
pub use config::{ConfigGuard, RuntimeConfig, TextEncoding};
pub use copy::CopyMap;
pub use entry::{Entry, Slot};
pub use error::{ValueError, ValueResult};
pub use key::{ArrayKey, IntoArrayKey};
pub use marshal::{MarshalTarget, marshal_cost};
pub use object::ObjectHandle;
pub use serialize::{Serializer, Unserializer, serialize, unserialize};
pub use string::{StringBuf, StringTable, StringWidth};
pub use value::{Value, ValueType};
pub use var::Var;
