//! Message composition: field precedence, subject date macros, inline
//! images and final assembly.

pub mod date_macro;
pub mod fields;
pub mod images;
pub mod message;

pub use date_macro::{Clock, FixedClock, SystemClock};
pub use fields::Recipients;
pub use images::{AttachmentRecord, ContentIdSource, ImageEmbedder, UuidContentIds};
pub use message::ComposedMessage;
