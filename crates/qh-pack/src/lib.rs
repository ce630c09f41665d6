//! Archive installation pipeline.
//!
//! A download is classified by content, decompressed layer by layer, extracted and finally
//! flattened so the destination holds the package's files directly.

pub mod error;
pub mod extract;
pub mod flatten;
pub mod install;
pub mod media;
pub mod sanitize;
pub mod stream;
pub mod unpack;

pub use error::{InstallError, PackError, PackResult};
pub use extract::ExtractReport;
pub use flatten::FlattenOutcome;
pub use install::Installer;
pub use media::{InferSniffer, MediaKind, MediaType, Sniffer};
pub use stream::SniffReader;
pub use unpack::{UnpackOptions, UnpackOutcome, Unpacker};
