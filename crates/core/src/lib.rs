pub mod catalog;
pub mod codec;
pub mod document;
pub mod fs;
pub mod surface;

pub use catalog::FileTypeInfo;
pub use codec::{CodecError, DecodedText, Encoding, LegacyEncoding, LineEnding, TextFormat};
pub use document::Document;
pub use fs::{write_atomic, DirEntry, FileSystem, FsError, LocalFileSystem};
pub use surface::{
    ChangeCallback, DocumentHandle, EditorSurface, HeadlessSurface, SubscriptionId, ViewState,
};
