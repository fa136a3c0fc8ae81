use std::{error, fmt, io};

/// Unified error type
///
/// Everything that can go wrong while decoding, encoding, or building
/// a skeleton is reported through this one enum. All errors are
/// terminal for the current call: the caller either gets a fully
/// valid result or one of these, never a partial skeleton.
///
/// `io::Error` values with kind `UnexpectedEof` are mapped to
/// `TruncatedInput` by the `From` implementation since a fixed-layout
/// field running out of bytes is the condition being reported.
#[derive(Debug)]
pub enum SklError {
    TruncatedInput,
    TextDecode,
    FieldOverflow,
    ElementCountInvalid,
    DuplicateName(String),
    InvalidParentReference { bone: usize, parent: i32 },
    DegenerateBone(usize),
    StdIoError(io::Error),
}

impl error::Error for SklError {}

impl fmt::Display for SklError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TruncatedInput => {
                write!(f, "stream too short for a fixed size field")
            }
            Self::TextDecode => {
                write!(f, "text field contains non text bytes")
            }
            Self::FieldOverflow => {
                write!(f, "value does not fit in its fixed width field")
            }
            Self::ElementCountInvalid => {
                write!(f, "element count does not match the bone records")
            }
            Self::DuplicateName(a) => {
                write!(f, "duplicate bone name \"{a}\"")
            }
            Self::InvalidParentReference { bone, parent } => {
                write!(f, "bone {bone} has invalid parent reference {parent}")
            }
            Self::DegenerateBone(a) => {
                write!(f, "leaf bone {a} has a scale of zero")
            }
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
        }
    }
}

impl From<io::Error> for SklError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedInput
        } else {
            Self::StdIoError(e)
        }
    }
}

impl From<std::str::Utf8Error> for SklError {
    fn from(_: std::str::Utf8Error) -> Self {
        Self::TextDecode
    }
}
