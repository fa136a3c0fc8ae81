use super::types::{BoneRecord, SkeletonHeader};
use crate::skl_error::SklError;
use log::info;
use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

const TAG_SIZE: usize = 8;
const NAME_SIZE: usize = 32;
const MATRIX_OFFSET: usize = 40;

fn int(slice: &[u8]) -> Result<i32, SklError> {
    Ok(i32::from_le_bytes(
        slice.try_into().map_err(|_| SklError::TruncatedInput)?,
    ))
}

fn float(slice: &[u8]) -> Result<f32, SklError> {
    Ok(f32::from_le_bytes(
        slice.try_into().map_err(|_| SklError::TruncatedInput)?,
    ))
}

fn text(slice: &[u8]) -> Result<&str, SklError> {
    Ok(std::str::from_utf8(slice)?)
}

// Copies `value` into `field`, filling the rest with null padding.
// The caller picks a slice of exactly the fixed field width.
fn pad(field: &mut [u8], value: &str) -> Result<(), SklError> {
    let value = value.as_bytes();
    if value.len() > field.len() {
        return Err(SklError::FieldOverflow);
    }
    field[0..value.len()].copy_from_slice(value);
    Ok(())
}

impl SkeletonHeader {
    pub const SIZE: usize = 20;

    /// Reads the header from the current stream position, which
    /// should be the start of the file
    ///
    /// # Errors
    /// May return `SklError`
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, SklError> {
        let mut buffer = [0u8; Self::SIZE];
        reader.read_exact(&mut buffer)?;
        Ok(Self {
            file_type: text(&buffer[0..TAG_SIZE])?.to_string(),
            num_objects: int(&buffer[8..12])?,
            skeleton_hash: int(&buffer[12..16])?,
            num_elements: int(&buffer[16..20])?,
        })
    }

    /// Encodes the header into its exact 20 byte layout
    ///
    /// # Errors
    /// May return `SklError` if the file type tag does not fit in
    /// its 8 byte field
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE], SklError> {
        let mut bytes = [0u8; Self::SIZE];
        pad(&mut bytes[0..TAG_SIZE], &self.file_type)?;
        bytes[8..12].copy_from_slice(&self.num_objects.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.skeleton_hash.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.num_elements.to_le_bytes());
        Ok(bytes)
    }
}

impl BoneRecord {
    pub const SIZE: usize = 88;

    /// Reads one bone record from the current stream position
    ///
    /// # Errors
    /// May return `SklError`
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, SklError> {
        let mut buffer = [0u8; Self::SIZE];
        reader.read_exact(&mut buffer)?;

        // Strip the null padding from the name since it is used as
        // an identifier
        let name =
            text(&buffer[0..NAME_SIZE])?.trim_end_matches('\0').to_string();
        let parent = int(&buffer[32..36])?;
        let scale = float(&buffer[36..40])?;

        // The trailing 48 bytes are the affine matrix, row major by
        // rows of 4
        let mut matrix = [[0.0f32; 4]; 3];
        for (j, row) in matrix.iter_mut().enumerate() {
            for (k, value) in row.iter_mut().enumerate() {
                let at = MATRIX_OFFSET + (j * 4 + k) * 4;
                *value = float(&buffer[at..at + 4])?;
            }
        }

        Ok(Self {
            name,
            parent,
            scale,
            matrix,
        })
    }

    /// Encodes the record into its exact 88 byte layout
    ///
    /// # Errors
    /// May return `SklError` if the name does not fit in its 32 byte
    /// field
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE], SklError> {
        let mut bytes = [0u8; Self::SIZE];
        pad(&mut bytes[0..NAME_SIZE], &self.name)?;
        bytes[32..36].copy_from_slice(&self.parent.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.scale.to_le_bytes());
        for (j, row) in self.matrix.iter().enumerate() {
            for (k, value) in row.iter().enumerate() {
                let at = MATRIX_OFFSET + (j * 4 + k) * 4;
                bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        Ok(bytes)
    }
}

/// Decodes a header followed by exactly the number of bone records it
/// declares. Trailing bytes after the last record are left unread.
///
/// # Errors
/// May return `SklError`
pub fn decode_skeleton<R: Read>(
    reader: &mut R,
) -> Result<(SkeletonHeader, Vec<BoneRecord>), SklError> {
    let header = SkeletonHeader::decode(reader)?;
    let count = usize::try_from(header.num_elements)
        .map_err(|_| SklError::ElementCountInvalid)?;

    let mut records = Vec::new();
    for _ in 0..count {
        records.push(BoneRecord::decode(reader)?);
    }
    Ok((header, records))
}

/// Encodes a header and its bone records to a stream
///
/// # Errors
/// May return `SklError`, including when the header's element count
/// disagrees with the number of records provided
pub fn encode_skeleton<W: Write>(
    writer: &mut W,
    header: &SkeletonHeader,
    records: &[BoneRecord],
) -> Result<(), SklError> {
    if usize::try_from(header.num_elements) != Ok(records.len()) {
        return Err(SklError::ElementCountInvalid);
    }
    writer.write_all(&header.to_bytes()?)?;
    for record in records {
        writer.write_all(&record.to_bytes()?)?;
    }
    Ok(())
}

/// Loads a .skl file from a path
///
/// # Errors
/// May return `SklError`
pub fn import_skl<P: AsRef<Path>>(
    path: P,
) -> Result<(SkeletonHeader, Vec<BoneRecord>), SklError> {
    let path = path.as_ref();
    let file = fs::File::open(path)?;
    let mut reader = io::BufReader::new(file);
    let (header, records) = decode_skeleton(&mut reader)?;

    // Some info
    info!(
        "{:?}, file type={}, objects={}, bones={}",
        path,
        header.file_type,
        header.num_objects,
        records.len(),
    );

    Ok((header, records))
}

/// Writes a .skl file to a path
///
/// # Errors
/// May return `SklError`
pub fn export_skl<P: AsRef<Path>>(
    path: P,
    header: &SkeletonHeader,
    records: &[BoneRecord],
) -> Result<(), SklError> {
    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    encode_skeleton(&mut writer, header, records)?;
    writer.flush()?;
    Ok(())
}
