//! Bot-API compatible `file_id` and `file_unique_id` strings.
//!
//! A file id is the little-endian description of a media location, run-length
//! encoded on zero bytes and written as unpadded URL-safe base64. The last
//! one or two bytes carry the format version.

use std::fmt;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tgcore_tl::{Cursor, Deserializable, Serializable};

/// URL-safe base64 that writes no padding and accepts either form.
pub(crate) const URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub const MAJOR: u8 = 4;
pub const MINOR: u8 = 30;

const WEB_LOCATION_FLAG: i32 = 1 << 24;
const FILE_REFERENCE_FLAG: i32 = 1 << 25;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum FileIdError {
    Base64(base64::DecodeError),
    /// The location fields could not be read.
    Malformed(tgcore_tl::deserialize::Error),
    /// The decoded string is too short to hold a version.
    Empty,
    UnknownFileType { file_type: i32, file_id: String },
    UnknownThumbnailSource { source: i32, file_id: String },
    UnknownUniqueType { unique_type: i32, file_unique_id: String },
    InvalidThumbnailSize(i32),
}

impl fmt::Display for FileIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64(e) => write!(f, "invalid base64: {e}"),
            Self::Malformed(e) => write!(f, "malformed file id: {e}"),
            Self::Empty => write!(f, "empty file id"),
            Self::UnknownFileType { file_type, file_id } => {
                write!(f, "Unknown file_type {file_type} of file_id {file_id}")
            }
            Self::UnknownThumbnailSource { source, file_id } => {
                write!(f, "Unknown thumbnail_source {source} of file_id {file_id}")
            }
            Self::UnknownUniqueType { unique_type, file_unique_id } => {
                write!(f, "Unknown decoder for file_unique_type {unique_type} of file_unique_id {file_unique_id}")
            }
            Self::InvalidThumbnailSize(size) => write!(f, "invalid thumbnail size {size}"),
        }
    }
}

impl std::error::Error for FileIdError {}

impl From<base64::DecodeError> for FileIdError {
    fn from(e: base64::DecodeError) -> Self { Self::Base64(e) }
}

impl From<tgcore_tl::deserialize::Error> for FileIdError {
    fn from(e: tgcore_tl::deserialize::Error) -> Self { Self::Malformed(e) }
}

// ─── Enumerations ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Thumbnail = 0,
    ChatPhoto = 1,
    Photo = 2,
    Voice = 3,
    Video = 4,
    Document = 5,
    Encrypted = 6,
    Temp = 7,
    Sticker = 8,
    Audio = 9,
    Animation = 10,
    EncryptedThumbnail = 11,
    Wallpaper = 12,
    VideoNote = 13,
    SecureRaw = 14,
    Secure = 15,
    Background = 16,
    DocumentAsFile = 17,
}

impl FileType {
    pub fn from_i32(v: i32) -> Option<Self> {
        use FileType::*;
        Some(match v {
            0 => Thumbnail,
            1 => ChatPhoto,
            2 => Photo,
            3 => Voice,
            4 => Video,
            5 => Document,
            6 => Encrypted,
            7 => Temp,
            8 => Sticker,
            9 => Audio,
            10 => Animation,
            11 => EncryptedThumbnail,
            12 => Wallpaper,
            13 => VideoNote,
            14 => SecureRaw,
            15 => Secure,
            16 => Background,
            17 => DocumentAsFile,
            _ => return None,
        })
    }

    /// Types whose location carries a volume id and a thumbnail source.
    pub fn is_photo(self) -> bool {
        matches!(
            self,
            Self::Thumbnail | Self::ChatPhoto | Self::Photo | Self::Wallpaper | Self::EncryptedThumbnail
        )
    }
}

/// Where a photo-like location came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ThumbnailSource {
    Legacy { secret: i64, local_id: i32 },
    Thumbnail { file_type: i32, thumbnail_size: char, local_id: i32 },
    ChatPhotoSmall { chat_id: i64, chat_access_hash: i64, local_id: i32 },
    ChatPhotoBig { chat_id: i64, chat_access_hash: i64, local_id: i32 },
    StickerSetThumbnail { sticker_set_id: i64, sticker_set_access_hash: i64, local_id: i32 },
}

impl ThumbnailSource {
    fn tag(&self) -> i32 {
        match self {
            Self::Legacy { .. } => 0,
            Self::Thumbnail { .. } => 1,
            Self::ChatPhotoSmall { .. } => 2,
            Self::ChatPhotoBig { .. } => 3,
            Self::StickerSetThumbnail { .. } => 4,
        }
    }

    pub fn local_id(&self) -> i32 {
        match self {
            Self::Legacy { local_id, .. }
            | Self::Thumbnail { local_id, .. }
            | Self::ChatPhotoSmall { local_id, .. }
            | Self::ChatPhotoBig { local_id, .. }
            | Self::StickerSetThumbnail { local_id, .. } => *local_id,
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Legacy { secret, local_id } => {
                buf.extend(secret.to_le_bytes());
                buf.extend(local_id.to_le_bytes());
            }
            Self::Thumbnail { file_type, thumbnail_size, local_id } => {
                buf.extend(file_type.to_le_bytes());
                buf.extend((*thumbnail_size as i32).to_le_bytes());
                buf.extend(local_id.to_le_bytes());
            }
            Self::ChatPhotoSmall { chat_id, chat_access_hash, local_id }
            | Self::ChatPhotoBig { chat_id, chat_access_hash, local_id } => {
                buf.extend(chat_id.to_le_bytes());
                buf.extend(chat_access_hash.to_le_bytes());
                buf.extend(local_id.to_le_bytes());
            }
            Self::StickerSetThumbnail { sticker_set_id, sticker_set_access_hash, local_id } => {
                buf.extend(sticker_set_id.to_le_bytes());
                buf.extend(sticker_set_access_hash.to_le_bytes());
                buf.extend(local_id.to_le_bytes());
            }
        }
    }

    fn read(tag: i32, cur: &mut Cursor, file_id: &str) -> Result<Self, FileIdError> {
        Ok(match tag {
            0 => Self::Legacy { secret: i64::deserialize(cur)?, local_id: i32::deserialize(cur)? },
            1 => {
                let file_type = i32::deserialize(cur)?;
                let size = i32::deserialize(cur)?;
                let thumbnail_size = u32::try_from(size)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(FileIdError::InvalidThumbnailSize(size))?;
                Self::Thumbnail { file_type, thumbnail_size, local_id: i32::deserialize(cur)? }
            }
            2 | 3 => {
                let chat_id = i64::deserialize(cur)?;
                let chat_access_hash = i64::deserialize(cur)?;
                let local_id = i32::deserialize(cur)?;
                if tag == 2 {
                    Self::ChatPhotoSmall { chat_id, chat_access_hash, local_id }
                } else {
                    Self::ChatPhotoBig { chat_id, chat_access_hash, local_id }
                }
            }
            4 => Self::StickerSetThumbnail {
                sticker_set_id: i64::deserialize(cur)?,
                sticker_set_access_hash: i64::deserialize(cur)?,
                local_id: i32::deserialize(cur)?,
            },
            source => {
                return Err(FileIdError::UnknownThumbnailSource { source, file_id: file_id.to_string() });
            }
        })
    }
}

/// The location part of a file id.
#[derive(Clone, Debug, PartialEq)]
pub enum FileLocation {
    Web { url: String, access_hash: i64 },
    Document { file_reference: Vec<u8>, media_id: i64, access_hash: i64 },
    Photo {
        file_reference: Vec<u8>,
        media_id: i64,
        access_hash: i64,
        volume_id: i64,
        source: ThumbnailSource,
    },
}

// ─── FileId ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct FileId {
    pub major: u8,
    pub minor: u8,
    pub file_type: FileType,
    pub dc_id: i32,
    pub location: FileLocation,
}

impl FileId {
    /// A current-version id.
    pub fn new(file_type: FileType, dc_id: i32, location: FileLocation) -> Self {
        Self { major: MAJOR, minor: MINOR, file_type, dc_id, location }
    }

    pub fn decode(file_id: &str) -> Result<Self, FileIdError> {
        let decoded = rle_decode(&URL_SAFE.decode(file_id)?);
        let (&major, rest) = decoded.split_last().ok_or(FileIdError::Empty)?;
        let (minor, payload) = if major < 4 {
            (0, rest)
        } else {
            let (&minor, payload) = rest.split_last().ok_or(FileIdError::Empty)?;
            (minor, payload)
        };

        let mut cur = Cursor::from_slice(payload);
        let raw_type = i32::deserialize(&mut cur)?;
        let dc_id = i32::deserialize(&mut cur)?;

        let has_web_location = raw_type & WEB_LOCATION_FLAG != 0;
        let has_file_reference = raw_type & FILE_REFERENCE_FLAG != 0;
        let type_tag = raw_type & !WEB_LOCATION_FLAG & !FILE_REFERENCE_FLAG;
        let file_type = FileType::from_i32(type_tag).ok_or_else(|| FileIdError::UnknownFileType {
            file_type: type_tag,
            file_id: file_id.to_string(),
        })?;

        if has_web_location {
            let url = String::deserialize(&mut cur)?;
            let access_hash = i64::deserialize(&mut cur)?;
            let location = FileLocation::Web { url, access_hash };
            return Ok(Self { major, minor, file_type, dc_id, location });
        }

        let file_reference =
            if has_file_reference { Vec::<u8>::deserialize(&mut cur)? } else { Vec::new() };
        let media_id = i64::deserialize(&mut cur)?;
        let access_hash = i64::deserialize(&mut cur)?;

        let location = if file_type.is_photo() {
            let volume_id = i64::deserialize(&mut cur)?;
            let tag = if major >= 4 { i32::deserialize(&mut cur)? } else { 0 };
            let source = ThumbnailSource::read(tag, &mut cur, file_id)?;
            FileLocation::Photo { file_reference, media_id, access_hash, volume_id, source }
        } else {
            FileLocation::Document { file_reference, media_id, access_hash }
        };
        Ok(Self { major, minor, file_type, dc_id, location })
    }

    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        let mut raw_type = self.file_type as i32;
        match &self.location {
            FileLocation::Web { .. } => raw_type |= WEB_LOCATION_FLAG,
            FileLocation::Document { file_reference, .. } | FileLocation::Photo { file_reference, .. }
                if !file_reference.is_empty() =>
            {
                raw_type |= FILE_REFERENCE_FLAG
            }
            _ => {}
        }
        buf.extend(raw_type.to_le_bytes());
        buf.extend(self.dc_id.to_le_bytes());

        match &self.location {
            FileLocation::Web { url, access_hash } => {
                url.serialize(&mut buf);
                buf.extend(access_hash.to_le_bytes());
            }
            FileLocation::Document { file_reference, media_id, access_hash } => {
                write_reference(&mut buf, file_reference);
                buf.extend(media_id.to_le_bytes());
                buf.extend(access_hash.to_le_bytes());
            }
            FileLocation::Photo { file_reference, media_id, access_hash, volume_id, source } => {
                write_reference(&mut buf, file_reference);
                buf.extend(media_id.to_le_bytes());
                buf.extend(access_hash.to_le_bytes());
                buf.extend(volume_id.to_le_bytes());
                if self.major >= 4 {
                    buf.extend(source.tag().to_le_bytes());
                }
                source.write(&mut buf);
            }
        }

        if self.major >= 4 {
            buf.push(self.minor);
        }
        buf.push(self.major);
        URL_SAFE.encode(rle_encode(&buf))
    }

    /// The stable id Telegram derives for the same file.
    pub fn unique_id(&self) -> FileUniqueId {
        match &self.location {
            FileLocation::Web { url, .. } => FileUniqueId::Web { url: url.clone() },
            FileLocation::Photo { volume_id, source: source @ ThumbnailSource::Legacy { .. }, .. } => {
                FileUniqueId::Photo { volume_id: *volume_id, local_id: source.local_id() }
            }
            FileLocation::Photo { media_id, .. } | FileLocation::Document { media_id, .. } => {
                let media_id = *media_id;
                match self.file_type {
                    FileType::Encrypted => FileUniqueId::Encrypted { media_id },
                    FileType::Secure | FileType::SecureRaw => FileUniqueId::Secure { media_id },
                    FileType::Temp => FileUniqueId::Temp { media_id },
                    _ => FileUniqueId::Document { media_id },
                }
            }
        }
    }
}

fn write_reference(buf: &mut Vec<u8>, file_reference: &[u8]) {
    if !file_reference.is_empty() {
        file_reference.serialize(buf);
    }
}

// ─── FileUniqueId ─────────────────────────────────────────────────────────────

/// Identifies a file across bots and accounts; cannot be used to download.
#[derive(Clone, Debug, PartialEq)]
pub enum FileUniqueId {
    Web { url: String },
    Photo { volume_id: i64, local_id: i32 },
    Document { media_id: i64 },
    Secure { media_id: i64 },
    Encrypted { media_id: i64 },
    Temp { media_id: i64 },
}

impl FileUniqueId {
    fn tag(&self) -> i32 {
        match self {
            Self::Web { .. } => -1,
            Self::Photo { .. } => 0,
            Self::Document { .. } => 1,
            Self::Secure { .. } => 2,
            Self::Encrypted { .. } => 3,
            Self::Temp { .. } => 4,
        }
    }

    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        buf.extend(self.tag().to_le_bytes());
        match self {
            Self::Web { url } => url.serialize(&mut buf),
            Self::Photo { volume_id, local_id } => {
                buf.extend(volume_id.to_le_bytes());
                buf.extend(local_id.to_le_bytes());
            }
            Self::Document { media_id }
            | Self::Secure { media_id }
            | Self::Encrypted { media_id }
            | Self::Temp { media_id } => buf.extend(media_id.to_le_bytes()),
        }
        URL_SAFE.encode(rle_encode(&buf))
    }

    pub fn decode(file_unique_id: &str) -> Result<Self, FileIdError> {
        let decoded = rle_decode(&URL_SAFE.decode(file_unique_id)?);
        let mut cur = Cursor::from_slice(&decoded);
        Ok(match i32::deserialize(&mut cur)? {
            -1 => Self::Web { url: String::deserialize(&mut cur)? },
            0 => Self::Photo { volume_id: i64::deserialize(&mut cur)?, local_id: i32::deserialize(&mut cur)? },
            1 => Self::Document { media_id: i64::deserialize(&mut cur)? },
            2 => Self::Secure { media_id: i64::deserialize(&mut cur)? },
            3 => Self::Encrypted { media_id: i64::deserialize(&mut cur)? },
            4 => Self::Temp { media_id: i64::deserialize(&mut cur)? },
            unique_type => {
                return Err(FileIdError::UnknownUniqueType {
                    unique_type,
                    file_unique_id: file_unique_id.to_string(),
                });
            }
        })
    }
}

// ─── Zero run-length encoding ─────────────────────────────────────────────────

/// Replace each run of zero bytes with `0x00 n` (runs longer than 255 are
/// split).
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0u8;
    for &b in data {
        if b == 0 {
            if zeros == u8::MAX {
                out.extend([0, zeros]);
                zeros = 0;
            }
            zeros += 1;
        } else {
            if zeros > 0 {
                out.extend([0, zeros]);
                zeros = 0;
            }
            out.push(b);
        }
    }
    if zeros > 0 {
        out.extend([0, zeros]);
    }
    out
}

pub fn rle_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut in_run = false;
    for &b in data {
        if in_run {
            out.resize(out.len() + b as usize, 0);
            in_run = false;
        } else if b == 0 {
            in_run = true;
        } else {
            out.push(b);
        }
    }
    out
}
