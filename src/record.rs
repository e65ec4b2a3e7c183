//! Decoded header records.
//!
//! Both header generations decode into the same descriptors. Fields that
//! only one generation stores are `Option`s or default to `false`.

use crate::file_media::ReadInterval;
use crate::formats::RawTimestamp;

/// Entry record flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file or directory.
    File,
    /// A service record (comment, quick-open index, ACL, stream, ...).
    Service,
}

/// Rarely used record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    Marker,
    Comment,
    AuthenticityVerification,
    Signature,
    Protection,
    OldService,
    Unknown(u64),
}

/// Record type, looked up once from the stored type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Main,
    Entry(EntryKind),
    EndOfArchive,
    Encryption,
    Auxiliary(AuxKind),
}

impl HeaderKind {
    /// Map a RAR 1.5-4.x header type byte.
    pub fn from_legacy(header_type: u8) -> Self {
        match header_type {
            0x72 => Self::Auxiliary(AuxKind::Marker),
            0x73 => Self::Main,
            0x74 => Self::Entry(EntryKind::File),
            0x75 => Self::Auxiliary(AuxKind::Comment),
            0x76 => Self::Auxiliary(AuxKind::AuthenticityVerification),
            0x77 => Self::Auxiliary(AuxKind::OldService),
            0x78 => Self::Auxiliary(AuxKind::Protection),
            0x79 => Self::Auxiliary(AuxKind::Signature),
            0x7a => Self::Entry(EntryKind::Service),
            0x7b => Self::EndOfArchive,
            other => Self::Auxiliary(AuxKind::Unknown(u64::from(other))),
        }
    }

    /// Map a RAR5 header type.
    pub fn from_modern(header_type: u64) -> Self {
        match header_type {
            1 => Self::Main,
            2 => Self::Entry(EntryKind::File),
            3 => Self::Entry(EntryKind::Service),
            4 => Self::Encryption,
            5 => Self::EndOfArchive,
            other => Self::Auxiliary(AuxKind::Unknown(other)),
        }
    }
}

/// Fields common to every record, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeaderPrefix {
    /// Stored checksum (RAR 1.5-4.x: 16 bits widened).
    pub checksum: u32,
    pub header_type: u64,
    pub flags: u64,
    /// Total header size in bytes, checksum field included.
    pub declared_size: u64,
    /// Readers that do not know the record may skip it.
    pub skip_if_unknown: bool,
}

/// One decoded record and where it sits in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: Header,
    pub prefix: RawHeaderPrefix,
    /// Offset of the first header byte (salt or IV for encrypted headers).
    pub current_block_pos: u64,
    /// Offset of the first payload byte.
    pub data_pos: u64,
    /// Offset of the following record.
    pub next_block_pos: u64,
    /// The stored checksum did not match, or the record contradicts the
    /// main archive header.
    pub broken: bool,
}

impl Record {
    pub fn kind(&self) -> HeaderKind {
        self.header.kind()
    }

    pub fn payload_size(&self) -> u64 {
        self.next_block_pos - self.data_pos
    }

    /// Byte range of the payload following the header, if any.
    pub fn payload(&self) -> Option<ReadInterval> {
        (self.next_block_pos > self.data_pos).then(|| ReadInterval {
            start: self.data_pos,
            end: self.next_block_pos - 1,
        })
    }

    pub fn as_entry(&self) -> Option<&EntryHeader> {
        match &self.header {
            Header::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_main(&self) -> Option<&MainArchiveHeader> {
        match &self.header {
            Header::Main(main) => Some(main),
            _ => None,
        }
    }
}

/// Decoded header body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Main(MainArchiveHeader),
    Entry(EntryHeader),
    EndOfArchive(EndOfArchiveHeader),
    Encryption(EncryptionHeader),
    Auxiliary(AuxHeader),
}

impl Header {
    pub fn kind(&self) -> HeaderKind {
        match self {
            Self::Main(_) => HeaderKind::Main,
            Self::Entry(entry) => HeaderKind::Entry(entry.kind),
            Self::EndOfArchive(_) => HeaderKind::EndOfArchive,
            Self::Encryption(_) => HeaderKind::Encryption,
            Self::Auxiliary(aux) => HeaderKind::Auxiliary(aux.kind()),
        }
    }
}

/// Main archive header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainArchiveHeader {
    pub is_volume: bool,
    pub has_comment: bool,
    pub is_locked: bool,
    pub is_solid: bool,
    /// `.partN.rar` volume names instead of `.rNN`.
    pub new_numbering: bool,
    pub has_authenticity: bool,
    pub has_recovery: bool,
    pub encrypted_headers: bool,
    pub is_first_volume: bool,
    /// RAR5 volume number (absent in the first volume).
    pub volume_number: Option<u64>,
    pub locator: Option<Locator>,
    pub metadata: Option<ArchiveMetadata>,
    pub high_pos_av: u16,
    pub pos_av: u32,
}

/// Absolute offsets of the quick-open index and recovery record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Locator {
    pub quick_open_offset: Option<u64>,
    pub recovery_offset: Option<u64>,
}

/// Original archive name and creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub name: Option<String>,
    pub ctime: Option<RawTimestamp>,
}

/// Typed content checksum of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentHash {
    #[default]
    None,
    Crc32(u32),
    Blake2sp([u8; 32]),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionInfo {
    /// 0 = store, 1-5 = fastest to best.
    pub method: u8,
    /// Minimum decoder version (e.g. 29, 50, 70). 0 if unknown.
    pub unpack_version: u16,
    pub is_solid: bool,
    pub dictionary_size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFlags {
    pub split_before: bool,
    pub split_after: bool,
    pub is_solid: bool,
    pub is_directory: bool,
    pub is_encrypted: bool,
    pub large_size: bool,
    pub has_comment: bool,
    pub has_salt: bool,
    pub has_version: bool,
    pub has_ext_time: bool,
    pub inherited: bool,
    pub child: bool,
}

/// Operating system the entry was archived on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostOs {
    MsDos,
    Os2,
    #[default]
    Windows,
    Unix,
    MacOs,
    BeOs,
    Unknown(u64),
}

impl HostOs {
    pub fn from_legacy(value: u8) -> Self {
        match value {
            0 => Self::MsDos,
            1 => Self::Os2,
            2 => Self::Windows,
            3 => Self::Unix,
            4 => Self::MacOs,
            5 => Self::BeOs,
            other => Self::Unknown(u64::from(other)),
        }
    }

    pub fn from_modern(value: u64) -> Self {
        match value {
            0 => Self::Windows,
            1 => Self::Unix,
            other => Self::Unknown(other),
        }
    }
}

/// How the stored name bytes are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameEncoding {
    /// Single-byte OEM/ANSI name.
    #[default]
    SingleByte,
    Utf8,
    /// Single-byte name, NUL, then compressed UTF-16.
    DualEncoded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryName {
    pub raw: Vec<u8>,
    pub encoding: NameEncoding,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    UnixSymlink,
    WindowsSymlink,
    Junction,
    HardLink,
    FileCopy,
    Unknown(u64),
}

impl From<u64> for RedirectKind {
    fn from(value: u64) -> Self {
        match value {
            1 => Self::UnixSymlink,
            2 => Self::WindowsSymlink,
            3 => Self::Junction,
            4 => Self::HardLink,
            5 => Self::FileCopy,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub is_directory: bool,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnixOwner {
    pub user: Option<String>,
    pub group: Option<String>,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
}

/// Per-entry encryption parameters (RAR5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEncryption {
    /// 0 is AES-256. Anything else is a method this decoder does not know.
    pub version: u64,
    pub use_mac: bool,
    pub lg2_count: u8,
    pub salt: [u8; 16],
    pub iv: [u8; 16],
    pub password_check: Option<[u8; 8]>,
    /// Outcome of checking the password, if it was checked.
    pub password_verified: Option<bool>,
}

/// Optional RAR5 extension records of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryExtensions {
    pub redirect: Option<Redirect>,
    pub owner: Option<UnixOwner>,
    /// Version suffix (`;N`).
    pub version: Option<u64>,
    pub encryption: Option<EntryEncryption>,
}

/// File or service header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    pub packed_size: u64,
    /// `None` when the archiver did not know the size.
    pub unpacked_size: Option<u64>,
    pub mtime: Option<RawTimestamp>,
    pub ctime: Option<RawTimestamp>,
    pub atime: Option<RawTimestamp>,
    pub arctime: Option<RawTimestamp>,
    pub hash: ContentHash,
    pub compression: CompressionInfo,
    pub flags: EntryFlags,
    pub host_os: HostOs,
    pub attributes: u64,
    pub name: EntryName,
    /// RAR 1.5-4.x per-file salt.
    pub salt: Option<[u8; 8]>,
    /// Service record data stored in the header.
    pub sub_data: Option<Vec<u8>>,
    pub extensions: EntryExtensions,
}

impl EntryHeader {
    pub(crate) fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            packed_size: 0,
            unpacked_size: None,
            mtime: None,
            ctime: None,
            atime: None,
            arctime: None,
            hash: ContentHash::None,
            compression: CompressionInfo::default(),
            flags: EntryFlags::default(),
            host_os: HostOs::default(),
            attributes: 0,
            name: EntryName::default(),
            salt: None,
            sub_data: None,
            extensions: EntryExtensions::default(),
        }
    }

    pub fn unknown_unpacked_size(&self) -> bool {
        self.unpacked_size.is_none()
    }

    pub fn is_directory(&self) -> bool {
        self.flags.is_directory
    }

    pub fn name(&self) -> &str {
        &self.name.text
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndOfArchiveHeader {
    pub next_volume: bool,
    pub volume_number: Option<u16>,
    pub data_crc: Option<u32>,
    pub rev_space: bool,
}

/// Stored 8-byte password check value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCheck {
    pub value: [u8; 8],
    pub checksum: [u8; 4],
}

/// RAR5 archive encryption header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub version: u64,
    pub lg2_count: u8,
    pub salt: [u8; 16],
    /// Present only when its checksum is intact.
    pub check: Option<PasswordCheck>,
    pub password_verified: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentHeader {
    pub unpacked_size: u16,
    pub version: u8,
    pub method: u8,
    pub crc: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvHeader {
    pub version: u8,
    pub method: u8,
    pub av_version: u8,
    pub crc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader {
    pub creation_time: u32,
    pub arc_name_size: u16,
    pub user_name_size: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionHeader {
    pub data_size: u32,
    pub version: u8,
    pub recovery_sectors: u16,
    pub total_blocks: u32,
    pub mark: [u8; 8],
}

/// Packed data description shared by old-style sub-blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedBlock {
    pub unpacked_size: u32,
    pub version: u8,
    pub method: u8,
    pub crc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OldServiceBody {
    UnixOwner { owner: Vec<u8>, group: Vec<u8> },
    NtfsAcl(PackedBlock),
    Os2Ea(PackedBlock),
    Stream { block: PackedBlock, name: Vec<u8> },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldServiceHeader {
    pub data_size: u32,
    pub sub_type: u16,
    pub level: u8,
    pub body: OldServiceBody,
}

/// Records of the rarely used kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxHeader {
    Marker,
    Comment(CommentHeader),
    AuthenticityVerification(AvHeader),
    Signature(SignatureHeader),
    Protection(ProtectionHeader),
    OldService(OldServiceHeader),
    Unknown {
        header_type: u64,
        data_size: Option<u64>,
    },
}

impl AuxHeader {
    pub fn kind(&self) -> AuxKind {
        match self {
            Self::Marker => AuxKind::Marker,
            Self::Comment(_) => AuxKind::Comment,
            Self::AuthenticityVerification(_) => AuxKind::AuthenticityVerification,
            Self::Signature(_) => AuxKind::Signature,
            Self::Protection(_) => AuxKind::Protection,
            Self::OldService(_) => AuxKind::OldService,
            Self::Unknown { header_type, .. } => AuxKind::Unknown(*header_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_kinds() {
        assert_eq!(HeaderKind::from_legacy(0x73), HeaderKind::Main);
        assert_eq!(HeaderKind::from_legacy(0x74), HeaderKind::Entry(EntryKind::File));
        assert_eq!(HeaderKind::from_legacy(0x7a), HeaderKind::Entry(EntryKind::Service));
        assert_eq!(HeaderKind::from_legacy(0x7b), HeaderKind::EndOfArchive);
        assert_eq!(
            HeaderKind::from_legacy(0x79),
            HeaderKind::Auxiliary(AuxKind::Signature)
        );
        assert_eq!(
            HeaderKind::from_legacy(0x30),
            HeaderKind::Auxiliary(AuxKind::Unknown(0x30))
        );
    }

    #[test]
    fn test_modern_kinds() {
        assert_eq!(HeaderKind::from_modern(1), HeaderKind::Main);
        assert_eq!(HeaderKind::from_modern(3), HeaderKind::Entry(EntryKind::Service));
        assert_eq!(HeaderKind::from_modern(4), HeaderKind::Encryption);
        assert_eq!(HeaderKind::from_modern(5), HeaderKind::EndOfArchive);
        assert_eq!(
            HeaderKind::from_modern(0x73),
            HeaderKind::Auxiliary(AuxKind::Unknown(0x73))
        );
    }

    #[test]
    fn test_payload_interval() {
        let record = Record {
            header: Header::EndOfArchive(EndOfArchiveHeader::default()),
            prefix: RawHeaderPrefix {
                checksum: 0,
                header_type: 5,
                flags: 0,
                declared_size: 8,
                skip_if_unknown: false,
            },
            current_block_pos: 100,
            data_pos: 108,
            next_block_pos: 108,
            broken: false,
        };
        assert_eq!(record.payload(), None);
        assert_eq!(record.payload_size(), 0);

        let record = Record {
            next_block_pos: 118,
            ..record
        };
        assert_eq!(record.payload(), Some(ReadInterval { start: 108, end: 117 }));
        assert_eq!(record.payload().unwrap().len(), 10);
    }
}
