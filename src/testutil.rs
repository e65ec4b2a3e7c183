//! Builders for synthetic archives used across the test modules.

use crate::checksum::{password_check_sum, ChecksumAccumulator, ChecksumKind};
use crate::formats::Signature;
use crate::key::test_cipher::XorCipher;
use crate::parsing::raw::CRYPT_BLOCK_SIZE;
use crate::parsing::rar5::vint::encode_vint;

/// Legacy header with computed size and checksum.
pub fn rar4_header(header_type: u8, flags: u16, body: &[u8]) -> Vec<u8> {
    let size = (7 + body.len()) as u16;
    let mut out = vec![0, 0, header_type];
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(body);
    let crc = ChecksumAccumulator::of_header(ChecksumKind::Legacy16, &out) as u16;
    out[..2].copy_from_slice(&crc.to_le_bytes());
    out
}

/// Legacy main header without an inline comment.
pub fn rar4_main(flags: u16) -> Vec<u8> {
    rar4_header(0x73, flags, &[0; 6])
}

pub fn rar4_end() -> Vec<u8> {
    rar4_header(0x7b, 0x4000, &[])
}

/// Legacy file or service header builder.
#[derive(Debug, Clone)]
pub struct Rar4File {
    header_type: u8,
    name: Vec<u8>,
    packed: u64,
    unpacked: u64,
    crc: u32,
    flags: u16,
    dos_time: u32,
    salt: Option<[u8; 8]>,
    sub_data: Vec<u8>,
    ext_time: Vec<u8>,
}

impl Rar4File {
    pub fn new(name: &str) -> Self {
        Self {
            header_type: 0x74,
            name: name.as_bytes().to_vec(),
            packed: 0,
            unpacked: 0,
            crc: 0,
            flags: 0,
            dos_time: (41 << 25) | (1 << 21) | (1 << 16),
            salt: None,
            sub_data: Vec::new(),
            ext_time: Vec::new(),
        }
    }

    pub fn service(mut self) -> Self {
        self.header_type = 0x7a;
        self
    }

    pub fn sizes(mut self, packed: u64, unpacked: u64) -> Self {
        self.packed = packed;
        self.unpacked = unpacked;
        self
    }

    pub fn crc(mut self, crc: u32) -> Self {
        self.crc = crc;
        self
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    pub fn salt(mut self, salt: [u8; 8]) -> Self {
        self.salt = Some(salt);
        self
    }

    pub fn dos_time(mut self, dos_time: u32) -> Self {
        self.dos_time = dos_time;
        self
    }

    pub fn sub_data(mut self, data: &[u8]) -> Self {
        self.sub_data = data.to_vec();
        self
    }

    pub fn ext_time(mut self, ext: &[u8]) -> Self {
        self.ext_time = ext.to_vec();
        self
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let large = self.flags & 0x0100 != 0;
        let mut body = Vec::new();
        body.extend_from_slice(&(self.packed as u32).to_le_bytes());
        body.extend_from_slice(&(self.unpacked as u32).to_le_bytes());
        body.push(2);
        body.extend_from_slice(&self.crc.to_le_bytes());
        body.extend_from_slice(&self.dos_time.to_le_bytes());
        body.push(29);
        body.push(0x33);
        body.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        body.extend_from_slice(&0x20u32.to_le_bytes());
        if large {
            body.extend_from_slice(&((self.packed >> 32) as u32).to_le_bytes());
            body.extend_from_slice(&((self.unpacked >> 32) as u32).to_le_bytes());
        }
        body.extend_from_slice(&self.name);
        body.extend_from_slice(&self.sub_data);
        if let Some(salt) = self.salt {
            body.extend_from_slice(&salt);
        }
        body.extend_from_slice(&self.ext_time);
        rar4_header(self.header_type, 0x8000 | self.flags, &body)
    }

    /// Header followed by `packed` filler bytes of data.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.resize(out.len() + self.packed as usize, 0xEE);
        out
    }
}

/// Signature, main header, the given records and an end marker.
pub fn rar4_archive(main_flags: u16, records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Signature::RAR15.to_vec();
    out.extend_from_slice(&rar4_main(main_flags));
    for record in records {
        out.extend_from_slice(record);
    }
    out.extend_from_slice(&rar4_end());
    out
}

pub fn vint(value: u64) -> Vec<u8> {
    encode_vint(value)
}

/// One extra area record; the size covers the tag and the payload.
pub fn extra_field(tag: u64, payload: &[u8]) -> Vec<u8> {
    let mut record = vint(tag);
    record.extend_from_slice(payload);
    let mut out = vint(record.len() as u64);
    out.extend_from_slice(&record);
    out
}

/// RAR5 header with computed size and CRC. The extra and data flags are set
/// from the arguments and added to `flags`.
pub fn rar5_header(
    header_type: u64,
    flags: u64,
    extra: &[u8],
    data_size: Option<u64>,
    body: &[u8],
) -> Vec<u8> {
    let mut flags = flags;
    if !extra.is_empty() {
        flags |= 0x0001;
    }
    if data_size.is_some() {
        flags |= 0x0002;
    }
    let mut rest = vint(header_type);
    rest.extend_from_slice(&vint(flags));
    if !extra.is_empty() {
        rest.extend_from_slice(&vint(extra.len() as u64));
    }
    if let Some(size) = data_size {
        rest.extend_from_slice(&vint(size));
    }
    rest.extend_from_slice(body);
    rest.extend_from_slice(extra);

    let mut out = vec![0; 4];
    out.extend_from_slice(&vint(rest.len() as u64));
    out.extend_from_slice(&rest);
    let crc = ChecksumAccumulator::of_header(ChecksumKind::Crc32, &out);
    out[..4].copy_from_slice(&crc.to_le_bytes());
    out
}

pub fn rar5_main(archive_flags: u64, extra: &[u8]) -> Vec<u8> {
    rar5_header(1, 0, extra, None, &vint(archive_flags))
}

pub fn rar5_end(end_flags: u64) -> Vec<u8> {
    rar5_header(5, 0, &[], None, &vint(end_flags))
}

/// Fixed fields of a RAR5 file header: Unix host, store method.
pub fn rar5_file_fields(name: &str, file_flags: u64, unpacked: u64, crc: Option<u32>) -> Vec<u8> {
    let mut out = vint(file_flags);
    out.extend_from_slice(&vint(unpacked));
    out.extend_from_slice(&vint(0x20));
    if file_flags & 0x0002 != 0 {
        out.extend_from_slice(&1_600_000_000u32.to_le_bytes());
    }
    if file_flags & 0x0004 != 0 {
        out.extend_from_slice(&crc.unwrap_or(0).to_le_bytes());
    }
    out.extend_from_slice(&vint(0));
    out.extend_from_slice(&vint(1));
    out.extend_from_slice(&vint(name.len() as u64));
    out.extend_from_slice(name.as_bytes());
    out
}

/// RAR5 file header plus `data_len` filler bytes.
pub fn rar5_file(name: &str, header_flags: u64, data_len: u64, extra: &[u8]) -> Vec<u8> {
    let fields = rar5_file_fields(name, 0x0004, data_len, Some(0xCAFE_F00D));
    let mut out = rar5_header(2, header_flags, extra, Some(data_len), &fields);
    out.resize(out.len() + data_len as usize, 0xEE);
    out
}

pub fn rar5_service(name: &str, extra: &[u8]) -> Vec<u8> {
    let fields = rar5_file_fields(name, 0, 0, None);
    rar5_header(3, 0, extra, None, &fields)
}

/// Signature, main header, the given records and an end header.
pub fn rar5_archive(archive_flags: u64, records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Signature::RAR50.to_vec();
    out.extend_from_slice(&rar5_main(archive_flags, &[]));
    for record in records {
        out.extend_from_slice(record);
    }
    out.extend_from_slice(&rar5_end(0));
    out
}

/// Archive encryption header; the check value is stored with a valid sum.
pub fn rar5_encryption_header(lg2_count: u8, salt: [u8; 16], check: Option<[u8; 8]>) -> Vec<u8> {
    let mut body = vint(0);
    body.extend_from_slice(&vint(u64::from(check.is_some())));
    body.push(lg2_count);
    body.extend_from_slice(&salt);
    if let Some(check) = check {
        body.extend_from_slice(&check);
        body.extend_from_slice(&password_check_sum(&check));
    }
    rar5_header(4, 0, &[], None, &body)
}

/// Pad `header` to the cipher block size, encrypt it with [`XorCipher`] and
/// put `init` (salt or IV) in front.
pub fn encrypt_header(header: &[u8], init: &[u8], key: u8) -> Vec<u8> {
    let mut padded = header.to_vec();
    padded.resize(header.len().div_ceil(CRYPT_BLOCK_SIZE) * CRYPT_BLOCK_SIZE, 0);
    XorCipher(key).apply(init, &mut padded);
    let mut out = init.to_vec();
    out.extend_from_slice(&padded);
    out
}
