//! Sequential header decoder.
//!
//! [`HeaderDecoder`] walks an archive one record at a time. It detects the
//! header generation from the signature, decrypts headers when the archive
//! says they are encrypted, and skips over damaged records by advancing one
//! byte at a time until something decodes again.
//!
//! ```rust,ignore
//! use std::fs::File;
//! use rar_headers::{HeaderDecoder, HeaderResult};
//!
//! let mut decoder = HeaderDecoder::new(File::open("archive.rar")?)?;
//! while let HeaderResult::Record(record) = decoder.read_next()? {
//!     if let Some(entry) = record.as_entry() {
//!         println!("{} ({} bytes)", entry.name(), entry.packed_size);
//!     }
//! }
//! ```

use tracing::{debug, trace, warn};

use crate::cursor::ByteCursor;
use crate::error::{RarError, Result, Violation};
use crate::file_media::ByteSource;
use crate::formats::{Signature, SignatureMatch};
use crate::key::{
    ArchiveKeyPurpose, FormatGeneration, KdfParameters, KeyMaterial, KeyProvider, KeyRequest,
};
use crate::parsing::rar4::{self, AuxHeaderParser, SALT_SIZE, SHORT_HEADER_SIZE};
use crate::parsing::rar5::{self, IV_SIZE};
use crate::parsing::{HeaderLoader, ParsedHeader};
use crate::record::{
    AuxKind, CommentHeader, EncryptionHeader, EntryHeader, EntryKind, Header, HeaderKind,
    MainArchiveHeader, Record,
};


/// Decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Single-byte resync steps allowed from one record start before giving
    /// up with [`RarError::ResyncExhausted`].
    pub max_resync_attempts: usize,
    /// How far into the source the signature may start. Self-extracting
    /// archives put an executable in front of it.
    pub signature_search_limit: usize,
    /// Ask the key provider to verify per-entry password check values.
    pub verify_entry_passwords: bool,
    /// The source already holds the whole archive. Running out of bytes
    /// inside a record is then damage, and the end of the source ends the
    /// walk with [`HeaderResult::Eof`] instead of asking for more input.
    pub complete_input: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_resync_attempts: 65536,
            signature_search_limit: 0,
            verify_entry_passwords: false,
            complete_input: false,
        }
    }
}

/// Availability of the header key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStatus {
    #[default]
    Absent,
    Ready,
    /// The key failed verification. Cleared by `set_key` or `clear_key`.
    Rejected,
}

/// Archive-wide state carried between records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderState {
    /// `None` until the signature has been seen.
    pub generation: Option<FormatGeneration>,
    /// Headers after the current position are encrypted.
    pub encryption_active: bool,
    pub broken_headers: usize,
    pub main_header: Option<MainArchiveHeader>,
    /// Most recent RAR5 archive encryption header.
    pub encryption: Option<EncryptionHeader>,
    pub key_status: KeyStatus,
    /// The end of archive record has been returned.
    pub finished: bool,
}

/// Outcome of one [`HeaderDecoder::read_next`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderResult {
    Record(Record),
    /// At least `needed` more bytes are required to decode the record at
    /// `position`. The cursor is left at `position`.
    ///
    /// Without [`DecoderOptions::complete_input`] this is also what damage
    /// too short to hold a record looks like at the end of a source that
    /// will never grow.
    NeedMoreBytes { needed: usize, position: u64 },
    /// No more records.
    Eof { position: u64 },
    /// The source is not a RAR archive. Every later call returns this too.
    FatalFormatMismatch { position: u64 },
}

/// Comment stored inside a RAR 1.5-4.x main header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineComment {
    pub header: CommentHeader,
    /// Packed comment bytes.
    pub data: Vec<u8>,
}

/// Scan for the next intact record after a damaged one.
#[derive(Debug, Clone, Copy)]
struct ResyncRun {
    origin: u64,
    attempts: usize,
    /// First candidate that ran out of input, with the attempt count at it.
    /// Scanning goes on past it; if nothing intact turns up the decoder
    /// waits for more input there.
    short: Option<(u64, usize, usize)>,
}

/// Reads archive headers one at a time from a [`ByteSource`].
pub struct HeaderDecoder<S> {
    cursor: ByteCursor<S>,
    options: DecoderOptions,
    state: DecoderState,
    key: Option<KeyMaterial>,
    provider: Option<Box<dyn KeyProvider>>,
    resync: Option<ResyncRun>,
    fatal_at: Option<u64>,
}

impl<S: ByteSource> HeaderDecoder<S> {
    /// Decoder starting at the source's current position.
    pub fn new(source: S) -> Result<Self> {
        Self::with_options(source, DecoderOptions::default())
    }

    pub fn with_options(source: S, options: DecoderOptions) -> Result<Self> {
        Ok(Self {
            cursor: ByteCursor::new(source)?,
            options,
            state: DecoderState::default(),
            key: None,
            provider: None,
            resync: None,
            fatal_at: None,
        })
    }

    /// Ask `provider` for keys when encrypted headers are met.
    pub fn with_key_provider(mut self, provider: impl KeyProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// A record was returned with a bad checksum or contradicting the main
    /// header, or damage had to be skipped.
    pub fn broken_header_seen(&self) -> bool {
        self.state.broken_headers > 0
    }

    /// Position of the next record.
    pub fn position(&self) -> u64 {
        self.cursor.tell()
    }

    /// Mutable access to the source, e.g. to append bytes after
    /// [`HeaderResult::NeedMoreBytes`].
    pub fn source_mut(&mut self) -> &mut S {
        self.cursor.source_mut()
    }

    pub fn into_inner(self) -> S {
        self.cursor.into_inner()
    }

    /// Use `material` for the headers that follow, replacing any earlier key.
    /// If an encryption header with a password check has been seen, the key
    /// is verified now; a mismatch makes the next read fail with
    /// [`RarError::PasswordIncorrect`].
    pub fn set_key(&mut self, material: KeyMaterial) {
        if let Err(err) = self.install_key(material) {
            debug!(%err, "key rejected");
        }
    }

    /// Forget the current key and any rejection.
    pub fn clear_key(&mut self) {
        self.key = None;
        self.state.key_status = KeyStatus::Absent;
        if let Some(encryption) = self.state.encryption.as_mut() {
            encryption.password_verified = None;
        }
    }

    /// Decode the next record.
    ///
    /// Damaged checksums are reported through [`Record::broken`].
    /// Structurally impossible records are skipped. Errors leave the cursor
    /// at the record start, so the call can be repeated once the cause
    /// (missing key, wrong key) is fixed.
    pub fn read_next(&mut self) -> Result<HeaderResult> {
        if let Some(position) = self.fatal_at {
            return Ok(HeaderResult::FatalFormatMismatch { position });
        }
        if self.state.finished {
            return Ok(HeaderResult::Eof {
                position: self.cursor.tell(),
            });
        }

        let generation = match self.state.generation {
            Some(generation) => generation,
            None => match self.sniff()? {
                Ok(generation) => generation,
                Err(result) => return Ok(result),
            },
        };

        loop {
            let start = self.cursor.tell();
            if let Some(len) = self.cursor.stream_len()? {
                let at_end = start == len || (self.options.complete_input && start > len);
                if at_end {
                    if let Some(result) = self.wait_for_short_candidate() {
                        return Ok(result);
                    }
                    self.resync = None;
                    return Ok(HeaderResult::Eof { position: start });
                }
            }

            match self.decode_at(generation, start) {
                // While scanning damage only an intact record ends the run.
                Ok(record) if record.broken && self.resync.is_some() => {
                    self.resync_step(start, "checksum mismatch")?;
                }
                Ok(record) => {
                    self.resync = None;
                    self.cursor.seek_to(record.next_block_pos);
                    return Ok(HeaderResult::Record(self.accept(generation, record)));
                }
                Err(err @ RarError::Truncated { .. }) if self.options.complete_input => {
                    self.resync_step(start, err)?;
                }
                Err(RarError::Truncated { needed }) => match self.resync.as_mut() {
                    Some(run) => {
                        run.short.get_or_insert((start, needed, run.attempts));
                        self.resync_step(start, "candidate runs past the input")?;
                    }
                    None => {
                        self.cursor.seek_to(start);
                        return Ok(HeaderResult::NeedMoreBytes {
                            needed,
                            position: start,
                        });
                    }
                },
                Err(err) if err.is_structural() => self.resync_step(start, err)?,
                Err(err) => {
                    self.cursor.seek_to(start);
                    return Err(err);
                }
            }
        }
    }

    /// Skip the byte at `start` because of `cause`. The first step of a run counts
    /// the damage as one broken header.
    fn resync_step(&mut self, start: u64, cause: impl std::fmt::Display) -> Result<()> {
        if self.resync.is_none() {
            self.state.broken_headers += 1;
            warn!(
                position = start,
                %cause,
                broken_headers = self.state.broken_headers,
                "damaged header, resynchronizing"
            );
        }
        let run = self.resync.get_or_insert(ResyncRun {
            origin: start,
            attempts: 0,
            short: None,
        });
        run.attempts += 1;
        if run.attempts > self.options.max_resync_attempts {
            let origin = run.origin;
            // Scanning carries on from here on the next call, as the same run.
            *run = ResyncRun {
                origin: start,
                attempts: 0,
                short: None,
            };
            self.cursor.seek_to(start);
            warn!(
                origin,
                attempts = self.options.max_resync_attempts,
                "resync budget exhausted"
            );
            return Err(RarError::ResyncExhausted {
                attempts: self.options.max_resync_attempts,
                start: origin,
            });
        }
        debug!(position = start, attempts = run.attempts, %cause, "resync");
        self.cursor.seek_to(start + 1);
        Ok(())
    }

    /// A resync run reached the end of the input past a candidate that was
    /// only short of bytes: go back and wait for more input there.
    fn wait_for_short_candidate(&mut self) -> Option<HeaderResult> {
        if self.options.complete_input {
            return None;
        }
        let run = self.resync.as_mut()?;
        let (position, needed, attempts) = run.short.take()?;
        run.attempts = attempts;
        self.cursor.seek_to(position);
        Some(HeaderResult::NeedMoreBytes { needed, position })
    }

    /// Decode the comment embedded in a RAR 1.5-4.x main header, if `record`
    /// is such a header. The decoder position is unchanged.
    pub fn read_inline_comment(&mut self, record: &Record) -> Result<Option<InlineComment>> {
        let has_comment = matches!(&record.header, Header::Main(main) if main.has_comment);
        if self.state.generation != Some(FormatGeneration::Legacy) || !has_comment {
            return Ok(None);
        }

        let saved = self.cursor.tell();
        self.cursor
            .seek_to(record.current_block_pos + SHORT_HEADER_SIZE as u64);
        let comment = self.read_comment_block();
        self.cursor.seek_to(saved);
        comment
    }

    fn read_comment_block(&mut self) -> Result<Option<InlineComment>> {
        let fixed: [u8; SHORT_HEADER_SIZE] = self.cursor.read_array()?;
        let prefix = rar4::parse_prefix(&fixed)?;
        let kind = HeaderKind::from_legacy(prefix.header_type as u8);
        if kind != HeaderKind::Auxiliary(AuxKind::Comment) {
            debug!(header_type = prefix.header_type, "main header comment block has wrong type");
            return Ok(None);
        }
        let size = prefix.declared_size as usize;
        if size < SHORT_HEADER_SIZE {
            return Err(Violation::HeaderTooSmall {
                size: prefix.declared_size,
                minimum: SHORT_HEADER_SIZE as u64,
            }
            .into());
        }
        let mut body = ByteCursor::over_record(&fixed);
        body.seek_to(rar4::PREFIX_SIZE as u64);
        let header = AuxHeaderParser::parse_comment(&mut body)?;
        let data = self.cursor.read_bytes(size - SHORT_HEADER_SIZE)?;
        Ok(Some(InlineComment { header, data }))
    }

    /// Find the signature and position the cursor after it. `Err` carries
    /// the result to hand back instead.
    fn sniff(&mut self) -> Result<std::result::Result<FormatGeneration, HeaderResult>> {
        let start = self.cursor.tell();
        let limit = self.options.signature_search_limit;
        let wanted = limit.saturating_add(Signature::RAR50.len());
        let available = self
            .cursor
            .bytes_available()?
            .map_or(wanted, |avail| avail.min(wanted as u64) as usize);
        let data = match self.cursor.read_bytes(available) {
            Ok(data) => data,
            Err(RarError::Truncated { needed }) => {
                self.cursor.seek_to(start);
                return Ok(Err(HeaderResult::NeedMoreBytes {
                    needed,
                    position: start,
                }));
            }
            Err(err) => return Err(err),
        };
        self.cursor.seek_to(start);

        match Signature::sniff(&data, limit) {
            SignatureMatch::Found { signature, offset } => {
                let generation = match signature {
                    Signature::Rar15 => FormatGeneration::Legacy,
                    Signature::Rar50 => FormatGeneration::Modern,
                };
                debug!(?generation, offset, "signature found");
                self.state.generation = Some(generation);
                self.cursor
                    .seek_to(start + offset as u64 + signature.size());
                Ok(Ok(generation))
            }
            SignatureMatch::NeedMore { needed } if !self.options.complete_input => {
                Ok(Err(HeaderResult::NeedMoreBytes {
                    needed,
                    position: start,
                }))
            }
            SignatureMatch::NeedMore { .. } | SignatureMatch::Mismatch => {
                warn!(position = start, "no RAR signature");
                self.fatal_at = Some(start);
                Ok(Err(HeaderResult::FatalFormatMismatch { position: start }))
            }
        }
    }

    /// Decode the record at `start` and place it in the stream.
    fn decode_at(&mut self, generation: FormatGeneration, start: u64) -> Result<Record> {
        let decrypting = self.state.encryption_active;
        if decrypting {
            self.ensure_key(generation)?;
        }

        let (parsed, full_size) = match self.load(generation, start, decrypting) {
            Ok(loaded) => loaded,
            Err(err) if decrypting && err.is_structural() => {
                return Err(self.reject_key(&err.to_string()))
            }
            Err(err) => return Err(err),
        };

        let data_pos = start.checked_add(full_size).ok_or(Violation::SizeOverflow)?;
        let next_block_pos = data_pos
            .checked_add(parsed.payload_size)
            .ok_or(Violation::SizeOverflow)?;
        if next_block_pos <= start {
            return Err(Violation::NonAdvancing {
                current: start,
                next: next_block_pos,
            }
            .into());
        }

        let broken = if parsed.checksum_ok {
            false
        } else if decrypting {
            return Err(self.reject_key("checksum mismatch"));
        } else {
            !self.is_legacy_end_at_stream_end(generation, &parsed, next_block_pos)?
        };

        Ok(Record {
            header: parsed.header,
            prefix: parsed.prefix,
            current_block_pos: start,
            data_pos,
            next_block_pos,
            broken,
        })
    }

    /// Read and decode the header at the cursor. Returns it with the number
    /// of bytes it occupies in the stream.
    fn load(
        &mut self,
        generation: FormatGeneration,
        start: u64,
        decrypting: bool,
    ) -> Result<(ParsedHeader, u64)> {
        let cipher = if decrypting {
            self.key.as_mut().and_then(|key| key.cipher.as_deref_mut())
        } else {
            None
        };
        let mut loader = match cipher {
            None => HeaderLoader::plain(&mut self.cursor),
            Some(cipher) => {
                let init_len = match generation {
                    FormatGeneration::Legacy => SALT_SIZE,
                    FormatGeneration::Modern => IV_SIZE,
                };
                HeaderLoader::encrypted(&mut self.cursor, cipher, init_len)?
            }
        };

        let parsed = match generation {
            FormatGeneration::Legacy => rar4::decode(&mut loader)?,
            FormatGeneration::Modern => rar5::decode(&mut loader, start)?,
        };
        let full_size = loader
            .on_disk_size(parsed.header_size)
            .ok_or(Violation::SizeOverflow)?;
        Ok((parsed, full_size))
    }

    /// Old archivers wrote end markers with unreliable checksums.
    fn is_legacy_end_at_stream_end(
        &mut self,
        generation: FormatGeneration,
        parsed: &ParsedHeader,
        next_block_pos: u64,
    ) -> Result<bool> {
        Ok(generation == FormatGeneration::Legacy
            && matches!(parsed.header, Header::EndOfArchive(_))
            && self.cursor.stream_len()? == Some(next_block_pos))
    }

    fn reject_key(&mut self, cause: &str) -> RarError {
        warn!(cause, "decrypted header is invalid");
        self.state.key_status = KeyStatus::Rejected;
        RarError::PasswordIncorrect
    }

    /// Update the decoder state from an accepted record and apply the
    /// checks that need archive context.
    fn accept(&mut self, generation: FormatGeneration, mut record: Record) -> Record {
        let position = record.current_block_pos;
        match &mut record.header {
            Header::Main(main) => {
                if generation == FormatGeneration::Legacy && main.encrypted_headers {
                    self.state.encryption_active = true;
                }
                self.state.main_header = Some(main.clone());
            }
            Header::Encryption(encryption) => {
                self.state.encryption_active = true;
                self.state.encryption = Some(encryption.clone());
                self.try_key_early();
                encryption.password_verified = self
                    .state
                    .encryption
                    .as_ref()
                    .and_then(|cached| cached.password_verified);
            }
            Header::Entry(entry) => {
                if let Some(main) = &self.state.main_header {
                    if let Some(reason) = contradiction(generation, main, entry) {
                        warn!(position, name = entry.name(), reason, "entry contradicts main header");
                        record.broken = true;
                    }
                }
                if self.options.verify_entry_passwords {
                    self.verify_entry_password(entry);
                }
            }
            Header::EndOfArchive(_) => self.state.finished = true,
            Header::Auxiliary(_) => {}
        }

        if record.broken {
            self.state.broken_headers += 1;
            warn!(
                position,
                kind = ?record.kind(),
                broken_headers = self.state.broken_headers,
                "broken header"
            );
        }
        trace!(
            position,
            kind = ?record.kind(),
            next = record.next_block_pos,
            "record"
        );
        record
    }

    /// Verify a key the moment the encryption header arrives, so that a
    /// wrong password shows up before any encrypted header is read.
    fn try_key_early(&mut self) {
        let outcome = match self.state.key_status {
            KeyStatus::Ready => match self.key.take() {
                Some(material) => self.install_key(material),
                None => Ok(()),
            },
            KeyStatus::Absent if self.provider.is_some() => {
                self.ensure_key(FormatGeneration::Modern)
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            debug!(%err, "header key not usable yet");
        }
    }

    /// Make sure a header cipher is available, asking the provider if needed.
    fn ensure_key(&mut self, generation: FormatGeneration) -> Result<()> {
        match self.state.key_status {
            KeyStatus::Rejected => return Err(RarError::PasswordIncorrect),
            KeyStatus::Ready => {}
            KeyStatus::Absent => {
                let kdf = self.state.encryption.as_ref().map(|encryption| KdfParameters {
                    version: encryption.version,
                    lg2_count: encryption.lg2_count,
                    salt: &encryption.salt,
                });
                let request = KeyRequest {
                    purpose: ArchiveKeyPurpose::HeaderDecryption,
                    generation,
                    kdf,
                };
                debug!(?generation, "requesting header key");
                let material = self
                    .provider
                    .as_mut()
                    .and_then(|provider| provider.request_key(&request))
                    .ok_or(RarError::PasswordRequired)?;
                self.install_key(material)?;
            }
        }
        if self.key.as_ref().is_some_and(|key| key.cipher.is_some()) {
            Ok(())
        } else {
            Err(RarError::PasswordRequired)
        }
    }

    /// Store `material`, checking it against the cached encryption header.
    fn install_key(&mut self, material: KeyMaterial) -> Result<()> {
        let stored = self
            .state
            .encryption
            .as_ref()
            .and_then(|encryption| encryption.check);
        let verified = match (stored, material.password_check) {
            (Some(stored), Some(derived)) => Some(stored.value == derived),
            _ => None,
        };
        if let Some(encryption) = self.state.encryption.as_mut() {
            encryption.password_verified = verified;
        }

        if verified == Some(false) {
            warn!("password check value mismatch");
            self.key = None;
            self.state.key_status = KeyStatus::Rejected;
            return Err(RarError::PasswordIncorrect);
        }
        self.key = Some(material);
        self.state.key_status = KeyStatus::Ready;
        Ok(())
    }

    fn verify_entry_password(&mut self, entry: &mut EntryHeader) {
        let Some(provider) = self.provider.as_mut() else {
            return;
        };
        let Some(crypt) = entry.extensions.encryption.as_mut() else {
            return;
        };
        let Some(stored) = crypt.password_check else {
            return;
        };
        if crypt.version != 0 {
            return;
        }
        let request = KeyRequest {
            purpose: ArchiveKeyPurpose::EntryVerification,
            generation: FormatGeneration::Modern,
            kdf: Some(KdfParameters {
                version: crypt.version,
                lg2_count: crypt.lg2_count,
                salt: &crypt.salt,
            }),
        };
        debug!(name = %entry.name.text, "requesting entry verification key");
        let derived = provider
            .request_key(&request)
            .and_then(|material| material.password_check);
        crypt.password_verified = derived.map(|derived| derived == stored);
    }
}

/// Why `entry` cannot belong to the archive `main` describes, if it can't.
fn contradiction(
    generation: FormatGeneration,
    main: &MainArchiveHeader,
    entry: &EntryHeader,
) -> Option<&'static str> {
    let flags = &entry.flags;
    if flags.split_before && main.is_first_volume {
        Some("continued from a previous volume in the first volume")
    } else if (flags.split_before || flags.split_after) && !main.is_volume {
        Some("split entry in a single-volume archive")
    } else if generation == FormatGeneration::Legacy
        && entry.kind == EntryKind::File
        && flags.is_solid
        && !main.is_solid
    {
        Some("solid entry in a non-solid archive")
    } else {
        None
    }
}
