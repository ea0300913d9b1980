//! Memory-mapped array of fixed-size records.
//!
//! The whole file (header and records) is mapped. Record views borrow the
//! store, and every operation that changes the file length takes `&mut self`,
//! so a view can never outlive the mapping it points into.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use memmap2::{Mmap, MmapMut};

use super::store_header::{
    mix_magic, StoreHeader, FORMAT_VERSION, NUM_RECORDS_OFFSET, STORE_HEADER_SIZE,
};
use super::PageId;
use crate::errors::{SpatialError, SpatialResult};

enum Mapping {
    ReadOnly(Mmap),
    Writable(MmapMut),
    /// No view of the file; held while its length changes.
    Detached,
}

impl Mapping {
    fn map(file: &File, writable: bool) -> io::Result<Self> {
        // SAFETY: writable stores hold an exclusive advisory lock, and
        // read-only stores are only opened while no writer holds the file.
        unsafe {
            if writable {
                Ok(Mapping::Writable(MmapMut::map_mut(file)?))
            } else {
                Ok(Mapping::ReadOnly(Mmap::map(file)?))
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(map) => &map[..],
            Mapping::Writable(map) => &map[..],
            Mapping::Detached => &[],
        }
    }

    fn bytes_mut(&mut self) -> SpatialResult<&mut [u8]> {
        match self {
            Mapping::ReadOnly(_) => Err(SpatialError::ReadOnly),
            Mapping::Writable(map) => Ok(&mut map[..]),
            Mapping::Detached => Ok(Default::default()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Mapping::ReadOnly(_) | Mapping::Detached => Ok(()),
            Mapping::Writable(map) => map.flush(),
        }
    }
}

/// On-disk array of `num_records` records of `record_size` bytes each,
/// preceded by a validated header.
///
/// Invariant: the file length is always `header_size + record_size * num_records`.
pub struct PageStore {
    file: File,
    path: PathBuf,
    mapping: Mapping,
    magic: u32,
    header_size: usize,
    record_size: usize,
    num_records: u32,
    writable: bool,
}

impl PageStore {
    /// Creates a new store, replacing any existing file at `path`.
    ///
    /// The file is locked exclusively for the lifetime of the store.
    pub fn create(
        path: impl AsRef<Path>,
        magic_seed: u32,
        extra_header_size: usize,
        record_size: usize,
        initial_records: u32,
    ) -> SpatialResult<Self> {
        let path = path.as_ref().to_path_buf();
        if record_size == 0 {
            return Err(SpatialError::InvalidOperation(
                "record size must be positive".into(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        lock_exclusive(&file, &path)?;

        let header = StoreHeader {
            magic: mix_magic(FORMAT_VERSION, magic_seed),
            header_size: (STORE_HEADER_SIZE + extra_header_size) as u32,
            record_size: record_size as u32,
            num_records: initial_records,
        };

        // Truncate only once the lock is held.
        file.set_len(0)?;
        file.set_len(header.expected_file_len())?;

        let mut mapping = Mapping::map(&file, true)?;
        header.encode_into(mapping.bytes_mut()?)?;
        mapping.flush()?;

        log::debug!(
            "Created page store {} (record size {}, {} records)",
            path.display(),
            record_size,
            initial_records
        );

        Ok(Self {
            file,
            path,
            mapping,
            magic: header.magic,
            header_size: header.header_size as usize,
            record_size,
            num_records: initial_records,
            writable: true,
        })
    }

    /// Opens and validates an existing store.
    ///
    /// With `record_size = Some(r)` the stored record size must equal `r`
    /// (strict mode); with `None` the stored value is adopted. Writable stores
    /// take an exclusive lock, read-only stores take none.
    pub fn open(
        path: impl AsRef<Path>,
        magic_seed: u32,
        extra_header_size: usize,
        record_size: Option<usize>,
        writable: bool,
    ) -> SpatialResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(writable).open(&path)?;
        if writable {
            lock_exclusive(&file, &path)?;
        }

        let file_len = file.metadata()?.len();
        if file_len < STORE_HEADER_SIZE as u64 {
            return Err(SpatialError::CorruptFile {
                path,
                expected: STORE_HEADER_SIZE as u64,
                actual: file_len,
            });
        }

        let mut raw = [0u8; STORE_HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = StoreHeader::decode(&raw)?;

        let expected_magic = mix_magic(FORMAT_VERSION, magic_seed);
        if header.magic != expected_magic {
            return Err(SpatialError::BadMagic {
                path,
                expected: expected_magic,
                actual: header.magic,
            });
        }

        let expected_header_size = (STORE_HEADER_SIZE + extra_header_size) as u32;
        if header.header_size != expected_header_size {
            return Err(SpatialError::HeaderSizeMismatch {
                path,
                expected: expected_header_size,
                actual: header.header_size,
            });
        }

        if let Some(record_size) = record_size {
            if header.record_size != record_size as u32 {
                return Err(SpatialError::RecordSizeMismatch {
                    path,
                    expected: record_size as u32,
                    actual: header.record_size,
                });
            }
        }
        if header.record_size == 0 {
            return Err(SpatialError::CorruptFile {
                path,
                expected: header.expected_file_len(),
                actual: file_len,
            });
        }

        if file_len != header.expected_file_len() {
            return Err(SpatialError::CorruptFile {
                path,
                expected: header.expected_file_len(),
                actual: file_len,
            });
        }

        let mapping = Mapping::map(&file, writable)?;

        log::debug!(
            "Opened page store {} ({} records of {} bytes, {})",
            path.display(),
            header.num_records,
            header.record_size,
            if writable { "read-write" } else { "read-only" }
        );

        Ok(Self {
            file,
            path,
            mapping,
            magic: header.magic,
            header_size: header.header_size as usize,
            record_size: header.record_size as usize,
            num_records: header.num_records,
            writable,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn num_records(&self) -> u32 {
        self.num_records
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Caller-defined bytes following the fixed header.
    pub fn extra_header(&self) -> &[u8] {
        self.mapping
            .bytes()
            .get(STORE_HEADER_SIZE..self.header_size)
            .unwrap_or(&[])
    }

    pub fn extra_header_mut(&mut self) -> SpatialResult<&mut [u8]> {
        let range = STORE_HEADER_SIZE..self.header_size;
        self.mapped_mut(range)
    }

    /// The bytes of record `page_id`.
    pub fn record_buffer(&self, page_id: PageId) -> SpatialResult<&[u8]> {
        let range = self.record_range(page_id)?;
        let mapped_len = self.mapping.bytes().len();
        match self.mapping.bytes().get(range.clone()) {
            Some(bytes) => Ok(bytes),
            None => Err(self.short_mapping(range.end, mapped_len)),
        }
    }

    /// Mutable bytes of record `page_id`; fails on read-only stores.
    pub fn record_buffer_mut(&mut self, page_id: PageId) -> SpatialResult<&mut [u8]> {
        let range = self.record_range(page_id)?;
        self.mapped_mut(range)
    }

    fn mapped_mut(&mut self, range: std::ops::Range<usize>) -> SpatialResult<&mut [u8]> {
        let mapped_len = self.mapping.bytes().len();
        if range.end > mapped_len {
            return Err(self.short_mapping(range.end, mapped_len));
        }
        Ok(&mut self.mapping.bytes_mut()?[range])
    }

    fn short_mapping(&self, needed: usize, mapped: usize) -> SpatialError {
        SpatialError::CorruptFile {
            path: self.path.clone(),
            expected: needed as u64,
            actual: mapped as u64,
        }
    }

    fn record_range(&self, page_id: PageId) -> SpatialResult<std::ops::Range<usize>> {
        if page_id >= self.num_records {
            return Err(SpatialError::PageOutOfRange {
                page_id: page_id as u64,
                num_records: self.num_records,
            });
        }
        let start = self.header_size + page_id as usize * self.record_size;
        Ok(start..start + self.record_size)
    }

    /// Grows the store to hold at least `num_records` records.
    pub fn ensure_size(&mut self, num_records: u32) -> SpatialResult<()> {
        if num_records > self.num_records {
            self.resize_file(num_records)?;
        }
        Ok(())
    }

    /// Sets the record count to exactly `num_records`, growing or truncating.
    ///
    /// The header field is rewritten first, then the file length changes and
    /// the file is mapped again. If the length cannot be changed the old
    /// length, mapping and header field are put back before the error is
    /// returned.
    pub fn resize_file(&mut self, num_records: u32) -> SpatialResult<()> {
        if !self.writable {
            return Err(SpatialError::ReadOnly);
        }
        if num_records == self.num_records {
            return Ok(());
        }

        let old_records = self.num_records;
        self.write_num_records(num_records)?;

        if let Err(e) = self.remap_with_records(num_records) {
            log::error!(
                "Failed to resize page store {} to {} records: {}",
                self.path.display(),
                num_records,
                e
            );
            if let Err(restore) = self
                .remap_with_records(old_records)
                .and_then(|_| self.write_num_records(old_records))
            {
                log::error!(
                    "Failed to restore page store {} to {} records: {}",
                    self.path.display(),
                    old_records,
                    restore
                );
            }
            return Err(e);
        }

        log::debug!(
            "Resized page store {} from {} to {} records",
            self.path.display(),
            old_records,
            num_records
        );
        self.num_records = num_records;
        Ok(())
    }

    fn write_num_records(&mut self, num_records: u32) -> SpatialResult<()> {
        let field = self.mapped_mut(NUM_RECORDS_OFFSET..STORE_HEADER_SIZE)?;
        field.copy_from_slice(&num_records.to_le_bytes());
        self.mapping.flush()?;
        Ok(())
    }

    fn remap_with_records(&mut self, num_records: u32) -> SpatialResult<()> {
        // Unmap before the length changes.
        self.mapping = Mapping::Detached;
        let new_len = self.header_size as u64 + self.record_size as u64 * num_records as u64;
        self.file.set_len(new_len)?;
        self.mapping = Mapping::map(&self.file, true)?;
        Ok(())
    }

    /// Writes dirty mapped pages back to the file.
    pub fn flush(&self) -> SpatialResult<()> {
        self.mapping.flush()?;
        Ok(())
    }

    /// Flushes and releases the store, surfacing any flush failure.
    pub fn close(self) -> SpatialResult<()> {
        self.flush()?;
        log::debug!("Closed page store {}", self.path.display());
        Ok(())
    }
}

fn lock_exclusive(file: &File, path: &Path) -> SpatialResult<()> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(()),
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            log::error!("Page store {} is already locked", path.display());
            Err(SpatialError::Locked {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        if !self.writable {
            return;
        }
        if let Err(e) = self.mapping.flush() {
            log::error!("Failed to flush page store {}: {}", self.path.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            log::error!("Failed to unlock page store {}: {}", self.path.display(), e);
        }
    }
}
