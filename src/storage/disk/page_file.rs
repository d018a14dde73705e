use crate::error::{DbError, DbResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// A file viewed as an array of fixed-size pages.
///
/// Reads and writes are positional, so a shared `&PageFile` can serve
/// concurrent readers. Growth goes through `allocate_page`, which is
/// serialized so that concurrent appenders get distinct page numbers.
#[derive(Debug)]
pub struct PageFile {
    file: File,
    page_size: usize,
    append_latch: Mutex<()>,
}

impl PageFile {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, page_size: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::with_file(file, page_size)
    }

    /// Open an existing file, or create an empty one if it is missing.
    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::with_file(file, page_size)
    }

    fn with_file(file: File, page_size: usize) -> DbResult<Self> {
        if page_size == 0 {
            return Err(DbError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }
        Ok(Self {
            file,
            page_size,
            append_latch: Mutex::new(()),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whole pages currently in the file; a trailing partial page is not counted.
    pub fn num_pages(&self) -> DbResult<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Fill `buf` with page `page_no`. Fails with `UnexpectedEof` when the
    /// page lies (partly) beyond the end of the file.
    pub fn read_page(&self, page_no: u32, buf: &mut [u8]) -> DbResult<()> {
        self.check_len(buf.len())?;
        read_exact_at(&self.file, buf, self.offset(page_no))?;
        Ok(())
    }

    /// Overwrite page `page_no`, extending the file if needed.
    pub fn write_page(&self, page_no: u32, data: &[u8]) -> DbResult<()> {
        self.check_len(data.len())?;
        write_all_at(&self.file, data, self.offset(page_no))?;
        Ok(())
    }

    /// Append one zeroed page and return its number.
    pub fn allocate_page(&self) -> DbResult<u32> {
        let _latch = self.append_latch.lock();
        let page_no = self.num_pages()?;
        self.file
            .set_len((page_no as u64 + 1) * self.page_size as u64)?;
        Ok(page_no)
    }

    pub fn sync(&self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    fn check_len(&self, len: usize) -> DbResult<()> {
        if len != self.page_size {
            return Err(DbError::InvalidArgument(format!(
                "buffer of {} bytes for a {} byte page",
                len, self.page_size
            )));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            n => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        match file.seek_write(data, offset)? {
            0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            n => {
                data = &data[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}
