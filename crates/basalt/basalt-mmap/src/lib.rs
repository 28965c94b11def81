use memmap2::{MmapOptions, MmapRaw};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
};

/// Configures how a shared region is opened and mapped.
///
/// Exactly one of `path(..)` or `anonymous()` must be set. File-backed
/// regions are mapped `MAP_SHARED` read-write so every process mapping the
/// same file observes the same bytes.
#[derive(Debug, Default)]
pub struct RegionBuilder {
    path: Option<PathBuf>,
    anonymous: bool,
    size: u64,
    allow_create: bool,
    no_truncate_on_create: bool,
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Map anonymous memory instead of a file. Visible only within this
    /// process (and children that inherit the mapping).
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn size(mut self, bytes: u64) -> Self {
        self.size = bytes;
        self
    }

    /// Permit creating the backing file when it does not exist yet.
    pub fn allow_create(mut self) -> Self {
        self.allow_create = true;
        self
    }

    /// Skip sizing a freshly created file. On by default.
    pub fn no_truncate_on_create(mut self) -> Self {
        self.no_truncate_on_create = true;
        self
    }

    /// Open (creating if permitted and absent), size, and map the region.
    ///
    /// Creation uses `create_new` (O_EXCL) so that when two processes race
    /// on a fresh file exactly one of them initializes it; the loser falls
    /// back to opening the existing file and `Region::created()` reports
    /// `false` for it.
    pub fn build(self) -> io::Result<Region> {
        if self.anonymous == self.path.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region must be exactly one of anonymous or file-backed",
            ));
        }
        if self.size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region size must be set",
            ));
        }
        let len = self.size as usize;

        if self.anonymous {
            let map = MmapOptions::new().len(len).map_anon()?;
            return Ok(Region {
                raw: MmapRaw::from(map),
                created: true,
            });
        }

        let path = self.path.as_ref().unwrap();
        let mut created = false;
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound && self.allow_create => {
                match OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .open(path)
                {
                    Ok(f) => {
                        created = true;
                        f
                    }
                    // Lost the create race: another process got there first.
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        OpenOptions::new().read(true).write(true).open(path)?
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        if created && !self.no_truncate_on_create {
            file.set_len(self.size)?;
        } else if !created && file.metadata()?.len() < self.size {
            // Mapping past the end of the file would SIGBUS on first touch.
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("existing region '{}' is smaller than requested", path.display()),
            ));
        }

        let raw = MmapOptions::new().len(len).map_raw(&file)?;
        // `file` drops here; the mapping keeps the pages alive.
        Ok(Region { raw, created })
    }
}

/// An owning shared memory mapping. Unmapped on drop.
///
/// The raw mapping is handed out as pointers rather than slices: the bytes
/// are shared with other processes and callers synchronize access with
/// their own locks, so no `&`/`&mut` reference to the whole region is ever
/// materialized here.
#[derive(Debug)]
pub struct Region {
    raw: MmapRaw,
    created: bool,
}

impl Region {
    /// Pointer to the start of the mapped region.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.raw.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Whether `build()` created the backing file on this open.
    #[inline]
    pub fn created(&self) -> bool {
        self.created
    }
}
