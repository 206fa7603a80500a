use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::StreamResult;

/// Read-only, random-access, zero-copy view over the input file.
///
/// Both the Parser's sequential scan and the Sender's positional payload
/// reads index into the same mapping; neither holds a seek cursor into the
/// underlying file.
pub struct ByteSource {
    mmap: Mmap,
}

impl ByteSource {
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        let file = File::open(path)?;
        // SAFETY: we require the caller not to mutate the file out from under
        // us for the lifetime of this mapping; it is only ever read here.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(ByteSource { mmap })
    }

    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Byte range `[start, end)`, addressed by absolute offset.
    pub fn slice(&self, start: u64, end: u64) -> &[u8] {
        &self.mmap[start as usize..end as usize]
    }

    pub fn byte_at(&self, offset: u64) -> u8 {
        self.mmap[offset as usize]
    }

    /// A sequential read cursor for the Parser's scan. Independent of
    /// `slice`/`byte_at`; the Byte Source itself tracks no cursor state.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            bytes: &self.mmap,
            pos: 0,
        }
    }
}

/// Sequential view over a `ByteSource`, owned by whoever is scanning.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> Cursor<'a> {
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.len()
    }

    pub fn byte_at(&self, offset: u64) -> Option<u8> {
        self.bytes.get(offset as usize).copied()
    }

    pub fn advance(&mut self, n: u64) {
        self.pos += n;
    }

    pub fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }
}
