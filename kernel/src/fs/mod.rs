//! Read-only filesystem over an in-memory image.
//!
//! The image arrives as a multiboot module: a 4 KiB boot block (entry
//! counts plus up to 63 directory entries), then one 4 KiB record per
//! inode, then the 4 KiB data blocks. Nothing is ever written back.

pub mod file;

use spin::Once;

use crate::error::KernelError;

/// Bytes per block, and per boot-block/inode record.
pub const BLOCK_SIZE: usize = 4096;
/// Maximum filename length; names this long carry no terminator.
pub const MAX_FNAME_LEN: usize = 32;
/// Maximum directory entries an image can hold.
pub const MAX_DENTRIES: usize = 63;
/// Bytes per directory entry record.
const DENTRY_SIZE: usize = 64;
/// Offset of the dentry array within the boot block.
const DENTRY_OFFSET: usize = 64;
/// Data block indices an inode can hold.
const MAX_BLOCKS_PER_INODE: usize = BLOCK_SIZE / 4 - 1;

/// Directory entry type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Rtc = 0,
    Directory = 1,
    Regular = 2,
}

impl TryFrom<u32> for FileType {
    type Error = KernelError;

    fn try_from(raw: u32) -> Result<Self, KernelError> {
        match raw {
            0 => Ok(FileType::Rtc),
            1 => Ok(FileType::Directory),
            2 => Ok(FileType::Regular),
            _ => Err(KernelError::InvalidFileType),
        }
    }
}

/// One directory entry, copied out of the boot block.
#[derive(Debug, Clone, Copy)]
pub struct Dentry {
    pub name: [u8; MAX_FNAME_LEN],
    pub ftype: FileType,
    pub inode: u32,
}

impl Dentry {
    /// The name without trailing NUL padding.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FNAME_LEN);
        &self.name[..len]
    }
}

/// Pad or truncate a lookup name to the stored 32-byte form. Names longer
/// than 32 bytes are compared on their first 32 bytes, so a 33-character
/// query can still address a 32-character entry.
fn canonical_name(name: &[u8]) -> [u8; MAX_FNAME_LEN] {
    let mut out = [0u8; MAX_FNAME_LEN];
    let len = name.len().min(MAX_FNAME_LEN);
    out[..len].copy_from_slice(&name[..len]);
    out
}

/// A parsed view over a filesystem image.
pub struct FsImage<'a> {
    data: &'a [u8],
    num_dentries: u32,
    num_inodes: u32,
    num_data_blocks: u32,
    inode_offset: usize,
    data_offset: usize,
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

impl<'a> FsImage<'a> {
    /// Validate the boot block against the image size and compute the
    /// region offsets.
    pub fn parse(data: &'a [u8]) -> Result<Self, KernelError> {
        if data.len() < BLOCK_SIZE {
            return Err(KernelError::InvalidFileName);
        }
        let num_dentries = read_u32(data, 0);
        let num_inodes = read_u32(data, 4);
        let num_data_blocks = read_u32(data, 8);
        if num_dentries as usize > MAX_DENTRIES {
            return Err(KernelError::InvalidFileName);
        }
        let inode_offset = BLOCK_SIZE;
        let data_offset = inode_offset + num_inodes as usize * BLOCK_SIZE;
        let total = data_offset + num_data_blocks as usize * BLOCK_SIZE;
        if data.len() < total {
            return Err(KernelError::InvalidFileName);
        }
        Ok(Self {
            data,
            num_dentries,
            num_inodes,
            num_data_blocks,
            inode_offset,
            data_offset,
        })
    }

    pub fn num_dentries(&self) -> u32 {
        self.num_dentries
    }

    /// Directory entry by position in the boot block.
    pub fn read_dentry_by_index(&self, index: u32) -> Result<Dentry, KernelError> {
        if index >= self.num_dentries {
            return Err(KernelError::InvalidFileName);
        }
        let base = DENTRY_OFFSET + index as usize * DENTRY_SIZE;
        let mut name = [0u8; MAX_FNAME_LEN];
        name.copy_from_slice(&self.data[base..base + MAX_FNAME_LEN]);
        let ftype = FileType::try_from(read_u32(self.data, base + 32))?;
        let inode = read_u32(self.data, base + 36);
        Ok(Dentry { name, ftype, inode })
    }

    /// Directory entry by name. Case sensitive; compares the full 32-byte
    /// field, so names exactly 32 characters wide match without a NUL.
    pub fn read_dentry_by_name(&self, name: &[u8]) -> Result<Dentry, KernelError> {
        let wanted = canonical_name(name);
        for index in 0..self.num_dentries {
            let dentry = self.read_dentry_by_index(index)?;
            if dentry.name == wanted {
                return Ok(dentry);
            }
        }
        Err(KernelError::InvalidFileName)
    }

    fn inode_base(&self, inode: u32) -> Result<usize, KernelError> {
        if inode >= self.num_inodes {
            return Err(KernelError::InvalidDescriptor);
        }
        Ok(self.inode_offset + inode as usize * BLOCK_SIZE)
    }

    /// Length in bytes of an inode's file.
    pub fn inode_len(&self, inode: u32) -> Result<u32, KernelError> {
        let base = self.inode_base(inode)?;
        Ok(read_u32(self.data, base))
    }

    /// Read up to `buf.len()` bytes starting at byte `offset` of the
    /// inode's file. Returns 0 at end of file; never reads past the
    /// recorded length. A data-block index outside the image is image
    /// corruption and halts the kernel.
    pub fn read_data(
        &self,
        inode: u32,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, KernelError> {
        let base = self.inode_base(inode)?;
        let length = read_u32(self.data, base);
        if offset >= length {
            return Ok(0);
        }
        let wanted = buf.len().min((length - offset) as usize);

        let mut copied = 0usize;
        while copied < wanted {
            let pos = offset as usize + copied;
            let block_slot = pos / BLOCK_SIZE;
            let block_offset = pos % BLOCK_SIZE;
            assert!(
                block_slot < MAX_BLOCKS_PER_INODE,
                "filesystem: inode {} walks past its block list",
                inode
            );
            let block_index = read_u32(self.data, base + 4 + block_slot * 4);
            assert!(
                block_index < self.num_data_blocks,
                "filesystem: inode {} names data block {} of {}",
                inode,
                block_index,
                self.num_data_blocks
            );
            let chunk = (BLOCK_SIZE - block_offset).min(wanted - copied);
            let src = self.data_offset + block_index as usize * BLOCK_SIZE + block_offset;
            buf[copied..copied + chunk].copy_from_slice(&self.data[src..src + chunk]);
            copied += chunk;
        }
        Ok(copied)
    }
}

static FS: Once<FsImage<'static>> = Once::new();

/// Adopt the multiboot module at `[start, end)` as the filesystem image.
///
/// # Safety
/// The range must stay mapped and unmodified for the kernel's lifetime.
pub unsafe fn init(start: usize, end: usize) -> Result<(), KernelError> {
    // SAFETY: guaranteed by the caller; the loader placed the module in
    // memory the kernel never reuses.
    let data = unsafe { core::slice::from_raw_parts(start as *const u8, end - start) };
    let image = FsImage::parse(data)?;
    log::info!(
        "filesystem: {} dentries, {} inodes, {} data blocks",
        image.num_dentries,
        image.num_inodes,
        image.num_data_blocks
    );
    FS.call_once(|| image);
    Ok(())
}

/// The mounted image. Panics if called before [`init`]; boot order
/// guarantees it.
pub fn image() -> &'static FsImage<'static> {
    FS.get().expect("filesystem used before init")
}

#[cfg(test)]
pub(crate) fn mount_for_tests(builder: fn() -> std::vec::Vec<u8>) -> &'static FsImage<'static> {
    FS.call_once(|| {
        let data: &'static [u8] = std::boxed::Box::leak(builder().into_boxed_slice());
        FsImage::parse(data).expect("test image must parse")
    })
}

#[cfg(test)]
pub(crate) mod testfs {
    //! Synthetic image builder shared by the filesystem tests.

    use std::vec;
    use std::vec::Vec;

    use super::*;

    pub struct FileSpec {
        pub name: &'static [u8],
        pub ftype: u32,
        pub content: &'static [u8],
    }

    /// Assemble an image from file specs. Inode and data block numbering
    /// follow declaration order; type-0 and type-1 entries get inode 0.
    pub fn build(files: &[FileSpec]) -> Vec<u8> {
        let regulars: Vec<&FileSpec> = files.iter().filter(|f| f.ftype == 2).collect();
        let num_inodes = regulars.len();
        let blocks_per: Vec<usize> = regulars.iter().map(|f| f.content.len().div_ceil(BLOCK_SIZE).max(1)).collect();
        let num_blocks: usize = blocks_per.iter().sum();

        let mut image = vec![0u8; BLOCK_SIZE * (1 + num_inodes + num_blocks)];
        image[0..4].copy_from_slice(&(files.len() as u32).to_le_bytes());
        image[4..8].copy_from_slice(&(num_inodes as u32).to_le_bytes());
        image[8..12].copy_from_slice(&(num_blocks as u32).to_le_bytes());

        let mut inode = 0u32;
        let mut next_block = 0u32;
        for (i, file) in files.iter().enumerate() {
            let base = DENTRY_OFFSET + i * DENTRY_SIZE;
            let len = file.name.len().min(MAX_FNAME_LEN);
            image[base..base + len].copy_from_slice(&file.name[..len]);
            image[base + 32..base + 36].copy_from_slice(&file.ftype.to_le_bytes());
            if file.ftype != 2 {
                continue;
            }
            image[base + 36..base + 40].copy_from_slice(&inode.to_le_bytes());

            let inode_base = BLOCK_SIZE * (1 + inode as usize);
            image[inode_base..inode_base + 4]
                .copy_from_slice(&(file.content.len() as u32).to_le_bytes());
            let nblocks = file.content.len().div_ceil(BLOCK_SIZE).max(1);
            for b in 0..nblocks {
                let slot = inode_base + 4 + b * 4;
                image[slot..slot + 4].copy_from_slice(&next_block.to_le_bytes());
                let data_base = BLOCK_SIZE * (1 + num_inodes + next_block as usize);
                let lo = b * BLOCK_SIZE;
                let hi = file.content.len().min(lo + BLOCK_SIZE);
                image[data_base..data_base + (hi - lo)].copy_from_slice(&file.content[lo..hi]);
                next_block += 1;
            }
            inode += 1;
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use std::vec;
    use std::vec::Vec;

    use super::testfs::FileSpec;
    use super::*;

    fn two_file_image() -> Vec<u8> {
        testfs::build(&[
            FileSpec {
                name: b".",
                ftype: 1,
                content: b"",
            },
            FileSpec {
                name: b"frame0.txt",
                ftype: 2,
                content: b"ceci n'est pas une frame\n",
            },
            FileSpec {
                name: b"verylargetextwithverylongname.tx",
                ftype: 2,
                content: &[0xAB; 9000],
            },
            FileSpec {
                name: b"rtc",
                ftype: 0,
                content: b"",
            },
        ])
    }

    #[test]
    fn lookup_by_name_finds_each_entry() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let dentry = fs.read_dentry_by_name(b"frame0.txt").unwrap();
        assert_eq!(dentry.ftype, FileType::Regular);
        assert_eq!(dentry.name_bytes(), b"frame0.txt");
        assert_eq!(fs.read_dentry_by_name(b"rtc").unwrap().ftype, FileType::Rtc);
        assert!(fs.read_dentry_by_name(b"absent").is_err());
    }

    #[test]
    fn thirty_two_byte_names_match_without_a_terminator() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let full = b"verylargetextwithverylongname.tx";
        assert_eq!(full.len(), 32);
        let dentry = fs.read_dentry_by_name(full).unwrap();
        assert_eq!(dentry.name_bytes().len(), 32);
        // A longer query is compared on its first 32 bytes.
        assert!(fs
            .read_dentry_by_name(b"verylargetextwithverylongname.txt")
            .is_ok());
        // A truncated query is a different 32-byte record.
        assert!(fs
            .read_dentry_by_name(b"verylargetextwithverylongname.t")
            .is_err());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        assert!(fs.read_dentry_by_name(b"Frame0.txt").is_err());
    }

    #[test]
    fn read_data_returns_zero_at_end_of_file() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let dentry = fs.read_dentry_by_name(b"frame0.txt").unwrap();
        let len = fs.inode_len(dentry.inode).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(fs.read_data(dentry.inode, len, &mut buf), Ok(0));
        assert_eq!(fs.read_data(dentry.inode, len + 100, &mut buf), Ok(0));
    }

    #[test]
    fn read_data_never_passes_the_length() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let dentry = fs.read_dentry_by_name(b"frame0.txt").unwrap();
        let mut buf = [0u8; 1024];
        let n = fs.read_data(dentry.inode, 0, &mut buf).unwrap();
        assert_eq!(n as u32, fs.inode_len(dentry.inode).unwrap());
        assert_eq!(&buf[..n], b"ceci n'est pas une frame\n");
    }

    #[test]
    fn chunked_reads_reconcile_with_one_shot() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let dentry = fs
            .read_dentry_by_name(b"verylargetextwithverylongname.tx")
            .unwrap();
        let len = fs.inode_len(dentry.inode).unwrap() as usize;
        assert_eq!(len, 9000);

        let mut whole = vec![0u8; len];
        assert_eq!(fs.read_data(dentry.inode, 0, &mut whole), Ok(len));

        let mut chunked = Vec::new();
        let mut offset = 0u32;
        loop {
            let mut chunk = [0u8; 977];
            let n = fs.read_data(dentry.inode, offset, &mut chunk).unwrap();
            if n == 0 {
                break;
            }
            chunked.extend_from_slice(&chunk[..n]);
            offset += n as u32;
        }
        assert_eq!(chunked, whole);
    }

    #[test]
    fn reads_cross_block_boundaries() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        let dentry = fs
            .read_dentry_by_name(b"verylargetextwithverylongname.tx")
            .unwrap();
        let mut buf = [0u8; 64];
        // Straddle the first block edge.
        let n = fs
            .read_data(dentry.inode, (BLOCK_SIZE - 32) as u32, &mut buf)
            .unwrap();
        assert_eq!(n, 64);
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn truncated_images_are_rejected() {
        let data = two_file_image();
        assert!(FsImage::parse(&data[..BLOCK_SIZE - 1]).is_err());
        assert!(FsImage::parse(&data[..data.len() - 1]).is_err());
        assert!(FsImage::parse(&data[..data.len()]).is_ok());
    }

    #[test]
    fn dentry_index_walks_in_order() {
        let data = two_file_image();
        let fs = FsImage::parse(&data).unwrap();
        assert_eq!(fs.num_dentries(), 4);
        assert_eq!(fs.read_dentry_by_index(0).unwrap().name_bytes(), b".");
        assert_eq!(
            fs.read_dentry_by_index(1).unwrap().name_bytes(),
            b"frame0.txt"
        );
        assert!(fs.read_dentry_by_index(4).is_err());
    }
}
