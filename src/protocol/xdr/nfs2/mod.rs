//! The module defines XDR data types and constants for Network File System (NFS)
//! version 2, as defined in RFC 1094.
//!
//! NFSv2 predates the weak-cache-consistency (`wcc_data`) and 64-bit size/offset
//! conventions introduced in version 3: attributes are 32-bit, replies that modify
//! a directory return only the new object's own attributes (no before/after
//! snapshot of the parent), and several procedures (REMOVE, RENAME, LINK, SYMLINK,
//! RMDIR) return nothing but a status code. File handles are a fixed 32 bytes
//! rather than the variable opaque handle version 3 uses.
//!
//! This implementation reuses the version 3 string and path wire types (`nfsstring`
//! has an identical encoding in both versions) and converts version 2 arguments to
//! their version 3 equivalents so procedure handlers can share the same
//! [`crate::vfs::NFSFileSystem`] trait.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::nfs3;
use super::{
    Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum, SerializeStruct,
};

/// The RPC program number for NFS service (shared across versions 2 and 3).
pub const PROGRAM: u32 = 100003;
/// The version number for the NFS version 2 protocol.
pub const VERSION: u32 = 2;

/// Fixed size in bytes of a version 2 file handle.
pub const NFS2_FHSIZE: usize = 32;
/// Maximum bytes of file data in a single READ/WRITE, per RFC 1094 section 2.3.3.
pub const NFS2_MAXDATA: u32 = 8192;

/// Procedure numbers for the NFS version 2 protocol, per RFC 1094 section 2.2.
///
/// Procedures 3 (ROOT) and 7 (WRITECACHE) are marked obsolete by the RFC and are
/// not dispatched; unrecognized procedure numbers (including these two) fall
/// through to `PROC_UNAVAIL` in the dispatcher.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
pub enum NFSProgram {
    NFSPROC_NULL = 0,
    NFSPROC_GETATTR = 1,
    NFSPROC_SETATTR = 2,
    NFSPROC_ROOT = 3,
    NFSPROC_LOOKUP = 4,
    NFSPROC_READLINK = 5,
    NFSPROC_READ = 6,
    NFSPROC_WRITECACHE = 7,
    NFSPROC_WRITE = 8,
    NFSPROC_CREATE = 9,
    NFSPROC_REMOVE = 10,
    NFSPROC_RENAME = 11,
    NFSPROC_LINK = 12,
    NFSPROC_SYMLINK = 13,
    NFSPROC_MKDIR = 14,
    NFSPROC_RMDIR = 15,
    NFSPROC_READDIR = 16,
    NFSPROC_STATFS = 17,
    INVALID = 18,
}

/// A version 2 file handle: a fixed 32-byte opaque blob, unlike version 3's
/// variable-length handle.
#[derive(Clone)]
pub struct fhandle2(pub [u8; NFS2_FHSIZE]);

impl Default for fhandle2 {
    fn default() -> Self {
        fhandle2([0u8; NFS2_FHSIZE])
    }
}

impl std::fmt::Debug for fhandle2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fhandle2({:?})", &self.0[..])
    }
}

impl Serialize for fhandle2 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(&self.0)
    }
}
impl Deserialize for fhandle2 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(&mut self.0)
    }
}

impl fhandle2 {
    /// Packs a version 3 file handle (the generation+fileid encoding produced by
    /// [`crate::vfs::NFSFileSystem::id_to_fh`]) into the first bytes of a version 2
    /// handle, zero-padding the remainder.
    pub fn from_fh3(fh: &nfs3::nfs_fh3) -> Self {
        let mut data = [0u8; NFS2_FHSIZE];
        let n = fh.data.len().min(NFS2_FHSIZE);
        data[..n].copy_from_slice(&fh.data[..n]);
        fhandle2(data)
    }

    /// Unpacks the leading 16 bytes back into a version 3 handle for use with
    /// [`crate::vfs::NFSFileSystem::fh_to_id`].
    pub fn to_fh3(&self) -> nfs3::nfs_fh3 {
        nfs3::nfs_fh3 { data: self.0[..16].to_vec() }
    }
}

/// Status codes returned by NFS version 2 operations, per RFC 1094 section 2.3.4.
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat2 {
    NFS_OK = 0,
    NFSERR_PERM = 1,
    NFSERR_NOENT = 2,
    NFSERR_IO = 5,
    NFSERR_NXIO = 6,
    NFSERR_ACCES = 13,
    NFSERR_EXIST = 17,
    NFSERR_NODEV = 19,
    NFSERR_NOTDIR = 20,
    NFSERR_ISDIR = 21,
    NFSERR_FBIG = 27,
    NFSERR_NOSPC = 28,
    NFSERR_ROFS = 30,
    NFSERR_NAMETOOLONG = 63,
    NFSERR_NOTEMPTY = 66,
    NFSERR_DQUOT = 69,
    NFSERR_STALE = 70,
    NFSERR_WFLUSH = 99,
}
SerializeEnum!(nfsstat2);
DeserializeEnum!(nfsstat2);

impl From<nfs3::nfsstat3> for nfsstat2 {
    fn from(stat: nfs3::nfsstat3) -> Self {
        use nfs3::nfsstat3::*;
        match stat {
            NFS3_OK => nfsstat2::NFS_OK,
            NFS3ERR_PERM => nfsstat2::NFSERR_PERM,
            NFS3ERR_NOENT => nfsstat2::NFSERR_NOENT,
            NFS3ERR_IO => nfsstat2::NFSERR_IO,
            NFS3ERR_NXIO => nfsstat2::NFSERR_NXIO,
            NFS3ERR_ACCES => nfsstat2::NFSERR_ACCES,
            NFS3ERR_EXIST => nfsstat2::NFSERR_EXIST,
            NFS3ERR_XDEV => nfsstat2::NFSERR_IO,
            NFS3ERR_NODEV => nfsstat2::NFSERR_NODEV,
            NFS3ERR_NOTDIR => nfsstat2::NFSERR_NOTDIR,
            NFS3ERR_ISDIR => nfsstat2::NFSERR_ISDIR,
            NFS3ERR_INVAL => nfsstat2::NFSERR_IO,
            NFS3ERR_FBIG => nfsstat2::NFSERR_FBIG,
            NFS3ERR_NOSPC => nfsstat2::NFSERR_NOSPC,
            NFS3ERR_ROFS => nfsstat2::NFSERR_ROFS,
            NFS3ERR_MLINK => nfsstat2::NFSERR_IO,
            NFS3ERR_NAMETOOLONG => nfsstat2::NFSERR_NAMETOOLONG,
            NFS3ERR_NOTEMPTY => nfsstat2::NFSERR_NOTEMPTY,
            NFS3ERR_DQUOT => nfsstat2::NFSERR_DQUOT,
            NFS3ERR_STALE => nfsstat2::NFSERR_STALE,
            NFS3ERR_REMOTE => nfsstat2::NFSERR_IO,
            NFS3ERR_BADHANDLE => nfsstat2::NFSERR_STALE,
            NFS3ERR_NOT_SYNC => nfsstat2::NFSERR_IO,
            NFS3ERR_BAD_COOKIE => nfsstat2::NFSERR_IO,
            NFS3ERR_NOTSUPP => nfsstat2::NFSERR_IO,
            NFS3ERR_TOOSMALL => nfsstat2::NFSERR_IO,
            NFS3ERR_SERVERFAULT => nfsstat2::NFSERR_IO,
            NFS3ERR_BADTYPE => nfsstat2::NFSERR_IO,
            NFS3ERR_JUKEBOX => nfsstat2::NFSERR_IO,
        }
    }
}

/// File type enumeration as defined in RFC 1094 section 2.3.3.
#[derive(Copy, Clone, Debug, Default, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype2 {
    #[default]
    NFNON = 0,
    NFREG = 1,
    NFDIR = 2,
    NFBLK = 3,
    NFCHR = 4,
    NFLNK = 5,
}
SerializeEnum!(ftype2);
DeserializeEnum!(ftype2);

impl From<nfs3::ftype3> for ftype2 {
    fn from(t: nfs3::ftype3) -> Self {
        match t {
            nfs3::ftype3::NF3REG => ftype2::NFREG,
            nfs3::ftype3::NF3DIR => ftype2::NFDIR,
            nfs3::ftype3::NF3BLK => ftype2::NFBLK,
            nfs3::ftype3::NF3CHR => ftype2::NFCHR,
            nfs3::ftype3::NF3LNK => ftype2::NFLNK,
            nfs3::ftype3::NF3SOCK | nfs3::ftype3::NF3FIFO => ftype2::NFNON,
        }
    }
}

/// A timestamp expressed as seconds and microseconds since the epoch, per
/// RFC 1094 section 2.3.2. Unlike version 3's `nfstime3`, which counts
/// nanoseconds, version 2 counts microseconds.
#[derive(Copy, Clone, Debug, Default)]
pub struct timeval2 {
    pub seconds: u32,
    pub useconds: u32,
}
DeserializeStruct!(timeval2, seconds, useconds);
SerializeStruct!(timeval2, seconds, useconds);

impl From<nfs3::nfstime3> for timeval2 {
    fn from(t: nfs3::nfstime3) -> Self {
        timeval2 { seconds: t.seconds, useconds: t.nseconds / 1000 }
    }
}

impl From<timeval2> for nfs3::nfstime3 {
    fn from(t: timeval2) -> Self {
        nfs3::nfstime3 { seconds: t.seconds, nseconds: t.useconds * 1000 }
    }
}

/// File attributes in NFS version 2, per RFC 1094 section 2.3.5.
///
/// All size-like fields are 32 bits, so values from the underlying file system
/// that do not fit are saturated to `u32::MAX` rather than wrapping.
#[derive(Copy, Clone, Debug, Default)]
pub struct fattr2 {
    pub ftype: ftype2,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub blocksize: u32,
    pub rdev: u32,
    pub blocks: u32,
    pub fsid: u32,
    pub fileid: u32,
    pub atime: timeval2,
    pub mtime: timeval2,
    pub ctime: timeval2,
}
DeserializeStruct!(
    fattr2, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);
SerializeStruct!(
    fattr2, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);

/// Block size reported in `fattr2.blocksize`, matching the POSIX `st_blksize`
/// most loopback file systems in this size range report.
const NFS2_BLOCKSIZE: u32 = 4096;

impl From<nfs3::fattr3> for fattr2 {
    fn from(a: nfs3::fattr3) -> Self {
        fattr2 {
            ftype: a.ftype.into(),
            mode: a.mode,
            nlink: a.nlink,
            uid: a.uid,
            gid: a.gid,
            size: a.size.min(u32::MAX as u64) as u32,
            blocksize: NFS2_BLOCKSIZE,
            rdev: a.rdev.specdata1,
            blocks: (a.used / 512).min(u32::MAX as u64) as u32,
            fsid: a.fsid as u32,
            fileid: a.fileid.min(u32::MAX as u64) as u32,
            atime: a.atime.into(),
            mtime: a.mtime.into(),
            ctime: a.ctime.into(),
        }
    }
}

/// A sentinel value meaning "don't change this field" in an `sattr2`, per
/// RFC 1094 section 2.3.6: a size/time field of all-ones.
const SATTR2_DONT_CHANGE: u32 = u32::MAX;

/// Attributes settable via SETATTR/CREATE/MKDIR in NFS version 2, per RFC 1094
/// section 2.3.6. Unlike version 3's tagged-union `sattr3`, an unset field is
/// conventionally represented by `SATTR2_DONT_CHANGE` (`0xFFFFFFFF`).
#[derive(Copy, Clone, Debug, Default)]
pub struct sattr2 {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub atime: timeval2,
    pub mtime: timeval2,
}
DeserializeStruct!(sattr2, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr2, mode, uid, gid, size, atime, mtime);

impl sattr2 {
    /// Translates the `0xFFFFFFFF`-means-unset convention into version 3's
    /// `Void`/`DONT_CHANGE` tagged unions, for use with
    /// [`crate::vfs::NFSFileSystem::setattr`].
    pub fn to_sattr3(self) -> nfs3::sattr3 {
        nfs3::sattr3 {
            mode: if self.mode == SATTR2_DONT_CHANGE {
                nfs3::set_mode3::Void
            } else {
                nfs3::set_mode3::mode(self.mode)
            },
            uid: if self.uid == SATTR2_DONT_CHANGE {
                nfs3::set_uid3::Void
            } else {
                nfs3::set_uid3::uid(self.uid)
            },
            gid: if self.gid == SATTR2_DONT_CHANGE {
                nfs3::set_gid3::Void
            } else {
                nfs3::set_gid3::gid(self.gid)
            },
            size: if self.size == SATTR2_DONT_CHANGE {
                nfs3::set_size3::Void
            } else {
                nfs3::set_size3::size(self.size as u64)
            },
            atime: if self.atime.seconds == SATTR2_DONT_CHANGE {
                nfs3::set_atime::DONT_CHANGE
            } else {
                nfs3::set_atime::SET_TO_CLIENT_TIME(self.atime.into())
            },
            mtime: if self.mtime.seconds == SATTR2_DONT_CHANGE {
                nfs3::set_mtime::DONT_CHANGE
            } else {
                nfs3::set_mtime::SET_TO_CLIENT_TIME(self.mtime.into())
            },
        }
    }
}

/// Filename component, identical wire encoding to version 3's `filename3`.
pub type filename2 = nfs3::filename3;
/// Symbolic link path contents, identical wire encoding to version 3's `nfspath3`.
pub type path2 = nfs3::nfspath3;
/// Directory-read position cookie. Unlike version 3's 64-bit `cookie3`, this is
/// a single opaque 32-bit value with no separate verifier.
pub type nfscookie2 = u32;

/// Arguments shared by LOOKUP, CREATE, REMOVE, RENAME (half of it), MKDIR and
/// RMDIR: a directory handle plus a name within that directory.
#[derive(Clone, Debug, Default)]
pub struct diropargs2 {
    pub dir: fhandle2,
    pub name: filename2,
}
DeserializeStruct!(diropargs2, dir, name);
SerializeStruct!(diropargs2, dir, name);

/// Arguments for SETATTR (procedure 2).
#[derive(Clone, Debug, Default)]
pub struct sattrargs2 {
    pub file: fhandle2,
    pub attributes: sattr2,
}
DeserializeStruct!(sattrargs2, file, attributes);
SerializeStruct!(sattrargs2, file, attributes);

/// Arguments for READ (procedure 6). `totalcount` is unused, carried only for
/// wire compatibility: RFC 1094 section 2.3.3 says "this parameter is unused".
#[derive(Clone, Debug, Default)]
pub struct readargs2 {
    pub file: fhandle2,
    pub offset: u32,
    pub count: u32,
    pub totalcount: u32,
}
DeserializeStruct!(readargs2, file, offset, count, totalcount);
SerializeStruct!(readargs2, file, offset, count, totalcount);

/// Successful response to READ: attributes of the file after the read plus the
/// data itself. Version 2 has no explicit EOF flag; the client infers EOF from
/// getting back fewer bytes than it asked for.
#[derive(Clone, Debug, Default)]
pub struct readres2resok {
    pub attributes: fattr2,
    pub data: Vec<u8>,
}
DeserializeStruct!(readres2resok, attributes, data);
SerializeStruct!(readres2resok, attributes, data);

/// Arguments for WRITE (procedure 8). `beginoffset` and `totalcount` are
/// unused, carried only for wire compatibility per RFC 1094 section 2.3.3.
#[derive(Clone, Debug, Default)]
pub struct writeargs2 {
    pub file: fhandle2,
    pub beginoffset: u32,
    pub offset: u32,
    pub totalcount: u32,
    pub data: Vec<u8>,
}
DeserializeStruct!(writeargs2, file, beginoffset, offset, totalcount, data);
SerializeStruct!(writeargs2, file, beginoffset, offset, totalcount, data);

/// Arguments for CREATE (procedure 9) and MKDIR (procedure 14): both create a
/// new name in a directory with an initial set of attributes.
#[derive(Clone, Debug, Default)]
pub struct createargs2 {
    pub where_: diropargs2,
    pub attributes: sattr2,
}
DeserializeStruct!(createargs2, where_, attributes);
SerializeStruct!(createargs2, where_, attributes);

/// Arguments for RENAME (procedure 11).
#[derive(Clone, Debug, Default)]
pub struct renameargs2 {
    pub from: diropargs2,
    pub to: diropargs2,
}
DeserializeStruct!(renameargs2, from, to);
SerializeStruct!(renameargs2, from, to);

/// Arguments for LINK (procedure 12): the handle of the existing file plus
/// the directory and name for the new link.
#[derive(Clone, Debug, Default)]
pub struct linkargs2 {
    pub from: fhandle2,
    pub to: diropargs2,
}
DeserializeStruct!(linkargs2, from, to);
SerializeStruct!(linkargs2, from, to);

/// Arguments for SYMLINK (procedure 13): directory and name for the new link,
/// the target path it should contain, and its initial attributes.
#[derive(Clone, Debug, Default)]
pub struct symlinkargs2 {
    pub from: diropargs2,
    pub to: path2,
    pub attributes: sattr2,
}
DeserializeStruct!(symlinkargs2, from, to, attributes);
SerializeStruct!(symlinkargs2, from, to, attributes);

/// Arguments for READDIR (procedure 16).
#[derive(Clone, Debug, Default)]
pub struct readdirargs2 {
    pub dir: fhandle2,
    pub cookie: nfscookie2,
    pub count: u32,
}
DeserializeStruct!(readdirargs2, dir, cookie, count);
SerializeStruct!(readdirargs2, dir, cookie, count);

/// Successful response to STATFS (procedure 17), per RFC 1094 section 2.3.7.
#[derive(Clone, Debug, Default)]
pub struct statfsokres2 {
    pub tsize: u32,
    pub bsize: u32,
    pub blocks: u32,
    pub bfree: u32,
    pub bavail: u32,
}
DeserializeStruct!(statfsokres2, tsize, bsize, blocks, bfree, bavail);
SerializeStruct!(statfsokres2, tsize, bsize, blocks, bfree, bavail);
