//! XDR data types for the NFS version 4.0 protocol (RFC 7530), scoped to the
//! COMPOUND procedure and the subset of operations this server executes.
//!
//! Follows the same `Serialize`/`Deserialize` convention as `xdr::nfs3`:
//! fixed-shape structs via `SerializeStruct!`/`DeserializeStruct!`, and the
//! COMPOUND operation union (`nfs_argop4`/`nfs_resop4`) hand-written the same
//! way `xdr::rpc`'s `rpc_body`/`accept_body` tagged unions are, since their
//! discriminant (the opcode) selects an arbitrarily-shaped payload per arm
//! rather than a uniform one.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// The RPC program number shared with NFSv2/v3 - NFSv4 is just another
/// version of program 100003.
pub const PROGRAM: u32 = 100003;
pub const VERSION: u32 = 4;

/// Status codes returned by NFSv4 operations (RFC 7530 section 13.1),
/// restricted to the subset this server's operation set can produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat4 {
    NFS4_OK = 0,
    NFS4ERR_PERM = 1,
    NFS4ERR_NOENT = 2,
    NFS4ERR_IO = 5,
    NFS4ERR_ACCES = 13,
    NFS4ERR_EXIST = 17,
    NFS4ERR_NOTDIR = 20,
    NFS4ERR_ISDIR = 21,
    NFS4ERR_INVAL = 22,
    NFS4ERR_NOSPC = 28,
    NFS4ERR_ROFS = 30,
    NFS4ERR_NAMETOOLONG = 63,
    NFS4ERR_NOTEMPTY = 66,
    NFS4ERR_DQUOT = 69,
    NFS4ERR_STALE = 70,
    NFS4ERR_BADHANDLE = 10001,
    NFS4ERR_BAD_COOKIE = 10003,
    NFS4ERR_NOTSUPP = 10004,
    NFS4ERR_TOOSMALL = 10005,
    NFS4ERR_SERVERFAULT = 10006,
    NFS4ERR_BADTYPE = 10007,
    NFS4ERR_DELAY = 10008,
    NFS4ERR_SAME = 10009,
    NFS4ERR_DENIED = 10010,
    NFS4ERR_EXPIRED = 10011,
    NFS4ERR_LOCKED = 10012,
    NFS4ERR_GRACE = 10013,
    NFS4ERR_FHEXPIRED = 10014,
    NFS4ERR_NOFILEHANDLE = 10020,
    NFS4ERR_MOVED = 10019,
    NFS4ERR_OP_ILLEGAL = 10044,
    NFS4ERR_BAD_SEQID = 10026,
    NFS4ERR_BAD_STATEID = 10025,
}
SerializeEnum!(nfsstat4);
DeserializeEnum!(nfsstat4);

impl Default for nfsstat4 {
    fn default() -> Self {
        nfsstat4::NFS4_OK
    }
}

/// NFSv3 and NFSv4 status codes share the same numeric space for every
/// error both protocols define (RFC 7530 section 13.1 reuses RFC 1813's
/// assignments); this server executes v4 operations against the same VFS
/// layer as v3, so translating an `nfsstat3` the VFS returns is just a
/// narrowing match rather than a separate error domain.
impl From<nfs3::nfsstat3> for nfsstat4 {
    fn from(s: nfs3::nfsstat3) -> Self {
        use nfs3::nfsstat3 as v3;
        match s {
            v3::NFS3_OK => nfsstat4::NFS4_OK,
            v3::NFS3ERR_PERM => nfsstat4::NFS4ERR_PERM,
            v3::NFS3ERR_NOENT => nfsstat4::NFS4ERR_NOENT,
            v3::NFS3ERR_IO | v3::NFS3ERR_NXIO => nfsstat4::NFS4ERR_IO,
            v3::NFS3ERR_ACCES => nfsstat4::NFS4ERR_ACCES,
            v3::NFS3ERR_EXIST => nfsstat4::NFS4ERR_EXIST,
            v3::NFS3ERR_NOTDIR => nfsstat4::NFS4ERR_NOTDIR,
            v3::NFS3ERR_ISDIR => nfsstat4::NFS4ERR_ISDIR,
            v3::NFS3ERR_INVAL | v3::NFS3ERR_XDEV | v3::NFS3ERR_NODEV | v3::NFS3ERR_FBIG => {
                nfsstat4::NFS4ERR_INVAL
            }
            v3::NFS3ERR_NOSPC => nfsstat4::NFS4ERR_NOSPC,
            v3::NFS3ERR_ROFS => nfsstat4::NFS4ERR_ROFS,
            v3::NFS3ERR_MLINK => nfsstat4::NFS4ERR_INVAL,
            v3::NFS3ERR_NAMETOOLONG => nfsstat4::NFS4ERR_NAMETOOLONG,
            v3::NFS3ERR_NOTEMPTY => nfsstat4::NFS4ERR_NOTEMPTY,
            v3::NFS3ERR_DQUOT => nfsstat4::NFS4ERR_DQUOT,
            v3::NFS3ERR_STALE | v3::NFS3ERR_REMOTE => nfsstat4::NFS4ERR_STALE,
            v3::NFS3ERR_BADHANDLE => nfsstat4::NFS4ERR_BADHANDLE,
            v3::NFS3ERR_NOT_SYNC => nfsstat4::NFS4ERR_INVAL,
            v3::NFS3ERR_BAD_COOKIE => nfsstat4::NFS4ERR_BAD_COOKIE,
            v3::NFS3ERR_NOTSUPP => nfsstat4::NFS4ERR_NOTSUPP,
            v3::NFS3ERR_TOOSMALL => nfsstat4::NFS4ERR_TOOSMALL,
            v3::NFS3ERR_SERVERFAULT => nfsstat4::NFS4ERR_SERVERFAULT,
            v3::NFS3ERR_BADTYPE => nfsstat4::NFS4ERR_BADTYPE,
            v3::NFS3ERR_JUKEBOX => nfsstat4::NFS4ERR_DELAY,
        }
    }
}

/// Opaque filehandle, up to 128 bytes per RFC 7530 section 2.3. Unlike
/// `nfs3::nfs_fh3` (which always wraps the VFS's own `fh_to_id`/`id_to_fh`
/// encoding), this type is a plain byte-vector alias so the COMPOUND engine
/// can interoperate with that same encoding without introducing a second
/// handle format.
pub type fh4 = Vec<u8>;

/// A present/absent time value; this server reports `seconds`/`nseconds`
/// verbatim from the VFS layer's `nfs3::nfstime3` and never synthesizes
/// leap-second corrections (`NFS4ERR_INVAL` is not reachable through this
/// path in practice).
#[derive(Copy, Clone, Debug, Default)]
pub struct nfstime4 {
    pub seconds: i64,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime4, seconds, nseconds);
SerializeStruct!(nfstime4, seconds, nseconds);

impl From<nfs3::nfstime3> for nfstime4 {
    fn from(t: nfs3::nfstime3) -> Self {
        nfstime4 { seconds: t.seconds as i64, nseconds: t.nseconds }
    }
}

/// Stateid: a sequence number plus a 12-byte opaque server-chosen value.
/// Produced by OPEN/LOCK and consumed by subsequent ops over the same state;
/// this server derives `other` from the open/lock id the relevant tracker
/// assigned, so a stateid round-trips to exactly one entry in that tracker.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct stateid4 {
    pub seqid: u32,
    pub other: [u8; 12],
}
DeserializeStruct!(stateid4, seqid, other);
SerializeStruct!(stateid4, seqid, other);

impl stateid4 {
    pub fn from_id(seqid: u32, id: u32) -> Self {
        let mut other = [0_u8; 12];
        other[..4].copy_from_slice(&id.to_be_bytes());
        stateid4 { seqid, other }
    }

    pub fn id(&self) -> u32 {
        u32::from_be_bytes(self.other[..4].try_into().unwrap())
    }
}

/// Minimal attribute carrier: this server only ever populates type, size,
/// and fileid (the subset every op that returns attributes needs), encoded
/// as fixed fields rather than the full general bitmap4-addressed attribute
/// set RFC 7530 defines - a faithful general attribute encoder is out of
/// scope at this core's depth.
#[derive(Copy, Clone, Debug, Default)]
pub struct fattr4 {
    pub file_type: nfs3::ftype3,
    pub size: u64,
    pub fileid: u64,
}
DeserializeStruct!(fattr4, file_type, size, fileid);
SerializeStruct!(fattr4, file_type, size, fileid);

impl From<nfs3::fattr3> for fattr4 {
    fn from(a: nfs3::fattr3) -> Self {
        fattr4 { file_type: a.ftype, size: a.size, fileid: a.fileid }
    }
}

// ---- Per-operation argument/result structs ----
// Structs with no fields carry no wire payload beyond the opcode itself
// (SerializeStruct!/DeserializeStruct! with an empty field list is still a
// well-formed, zero-byte encoding).

#[derive(Clone, Debug, Default)]
pub struct PUTFH4args {
    pub object: fh4,
}
DeserializeStruct!(PUTFH4args, object);
SerializeStruct!(PUTFH4args, object);

#[derive(Clone, Debug, Default)]
pub struct GETFH4resok {
    pub object: fh4,
}
DeserializeStruct!(GETFH4resok, object);
SerializeStruct!(GETFH4resok, object);

#[derive(Clone, Debug, Default)]
pub struct LOOKUP4args {
    pub objname: nfs3::nfsstring,
}
DeserializeStruct!(LOOKUP4args, objname);
SerializeStruct!(LOOKUP4args, objname);

#[derive(Clone, Debug, Default)]
pub struct GETATTR4args {
    pub attr_request: Vec<u32>,
}
DeserializeStruct!(GETATTR4args, attr_request);
SerializeStruct!(GETATTR4args, attr_request);

#[derive(Clone, Debug, Default)]
pub struct GETATTR4resok {
    pub obj_attributes: fattr4,
}
DeserializeStruct!(GETATTR4resok, obj_attributes);
SerializeStruct!(GETATTR4resok, obj_attributes);

#[derive(Clone, Debug, Default)]
pub struct ACCESS4args {
    pub access: u32,
}
DeserializeStruct!(ACCESS4args, access);
SerializeStruct!(ACCESS4args, access);

#[derive(Clone, Debug, Default)]
pub struct ACCESS4resok {
    pub supported: u32,
    pub access: u32,
}
DeserializeStruct!(ACCESS4resok, supported, access);
SerializeStruct!(ACCESS4resok, supported, access);

#[derive(Clone, Debug, Default)]
pub struct READ4args {
    pub stateid: stateid4,
    pub offset: u64,
    pub count: u32,
}
DeserializeStruct!(READ4args, stateid, offset, count);
SerializeStruct!(READ4args, stateid, offset, count);

#[derive(Clone, Debug, Default)]
pub struct READ4resok {
    pub eof: bool,
    pub data: Vec<u8>,
}
DeserializeStruct!(READ4resok, eof, data);
SerializeStruct!(READ4resok, eof, data);

#[derive(Clone, Debug, Default)]
pub struct WRITE4args {
    pub stateid: stateid4,
    pub offset: u64,
    pub stable: u32,
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE4args, stateid, offset, stable, data);
SerializeStruct!(WRITE4args, stateid, offset, stable, data);

#[derive(Clone, Debug, Default)]
pub struct WRITE4resok {
    pub count: u32,
    pub committed: u32,
    pub writeverf: u64,
}
DeserializeStruct!(WRITE4resok, count, committed, writeverf);
SerializeStruct!(WRITE4resok, count, committed, writeverf);

#[derive(Clone, Debug, Default)]
pub struct CREATE4args {
    pub objtype: u32,
    pub objname: nfs3::nfsstring,
}
DeserializeStruct!(CREATE4args, objtype, objname);
SerializeStruct!(CREATE4args, objtype, objname);

#[derive(Clone, Debug, Default)]
pub struct REMOVE4args {
    pub target: nfs3::nfsstring,
}
DeserializeStruct!(REMOVE4args, target);
SerializeStruct!(REMOVE4args, target);

#[derive(Clone, Debug, Default)]
pub struct RENAME4args {
    pub oldname: nfs3::nfsstring,
    pub newname: nfs3::nfsstring,
}
DeserializeStruct!(RENAME4args, oldname, newname);
SerializeStruct!(RENAME4args, oldname, newname);

#[derive(Clone, Debug, Default)]
pub struct LINK4args {
    pub newname: nfs3::nfsstring,
}
DeserializeStruct!(LINK4args, newname);
SerializeStruct!(LINK4args, newname);

#[derive(Clone, Debug, Default)]
pub struct OPEN4args {
    pub seqid: u32,
    pub share_access: u32,
    pub share_deny: u32,
    pub claim_name: nfs3::nfsstring,
}
DeserializeStruct!(OPEN4args, seqid, share_access, share_deny, claim_name);
SerializeStruct!(OPEN4args, seqid, share_access, share_deny, claim_name);

#[derive(Clone, Debug, Default)]
pub struct OPEN4resok {
    pub stateid: stateid4,
}
DeserializeStruct!(OPEN4resok, stateid);
SerializeStruct!(OPEN4resok, stateid);

#[derive(Clone, Debug, Default)]
pub struct CLOSE4args {
    pub seqid: u32,
    pub open_stateid: stateid4,
}
DeserializeStruct!(CLOSE4args, seqid, open_stateid);
SerializeStruct!(CLOSE4args, seqid, open_stateid);

#[derive(Clone, Debug, Default)]
pub struct CLOSE4resok {
    pub open_stateid: stateid4,
}
DeserializeStruct!(CLOSE4resok, open_stateid);
SerializeStruct!(CLOSE4resok, open_stateid);

#[derive(Clone, Debug, Default)]
pub struct LOCK4args {
    pub locktype: u32,
    pub offset: u64,
    pub length: u64,
    pub owner: u64,
}
DeserializeStruct!(LOCK4args, locktype, offset, length, owner);
SerializeStruct!(LOCK4args, locktype, offset, length, owner);

#[derive(Clone, Debug, Default)]
pub struct LOCK4resok {
    pub lock_stateid: stateid4,
}
DeserializeStruct!(LOCK4resok, lock_stateid);
SerializeStruct!(LOCK4resok, lock_stateid);

#[derive(Clone, Debug, Default)]
pub struct LOCKT4args {
    pub locktype: u32,
    pub offset: u64,
    pub length: u64,
    pub owner: u64,
}
DeserializeStruct!(LOCKT4args, locktype, offset, length, owner);
SerializeStruct!(LOCKT4args, locktype, offset, length, owner);

#[derive(Clone, Debug, Default)]
pub struct LOCKU4args {
    pub offset: u64,
    pub length: u64,
    pub lock_stateid: stateid4,
}
DeserializeStruct!(LOCKU4args, offset, length, lock_stateid);
SerializeStruct!(LOCKU4args, offset, length, lock_stateid);

#[derive(Clone, Debug, Default)]
pub struct LOCKU4resok {
    pub lock_stateid: stateid4,
}
DeserializeStruct!(LOCKU4resok, lock_stateid);
SerializeStruct!(LOCKU4resok, lock_stateid);

#[derive(Clone, Debug, Default)]
pub struct READDIR4args {
    pub cookie: u64,
    pub cookieverf: u64,
    pub dircount: u32,
    pub maxcount: u32,
}
DeserializeStruct!(READDIR4args, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIR4args, cookie, cookieverf, dircount, maxcount);

#[derive(Clone, Debug, Default)]
pub struct entry4 {
    pub cookie: u64,
    pub name: nfs3::nfsstring,
    pub attrs: fattr4,
}
DeserializeStruct!(entry4, cookie, name, attrs);
SerializeStruct!(entry4, cookie, name, attrs);

#[derive(Clone, Debug, Default)]
pub struct READDIR4resok {
    pub cookieverf: u64,
    pub entries: Vec<entry4>,
    pub eof: bool,
}

impl Serialize for Vec<entry4> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for e in self {
            true.serialize(dest)?;
            e.serialize(dest)?;
        }
        false.serialize(dest)
    }
}
impl Deserialize for Vec<entry4> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.clear();
        while deserialize::<bool, R>(src)? {
            self.push(deserialize(src)?);
        }
        Ok(())
    }
}
DeserializeStruct!(READDIR4resok, cookieverf, entries, eof);
SerializeStruct!(READDIR4resok, cookieverf, entries, eof);

#[derive(Clone, Debug, Default)]
pub struct COMMIT4args {
    pub offset: u64,
    pub count: u32,
}
DeserializeStruct!(COMMIT4args, offset, count);
SerializeStruct!(COMMIT4args, offset, count);

#[derive(Clone, Debug, Default)]
pub struct COMMIT4resok {
    pub writeverf: u64,
}
DeserializeStruct!(COMMIT4resok, writeverf);
SerializeStruct!(COMMIT4resok, writeverf);

#[derive(Clone, Debug, Default)]
pub struct SEQUENCE4args {
    pub sessionid: [u8; 16],
    pub sequenceid: u32,
    pub slotid: u32,
}
DeserializeStruct!(SEQUENCE4args, sessionid, sequenceid, slotid);
SerializeStruct!(SEQUENCE4args, sessionid, sequenceid, slotid);

#[derive(Clone, Debug, Default)]
pub struct SEQUENCE4resok {
    pub sessionid: [u8; 16],
    pub sequenceid: u32,
    pub slotid: u32,
}
DeserializeStruct!(SEQUENCE4resok, sessionid, sequenceid, slotid);
SerializeStruct!(SEQUENCE4resok, sessionid, sequenceid, slotid);

/// One element of a COMPOUND request's argument array (RFC 7530 section
/// 17.2), discriminated by opcode. `Unimplemented` carries the raw opcode
/// for any operation this server doesn't execute (e.g. DELEGRETURN,
/// SETCLIENTID) so the COMPOUND loop can still reply NFS4ERR_OP_ILLEGAL /
/// NOTSUPP without failing to decode the rest of the request.
#[derive(Clone, Debug)]
pub enum nfs_argop4 {
    PUTFH(PUTFH4args),
    PUTROOTFH,
    GETFH,
    SAVEFH,
    RESTOREFH,
    LOOKUP(LOOKUP4args),
    GETATTR(GETATTR4args),
    ACCESS(ACCESS4args),
    READ(READ4args),
    WRITE(WRITE4args),
    CREATE(CREATE4args),
    REMOVE(REMOVE4args),
    OPEN(OPEN4args),
    CLOSE(CLOSE4args),
    LOCK(LOCK4args),
    LOCKT(LOCKT4args),
    LOCKU(LOCKU4args),
    READDIR(READDIR4args),
    COMMIT(COMMIT4args),
    RENAME(RENAME4args),
    LINK(LINK4args),
    SEQUENCE(SEQUENCE4args),
    Unimplemented(u32),
}

/// Opcode numbers as assigned in RFC 7530 section 17.2.2.
mod opcode {
    pub const PUTFH: u32 = 22;
    pub const PUTROOTFH: u32 = 24;
    pub const GETFH: u32 = 10;
    pub const SAVEFH: u32 = 32;
    pub const RESTOREFH: u32 = 31;
    pub const LOOKUP: u32 = 15;
    pub const GETATTR: u32 = 9;
    pub const ACCESS: u32 = 3;
    pub const READ: u32 = 25;
    pub const WRITE: u32 = 38;
    pub const CREATE: u32 = 6;
    pub const REMOVE: u32 = 28;
    pub const OPEN: u32 = 18;
    pub const CLOSE: u32 = 4;
    pub const LOCK: u32 = 12;
    pub const LOCKT: u32 = 13;
    pub const LOCKU: u32 = 14;
    pub const READDIR: u32 = 26;
    pub const COMMIT: u32 = 5;
    pub const RENAME: u32 = 29;
    pub const LINK: u32 = 11;
    pub const SEQUENCE: u32 = 53;
}

impl Default for nfs_argop4 {
    fn default() -> Self {
        nfs_argop4::Unimplemented(0)
    }
}

impl Serialize for nfs_argop4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            nfs_argop4::PUTFH(a) => {
                opcode::PUTFH.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::PUTROOTFH => opcode::PUTROOTFH.serialize(dest),
            nfs_argop4::GETFH => opcode::GETFH.serialize(dest),
            nfs_argop4::SAVEFH => opcode::SAVEFH.serialize(dest),
            nfs_argop4::RESTOREFH => opcode::RESTOREFH.serialize(dest),
            nfs_argop4::LOOKUP(a) => {
                opcode::LOOKUP.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::GETATTR(a) => {
                opcode::GETATTR.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::ACCESS(a) => {
                opcode::ACCESS.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::READ(a) => {
                opcode::READ.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::WRITE(a) => {
                opcode::WRITE.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::CREATE(a) => {
                opcode::CREATE.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::REMOVE(a) => {
                opcode::REMOVE.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::OPEN(a) => {
                opcode::OPEN.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::CLOSE(a) => {
                opcode::CLOSE.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::LOCK(a) => {
                opcode::LOCK.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::LOCKT(a) => {
                opcode::LOCKT.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::LOCKU(a) => {
                opcode::LOCKU.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::READDIR(a) => {
                opcode::READDIR.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::COMMIT(a) => {
                opcode::COMMIT.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::RENAME(a) => {
                opcode::RENAME.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::LINK(a) => {
                opcode::LINK.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::SEQUENCE(a) => {
                opcode::SEQUENCE.serialize(dest)?;
                a.serialize(dest)
            }
            nfs_argop4::Unimplemented(op) => op.serialize(dest),
        }
    }
}

impl Deserialize for nfs_argop4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let op: u32 = deserialize(src)?;
        *self = match op {
            v if v == opcode::PUTFH => nfs_argop4::PUTFH(deserialize(src)?),
            v if v == opcode::PUTROOTFH => nfs_argop4::PUTROOTFH,
            v if v == opcode::GETFH => nfs_argop4::GETFH,
            v if v == opcode::SAVEFH => nfs_argop4::SAVEFH,
            v if v == opcode::RESTOREFH => nfs_argop4::RESTOREFH,
            v if v == opcode::LOOKUP => nfs_argop4::LOOKUP(deserialize(src)?),
            v if v == opcode::GETATTR => nfs_argop4::GETATTR(deserialize(src)?),
            v if v == opcode::ACCESS => nfs_argop4::ACCESS(deserialize(src)?),
            v if v == opcode::READ => nfs_argop4::READ(deserialize(src)?),
            v if v == opcode::WRITE => nfs_argop4::WRITE(deserialize(src)?),
            v if v == opcode::CREATE => nfs_argop4::CREATE(deserialize(src)?),
            v if v == opcode::REMOVE => nfs_argop4::REMOVE(deserialize(src)?),
            v if v == opcode::OPEN => nfs_argop4::OPEN(deserialize(src)?),
            v if v == opcode::CLOSE => nfs_argop4::CLOSE(deserialize(src)?),
            v if v == opcode::LOCK => nfs_argop4::LOCK(deserialize(src)?),
            v if v == opcode::LOCKT => nfs_argop4::LOCKT(deserialize(src)?),
            v if v == opcode::LOCKU => nfs_argop4::LOCKU(deserialize(src)?),
            v if v == opcode::READDIR => nfs_argop4::READDIR(deserialize(src)?),
            v if v == opcode::COMMIT => nfs_argop4::COMMIT(deserialize(src)?),
            v if v == opcode::RENAME => nfs_argop4::RENAME(deserialize(src)?),
            v if v == opcode::LINK => nfs_argop4::LINK(deserialize(src)?),
            v if v == opcode::SEQUENCE => nfs_argop4::SEQUENCE(deserialize(src)?),
            other => nfs_argop4::Unimplemented(other),
        };
        Ok(())
    }
}

/// Result union mirroring `nfs_argop4`: every arm carries the op's status
/// plus its success payload. Unlike NFSv3's per-procedure handlers (which
/// hand-serialize status-then-payload directly to the output stream), these
/// results are buffered into `resarray` first since COMPOUND's overall
/// status and result count aren't known until the whole op sequence runs.
#[derive(Clone, Debug)]
pub enum nfs_resop4 {
    PUTFH(nfsstat4),
    PUTROOTFH(nfsstat4),
    GETFH(nfsstat4, Option<GETFH4resok>),
    SAVEFH(nfsstat4),
    RESTOREFH(nfsstat4),
    LOOKUP(nfsstat4),
    GETATTR(nfsstat4, Option<GETATTR4resok>),
    ACCESS(nfsstat4, Option<ACCESS4resok>),
    READ(nfsstat4, Option<READ4resok>),
    WRITE(nfsstat4, Option<WRITE4resok>),
    CREATE(nfsstat4),
    REMOVE(nfsstat4),
    OPEN(nfsstat4, Option<OPEN4resok>),
    CLOSE(nfsstat4, Option<CLOSE4resok>),
    LOCK(nfsstat4, Option<LOCK4resok>),
    LOCKT(nfsstat4),
    LOCKU(nfsstat4, Option<LOCKU4resok>),
    READDIR(nfsstat4, Option<READDIR4resok>),
    COMMIT(nfsstat4, Option<COMMIT4resok>),
    RENAME(nfsstat4),
    LINK(nfsstat4),
    SEQUENCE(nfsstat4, Option<SEQUENCE4resok>),
    Unimplemented(u32),
}

impl nfs_resop4 {
    pub fn status(&self) -> nfsstat4 {
        match self {
            nfs_resop4::PUTFH(s)
            | nfs_resop4::PUTROOTFH(s)
            | nfs_resop4::GETFH(s, _)
            | nfs_resop4::SAVEFH(s)
            | nfs_resop4::RESTOREFH(s)
            | nfs_resop4::LOOKUP(s)
            | nfs_resop4::GETATTR(s, _)
            | nfs_resop4::ACCESS(s, _)
            | nfs_resop4::READ(s, _)
            | nfs_resop4::WRITE(s, _)
            | nfs_resop4::CREATE(s)
            | nfs_resop4::REMOVE(s)
            | nfs_resop4::OPEN(s, _)
            | nfs_resop4::CLOSE(s, _)
            | nfs_resop4::LOCK(s, _)
            | nfs_resop4::LOCKT(s)
            | nfs_resop4::LOCKU(s, _)
            | nfs_resop4::READDIR(s, _)
            | nfs_resop4::COMMIT(s, _)
            | nfs_resop4::RENAME(s)
            | nfs_resop4::LINK(s)
            | nfs_resop4::SEQUENCE(s, _) => *s,
            nfs_resop4::Unimplemented(_) => nfsstat4::NFS4ERR_OP_ILLEGAL,
        }
    }
}

impl Serialize for nfs_resop4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        macro_rules! write_op {
            ($op:expr, $status:expr) => {{
                $op.serialize(dest)?;
                $status.serialize(dest)
            }};
        }
        match self {
            nfs_resop4::PUTFH(s) => write_op!(opcode::PUTFH, s),
            nfs_resop4::PUTROOTFH(s) => write_op!(opcode::PUTROOTFH, s),
            nfs_resop4::GETFH(s, res) => {
                opcode::GETFH.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::SAVEFH(s) => write_op!(opcode::SAVEFH, s),
            nfs_resop4::RESTOREFH(s) => write_op!(opcode::RESTOREFH, s),
            nfs_resop4::LOOKUP(s) => write_op!(opcode::LOOKUP, s),
            nfs_resop4::GETATTR(s, res) => {
                opcode::GETATTR.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::ACCESS(s, res) => {
                opcode::ACCESS.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::READ(s, res) => {
                opcode::READ.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::WRITE(s, res) => {
                opcode::WRITE.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::CREATE(s) => write_op!(opcode::CREATE, s),
            nfs_resop4::REMOVE(s) => write_op!(opcode::REMOVE, s),
            nfs_resop4::OPEN(s, res) => {
                opcode::OPEN.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::CLOSE(s, res) => {
                opcode::CLOSE.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::LOCK(s, res) => {
                opcode::LOCK.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::LOCKT(s) => write_op!(opcode::LOCKT, s),
            nfs_resop4::LOCKU(s, res) => {
                opcode::LOCKU.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::READDIR(s, res) => {
                opcode::READDIR.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::COMMIT(s, res) => {
                opcode::COMMIT.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::RENAME(s) => write_op!(opcode::RENAME, s),
            nfs_resop4::LINK(s) => write_op!(opcode::LINK, s),
            nfs_resop4::SEQUENCE(s, res) => {
                opcode::SEQUENCE.serialize(dest)?;
                s.serialize(dest)?;
                if let Some(res) = res {
                    res.serialize(dest)?;
                }
                Ok(())
            }
            nfs_resop4::Unimplemented(op) => op.serialize(dest),
        }
    }
}

/// Only used by tests exercising round-trip decode of a server-produced
/// reply; the server itself never deserializes its own result union.
impl Deserialize for nfs_resop4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let op: u32 = deserialize(src)?;
        let status: nfsstat4 = deserialize(src)?;
        *self = match op {
            v if v == opcode::PUTFH => nfs_resop4::PUTFH(status),
            v if v == opcode::PUTROOTFH => nfs_resop4::PUTROOTFH(status),
            v if v == opcode::GETFH => nfs_resop4::GETFH(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::SAVEFH => nfs_resop4::SAVEFH(status),
            v if v == opcode::RESTOREFH => nfs_resop4::RESTOREFH(status),
            v if v == opcode::LOOKUP => nfs_resop4::LOOKUP(status),
            v if v == opcode::GETATTR => nfs_resop4::GETATTR(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::ACCESS => nfs_resop4::ACCESS(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::READ => nfs_resop4::READ(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::WRITE => nfs_resop4::WRITE(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::CREATE => nfs_resop4::CREATE(status),
            v if v == opcode::REMOVE => nfs_resop4::REMOVE(status),
            v if v == opcode::OPEN => nfs_resop4::OPEN(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::CLOSE => nfs_resop4::CLOSE(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::LOCK => nfs_resop4::LOCK(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::LOCKT => nfs_resop4::LOCKT(status),
            v if v == opcode::LOCKU => nfs_resop4::LOCKU(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::READDIR => nfs_resop4::READDIR(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::COMMIT => nfs_resop4::COMMIT(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            v if v == opcode::RENAME => nfs_resop4::RENAME(status),
            v if v == opcode::LINK => nfs_resop4::LINK(status),
            v if v == opcode::SEQUENCE => nfs_resop4::SEQUENCE(
                status,
                (status == nfsstat4::NFS4_OK).then(|| deserialize(src)).transpose()?,
            ),
            other => nfs_resop4::Unimplemented(other),
        };
        Ok(())
    }
}

impl Default for nfs_resop4 {
    fn default() -> Self {
        nfs_resop4::Unimplemented(0)
    }
}

impl Serialize for Vec<nfs_argop4> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        for op in self {
            op.serialize(dest)?;
        }
        Ok(())
    }
}
impl Deserialize for Vec<nfs_argop4> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let count: u32 = deserialize(src)?;
        self.clear();
        for _ in 0..count {
            self.push(deserialize(src)?);
        }
        Ok(())
    }
}

impl Serialize for Vec<nfs_resop4> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        for op in self {
            op.serialize(dest)?;
        }
        Ok(())
    }
}
impl Deserialize for Vec<nfs_resop4> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let count: u32 = deserialize(src)?;
        self.clear();
        for _ in 0..count {
            self.push(deserialize(src)?);
        }
        Ok(())
    }
}

/// Arguments for the COMPOUND procedure (RFC 7530 section 17.2.1).
#[derive(Clone, Debug, Default)]
pub struct COMPOUND4args {
    pub tag: nfs3::nfsstring,
    pub minorversion: u32,
    pub argarray: Vec<nfs_argop4>,
}
DeserializeStruct!(COMPOUND4args, tag, minorversion, argarray);
SerializeStruct!(COMPOUND4args, tag, minorversion, argarray);

/// Result of the COMPOUND procedure.
#[derive(Clone, Debug, Default)]
pub struct COMPOUND4res {
    pub status: nfsstat4,
    pub tag: nfs3::nfsstring,
    pub resarray: Vec<nfs_resop4>,
}
DeserializeStruct!(COMPOUND4res, status, tag, resarray);
SerializeStruct!(COMPOUND4res, status, tag, resarray);
