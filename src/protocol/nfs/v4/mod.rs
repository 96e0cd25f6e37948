//! NFS version 4.0 (RFC 7530) protocol implementation, scoped to the
//! COMPOUND procedure and the subset of operations this server supports.
//!
//! Unlike NFSv3, which assigns one RPC procedure per operation, NFSv4
//! multiplexes everything through a single `COMPOUND` procedure carrying an
//! ordered list of sub-operations that share a `current_fh`/`saved_fh`
//! cursor across the request. This module implements that execution loop
//! and the handlers for each supported opcode; unsupported opcodes reply
//! `NFS4ERR_NOTSUPP` and stop the compound, per the short-circuit-on-error
//! rule every op follows.
//!
//! Locking, OPEN share reservations, and the NFSv4 session table are not
//! reimplemented here: they delegate to `context.lock_manager`,
//! `context.open_state`, and `context.security` respectively, the same
//! shared components NLM and the rest of the server use.

use std::io::{Read, Write};

use num_traits::cast::{FromPrimitive, ToPrimitive};
use tracing::{debug, warn};

use crate::lock_manager::{LockOwner, LockType};
use crate::open_state::{AccessMode, OpenOutcome, SharingMode};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, nfs4, Serialize};

/// Procedure numbers for the NFSv4 RPC program (RFC 7530 section 17.1/17.2).
mod procedure {
    pub const NULL: u32 = 0;
    pub const COMPOUND: u32 = 1;
}

/// Main handler for the NFSv4 protocol
///
/// Dispatches NFSv4 RPC calls to NULL or COMPOUND based on procedure number.
/// Validates protocol version and returns appropriate error for unsupported procedures.
pub async fn handle_nfs4(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs4::VERSION {
        warn!("Invalid NFS Version number {} != {}", call.vers, nfs4::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, nfs4::VERSION).serialize(output)?;
        return Ok(());
    }

    match call.proc {
        procedure::NULL => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        procedure::COMPOUND => {
            let args = deserialize::<nfs4::COMPOUND4args>(input)?;
            debug!("COMPOUND({:?}, tag={:?}, {} ops)", xid, args.tag, args.argarray.len());
            let res = handle_compound(args, context).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            res.serialize(output)?;
        }
        other => {
            warn!("Unimplemented NFSv4 procedure {}", other);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// Per-compound cursor: the file handle operations implicitly act on, and the
/// one slot RESTOREFH/SAVEFH exchange with it. Neither ever holds more than
/// one handle at a time, matching RFC 7530 section 14.2's "current filehandle"
/// and "saved filehandle" model.
#[derive(Default)]
struct CompoundState {
    current_fh: Option<Vec<u8>>,
    saved_fh: Option<Vec<u8>>,
}

impl CompoundState {
    fn require_current(&self) -> Result<&[u8], nfs4::nfsstat4> {
        self.current_fh.as_deref().ok_or(nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE)
    }

    fn current_id(&self, context: &rpc::Context) -> Result<nfs3::fileid3, nfs4::nfsstat4> {
        let fh = self.require_current()?;
        context.vfs.fh_to_id(&nfs3::nfs_fh3 { data: fh.to_vec() }).map_err(nfs4::nfsstat4::from)
    }

    fn saved_id(&self, context: &rpc::Context) -> Result<nfs3::fileid3, nfs4::nfsstat4> {
        let fh = self.saved_fh.as_deref().ok_or(nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE)?;
        context.vfs.fh_to_id(&nfs3::nfs_fh3 { data: fh.to_vec() }).map_err(nfs4::nfsstat4::from)
    }
}

/// Runs one COMPOUND request's operation list to completion or first error.
///
/// Every operation appends exactly one result to `resarray`; the reply's
/// overall status is whichever status the loop stopped on (NFS4_OK if every
/// op succeeded).
async fn handle_compound(args: nfs4::COMPOUND4args, context: &rpc::Context) -> nfs4::COMPOUND4res {
    let mut state = CompoundState::default();
    let mut resarray = Vec::with_capacity(args.argarray.len());
    let mut status = nfs4::nfsstat4::NFS4_OK;

    for op in args.argarray {
        let result = execute_op(op, &mut state, context).await;
        status = result.status();
        resarray.push(result);
        if status != nfs4::nfsstat4::NFS4_OK {
            break;
        }
    }

    nfs4::COMPOUND4res { status, tag: args.tag, resarray }
}

async fn execute_op(
    op: nfs4::nfs_argop4,
    state: &mut CompoundState,
    context: &rpc::Context,
) -> nfs4::nfs_resop4 {
    use nfs4::nfs_argop4 as Op;
    use nfs4::nfs_resop4 as Res;

    match op {
        Op::PUTFH(a) => {
            state.current_fh = Some(a.object);
            Res::PUTFH(nfs4::nfsstat4::NFS4_OK)
        }
        Op::PUTROOTFH => {
            let root = context.vfs.root_dir();
            state.current_fh = Some(context.vfs.id_to_fh(root).data);
            Res::PUTROOTFH(nfs4::nfsstat4::NFS4_OK)
        }
        Op::GETFH => match state.require_current() {
            Ok(fh) => Res::GETFH(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::GETFH4resok { object: fh.to_vec() }),
            ),
            Err(e) => Res::GETFH(e, None),
        },
        Op::SAVEFH => match &state.current_fh {
            Some(fh) => {
                state.saved_fh = Some(fh.clone());
                Res::SAVEFH(nfs4::nfsstat4::NFS4_OK)
            }
            None => Res::SAVEFH(nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE),
        },
        Op::RESTOREFH => match &state.saved_fh {
            Some(fh) => {
                state.current_fh = Some(fh.clone());
                Res::RESTOREFH(nfs4::nfsstat4::NFS4_OK)
            }
            None => Res::RESTOREFH(nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE),
        },
        Op::LOOKUP(a) => match do_lookup(state, context, &a.objname).await {
            Ok(fh) => {
                state.current_fh = Some(fh);
                Res::LOOKUP(nfs4::nfsstat4::NFS4_OK)
            }
            Err(e) => Res::LOOKUP(e),
        },
        Op::GETATTR(_a) => match do_getattr(state, context).await {
            Ok(attr) => Res::GETATTR(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::GETATTR4resok { obj_attributes: attr }),
            ),
            Err(e) => Res::GETATTR(e, None),
        },
        Op::ACCESS(a) => match do_access(state, context, a.access).await {
            Ok(granted) => Res::ACCESS(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::ACCESS4resok { supported: a.access, access: granted }),
            ),
            Err(e) => Res::ACCESS(e, None),
        },
        Op::READ(a) => match do_read(state, context, &a).await {
            Ok((data, eof)) => {
                Res::READ(nfs4::nfsstat4::NFS4_OK, Some(nfs4::READ4resok { eof, data }))
            }
            Err(e) => Res::READ(e, None),
        },
        Op::WRITE(a) => match do_write(state, context, &a).await {
            Ok((count, committed)) => Res::WRITE(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::WRITE4resok { count, committed, writeverf: 0 }),
            ),
            Err(e) => Res::WRITE(e, None),
        },
        Op::CREATE(a) => match do_create(state, context, &a).await {
            Ok(fh) => {
                state.current_fh = Some(fh);
                Res::CREATE(nfs4::nfsstat4::NFS4_OK)
            }
            Err(e) => Res::CREATE(e),
        },
        Op::REMOVE(a) => match do_remove(state, context, &a.target).await {
            Ok(()) => Res::REMOVE(nfs4::nfsstat4::NFS4_OK),
            Err(e) => Res::REMOVE(e),
        },
        Op::OPEN(a) => match do_open(state, context, &a).await {
            Ok(stateid) => {
                Res::OPEN(nfs4::nfsstat4::NFS4_OK, Some(nfs4::OPEN4resok { stateid }))
            }
            Err(e) => Res::OPEN(e, None),
        },
        Op::CLOSE(a) => match do_close(context, &a).await {
            Ok(()) => Res::CLOSE(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::CLOSE4resok { open_stateid: a.open_stateid }),
            ),
            Err(e) => Res::CLOSE(e, None),
        },
        Op::LOCK(a) => match do_lock(state, context, &a) {
            Ok(stateid) => {
                Res::LOCK(nfs4::nfsstat4::NFS4_OK, Some(nfs4::LOCK4resok { lock_stateid: stateid }))
            }
            Err(e) => Res::LOCK(e, None),
        },
        Op::LOCKT(a) => Res::LOCKT(do_lockt(state, context, &a)),
        Op::LOCKU(a) => match do_locku(state, context, &a) {
            Ok(stateid) => {
                Res::LOCKU(nfs4::nfsstat4::NFS4_OK, Some(nfs4::LOCKU4resok { lock_stateid: stateid }))
            }
            Err(e) => Res::LOCKU(e, None),
        },
        Op::READDIR(a) => match do_readdir(state, context, &a).await {
            Ok(resok) => Res::READDIR(nfs4::nfsstat4::NFS4_OK, Some(resok)),
            Err(e) => Res::READDIR(e, None),
        },
        Op::COMMIT(a) => match do_commit(state, context, &a).await {
            Ok(()) => {
                Res::COMMIT(nfs4::nfsstat4::NFS4_OK, Some(nfs4::COMMIT4resok { writeverf: 0 }))
            }
            Err(e) => Res::COMMIT(e, None),
        },
        Op::RENAME(a) => match do_rename(state, context, &a).await {
            Ok(()) => Res::RENAME(nfs4::nfsstat4::NFS4_OK),
            Err(e) => Res::RENAME(e),
        },
        Op::LINK(a) => match do_link(state, context, &a).await {
            Ok(()) => Res::LINK(nfs4::nfsstat4::NFS4_OK),
            Err(e) => Res::LINK(e),
        },
        Op::SEQUENCE(a) => {
            context.security.log_access(
                &context.security_context,
                "sequence",
                &hex_session(&a.sessionid),
                true,
            );
            Res::SEQUENCE(
                nfs4::nfsstat4::NFS4_OK,
                Some(nfs4::SEQUENCE4resok {
                    sessionid: a.sessionid,
                    sequenceid: a.sequenceid,
                    slotid: a.slotid,
                }),
            )
        }
        Op::Unimplemented(code) => {
            warn!("Unsupported NFSv4 operation code {}", code);
            Res::Unimplemented(code)
        }
    }
}

fn hex_session(id: &[u8; 16]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}

async fn do_lookup(
    state: &CompoundState,
    context: &rpc::Context,
    name: &nfs3::nfsstring,
) -> Result<Vec<u8>, nfs4::nfsstat4> {
    let dirid = state.current_id(context)?;
    let filename: nfs3::filename3 = name.clone();
    let id = context.vfs.lookup(dirid, &filename).await.map_err(nfs4::nfsstat4::from)?;
    Ok(context.vfs.id_to_fh(id).data)
}

async fn do_getattr(
    state: &CompoundState,
    context: &rpc::Context,
) -> Result<nfs4::fattr4, nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    let attr = context.vfs.getattr(id).await.map_err(nfs4::nfsstat4::from)?;
    Ok(attr.into())
}

/// Grants the full requested mask on a read-write export and restricts to
/// read/execute bits on a read-only one, mirroring the simplified policy
/// `nfsproc3_access` applies for NFSv3 (a full ACL-backed evaluation would
/// require per-entry owning uid/gid, which the VFS trait does not expose
/// uniformly here either).
async fn do_access(
    state: &CompoundState,
    context: &rpc::Context,
    requested: u32,
) -> Result<u32, nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    context.vfs.getattr(id).await.map_err(nfs4::nfsstat4::from)?;
    let granted = if matches!(context.vfs.capabilities(), crate::vfs::Capabilities::ReadWrite) {
        requested
    } else {
        requested & (nfs3::ACCESS3_READ | nfs3::ACCESS3_EXECUTE | nfs3::ACCESS3_LOOKUP)
    };
    Ok(granted)
}

async fn do_read(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::READ4args,
) -> Result<(Vec<u8>, bool), nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    context.vfs.read(id, args.offset, args.count).await.map_err(nfs4::nfsstat4::from)
}

async fn do_write(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::WRITE4args,
) -> Result<(u32, u32), nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    let stable = nfs3::file::stable_how::from_u32(args.stable).unwrap_or_default();
    let (_attr, committed, count) =
        context.vfs.write(id, args.offset, &args.data, stable).await.map_err(nfs4::nfsstat4::from)?;
    Ok((count, committed.to_u32().unwrap_or(0)))
}

async fn do_create(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::CREATE4args,
) -> Result<Vec<u8>, nfs4::nfsstat4> {
    let dirid = state.current_id(context)?;
    let filename: nfs3::filename3 = args.objname.clone();
    let (id, _attr) = context
        .vfs
        .create(dirid, &filename, nfs3::sattr3::default())
        .await
        .map_err(nfs4::nfsstat4::from)?;
    Ok(context.vfs.id_to_fh(id).data)
}

async fn do_remove(
    state: &CompoundState,
    context: &rpc::Context,
    target: &nfs3::nfsstring,
) -> Result<(), nfs4::nfsstat4> {
    let dirid = state.current_id(context)?;
    let filename: nfs3::filename3 = target.clone();
    context.vfs.remove(dirid, &filename).await.map_err(nfs4::nfsstat4::from)
}

async fn do_rename(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::RENAME4args,
) -> Result<(), nfs4::nfsstat4> {
    // RFC 7530 section 14.2.26: the saved filehandle names the source
    // directory, the current filehandle names the target directory.
    let from_dirid = state.saved_id(context)?;
    let to_dirid = state.current_id(context)?;
    let oldname: nfs3::filename3 = args.oldname.clone();
    let newname: nfs3::filename3 = args.newname.clone();
    context
        .vfs
        .rename(from_dirid, &oldname, to_dirid, &newname)
        .await
        .map_err(nfs4::nfsstat4::from)
}

async fn do_link(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::LINK4args,
) -> Result<(), nfs4::nfsstat4> {
    // RFC 7530 section 14.2.16: the saved filehandle names the existing
    // file, the current filehandle names the target directory.
    let file_id = state.saved_id(context)?;
    let dir_id = state.current_id(context)?;
    let name: nfs3::filename3 = args.newname.clone();
    context.vfs.link(file_id, dir_id, &name).await.map_err(nfs4::nfsstat4::from)?;
    Ok(())
}

async fn do_readdir(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::READDIR4args,
) -> Result<nfs4::READDIR4resok, nfs4::nfsstat4> {
    let dirid = state.current_id(context)?;
    let max_entries = (args.maxcount / 32).max(1) as usize;
    let result = context
        .vfs
        .readdir(dirid, args.cookie, max_entries)
        .await
        .map_err(nfs4::nfsstat4::from)?;
    let entries = result
        .entries
        .iter()
        .map(|e| nfs4::entry4 {
            cookie: e.fileid,
            name: e.name.clone(),
            attrs: nfs4::fattr4 { file_type: e.attr.ftype, size: e.attr.size, fileid: e.fileid },
        })
        .collect();
    Ok(nfs4::READDIR4resok { cookieverf: args.cookieverf, entries, eof: result.end })
}

async fn do_commit(
    state: &CompoundState,
    context: &rpc::Context,
    args: &nfs4::COMMIT4args,
) -> Result<(), nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    context.vfs.commit(id, args.offset, args.count).await.map_err(nfs4::nfsstat4::from)?;
    Ok(())
}

/// Converts an OPEN share-access/share-deny request into the open-state
/// tracker's access/sharing vocabulary. The bit values are RFC 7530 section
/// 16.18.3's `OPEN4_SHARE_ACCESS_*`/`OPEN4_SHARE_DENY_*` constants.
fn decode_share(share_access: u32, share_deny: u32) -> (AccessMode, SharingMode) {
    const SHARE_ACCESS_READ: u32 = 1;
    const SHARE_ACCESS_WRITE: u32 = 2;
    const SHARE_DENY_NONE: u32 = 0;
    const SHARE_DENY_WRITE: u32 = 2;
    const SHARE_DENY_BOTH: u32 = 3;

    let access = match share_access & (SHARE_ACCESS_READ | SHARE_ACCESS_WRITE) {
        v if v == (SHARE_ACCESS_READ | SHARE_ACCESS_WRITE) => AccessMode::ReadWrite,
        SHARE_ACCESS_WRITE => AccessMode::WriteOnly,
        _ => AccessMode::ReadOnly,
    };
    let sharing = match share_deny {
        SHARE_DENY_BOTH => SharingMode::Exclusive,
        SHARE_DENY_WRITE => SharingMode::SharedRead,
        SHARE_DENY_NONE => SharingMode::SharedAll,
        _ => SharingMode::SharedWrite,
    };
    (access, sharing)
}

async fn do_open(
    state: &mut CompoundState,
    context: &rpc::Context,
    args: &nfs4::OPEN4args,
) -> Result<nfs4::stateid4, nfs4::nfsstat4> {
    let dirid = state.current_id(context)?;
    let filename: nfs3::filename3 = args.claim_name.clone();
    let id = match context.vfs.lookup(dirid, &filename).await {
        Ok(id) => id,
        Err(nfs3::nfsstat3::NFS3ERR_NOENT) => {
            let (id, _attr) = context
                .vfs
                .create(dirid, &filename, nfs3::sattr3::default())
                .await
                .map_err(nfs4::nfsstat4::from)?;
            id
        }
        Err(e) => return Err(e.into()),
    };
    state.current_fh = Some(context.vfs.id_to_fh(id).data);

    let (access_mode, sharing_mode) = decode_share(args.share_access, args.share_deny);
    let owner = LockOwner {
        client_id: context.auth.uid,
        process_id: args.seqid,
        client_address: context.client_addr.clone(),
    };
    match context.open_state.open(
        &id.to_string(),
        owner.client_id,
        owner.process_id,
        access_mode,
        sharing_mode,
    ) {
        OpenOutcome::Granted(open_id) => Ok(nfs4::stateid4::from_id(args.seqid, open_id)),
        OpenOutcome::Conflict => Err(nfs4::nfsstat4::NFS4ERR_DENIED),
    }
}

async fn do_close(context: &rpc::Context, args: &nfs4::CLOSE4args) -> Result<(), nfs4::nfsstat4> {
    if context.open_state.close(args.open_stateid.id(), context.auth.uid) {
        Ok(())
    } else {
        Err(nfs4::nfsstat4::NFS4ERR_BAD_STATEID)
    }
}

fn lock_owner(state: &CompoundState, context: &rpc::Context, owner: u64) -> LockOwner {
    let _ = state;
    LockOwner { client_id: context.auth.uid, process_id: owner as u32, client_address: context.client_addr.clone() }
}

fn do_lock(
    state: &mut CompoundState,
    context: &rpc::Context,
    args: &nfs4::LOCK4args,
) -> Result<nfs4::stateid4, nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    let lock_type = if args.locktype % 2 == 1 { LockType::Exclusive } else { LockType::Shared };
    let owner = lock_owner(state, context, args.owner);
    match context.lock_manager.acquire(&id.to_string(), lock_type, args.offset, args.length, owner) {
        crate::lock_manager::LockOutcome::Granted(lock_id) => {
            Ok(nfs4::stateid4::from_id(0, lock_id))
        }
        crate::lock_manager::LockOutcome::Conflict(_) => Err(nfs4::nfsstat4::NFS4ERR_DENIED),
    }
}

fn do_lockt(
    state: &mut CompoundState,
    context: &rpc::Context,
    args: &nfs4::LOCKT4args,
) -> nfs4::nfsstat4 {
    let Ok(id) = state.current_id(context) else {
        return nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE;
    };
    let lock_type = if args.locktype % 2 == 1 { LockType::Exclusive } else { LockType::Shared };
    let owner = lock_owner(state, context, args.owner);
    match context.lock_manager.test(&id.to_string(), lock_type, args.offset, args.length, &owner) {
        Some(_) => nfs4::nfsstat4::NFS4ERR_DENIED,
        None => nfs4::nfsstat4::NFS4_OK,
    }
}

fn do_locku(
    state: &mut CompoundState,
    context: &rpc::Context,
    args: &nfs4::LOCKU4args,
) -> Result<nfs4::stateid4, nfs4::nfsstat4> {
    let id = state.current_id(context)?;
    let owner = LockOwner {
        client_id: context.auth.uid,
        process_id: args.lock_stateid.id(),
        client_address: context.client_addr.clone(),
    };
    context.lock_manager.release_range(&id.to_string(), args.offset, args.length, &owner);
    Ok(nfs4::stateid4::from_id(args.lock_stateid.seqid.wrapping_add(1), args.lock_stateid.id()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, RwLock};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::lock_manager::LockManager;
    use crate::open_state::OpenStateTracker;
    use crate::protocol::nfs::portmap::PortmapTable;
    use crate::protocol::rpc::{Context, ReplyCache, TransactionTracker};
    use crate::security::{SecurityConfig, SecurityManager};
    use crate::vfs::{self, Capabilities, ReadDirResult};
    use crate::xdr::nfs3;

    use super::*;

    /// Minimal in-memory VFS backing the compound-engine tests: a root
    /// directory plus flat files keyed by name, good enough to exercise
    /// PUTROOTFH/LOOKUP/GETATTR/CREATE/WRITE/READ without pulling in a real
    /// filesystem backend.
    #[derive(Default)]
    struct MockVfs {
        next_id: AtomicU64,
        files: Mutex<HashMap<nfs3::fileid3, (String, Vec<u8>)>>,
        names: Mutex<HashMap<String, nfs3::fileid3>>,
    }

    impl MockVfs {
        fn new() -> Self {
            Self { next_id: AtomicU64::new(2), ..Default::default() }
        }
    }

    #[async_trait]
    impl vfs::NFSFileSystem for MockVfs {
        fn generation(&self) -> u64 {
            1
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ReadWrite
        }

        fn root_dir(&self) -> nfs3::fileid3 {
            1
        }

        async fn lookup(
            &self,
            _dirid: nfs3::fileid3,
            filename: &nfs3::filename3,
        ) -> Result<nfs3::fileid3, nfs3::nfsstat3> {
            let name = String::from_utf8_lossy(filename.as_ref()).into_owned();
            self.names.lock().unwrap().get(&name).copied().ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)
        }

        async fn getattr(&self, id: nfs3::fileid3) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            if id == self.root_dir() {
                let mut attr = nfs3::fattr3::default();
                attr.ftype = nfs3::ftype3::NF3DIR;
                attr.fileid = id;
                return Ok(attr);
            }
            let files = self.files.lock().unwrap();
            let (_, data) = files.get(&id).ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)?;
            let mut attr = nfs3::fattr3::default();
            attr.ftype = nfs3::ftype3::NF3REG;
            attr.size = data.len() as u64;
            attr.fileid = id;
            Ok(attr)
        }

        async fn setattr(
            &self,
            id: nfs3::fileid3,
            _setattr: nfs3::sattr3,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            self.getattr(id).await
        }

        async fn read(
            &self,
            id: nfs3::fileid3,
            offset: u64,
            count: u32,
        ) -> Result<(Vec<u8>, bool), nfs3::nfsstat3> {
            let files = self.files.lock().unwrap();
            let (_, data) = files.get(&id).ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)?;
            let offset = offset as usize;
            if offset >= data.len() {
                return Ok((Vec::new(), true));
            }
            let end = (offset + count as usize).min(data.len());
            Ok((data[offset..end].to_vec(), end == data.len()))
        }

        async fn write(
            &self,
            id: nfs3::fileid3,
            offset: u64,
            data: &[u8],
            stable: nfs3::file::stable_how,
        ) -> Result<(nfs3::fattr3, nfs3::file::stable_how, nfs3::count3), nfs3::nfsstat3> {
            let mut files = self.files.lock().unwrap();
            let (_, existing) = files.get_mut(&id).ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)?;
            let offset = offset as usize;
            if existing.len() < offset + data.len() {
                existing.resize(offset + data.len(), 0);
            }
            existing[offset..offset + data.len()].copy_from_slice(data);
            let size = existing.len() as u64;
            drop(files);
            let mut attr = self.getattr(id).await?;
            attr.size = size;
            Ok((attr, stable, data.len() as u32))
        }

        async fn create(
            &self,
            _dirid: nfs3::fileid3,
            filename: &nfs3::filename3,
            _attr: nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            let name = String::from_utf8_lossy(filename.as_ref()).into_owned();
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.files.lock().unwrap().insert(id, (name.clone(), Vec::new()));
            self.names.lock().unwrap().insert(name, id);
            let attr = self.getattr(id).await?;
            Ok((id, attr))
        }

        async fn create_exclusive(
            &self,
            dirid: nfs3::fileid3,
            filename: &nfs3::filename3,
            _verifier: nfs3::createverf3,
        ) -> Result<nfs3::fileid3, nfs3::nfsstat3> {
            self.create(dirid, filename, nfs3::sattr3::default()).await.map(|(id, _)| id)
        }

        async fn mkdir(
            &self,
            _dirid: nfs3::fileid3,
            _dirname: &nfs3::filename3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOTSUPP)
        }

        async fn remove(
            &self,
            _dirid: nfs3::fileid3,
            filename: &nfs3::filename3,
        ) -> Result<(), nfs3::nfsstat3> {
            let name = String::from_utf8_lossy(filename.as_ref()).into_owned();
            let id = self.names.lock().unwrap().remove(&name).ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)?;
            self.files.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn rename(
            &self,
            _from_dirid: nfs3::fileid3,
            from_filename: &nfs3::filename3,
            _to_dirid: nfs3::fileid3,
            to_filename: &nfs3::filename3,
        ) -> Result<(), nfs3::nfsstat3> {
            let from = String::from_utf8_lossy(from_filename.as_ref()).into_owned();
            let to = String::from_utf8_lossy(to_filename.as_ref()).into_owned();
            let mut names = self.names.lock().unwrap();
            let id = names.remove(&from).ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)?;
            names.insert(to.clone(), id);
            drop(names);
            self.files.lock().unwrap().get_mut(&id).unwrap().0 = to;
            Ok(())
        }

        async fn readdir(
            &self,
            _dirid: nfs3::fileid3,
            _start_after: nfs3::fileid3,
            _max_entries: usize,
        ) -> Result<ReadDirResult, nfs3::nfsstat3> {
            Ok(ReadDirResult { entries: Vec::new(), end: true })
        }

        async fn symlink(
            &self,
            _dirid: nfs3::fileid3,
            _linkname: &nfs3::filename3,
            _symlink: &nfs3::nfspath3,
            _attr: &nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOTSUPP)
        }

        async fn readlink(&self, _id: nfs3::fileid3) -> Result<nfs3::nfspath3, nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOTSUPP)
        }

        async fn link(
            &self,
            file_id: nfs3::fileid3,
            _link_dir_id: nfs3::fileid3,
            link_name: &nfs3::filename3,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            let name = String::from_utf8_lossy(link_name.as_ref()).into_owned();
            self.names.lock().unwrap().insert(name, file_id);
            self.getattr(file_id).await
        }

        async fn mknod(
            &self,
            _dir_id: nfs3::fileid3,
            _name: &nfs3::filename3,
            _ftype: nfs3::ftype3,
            _specdata: nfs3::specdata3,
            _attrs: &nfs3::sattr3,
        ) -> Result<(nfs3::fileid3, nfs3::fattr3), nfs3::nfsstat3> {
            Err(nfs3::nfsstat3::NFS3ERR_NOTSUPP)
        }

        async fn commit(
            &self,
            id: nfs3::fileid3,
            _offset: u64,
            _count: u32,
        ) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
            self.getattr(id).await
        }
    }

    fn test_context(vfs: Arc<dyn vfs::NFSFileSystem + Send + Sync>) -> Context {
        Context {
            local_port: 0,
            client_addr: "127.0.0.1:1".to_string(),
            auth: xdr::rpc::auth_unix::default(),
            vfs,
            mount_signal: None,
            export_name: Arc::from("/".to_string()),
            transaction_tracker: Arc::new(TransactionTracker::new(Duration::from_secs(60))),
            portmap_table: Arc::new(RwLock::new(PortmapTable::default())),
            reply_cache: Arc::new(ReplyCache::new(Duration::from_secs(60))),
            lock_manager: Arc::new(LockManager::default()),
            open_state: Arc::new(OpenStateTracker::default()),
            security: Arc::new(SecurityManager::new(SecurityConfig::default())),
            security_context: crate::security::SecurityContext::anonymous("127.0.0.1:1"),
        }
    }

    #[tokio::test]
    async fn putrootfh_then_getfh_returns_root_handle() {
        let vfs = Arc::new(MockVfs::new());
        let context = test_context(vfs.clone());
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![nfs4::nfs_argop4::PUTROOTFH, nfs4::nfs_argop4::GETFH],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4_OK));
        assert_eq!(res.resarray.len(), 2);
        match &res.resarray[1] {
            nfs4::nfs_resop4::GETFH(nfs4::nfsstat4::NFS4_OK, Some(resok)) => {
                assert_eq!(resok.object, vfs.id_to_fh(vfs.root_dir()).data);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn getfh_without_putfh_is_nofilehandle() {
        let vfs = Arc::new(MockVfs::new());
        let context = test_context(vfs);
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![nfs4::nfs_argop4::GETFH],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE));
    }

    #[tokio::test]
    async fn compound_stops_at_first_error() {
        let vfs = Arc::new(MockVfs::new());
        let context = test_context(vfs);
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![nfs4::nfs_argop4::GETFH, nfs4::nfs_argop4::PUTROOTFH],
        };
        let res = handle_compound(args, &context).await;
        assert_eq!(res.resarray.len(), 1);
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4ERR_NOFILEHANDLE));
    }

    #[tokio::test]
    async fn unsupported_opcode_reports_illegal_status() {
        let vfs = Arc::new(MockVfs::new());
        let context = test_context(vfs);
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![nfs4::nfs_argop4::Unimplemented(9999)],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4ERR_OP_ILLEGAL));
    }

    #[tokio::test]
    async fn lookup_resolves_child_and_getattr_reports_its_size() {
        let vfs = Arc::new(MockVfs::new());
        let context = test_context(vfs.clone());
        let root = vfs.root_dir();
        let name: nfs3::filename3 = b"hello.txt".to_vec().into();
        let (child_id, _) =
            vfs.create(root, &name, nfs3::sattr3::default()).await.expect("create");
        vfs.write(child_id, 0, b"hi", nfs3::file::stable_how::FILE_SYNC).await.expect("write");

        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![
                nfs4::nfs_argop4::PUTROOTFH,
                nfs4::nfs_argop4::LOOKUP(nfs4::LOOKUP4args { objname: name }),
                nfs4::nfs_argop4::GETATTR(nfs4::GETATTR4args::default()),
            ],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4_OK));
        match &res.resarray[2] {
            nfs4::nfs_resop4::GETATTR(nfs4::nfsstat4::NFS4_OK, Some(resok)) => {
                assert_eq!(resok.obj_attributes.size, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_then_lock_then_conflicting_lock_from_other_owner_is_denied() {
        let vfs = Arc::new(MockVfs::new());
        let mut context = test_context(vfs.clone());
        let root = vfs.root_dir();
        let name: nfs3::filename3 = b"locked.txt".to_vec().into();
        vfs.create(root, &name, nfs3::sattr3::default()).await.expect("create");

        context.auth.uid = 1000;
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![
                nfs4::nfs_argop4::PUTROOTFH,
                nfs4::nfs_argop4::LOOKUP(nfs4::LOOKUP4args { objname: name }),
                nfs4::nfs_argop4::LOCK(nfs4::LOCK4args {
                    locktype: 1,
                    offset: 0,
                    length: 10,
                    owner: 1,
                }),
            ],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4_OK));

        context.auth.uid = 2000;
        let args = nfs4::COMPOUND4args {
            tag: nfs3::nfsstring::default(),
            minorversion: 0,
            argarray: vec![
                nfs4::nfs_argop4::PUTROOTFH,
                nfs4::nfs_argop4::LOOKUP(nfs4::LOOKUP4args {
                    objname: b"locked.txt".to_vec().into(),
                }),
                nfs4::nfs_argop4::LOCK(nfs4::LOCK4args {
                    locktype: 1,
                    offset: 0,
                    length: 10,
                    owner: 2,
                }),
            ],
        };
        let res = handle_compound(args, &context).await;
        assert!(matches!(res.status, nfs4::nfsstat4::NFS4ERR_DENIED));
    }
}
