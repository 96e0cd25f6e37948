//! NFSv2 (Network File System version 2) protocol implementation as specified in RFC 1094.
//!
//! This is a thin wrapper over the same [`crate::vfs::NFSFileSystem`] trait the
//! version 3 handlers use: version 2 arguments are converted to their version 3
//! equivalents (`fhandle2` -> `nfs_fh3`, `sattr2` -> `sattr3`, ...) and the result
//! converted back, rather than re-implementing file system access.
//!
//! Procedures 3 (ROOT) and 7 (WRITECACHE) are obsolete per RFC 1094 and are not
//! dispatched; clients calling them, like any other unrecognized procedure number,
//! get `PROC_UNAVAIL`.
//!
//! Several replies are considerably plainer than their version 3 counterparts:
//! REMOVE, RENAME, LINK, RMDIR and SYMLINK return nothing but a status code, and
//! no procedure returns the before/after weak-cache-consistency data version 3
//! introduced.

use std::io::{Read, Write};

use tracing::{debug, error, warn};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs2, nfs3, Serialize};
use crate::vfs;

/// Converts a version 2 file handle to a server file id, mapping a bad handle
/// straight to its version 2 status code.
fn fh2_to_id(
    context: &rpc::Context,
    handle: &nfs2::fhandle2,
) -> Result<nfs3::fileid3, nfs2::nfsstat2> {
    context.vfs.fh_to_id(&handle.to_fh3()).map_err(nfs2::nfsstat2::from)
}

/// Looks up the current attributes for `id`, already converted to `fattr2`.
async fn getattr2(context: &rpc::Context, id: nfs3::fileid3) -> Result<nfs2::fattr2, nfs2::nfsstat2> {
    context.vfs.getattr(id).await.map(nfs2::fattr2::from).map_err(nfs2::nfsstat2::from)
}

/// Main handler for the NFSv2 protocol.
///
/// Dispatches NFSv2 RPC calls to the appropriate procedure handler based on
/// procedure number, mirroring the version 3 dispatcher in `nfs::v3::handle_nfs`.
pub async fn handle_nfs2(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs2::VERSION {
        warn!("Invalid NFS Version number {} != {}", call.vers, nfs2::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, nfs2::VERSION).serialize(output)?;
        return Ok(());
    }

    match call.proc {
        0 => nfsproc2_null(xid, output)?,
        1 => nfsproc2_getattr(xid, input, output, context).await?,
        2 => nfsproc2_setattr(xid, input, output, context).await?,
        4 => nfsproc2_lookup(xid, input, output, context).await?,
        5 => nfsproc2_readlink(xid, input, output, context).await?,
        6 => nfsproc2_read(xid, input, output, context).await?,
        8 => nfsproc2_write(xid, input, output, context).await?,
        9 => nfsproc2_create(xid, input, output, context).await?,
        10 => nfsproc2_remove(xid, input, output, context).await?,
        11 => nfsproc2_rename(xid, input, output, context).await?,
        12 => nfsproc2_link(xid, input, output, context).await?,
        13 => nfsproc2_symlink(xid, input, output, context).await?,
        14 => nfsproc2_mkdir(xid, input, output, context).await?,
        15 => nfsproc2_rmdir(xid, input, output, context).await?,
        16 => nfsproc2_readdir(xid, input, output, context).await?,
        17 => nfsproc2_statfs(xid, input, output, context).await?,
        other => {
            warn!("Unimplemented NFSv2 procedure {:?}", other);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// NULL (procedure 0): no-op, used to check server liveness.
fn nfsproc2_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc2_null({:?})", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}

/// GETATTR (procedure 1): returns the attributes of a file system object.
async fn nfsproc2_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs2::fhandle2>(input)?;
    debug!("nfsproc2_getattr({:?},{:?})", xid, handle);

    let id = match fh2_to_id(context, &handle) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match getattr2(context, id).await {
        Ok(attr) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            attr.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_getattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}

/// SETATTR (procedure 2): changes the attributes of a file system object.
async fn nfsproc2_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::sattrargs2>(input)?;
    debug!("nfsproc2_setattr({:?},{:?})", xid, args);

    let id = match fh2_to_id(context, &args.file) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.setattr(id, args.attributes.to_sattr3()).await {
        Ok(attr) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            nfs2::fattr2::from(attr).serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_setattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// LOOKUP (procedure 4): resolves a name within a directory to a file handle.
async fn nfsproc2_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs2::diropargs2>(input)?;
    debug!("nfsproc2_lookup({:?},{:?})", xid, dirops);

    let dirid = match fh2_to_id(context, &dirops.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.lookup(dirid, &dirops.name).await {
        Ok(fid) => match getattr2(context, fid).await {
            Ok(attr) => {
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                nfs2::nfsstat2::NFS_OK.serialize(output)?;
                nfs2::fhandle2::from_fh3(&context.vfs.id_to_fh(fid)).serialize(output)?;
                attr.serialize(output)?;
            }
            Err(stat) => {
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
            }
        },
        Err(stat) => {
            debug!("nfsproc2_lookup error {:?}({:?}) --> {:?}", xid, dirops.name, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// READLINK (procedure 5): reads the target path of a symbolic link.
async fn nfsproc2_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs2::fhandle2>(input)?;
    debug!("nfsproc2_readlink({:?},{:?})", xid, handle);

    let id = match fh2_to_id(context, &handle) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.readlink(id).await {
        Ok(path) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            path.serialize(output)?;
        }
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// READ (procedure 6): reads data from a regular file.
async fn nfsproc2_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs2::readargs2>(input)?;
    debug!("nfsproc2_read({:?},{:?})", xid, args);

    let id = match fh2_to_id(context, &args.file) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    let count = args.count.min(nfs2::NFS2_MAXDATA);
    match context.vfs.read(id, args.offset as u64, count).await {
        Ok((data, _eof)) => match getattr2(context, id).await {
            Ok(attr) => {
                let res = nfs2::readres2resok { attributes: attr, data };
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                nfs2::nfsstat2::NFS_OK.serialize(output)?;
                res.serialize(output)?;
            }
            Err(stat) => {
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
            }
        },
        Err(stat) => {
            error!("nfsproc2_read error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// WRITE (procedure 8): writes data to a regular file. Version 2 has no
/// asynchronous write concept, so every write commits synchronously, as if the
/// version 3 client had asked for `FILE_SYNC`.
async fn nfsproc2_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::writeargs2>(input)?;
    debug!("nfsproc2_write({:?}, {} bytes at {})", xid, args.data.len(), args.offset);

    let id = match fh2_to_id(context, &args.file) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context
        .vfs
        .write(id, args.offset as u64, &args.data, nfs3::file::stable_how::FILE_SYNC)
        .await
    {
        Ok((attr, _committed, _count)) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            nfs2::fattr2::from(attr).serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_write error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// CREATE (procedure 9): creates a regular file in a directory.
async fn nfsproc2_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::createargs2>(input)?;
    debug!("nfsproc2_create({:?},{:?})", xid, args);

    let dirid = match fh2_to_id(context, &args.where_.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.create(dirid, &args.where_.name, args.attributes.to_sattr3()).await {
        Ok((fid, attr)) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            nfs2::fhandle2::from_fh3(&context.vfs.id_to_fh(fid)).serialize(output)?;
            nfs2::fattr2::from(attr).serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_create error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// REMOVE (procedure 10): removes a file system object from a directory.
/// Unlike version 3, the reply carries nothing but a status code.
async fn nfsproc2_remove(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let dirops = deserialize::<nfs2::diropargs2>(input)?;
    debug!("nfsproc2_remove({:?},{:?})", xid, dirops);

    let dirid = match fh2_to_id(context, &dirops.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.remove(dirid, &dirops.name).await {
        Ok(()) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_remove error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// RENAME (procedure 11): renames a file system object, possibly into a
/// different directory. Reply carries nothing but a status code.
async fn nfsproc2_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::renameargs2>(input)?;
    debug!("nfsproc2_rename({:?},{:?})", xid, args);

    let from_dirid = match fh2_to_id(context, &args.from.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    let to_dirid = match fh2_to_id(context, &args.to.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.rename(from_dirid, &args.from.name, to_dirid, &args.to.name).await {
        Ok(()) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_rename error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// LINK (procedure 12): creates a hard link. Reply carries nothing but a
/// status code.
async fn nfsproc2_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::linkargs2>(input)?;
    debug!("nfsproc2_link({:?},{:?})", xid, args);

    let file_id = match fh2_to_id(context, &args.from) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    let link_dir_id = match fh2_to_id(context, &args.to.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.link(file_id, link_dir_id, &args.to.name).await {
        Ok(_attr) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_link error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// SYMLINK (procedure 13): creates a symbolic link. Reply carries nothing but
/// a status code; unlike version 3's SYMLINK, the new object's handle and
/// attributes are not returned.
async fn nfsproc2_symlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::symlinkargs2>(input)?;
    debug!("nfsproc2_symlink({:?},{:?})", xid, args);

    let dirid = match fh2_to_id(context, &args.from.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    let attr = args.attributes.to_sattr3();
    match context.vfs.symlink(dirid, &args.from.name, &args.to, &attr).await {
        Ok(_) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc2_symlink error --> {:?}", stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// MKDIR (procedure 14): creates a directory. Like version 3's handler, the
/// requested attributes are not forwarded: `NFSFileSystem::mkdir` does not
/// take an attribute argument.
async fn nfsproc2_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if !matches!(context.vfs.capabilities(), vfs::Capabilities::ReadWrite) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs2::nfsstat2::NFSERR_ROFS.serialize(output)?;
        return Ok(());
    }
    let args = deserialize::<nfs2::createargs2>(input)?;
    debug!("nfsproc2_mkdir({:?},{:?})", xid, args);

    let dirid = match fh2_to_id(context, &args.where_.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };
    match context.vfs.mkdir(dirid, &args.where_.name).await {
        Ok((fid, attr)) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::NFS_OK.serialize(output)?;
            nfs2::fhandle2::from_fh3(&context.vfs.id_to_fh(fid)).serialize(output)?;
            nfs2::fattr2::from(attr).serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_mkdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// RMDIR (procedure 15): removes an empty directory. Like version 3's
/// dispatcher, which routes RMDIR to the same handler as REMOVE, this shares
/// `NFSFileSystem::remove`.
async fn nfsproc2_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    nfsproc2_remove(xid, input, output, context).await
}

/// READDIR (procedure 16): lists entries in a directory as a linked list,
/// terminated by a final `false` continuation flag and an EOF flag - the same
/// wire shape as version 3's `entryplus3*` list, minus attributes/file handles
/// per entry and the directory's own attributes, which version 2 does not
/// return here.
async fn nfsproc2_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs2::readdirargs2>(input)?;
    debug!("nfsproc2_readdir({:?},{:?})", xid, args);

    let dirid = match fh2_to_id(context, &args.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };

    // subtract off the final false continuation flag and eof flag
    let max_bytes_allowed = (args.count as usize).saturating_sub(8);
    // args.count is bytes of fileid, name and cookie; ballparked the same way
    // the version 3 READDIR handler estimates entries from dircount.
    let estimated_max_results = (args.count / 16).max(1) as usize;

    match context.vfs.readdir(dirid, args.cookie as u64, estimated_max_results).await {
        Ok(result) => {
            let mut counting_output = crate::write_counter::WriteCounter::new(output);
            xdr::rpc::make_success_reply(xid).serialize(&mut counting_output)?;
            nfs2::nfsstat2::NFS_OK.serialize(&mut counting_output)?;

            let mut all_entries_written = true;
            for entry in result.entries {
                let mut write_buf: Vec<u8> = Vec::new();
                let mut write_cursor = std::io::Cursor::new(&mut write_buf);
                true.serialize(&mut write_cursor)?;
                (entry.fileid as u32).serialize(&mut write_cursor)?;
                entry.name.serialize(&mut write_cursor)?;
                (entry.fileid as nfs2::nfscookie2).serialize(&mut write_cursor)?;
                write_cursor.flush()?;

                if write_buf.len() + counting_output.bytes_written() < max_bytes_allowed {
                    counting_output.write_all(&write_buf)?;
                } else {
                    all_entries_written = false;
                    break;
                }
            }
            false.serialize(&mut counting_output)?;
            (all_entries_written && result.end).serialize(&mut counting_output)?;
        }
        Err(stat) => {
            error!("nfsproc2_readdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs2::nfsstat2::from(stat).serialize(output)?;
        }
    }
    Ok(())
}

/// STATFS (procedure 17): reports file system capacity and usage statistics.
/// The underlying [`crate::vfs::NFSFileSystem`] trait has no notion of free
/// space, so this reports the same generously large constants version 3's
/// FSSTAT handler does.
async fn nfsproc2_statfs(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs2::fhandle2>(input)?;
    debug!("nfsproc2_statfs({:?},{:?})", xid, handle);

    if let Err(stat) = fh2_to_id(context, &handle) {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        stat.serialize(output)?;
        return Ok(());
    }

    let res = nfs2::statfsokres2 {
        tsize: nfs2::NFS2_MAXDATA,
        bsize: 4096,
        blocks: 1024 * 1024,
        bfree: 1024 * 1024,
        bavail: 1024 * 1024,
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs2::nfsstat2::NFS_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
