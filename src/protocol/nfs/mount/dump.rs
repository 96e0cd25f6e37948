//! Implementation of the DUMP procedure (procedure 2) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.3.
//!
//! DUMP lists the client/path pairs currently mounted through this server. This
//! server does not track individual client mount state beyond the `mount_signal`
//! used for diagnostics, so it always replies with an empty list.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_dump(
    xid: u32,
    _: &mut impl Read,
    output: &mut impl Write,
    _context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_dump({:?})", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    // mountlist is a linked list discriminated the same way pmaplist is; an empty
    // list is a single `false`.
    false.serialize(output)?;
    Ok(())
}
