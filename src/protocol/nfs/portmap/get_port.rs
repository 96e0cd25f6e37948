//! Implementation of the GETPORT procedure (procedure 3) for the PORTMAP protocol
//! as defined in RFC 1833 (previously RFC 1057 Appendix A).
//!
//! GETPORT maps an RPC program number, version number, and transport protocol to
//! the port number on which that program is awaiting calls, returning 0 when the
//! combination is not registered.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::portmap::PortmapKey;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, portmap, Serialize};

pub fn pmapproc_getport(
    xid: u32,
    read: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let mapping = deserialize::<portmap::mapping>(read)?;
    debug!("pmapproc_getport({:?}, {:?})", xid, mapping);
    let key = PortmapKey { prog: mapping.prog, vers: mapping.vers, prot: mapping.prot };
    let port = context.portmap_table.read().unwrap().table.get(&key).copied().unwrap_or(0);
    debug!("\t{:?} --> {:?}", xid, port);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    (port as u32).serialize(output)?;
    Ok(())
}
