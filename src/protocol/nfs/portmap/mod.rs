//! PORTMAP protocol implementation as specified in RFC 1833 (previously RFC 1057 Appendix A).
//! <https://datatracker.ietf.org/doc/rfc1833/>

use std::collections::HashMap;
use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::error;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, portmap, Serialize};

mod dump;
mod get_port;
mod null;
mod set_port;
mod unset_port;

use dump::pmapproc_dump;
use get_port::pmapproc_getport;
use null::pmapproc_null;
use set_port::pmapproc_setport;
use unset_port::pmapproc_unsetport;

/// Key identifying a single portmap registration: (program, version, protocol).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortmapKey {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
}

/// In-memory portmap registry, keyed by `(program, version, protocol)`.
///
/// Mirrors the table described for PMAPPROC_SET/UNSET/GETPORT/DUMP: a registration
/// with an existing key replaces the previous entry.
#[derive(Debug, Default)]
pub struct PortmapTable {
    pub table: HashMap<PortmapKey, u16>,
}

impl PortmapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the table with the NFS and MOUNT registrations this server itself answers,
    /// so a client's first GETPORT succeeds without a separate SET call.
    pub fn with_defaults(nfs_port: u16, mount_port: u16) -> Self {
        let mut table = HashMap::new();
        table.insert(
            PortmapKey { prog: xdr::nfs3::PROGRAM, vers: xdr::nfs3::VERSION, prot: portmap::IPPROTO_TCP },
            nfs_port,
        );
        table.insert(
            PortmapKey { prog: xdr::nfs3::PROGRAM, vers: xdr::nfs3::VERSION, prot: portmap::IPPROTO_UDP },
            nfs_port,
        );
        table.insert(
            PortmapKey { prog: xdr::mount::PROGRAM, vers: xdr::mount::VERSION, prot: portmap::IPPROTO_TCP },
            mount_port,
        );
        table.insert(
            PortmapKey { prog: xdr::mount::PROGRAM, vers: xdr::mount::VERSION, prot: portmap::IPPROTO_UDP },
            mount_port,
        );
        Self { table }
    }
}

/// Main handler for the PORTMAP protocol: dispatches by procedure number.
///
/// PMAPPROC_CALLIT (forwarding a call to another registered program) is out of
/// scope for this server; it is acknowledged with a benign success reply and logged.
pub fn handle_portmap(
    xid: u32,
    call: &xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &mut rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != portmap::VERSION {
        error!("Invalid Portmap Version number {} != {}", call.vers, portmap::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, portmap::VERSION).serialize(output)?;
        return Ok(());
    }
    let prog =
        portmap::PortmapProgram::from_u32(call.proc).unwrap_or(portmap::PortmapProgram::INVALID);

    match prog {
        portmap::PortmapProgram::PMAPPROC_NULL => pmapproc_null(xid, input, output)?,
        portmap::PortmapProgram::PMAPPROC_SET => pmapproc_setport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_UNSET => {
            pmapproc_unsetport(xid, input, output, context)?
        }
        portmap::PortmapProgram::PMAPPROC_GETPORT => {
            pmapproc_getport(xid, input, output, context)?
        }
        portmap::PortmapProgram::PMAPPROC_DUMP => pmapproc_dump(xid, output, context)?,
        portmap::PortmapProgram::PMAPPROC_CALLIT => {
            tracing::debug!("PMAPPROC_CALLIT is out of scope; replying with empty success");
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        portmap::PortmapProgram::INVALID => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
