//! Implementation of the NULL procedure (procedure 0) for the PORTMAP protocol
//! as defined in RFC 1833 (previously RFC 1057 Appendix A).
//!
//! NULL does no work; it exists so clients can check server responsiveness.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_null(
    xid: u32,
    _: &mut impl Read,
    output: &mut impl Write,
) -> Result<(), anyhow::Error> {
    debug!("pmapproc_null({:?})", xid);
    let msg = xdr::rpc::make_success_reply(xid);
    msg.serialize(output)?;
    Ok(())
}
