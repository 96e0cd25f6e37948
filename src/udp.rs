//! The UDP module provides NFS/RPC service over UDP datagrams.
//!
//! Unlike TCP, UDP carries exactly one RPC message per datagram - there is no
//! record marking, and the transport itself does not guarantee delivery or
//! ordering. This means:
//!
//! - A datagram that is truncated, oversized, or fails to XDR-decode is
//!   dropped silently rather than treated as a connection error.
//! - A client may retransmit a call after its timeout elapses before the
//!   server's reply arrives; since UDP has no connection state to piggyback
//!   retransmission detection on, the server consults a [`rpc::ReplyCache`]
//!   keyed by (xid, client address) and resends the cached reply rather than
//!   re-executing a non-idempotent call.
//!
//! Datagrams larger than 64 KiB are rejected, matching the practical upper
//! bound for UDP RPC payloads (RFC 1094 notes implementations historically
//! cap NFS/UDP transfers well below the UDP theoretical maximum).

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use std::{io, net::IpAddr};

use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::lock_manager::LockManager;
use crate::open_state::OpenStateTracker;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::{rpc, xdr};
use crate::security::{SecurityConfig, SecurityContext, SecurityManager};
use crate::tcp::SharedRpcState;
use crate::vfs::NFSFileSystem;

/// Largest UDP datagram this server will accept for an RPC call.
const MAX_UDP_MESSAGE_SIZE: usize = 65536;

/// NFS UDP listener that processes one RPC call per datagram.
pub struct NFSUdpListener<T: NFSFileSystem + Send + Sync + 'static> {
    socket: UdpSocket,
    port: u16,
    arcfs: Arc<T>,
    export_name: Arc<String>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
    portmap_table: Arc<RwLock<PortmapTable>>,
    reply_cache: Arc<rpc::ReplyCache>,
    lock_manager: Arc<LockManager>,
    open_state: Arc<OpenStateTracker>,
    security: Arc<SecurityManager>,
}

impl<T: NFSFileSystem + Send + Sync + 'static> NFSUdpListener<T> {
    /// Binds a standalone UDP listener with its own portmap table, transaction
    /// tracker, and reply cache. Use [`NFSUdpListener::bind_shared`] instead
    /// when running alongside a TCP listener for the same server so both
    /// transports share one portmap registry.
    pub async fn bind(ipstr: &str, fs: T) -> io::Result<NFSUdpListener<T>> {
        let socket = UdpSocket::bind(ipstr).await?;
        let port = match socket.local_addr()? {
            SocketAddr::V4(s) => s.port(),
            SocketAddr::V6(s) => s.port(),
        };
        Ok(NFSUdpListener {
            socket,
            port,
            arcfs: Arc::new(fs),
            export_name: Arc::from("/".to_string()),
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(Duration::from_secs(60))),
            portmap_table: Arc::from(RwLock::from(PortmapTable::default())),
            reply_cache: Arc::new(rpc::ReplyCache::new(Duration::from_secs(60))),
            lock_manager: Arc::new(LockManager::default()),
            open_state: Arc::new(OpenStateTracker::default()),
            security: Arc::new(SecurityManager::new(SecurityConfig::default())),
        })
    }

    /// Binds a UDP listener that shares portmap registrations, the export
    /// name, and the reply cache with an existing [`crate::tcp::NFSTcpListener`].
    pub async fn bind_shared(
        ipstr: &str,
        fs: T,
        shared: SharedRpcState,
    ) -> io::Result<NFSUdpListener<T>> {
        let socket = UdpSocket::bind(ipstr).await?;
        let port = match socket.local_addr()? {
            SocketAddr::V4(s) => s.port(),
            SocketAddr::V6(s) => s.port(),
        };
        Ok(NFSUdpListener {
            socket,
            port,
            arcfs: Arc::new(fs),
            export_name: shared.export_name,
            transaction_tracker: shared.transaction_tracker,
            portmap_table: shared.portmap_table,
            reply_cache: shared.reply_cache,
            lock_manager: shared.lock_manager,
            open_state: shared.open_state,
            security: shared.security,
        })
    }

    /// Sets the NFS export name clients use to mount the file system.
    pub fn with_export_name<S: AsRef<str>>(&mut self, export_name: S) {
        self.export_name = Arc::new(format!(
            "/{}",
            export_name.as_ref().trim_end_matches('/').trim_start_matches('/')
        ));
    }

    /// Returns the port this listener is bound to.
    pub fn get_listen_port(&self) -> u16 {
        self.port
    }

    /// Returns the IP address this listener is bound to.
    pub fn get_listen_ip(&self) -> IpAddr {
        self.socket.local_addr().expect("socket has no local address").ip()
    }

    /// Accepts datagrams forever, processing one RPC call per datagram.
    ///
    /// Returns only if the socket itself errors; malformed individual
    /// datagrams are logged and dropped rather than propagated.
    pub async fn handle_forever(&self) -> io::Result<()> {
        let mut buf = vec![0_u8; MAX_UDP_MESSAGE_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            if len < 4 {
                trace!("Dropping undersized UDP datagram from {}", peer);
                continue;
            }
            let datagram = buf[..len].to_vec();
            let context = rpc::Context {
                local_port: self.port,
                client_addr: peer.to_string(),
                auth: xdr::rpc::auth_unix::default(),
                vfs: self.arcfs.clone(),
                mount_signal: None,
                export_name: self.export_name.clone(),
                transaction_tracker: self.transaction_tracker.clone(),
                portmap_table: self.portmap_table.clone(),
                reply_cache: self.reply_cache.clone(),
                lock_manager: self.lock_manager.clone(),
                open_state: self.open_state.clone(),
                security: self.security.clone(),
                security_context: SecurityContext::anonymous(&peer.to_string()),
            };
            if let Err(e) = self.process_datagram(datagram, peer, context).await {
                warn!("Dropping malformed UDP datagram from {}: {:?}", peer, e);
            }
        }
    }

    async fn process_datagram(
        &self,
        datagram: Vec<u8>,
        peer: SocketAddr,
        context: rpc::Context,
    ) -> Result<(), anyhow::Error> {
        let xid = u32::from_be_bytes(datagram[..4].try_into().unwrap());
        let client_addr = peer.to_string();

        if let Some(cached) = context.reply_cache.get(xid, &client_addr) {
            debug!("Answering UDP retransmission xid={} from cache", xid);
            self.socket.send_to(&cached, peer).await?;
            return Ok(());
        }

        let mut input = Cursor::new(datagram);
        let mut output = Cursor::new(Vec::new());
        let sent = rpc::handle_rpc(&mut input, &mut output, context.clone()).await?;
        if sent {
            let reply = output.into_inner();
            context.reply_cache.insert(xid, &client_addr, reply.clone());
            self.socket.send_to(&reply, peer).await?;
        }
        Ok(())
    }
}
