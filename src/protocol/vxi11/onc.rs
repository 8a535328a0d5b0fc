//! Open Network Computing (ONC) RPC client protocol, as defined by RFC5531

use std::{mem, net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};

use crate::error::{Error, Result};

use super::xdr::{self, XdrPack};

pub const RPC_VERSION: u32 = 2;

pub const LAST_FRAGMENT_MARKER: u32 = 0x80000000;

/// A single ONC RPC client connection, issuing calls and matching replies by xid.
pub struct OncClient {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    next_xid: u32,
}
impl OncClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, stream: None, next_xid: 1 }
    }

    pub async fn connect(&mut self, deadline: Duration) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::Connect("already connected".into()));
        }

        let stream = time::timeout(deadline, TcpStream::connect(self.addr))
            .await
            .map_err(|_| Error::Connect(format!("timed out connecting to {}", self.addr)))?
            .map_err(|e| Error::Connect(format!("{}: {e}", self.addr)))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Issue a call and wait (bounded by `deadline`) for the matching reply, returning
    /// the success result bytes.
    pub async fn call(
        &mut self,
        prog: u32,
        vers: u32,
        proc: u32,
        args: impl XdrPack,
        deadline: Duration,
    ) -> Result<Vec<u8>> {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);

        let mut packed = vec![];
        args.pack_xdr(&mut packed);

        let msg = RpcMessage {
            xid,
            body: MessageBody::Call(CallBody {
                rpc_version: RPC_VERSION,
                prog,
                vers,
                proc,
                cred: OpaqueAuth::new_null(),
                verf: OpaqueAuth::new_null(),
                args: packed,
            }),
        };

        let mut frame = vec![];
        msg.pack_xdr(&mut frame);

        let stream = self.stream.as_mut().ok_or_else(|| Error::Connect("not connected".into()))?;

        let header = (frame.len() as u32) | LAST_FRAGMENT_MARKER;
        let mut packet = header.to_be_bytes().to_vec();
        packet.extend(frame);

        time::timeout(deadline, stream.write_all(&packet))
            .await
            .map_err(|_| Error::Timeout("RPC call write deadline elapsed".into()))?
            .map_err(Error::from)?;

        let reply = time::timeout(deadline, Self::read_matching_reply(stream, xid))
            .await
            .map_err(|_| Error::Timeout("RPC call reply deadline elapsed".into()))??;

        reply.into_success_result()
    }

    async fn read_matching_reply(stream: &mut TcpStream, xid: u32) -> Result<RpcMessage> {
        loop {
            let mut packet = read_record(stream).await?;
            let msg = RpcMessage::unpack(&mut packet)?;

            if msg.xid == xid {
                return Ok(msg);
            }

            log::warn!("discarding RPC reply with non-matching xid {} (expected {xid})", msg.xid);
        }
    }
}

/// Read one full (possibly multi-fragment) record-marked ONC RPC message.
async fn read_record(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut record = vec![];
    loop {
        let header = stream.read_u32().await?;
        let size = (header & !LAST_FRAGMENT_MARKER) as usize;

        let mut fragment = vec![0; size];
        stream.read_exact(&mut fragment).await?;
        record.append(&mut fragment);

        if (header & LAST_FRAGMENT_MARKER) != 0 {
            return Ok(record);
        }
    }
}

#[derive(Debug)]
pub enum AuthStat {
    AuthOk,
    AuthBadCred,
    AuthRejectedCred,
    AuthBadVerf,
    AuthRejectedVerf,
    AuthTooWeak,
    AuthInvalidResp,
    AuthFailed,
    Other(u32),
}
impl AuthStat {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(match xdr::unpack_u32(src)? {
            0 => Self::AuthOk,
            1 => Self::AuthBadCred,
            2 => Self::AuthRejectedCred,
            3 => Self::AuthBadVerf,
            4 => Self::AuthRejectedVerf,
            5 => Self::AuthTooWeak,
            6 => Self::AuthInvalidResp,
            7 => Self::AuthFailed,
            i => Self::Other(i),
        })
    }
}

#[derive(Debug)]
pub enum MessageBody {
    Call(CallBody),
    Reply(ReplyBody),
}
impl MessageBody {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        match xdr::unpack_u32(src)? {
            0 => Ok(Self::Call(CallBody::unpack(src)?)),
            1 => Ok(Self::Reply(ReplyBody::unpack(src)?)),
            i => Err(Error::Io(format!("unknown RPC message type {i}"))),
        }
    }
}
impl XdrPack for MessageBody {
    fn pack_xdr(self, out: &mut Vec<u8>) {
        match self {
            Self::Call(call) => {
                0u32.pack_xdr(out);
                call.pack_xdr(out);
            }
            Self::Reply(_reply) => {
                1u32.pack_xdr(out);
                unimplemented!("this client never sends a reply body")
            }
        }
    }
}

#[derive(Debug)]
pub struct RpcMessage {
    pub xid: u32,
    pub body: MessageBody,
}
impl RpcMessage {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self {
            xid: xdr::unpack_u32(src)?,
            body: MessageBody::unpack(src)?,
        })
    }

    /// Consume self, returning the success result bytes or an error describing
    /// whatever non-success reply was received.
    pub fn into_success_result(self) -> Result<Vec<u8>> {
        let MessageBody::Reply(reply) = self.body else {
            return Err(Error::Io("RPC message is not a reply".into()));
        };

        let accepted = match reply {
            ReplyBody::Rejected(reject) => {
                return Err(Error::Io(format!("RPC reply rejected: {reject:?}")));
            }
            ReplyBody::Accepted(accept) => accept,
        };

        match accepted.body {
            AcceptedReplyBodyType::Success(success) => Ok(success.results),
            other => Err(Error::Io(format!("RPC reply was not success: {other:?}"))),
        }
    }
}
impl XdrPack for RpcMessage {
    fn pack_xdr(self, out: &mut Vec<u8>) {
        self.xid.pack_xdr(out);
        self.body.pack_xdr(out);
    }
}

#[derive(Debug)]
pub struct CallBody {
    pub rpc_version: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: OpaqueAuth,
    pub verf: OpaqueAuth,
    pub args: Vec<u8>,
}
impl CallBody {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self {
            rpc_version: xdr::unpack_u32(src)?,
            prog: xdr::unpack_u32(src)?,
            vers: xdr::unpack_u32(src)?,
            proc: xdr::unpack_u32(src)?,
            cred: OpaqueAuth::unpack(src)?,
            verf: OpaqueAuth::unpack(src)?,
            args: xdr::unpack_opaque(src)?,
        })
    }
}
impl XdrPack for CallBody {
    fn pack_xdr(self, out: &mut Vec<u8>) {
        self.rpc_version.pack_xdr(out);
        self.prog.pack_xdr(out);
        self.vers.pack_xdr(out);
        self.proc.pack_xdr(out);
        self.cred.pack_xdr(out);
        self.verf.pack_xdr(out);
        out.extend(self.args);
    }
}

#[derive(Debug)]
pub enum ReplyBody {
    Accepted(AcceptedReplyBody),
    Rejected(RejectedReplyBody),
}
impl ReplyBody {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        match xdr::unpack_u32(src)? {
            0 => Ok(Self::Accepted(AcceptedReplyBody::unpack(src)?)),
            1 => Ok(Self::Rejected(RejectedReplyBody::unpack(src)?)),
            i => Err(Error::Io(format!("unknown RPC reply type {i}"))),
        }
    }
}

#[derive(Debug)]
pub struct AcceptedReplyBody {
    pub verf: OpaqueAuth,
    pub body: AcceptedReplyBodyType,
}
impl AcceptedReplyBody {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self {
            verf: OpaqueAuth::unpack(src)?,
            body: AcceptedReplyBodyType::unpack(src)?,
        })
    }
}

#[derive(Debug)]
pub enum AcceptedReplyBodyType {
    Success(SuccessAcceptedReplyBody),
    ProgUnavail,
    ProgMismatch(ProgMismatchBody),
    ProcUnavail,
    GarbageArgs,
    SystemErr,
}
impl AcceptedReplyBodyType {
    fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        match xdr::unpack_u32(src)? {
            0 => Ok(Self::Success(SuccessAcceptedReplyBody::unpack(src)?)),
            1 => Ok(Self::ProgUnavail),
            2 => Ok(Self::ProgMismatch(ProgMismatchBody::unpack(src)?)),
            3 => Ok(Self::ProcUnavail),
            4 => Ok(Self::GarbageArgs),
            5 => Ok(Self::SystemErr),
            i => Err(Error::Io(format!("unknown accepted reply type {i}"))),
        }
    }
}

#[derive(Debug)]
pub struct SuccessAcceptedReplyBody {
    pub results: Vec<u8>,
}
impl SuccessAcceptedReplyBody {
    fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self { results: mem::take(src) })
    }
}

#[derive(Debug)]
pub struct ProgMismatchBody {
    pub low: u32,
    pub high: u32,
}
impl ProgMismatchBody {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self {
            low: xdr::unpack_u32(src)?,
            high: xdr::unpack_u32(src)?,
        })
    }
}

#[derive(Debug)]
pub enum RejectedReplyBody {
    Mismatch(ProgMismatchBody),
    AuthError(AuthStat),
}
impl RejectedReplyBody {
    fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        match xdr::unpack_u32(src)? {
            0 => Ok(Self::Mismatch(ProgMismatchBody::unpack(src)?)),
            1 => Ok(Self::AuthError(AuthStat::unpack(src)?)),
            i => Err(Error::Io(format!("unknown rejected reply type {i}"))),
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug)]
pub enum AuthFlavor {
    Null = 0,
    Sys = 1,
    Short = 2,
    Dh = 3,
    RpcSecGss = 4,
}

#[derive(Debug)]
pub(crate) struct OpaqueAuth {
    pub flavor: AuthFlavor,
    pub body: Vec<u8>,
}
impl OpaqueAuth {
    pub fn unpack(src: &mut Vec<u8>) -> Result<Self> {
        Ok(Self {
            flavor: match xdr::unpack_u32(src)? {
                0 => AuthFlavor::Null,
                1 => AuthFlavor::Sys,
                2 => AuthFlavor::Short,
                3 => AuthFlavor::Dh,
                4 => AuthFlavor::RpcSecGss,
                i => return Err(Error::Io(format!("unknown auth flavor {i}"))),
            },
            body: xdr::unpack_opaque(src)?,
        })
    }

    pub fn new_null() -> Self {
        Self { flavor: AuthFlavor::Null, body: vec![] }
    }
}
impl XdrPack for OpaqueAuth {
    fn pack_xdr(self, out: &mut Vec<u8>) {
        (self.flavor as u32).pack_xdr(out);
        self.body.pack_xdr(out);
    }
}
