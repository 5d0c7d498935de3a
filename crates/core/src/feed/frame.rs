//! Wire format between the discovery sidecar and the socket feed.
//!
//! Every frame starts with a one-byte kind:
//!
//! | kind | body |
//! |------|------|
//! | `0x01` Metadata | content id (20) · length (`u32` BE) · bencoded info dict |
//! | `0x02` AnnouncePeer | content id (20) · family (`4`/`6`) · IP (4/16) · port (`u16` BE) |
//! | `0x03` RequestMetadata | same body as AnnouncePeer |

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::PeerAnnounce;
use crate::metadata::{ContentId, CONTENT_ID_LEN};

/// Largest accepted metadata payload.
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024 * 1024;

const KIND_METADATA: u8 = 0x01;
const KIND_ANNOUNCE_PEER: u8 = 0x02;
const KIND_REQUEST_METADATA: u8 = 0x03;

const FAMILY_V4: u8 = 4;
const FAMILY_V6: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Sidecar to spider: fetched metadata.
    Metadata {
        content_id: ContentId,
        payload: Vec<u8>,
    },
    /// Sidecar to spider: a peer has the content.
    AnnouncePeer(PeerAnnounce),
    /// Spider to sidecar: fetch the metadata from that peer.
    RequestMetadata(PeerAnnounce),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed mid-frame")]
    Truncated,

    #[error("Unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("Unknown address family: {0}")]
    UnknownFamily(u8),

    #[error("Payload of {0} bytes exceeds the limit")]
    PayloadTooLarge(usize),
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut buf = Vec::new();
        match self {
            Frame::Metadata {
                content_id,
                payload,
            } => {
                if payload.len() > MAX_PAYLOAD_LEN {
                    return Err(FrameError::PayloadTooLarge(payload.len()));
                }
                buf.reserve(1 + CONTENT_ID_LEN + 4 + payload.len());
                buf.push(KIND_METADATA);
                buf.extend_from_slice(content_id.as_bytes());
                buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                buf.extend_from_slice(payload);
            }
            Frame::AnnouncePeer(announce) => {
                buf.push(KIND_ANNOUNCE_PEER);
                encode_peer(&mut buf, announce);
            }
            Frame::RequestMetadata(announce) => {
                buf.push(KIND_REQUEST_METADATA);
                encode_peer(&mut buf, announce);
            }
        }
        Ok(buf)
    }
}

fn encode_peer(buf: &mut Vec<u8>, announce: &PeerAnnounce) {
    buf.extend_from_slice(announce.content_id.as_bytes());
    match announce.peer.ip() {
        IpAddr::V4(ip) => {
            buf.push(FAMILY_V4);
            buf.extend_from_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            buf.push(FAMILY_V6);
            buf.extend_from_slice(&ip.octets());
        }
    }
    buf.extend_from_slice(&announce.peer.port().to_be_bytes());
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut kind = [0u8; 1];
    if reader.read(&mut kind).await? == 0 {
        return Ok(None);
    }

    let frame = match kind[0] {
        KIND_METADATA => {
            let content_id = read_content_id(reader).await?;
            let mut len = [0u8; 4];
            read_exact(reader, &mut len).await?;
            let len = u32::from_be_bytes(len) as usize;
            if len > MAX_PAYLOAD_LEN {
                return Err(FrameError::PayloadTooLarge(len));
            }
            let mut payload = vec![0u8; len];
            read_exact(reader, &mut payload).await?;
            Frame::Metadata {
                content_id,
                payload,
            }
        }
        KIND_ANNOUNCE_PEER => Frame::AnnouncePeer(read_peer(reader).await?),
        KIND_REQUEST_METADATA => Frame::RequestMetadata(read_peer(reader).await?),
        other => return Err(FrameError::UnknownKind(other)),
    };

    Ok(Some(frame))
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()?).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_peer<R: AsyncRead + Unpin>(reader: &mut R) -> Result<PeerAnnounce, FrameError> {
    let content_id = read_content_id(reader).await?;

    let mut family = [0u8; 1];
    read_exact(reader, &mut family).await?;
    let ip = match family[0] {
        FAMILY_V4 => {
            let mut octets = [0u8; 4];
            read_exact(reader, &mut octets).await?;
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        FAMILY_V6 => {
            let mut octets = [0u8; 16];
            read_exact(reader, &mut octets).await?;
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        other => return Err(FrameError::UnknownFamily(other)),
    };

    let mut port = [0u8; 2];
    read_exact(reader, &mut port).await?;

    Ok(PeerAnnounce {
        content_id,
        peer: SocketAddr::new(ip, u16::from_be_bytes(port)),
    })
}

async fn read_content_id<R: AsyncRead + Unpin>(reader: &mut R) -> Result<ContentId, FrameError> {
    let mut bytes = [0u8; CONTENT_ID_LEN];
    read_exact(reader, &mut bytes).await?;
    Ok(ContentId::new(bytes))
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FrameError::Truncated),
        Err(e) => Err(FrameError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ContentId {
        ContentId::new([0x11; CONTENT_ID_LEN])
    }

    #[tokio::test]
    async fn test_metadata_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let frame = Frame::Metadata {
            content_id: id(),
            payload: b"d4:name1:xe".to_vec(),
        };

        write_frame(&mut client, &frame).await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(frame));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_peer_frames_v4_and_v6() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let v4 = Frame::AnnouncePeer(PeerAnnounce {
            content_id: id(),
            peer: "10.0.0.1:6881".parse().unwrap(),
        });
        let v6 = Frame::RequestMetadata(PeerAnnounce {
            content_id: id(),
            peer: "[::1]:51413".parse().unwrap(),
        });

        write_frame(&mut client, &v4).await.unwrap();
        write_frame(&mut client, &v6).await.unwrap();

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(v4));
        assert_eq!(read_frame(&mut server).await.unwrap(), Some(v6));
    }

    #[test]
    fn test_metadata_layout() {
        let bytes = Frame::Metadata {
            content_id: id(),
            payload: vec![1, 2, 3],
        }
        .encode()
        .unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..21], &[0x11; 20]);
        assert_eq!(&bytes[21..25], &[0, 0, 0, 3]);
        assert_eq!(&bytes[25..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let mut input: &[u8] = &[0x7f, 0, 0];
        assert!(matches!(
            read_frame(&mut input).await,
            Err(FrameError::UnknownKind(0x7f))
        ));
    }

    #[tokio::test]
    async fn test_unknown_family() {
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.push(5);
        let mut input: &[u8] = &bytes;
        assert!(matches!(
            read_frame(&mut input).await,
            Err(FrameError::UnknownFamily(5))
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame() {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.extend_from_slice(&10u32.to_be_bytes());
        bytes.extend_from_slice(b"short");
        let mut input: &[u8] = &bytes;
        assert!(matches!(
            read_frame(&mut input).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.extend_from_slice(&((MAX_PAYLOAD_LEN as u32) + 1).to_be_bytes());
        let mut input: &[u8] = &bytes;
        assert!(matches!(
            read_frame(&mut input).await,
            Err(FrameError::PayloadTooLarge(_))
        ));
    }
}
