//! Client-side Bolt handshake negotiation.

use super::{BoltVersion, HandshakeError, BOLT_MAGIC, HANDSHAKE_SIZE, MAX_PROPOSALS};

/// The client half of the handshake.
///
/// 1. Client sends 20 bytes: 4-byte magic + 4 x 4-byte version proposals
/// 2. Server answers with 4 bytes: the chosen version, or zeros if none fits
/// 3. The chosen version must be one the client proposed
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Proposed versions, most preferred first
    proposals: Vec<BoltVersion>,
}

impl Handshake {
    /// Build a handshake proposing `versions` in order of preference.
    pub fn new(versions: &[BoltVersion]) -> Result<Self, HandshakeError> {
        if versions.is_empty() || versions.len() > MAX_PROPOSALS {
            return Err(HandshakeError::InvalidData(format!(
                "between 1 and {} protocol versions must be proposed, got {}",
                MAX_PROPOSALS,
                versions.len()
            )));
        }
        Ok(Self {
            proposals: versions.to_vec(),
        })
    }

    pub fn proposals(&self) -> &[BoltVersion] {
        &self.proposals
    }

    /// Magic preamble followed by the proposals, zero padded to four slots.
    pub fn request_bytes(&self) -> [u8; HANDSHAKE_SIZE] {
        let mut out = [0u8; HANDSHAKE_SIZE];
        out[..4].copy_from_slice(&BOLT_MAGIC);
        for (slot, version) in out[4..].chunks_exact_mut(4).zip(&self.proposals) {
            slot.copy_from_slice(&version.to_bytes());
        }
        out
    }

    /// Validate the server's 4-byte answer.
    pub fn negotiate(&self, response: [u8; 4]) -> Result<BoltVersion, HandshakeError> {
        if &response == b"HTTP" {
            return Err(HandshakeError::HttpResponse);
        }
        let version = BoltVersion::from_bytes(response).ok_or(HandshakeError::NoCompatibleVersion)?;
        if self.proposals.contains(&version) {
            Ok(version)
        } else {
            Err(HandshakeError::UnsupportedVersion(version))
        }
    }
}

/// Split a 20-byte client handshake into its proposals (server side, used by
/// test peers). Empty slots are skipped.
pub fn parse_request(data: &[u8]) -> Result<Vec<BoltVersion>, HandshakeError> {
    if data.len() < HANDSHAKE_SIZE {
        return Err(HandshakeError::InvalidData(format!(
            "Expected {} bytes, got {}",
            HANDSHAKE_SIZE,
            data.len()
        )));
    }
    if data[..4] != BOLT_MAGIC {
        return Err(HandshakeError::InvalidData(format!(
            "Invalid magic number {:02X?}",
            &data[..4]
        )));
    }
    Ok(data[4..HANDSHAKE_SIZE]
        .chunks_exact(4)
        .filter_map(|c| BoltVersion::from_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
