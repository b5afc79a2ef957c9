use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature};

use crate::error::CryptoError;
use crate::proto;

/// Compact signature length, `[R || S]`.
pub const SIGNATURE_LEN: usize = 64;

/// Who produced a signature: a protocol key, or an external wallet using
/// Ethereum personal-sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Ecdsa,
    Wallet,
}

/// ECDSA secp256k1 signature with its recovery bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LEN],
    recovery: u8,
    kind: SignatureKind,
}

impl Signature {
    pub fn new(kind: SignatureKind, bytes: &[u8], recovery: u32) -> Result<Self, CryptoError> {
        let bytes: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength(bytes.len()))?;
        let recovery = match recovery {
            0 => 0,
            1 => 1,
            other => return Err(CryptoError::InvalidRecoveryBit(other)),
        };
        Ok(Self {
            bytes,
            recovery,
            kind,
        })
    }

    pub(crate) fn from_ecdsa(kind: SignatureKind, sig: &EcdsaSignature, recid: RecoveryId) -> Self {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&sig.to_bytes());
        Self {
            bytes,
            recovery: u8::from(recid.is_y_odd()),
            kind,
        }
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.bytes
    }

    pub fn recovery(&self) -> u8 {
        self.recovery
    }

    /// 65-byte Ethereum form `[R || S || V]` with `V = 27 + recovery`.
    pub fn to_eth_bytes(&self) -> [u8; SIGNATURE_LEN + 1] {
        let mut out = [0u8; SIGNATURE_LEN + 1];
        out[..SIGNATURE_LEN].copy_from_slice(&self.bytes);
        out[SIGNATURE_LEN] = 27 + self.recovery;
        out
    }

    /// Parse the 65-byte Ethereum form. Accepts `V` as 0/1 or 27/28.
    pub fn from_eth_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_LEN + 1 {
            return Err(CryptoError::InvalidSignatureLength(bytes.len()));
        }
        let v = u32::from(bytes[SIGNATURE_LEN]);
        let recovery = if v >= 27 { v - 27 } else { v };
        Self::new(SignatureKind::Wallet, &bytes[..SIGNATURE_LEN], recovery)
    }

    pub(crate) fn to_ecdsa(&self) -> Result<(EcdsaSignature, RecoveryId), CryptoError> {
        let sig = EcdsaSignature::from_slice(&self.bytes)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let recid = RecoveryId::from_byte(self.recovery)
            .ok_or(CryptoError::InvalidRecoveryBit(u32::from(self.recovery)))?;
        Ok((sig, recid))
    }

    pub fn to_proto(&self) -> proto::Signature {
        let union = match self.kind {
            SignatureKind::Ecdsa => {
                proto::signature::Union::EcdsaCompact(proto::signature::EcdsaCompact {
                    bytes: self.bytes.to_vec(),
                    recovery: u32::from(self.recovery),
                })
            }
            SignatureKind::Wallet => {
                proto::signature::Union::WalletEcdsaCompact(proto::signature::WalletEcdsaCompact {
                    bytes: self.bytes.to_vec(),
                    recovery: u32::from(self.recovery),
                })
            }
        };
        proto::Signature { union: Some(union) }
    }

    pub fn from_proto(value: &proto::Signature) -> Result<Self, CryptoError> {
        match &value.union {
            Some(proto::signature::Union::EcdsaCompact(s)) => {
                Self::new(SignatureKind::Ecdsa, &s.bytes, s.recovery)
            }
            Some(proto::signature::Union::WalletEcdsaCompact(s)) => {
                Self::new(SignatureKind::Wallet, &s.bytes, s.recovery)
            }
            None => Err(CryptoError::Malformed("signature")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_recovery_validated() {
        assert_eq!(
            Signature::new(SignatureKind::Ecdsa, &[0u8; 63], 0).unwrap_err(),
            CryptoError::InvalidSignatureLength(63)
        );
        assert_eq!(
            Signature::new(SignatureKind::Ecdsa, &[0u8; 64], 2).unwrap_err(),
            CryptoError::InvalidRecoveryBit(2)
        );
        assert!(Signature::new(SignatureKind::Ecdsa, &[0u8; 64], 1).is_ok());
    }

    #[test]
    fn eth_form_uses_27_offset() {
        let sig = Signature::new(SignatureKind::Wallet, &[7u8; 64], 1).unwrap();
        let eth = sig.to_eth_bytes();
        assert_eq!(eth[64], 28);
        assert_eq!(Signature::from_eth_bytes(&eth).unwrap(), sig);
    }

    #[test]
    fn proto_keeps_kind() {
        let wallet = Signature::new(SignatureKind::Wallet, &[1u8; 64], 0).unwrap();
        let ecdsa = Signature::new(SignatureKind::Ecdsa, &[1u8; 64], 0).unwrap();
        assert_eq!(Signature::from_proto(&wallet.to_proto()).unwrap(), wallet);
        assert_eq!(Signature::from_proto(&ecdsa.to_proto()).unwrap(), ecdsa);
        assert_ne!(wallet, ecdsa);
    }
}
