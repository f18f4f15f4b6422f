mod include;

use std::path::Path;

use log::{debug, info};

use crate::error::{FwError, Result, Warning};
use crate::utils::common;
use crate::utils::des::{decrypt_des_ecb, encrypt_des_ecb, DES_BLOCK_SIZE};
use include::*;

pub struct DecryptedConfig {
    pub payload: Vec<u8>,
    pub warning: Option<Warning>,
}

pub fn encrypt(plaintext: &[u8]) -> Result<Vec<u8>> {
    let digest = md5::compute(plaintext);

    let mut buffer = Vec::with_capacity(DIGEST_SIZE + plaintext.len() + DES_BLOCK_SIZE);
    buffer.extend_from_slice(&digest.0);
    buffer.extend_from_slice(plaintext);
    let padded_len = buffer.len().div_ceil(DES_BLOCK_SIZE) * DES_BLOCK_SIZE;
    buffer.resize(padded_len, 0);

    encrypt_des_ecb(&CONFIG_KEY, &buffer)
}

pub fn decrypt(ciphertext: &[u8]) -> Result<DecryptedConfig> {
    if ciphertext.len() < DIGEST_SIZE {
        return Err(FwError::ConfigMalformed(ciphertext.len()));
    }
    let plain = decrypt_des_ecb(&CONFIG_KEY, ciphertext)?;
    let (stored, body) = plain.split_at(DIGEST_SIZE);

    let first_zero = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    let truncated = &body[..first_zero];
    if md5::compute(truncated).0 == stored {
        return Ok(DecryptedConfig { payload: truncated.to_vec(), warning: None });
    }

    // Payload may itself contain zeros; then only the block padding is trailing.
    let trailing_zeros =
        body.iter().rev().take(DES_BLOCK_SIZE - 1).take_while(|&&b| b == 0).count();
    for pad in 0..=trailing_zeros {
        let candidate = &body[..body.len() - pad];
        if md5::compute(candidate).0 == stored {
            debug!("Payload contains zero bytes, stripped {} bytes of padding", pad);
            return Ok(DecryptedConfig { payload: candidate.to_vec(), warning: None });
        }
    }

    let warning = Warning::ConfigDigestMismatch {
        stored: hex::encode(stored),
        computed: hex::encode(md5::compute(truncated).0),
    };
    Ok(DecryptedConfig { payload: truncated.to_vec(), warning: Some(warning) })
}

pub fn decrypt_file(input: &Path, output: &Path) -> Result<Option<Warning>> {
    let ciphertext = common::read_all(input)?;
    let decrypted = decrypt(&ciphertext)?;
    common::write_file(output, &decrypted.payload)?;
    info!("Decrypted config ({} bytes) written to {}", decrypted.payload.len(), output.display());
    Ok(decrypted.warning)
}

pub fn encrypt_file(input: &Path, output: &Path) -> Result<()> {
    let plaintext = common::read_all(input)?;
    let ciphertext = encrypt(&plaintext)?;
    common::write_file(output, &ciphertext)?;
    info!("Encrypted config ({} bytes) written to {}", ciphertext.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_any_payload() {
        let payloads: [&[u8]; 6] = [
            b"",
            b"abc",
            b"exactly8",
            b"<config><wan>dhcp</wan></config>",
            b"inner\x00zero\x00\x00bytes",
            b"ends in zero\x00",
        ];
        for payload in payloads {
            let decrypted = decrypt(&encrypt(payload).unwrap()).unwrap();
            assert_eq!(decrypted.payload, payload, "{:?}", payload);
            assert_eq!(decrypted.warning, None);
        }
    }

    #[test]
    fn pads_to_block_multiple() {
        // 16 digest bytes + 8 payload bytes is already aligned
        assert_eq!(encrypt(b"12345678").unwrap().len(), 24);
        assert_eq!(encrypt(b"123456789").unwrap().len(), 32);
        assert_eq!(encrypt(b"").unwrap().len(), 16);
    }

    #[test]
    fn layout_is_digest_then_payload() {
        let ciphertext = encrypt(b"hello").unwrap();
        let plain = decrypt_des_ecb(&CONFIG_KEY, &ciphertext).unwrap();
        assert_eq!(&plain[..16], &md5::compute(b"hello").0);
        assert_eq!(&plain[16..21], b"hello");
        assert!(plain[21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn tampered_digest_is_a_warning() {
        let mut ciphertext = encrypt(b"some config text here").unwrap();
        ciphertext[0] ^= 0x01;
        let decrypted = decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted.payload, b"some config text here");
        assert!(matches!(decrypted.warning, Some(Warning::ConfigDigestMismatch { .. })));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(decrypt(&[0u8; 8]), Err(FwError::ConfigMalformed(8))));
        assert!(matches!(decrypt(&[0u8; 20]), Err(FwError::ConfigMalformed(20))));
    }

    #[test]
    fn file_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("config.xml");
        std::fs::write(&plain, b"<config/>").unwrap();

        encrypt_file(&plain, &dir.path().join("config.bin")).unwrap();
        let decrypted = dir.path().join("config.dec");
        let warning = decrypt_file(&dir.path().join("config.bin"), &decrypted).unwrap();
        assert_eq!(warning, None);
        assert_eq!(std::fs::read(&decrypted).unwrap(), b"<config/>");
    }
}
