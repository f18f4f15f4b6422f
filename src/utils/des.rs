use des::Des;
use ecb::cipher::generic_array::GenericArray;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use ecb::{Decryptor, Encryptor};

use crate::error::{FwError, Result};

pub const DES_BLOCK_SIZE: usize = 8;

type DesEcbEnc = Encryptor<Des>;
type DesEcbDec = Decryptor<Des>;

pub fn encrypt_des_ecb(key: &[u8; 8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() % DES_BLOCK_SIZE != 0 {
        return Err(FwError::ConfigMalformed(plaintext.len()));
    }

    let mut encryptor = DesEcbEnc::new(&(*key).into());
    let mut buffer = plaintext.to_vec();

    for chunk in buffer.chunks_exact_mut(DES_BLOCK_SIZE) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }

    Ok(buffer)
}

pub fn decrypt_des_ecb(key: &[u8; 8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % DES_BLOCK_SIZE != 0 {
        return Err(FwError::ConfigMalformed(ciphertext.len()));
    }

    let mut decryptor = DesEcbDec::new(&(*key).into());
    let mut buffer = ciphertext.to_vec();

    for chunk in buffer.chunks_exact_mut(DES_BLOCK_SIZE) {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }

    Ok(buffer)
}
