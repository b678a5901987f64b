//! AES-128-CFB8 transport encryption.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::KeyIvInit;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut};
use cfb8::{Decryptor, Encryptor};

/// Stateful stream encryption using AES-128-CFB8 with the shared secret as
/// both key and IV.
///
/// The cipher state is continuous across packets: each packet continues the
/// stream from where the previous one left off. Separate cipher instances
/// are used for the send and receive directions.
pub struct PacketEncryption {
    encrypt_cipher: Encryptor<Aes128>,
    decrypt_cipher: Decryptor<Aes128>,
}

impl PacketEncryption {
    /// Create a new encryption context from the decrypted shared secret.
    pub fn new(secret: &[u8; 16]) -> Self {
        Self {
            encrypt_cipher: Encryptor::<Aes128>::new(secret.into(), secret.into()),
            decrypt_cipher: Decryptor::<Aes128>::new(secret.into(), secret.into()),
        }
    }

    /// Encrypt outgoing bytes in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        // Byte-by-byte via BlockEncryptMut preserves cipher state between calls.
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.encrypt_cipher.encrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }

    /// Decrypt incoming bytes in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.decrypt_cipher.decrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 16] = [0x42; 16];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut server = PacketEncryption::new(&SECRET);
        let mut client = PacketEncryption::new(&SECRET);

        let plaintext = b"login success payload".to_vec();
        let mut data = plaintext.clone();
        server.encrypt(&mut data);
        assert_ne!(data, plaintext);
        client.decrypt(&mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn state_continues_across_packets() {
        let mut whole = PacketEncryption::new(&SECRET);
        let mut split = PacketEncryption::new(&SECRET);

        let mut all = b"first packet, second packet".to_vec();
        whole.encrypt(&mut all);

        let mut a = b"first packet, ".to_vec();
        let mut b = b"second packet".to_vec();
        split.encrypt(&mut a);
        split.encrypt(&mut b);
        a.extend_from_slice(&b);
        assert_eq!(a, all);
    }

    #[test]
    fn directions_are_independent() {
        let mut ctx = PacketEncryption::new(&SECRET);

        // Decrypting our own stream works because the remote cipher starts
        // from the same key/IV.
        let mut data = b"ping".to_vec();
        ctx.encrypt(&mut data);
        ctx.decrypt(&mut data);
        assert_eq!(data, b"ping");
    }

    #[test]
    fn multi_packet_roundtrip() {
        let mut server = PacketEncryption::new(&SECRET);
        let mut client = PacketEncryption::new(&SECRET);

        for i in 0..10 {
            let plaintext = format!("packet {i}").into_bytes();
            let mut data = plaintext.clone();
            server.encrypt(&mut data);
            client.decrypt(&mut data);
            assert_eq!(data, plaintext);
        }
    }

    #[test]
    fn empty_slice_is_noop() {
        let mut ctx = PacketEncryption::new(&SECRET);
        let mut data: Vec<u8> = Vec::new();
        ctx.encrypt(&mut data);
        assert!(data.is_empty());
    }
}
