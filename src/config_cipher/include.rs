/// DES key shared by the vendor's config export and import.
pub static CONFIG_KEY: [u8; 8] = [0x47, 0x8D, 0xA5, 0x0B, 0xF9, 0xE3, 0xD2, 0xCF];

pub const DIGEST_SIZE: usize = 16;
