use rand::RngCore;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

/// XORs the buffer in place with the keystream derived from `key` and `iv`:
/// byte `i` is combined with `key[i % 32]` and `iv[i % 16]`. The transform
/// is its own inverse.
#[inline]
pub fn apply(data: &mut [u8], key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % KEY_SIZE] ^ iv[i % IV_SIZE];
    }
}

/// Generates a fresh frame key.
#[inline]
pub fn random_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Generates a fresh initialization vector.
#[inline]
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_involution() {
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let key = random_key();
        let iv = random_iv();

        let mut data = original.clone();
        apply(&mut data, &key, &iv);

        assert_ne!(data, original);

        apply(&mut data, &key, &iv);

        assert_eq!(data, original);
    }

    #[test]
    fn test_apply_known_vector() {
        // With a zero IV the keystream degenerates to the key alone.
        let key = [0xffu8; KEY_SIZE];
        let iv = [0u8; IV_SIZE];

        let mut data = vec![0u8, 0x0f, 0xff];
        apply(&mut data, &key, &iv);

        assert_eq!(data, vec![0xff, 0xf0, 0x00]);
    }

    #[test]
    fn test_apply_wraps_past_key_and_iv() {
        let mut key = [0u8; KEY_SIZE];
        key[0] = 0xaa;
        let mut iv = [0u8; IV_SIZE];
        iv[0] = 0x55;

        // Byte 32 reuses key[0] but iv[0] only recurs at multiples of 16.
        let mut data = vec![0u8; 33];
        apply(&mut data, &key, &iv);

        assert_eq!(data[0], 0xaa ^ 0x55);
        assert_eq!(data[16], 0x55);
        assert_eq!(data[32], 0xaa ^ 0x55);
    }

    #[test]
    fn test_random_material_is_fresh() {
        assert_ne!(random_key(), random_key());
        assert_ne!(random_iv(), random_iv());
    }

    #[test]
    fn test_empty_buffer() {
        let mut data: Vec<u8> = Vec::new();
        apply(&mut data, &random_key(), &random_iv());

        assert!(data.is_empty());
    }
}
